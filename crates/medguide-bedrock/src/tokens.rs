use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub cost_usd: f64,
}

/// Per-million-token prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub fn estimate_cost(&self, input: u64, output: u64) -> f64 {
        (input as f64 * self.input_per_million + output as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

pub fn extract_token_usage(
    usage: &aws_sdk_bedrockruntime::types::TokenUsage,
    pricing: Option<ModelPricing>,
) -> TokenUsage {
    let input = usage.input_tokens.max(0) as u64;
    let output = usage.output_tokens.max(0) as u64;
    TokenUsage {
        input,
        output,
        cost_usd: pricing.map_or(0.0, |p| p.estimate_cost(input, output)),
    }
}

/// Approximate list prices; unknown models cost nothing in the logs.
pub fn get_pricing(model_id: &str) -> Option<ModelPricing> {
    match model_id {
        id if id.contains("claude-opus-4") => Some(ModelPricing {
            input_per_million: 15.0,
            output_per_million: 75.0,
        }),
        id if id.contains("claude-sonnet-4") => Some(ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }),
        id if id.contains("claude-haiku") => Some(ModelPricing {
            input_per_million: 0.80,
            output_per_million: 4.0,
        }),
        _ => None,
    }
}
