use aws_sdk_bedrockruntime::Client;
use aws_sdk_bedrockruntime::types::{ContentBlock, ConversationRole, Message, SystemContentBlock};
use medguide_core::BoxFuture;
use medguide_core::generation::{GenerationError, GenerationRequest, TextGenerator};
use tracing::info;

use crate::context::build_user_message;
use crate::error::BedrockError;
use crate::tokens::{self, TokenUsage};

pub struct BedrockGenerator {
    client: Client,
    model_id: String,
}

impl BedrockGenerator {
    pub fn new(config: &aws_config::SdkConfig, model_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            model_id: model_id.into(),
        }
    }

    /// Loads the default AWS configuration, optionally pinned to a region.
    pub async fn from_env(region: Option<&str>, model_id: impl Into<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Self::new(&config, model_id)
    }

    async fn invoke_converse(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<(String, TokenUsage), BedrockError> {
        let response = self
            .client
            .converse()
            .model_id(&self.model_id)
            .system(SystemContentBlock::Text(system_prompt.to_string()))
            .messages(
                Message::builder()
                    .role(ConversationRole::User)
                    .content(ContentBlock::Text(user_message.to_string()))
                    .build()
                    .map_err(|e| BedrockError::Invocation(e.to_string()))?,
            )
            .send()
            .await
            .map_err(|e| BedrockError::Invocation(e.into_service_error().to_string()))?;

        let output_message = response
            .output()
            .and_then(|o| o.as_message().ok())
            .ok_or_else(|| BedrockError::ResponseParse("no message in response".to_string()))?;

        let response_text = output_message
            .content()
            .iter()
            .filter_map(|block| {
                if let ContentBlock::Text(text) = block {
                    Some(text.as_str())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        let pricing = tokens::get_pricing(&self.model_id);
        let usage = response
            .usage()
            .map(|u| tokens::extract_token_usage(u, pricing))
            .unwrap_or_default();

        Ok((response_text, usage))
    }
}

impl TextGenerator for BedrockGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            let user_message = build_user_message(request);
            let (text, usage) = self
                .invoke_converse(&request.system_prompt, &user_message)
                .await?;

            info!(
                session_id = %request.session_id,
                model = %self.model_id,
                input_tokens = usage.input,
                output_tokens = usage.output,
                cost_usd = usage.cost_usd,
                "phrasing generated"
            );

            if text.trim().is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            Ok(text)
        })
    }
}
