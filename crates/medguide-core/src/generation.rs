//! The text-generation collaborator. It phrases an already computed result;
//! nothing it returns feeds back into diagnosis, plan or safety decisions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::future::BoxFuture;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub session_id: String,
    /// Instructions for the model.
    pub system_prompt: String,
    /// The structured result rendered as text; the model may only rephrase it.
    pub structured_summary: String,
    /// Evidence excerpts keyed by locator URI.
    pub evidence_context: Vec<(String, String)>,
    /// Recent conversation, oldest first.
    pub history: Vec<String>,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service error: {0}")]
    Service(String),

    #[error("generation returned no text")]
    EmptyResponse,
}

pub trait TextGenerator: Send + Sync {
    fn model_id(&self) -> &str;

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>>;
}
