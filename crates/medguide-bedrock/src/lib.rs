//! medguide-bedrock
//!
//! Bedrock Converse implementation of the text-generation collaborator.
//! Used only to phrase results the engine has already computed.

pub mod context;
pub mod error;
pub mod generator;
pub mod tokens;

pub use crate::generator::BedrockGenerator;
