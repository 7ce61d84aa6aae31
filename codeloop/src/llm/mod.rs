//! Text-generation backend seam.
//!
//! The workflow talks to a [`Generator`] and never to a concrete API, so
//! tests can script replies deterministically. The one real implementation
//! lives in [`openai`].

pub mod openai;
pub mod output;

use anyhow::Result;

use crate::core::state::TokenUsage;
pub use output::{GeneratorOutput, MalformedOutputError, parse_output};

/// Which structured output the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSchema {
    Planning,
    Code,
    TestInference,
    ErrorAnalysis,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: String,
    pub prompt: String,
    pub schema: OutputSchema,
}

#[derive(Debug, Clone)]
pub struct GeneratorReply {
    pub output: GeneratorOutput,
    pub usage: TokenUsage,
}

pub trait Generator {
    fn generate(&self, request: &GenerateRequest) -> Result<GeneratorReply>;
}
