//! Hosted-model integration for email analysis.
//!
//! `AnalysisModel` is the seam the email processor talks to. The production
//! implementation is [`client::ChatCompletionsModel`]; prompt construction and
//! response parsing live in [`prompt`].

pub mod client;
pub mod prompt;

use async_trait::async_trait;
use ideabox_types::{ActionExtraction, ClientMatch, EmailCategory};
use thiserror::Error;

use crate::models::{AnalysisContext, Email};

pub use client::ChatCompletionsModel;

/// What the model returned for one email, before it is stamped and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAnalysis {
    pub category: Option<EmailCategory>,
    pub action: ActionExtraction,
    pub client_match: Option<ClientMatch>,
    pub summary: Option<String>,
    pub topics: Vec<String>,
    pub tokens_used: u32,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request to model API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API rate limit exceeded")]
    RateLimited,

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model API request timed out")]
    Timeout,

    #[error("model returned no choices")]
    EmptyResponse,

    #[error("could not parse model output: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait AnalysisModel: Send + Sync {
    async fn analyze(
        &self,
        email: &Email,
        context: &AnalysisContext,
    ) -> Result<ModelAnalysis, ModelError>;

    /// Model identifier recorded on each analysis.
    fn model_name(&self) -> &str;
}
