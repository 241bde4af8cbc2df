//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{prompt, AnalysisModel, ModelAnalysis, ModelError};
use crate::config::AiConfig;
use crate::models::{AnalysisContext, Email};

pub struct ChatCompletionsModel {
    http: reqwest::Client,
    config: AiConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

impl ChatCompletionsModel {
    pub fn new(config: AiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        tracing::info!(
            "Initialized analysis model {} at {}",
            config.model,
            config.api_url
        );

        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl AnalysisModel for ChatCompletionsModel {
    async fn analyze(
        &self,
        email: &Email,
        context: &AnalysisContext,
    ) -> Result<ModelAnalysis, ModelError> {
        let body = json!({
            "model": &self.config.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": prompt::system_prompt(context) },
                { "role": "user", "content": prompt::user_prompt(email, self.config.max_body_chars) }
            ],
            "response_format": { "type": "json_object" }
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout
                } else {
                    ModelError::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;

        let tokens_used = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ModelError::EmptyResponse)?;

        tracing::debug!(email_id = %email.id, tokens_used, "Model responded");

        prompt::parse_analysis(&content, tokens_used, context)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
