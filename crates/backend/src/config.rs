use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_pool_size: usize,
    pub port: u16,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub ai: AiConfig,
    pub analysis: AnalysisConfig,
}

/// Hosted model settings
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
    /// Email bodies are cut to this many characters before prompting
    pub max_body_chars: usize,
    /// USD per million tokens, used for the cost estimate
    pub cost_per_million_tokens: f64,
}

/// Bulk analysis settings
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub batch_size: usize,
    pub item_timeout: Duration,
    pub run_timeout: Duration,
    pub default_max_emails: usize,
    pub max_emails_cap: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            item_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(120),
            default_max_emails: 50,
            max_emails_cap: 200,
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_or("ANALYSIS_BATCH_SIZE", defaults.batch_size).max(1),
            item_timeout: Duration::from_secs(env_or(
                "ANALYSIS_ITEM_TIMEOUT_SECS",
                defaults.item_timeout.as_secs(),
            )),
            run_timeout: Duration::from_secs(env_or(
                "ANALYSIS_RUN_TIMEOUT_SECS",
                defaults.run_timeout.as_secs(),
            )),
            default_max_emails: env_or("ANALYSIS_MAX_EMAILS", defaults.default_max_emails),
            max_emails_cap: defaults.max_emails_cap,
        }
    }

    /// Resolve the caller's requested maximum against the default and cap.
    pub fn clamp_max_emails(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_emails)
            .clamp(1, self.max_emails_cap)
    }
}

impl AiConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: env::var("AI_API_URL").unwrap_or_else(|_| "https://api.openai.com".to_string()),
            api_key: env::var("AI_API_KEY").context("AI_API_KEY must be set")?,
            model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            request_timeout: Duration::from_secs(env_or("AI_REQUEST_TIMEOUT_SECS", 30)),
            max_body_chars: env_or("AI_MAX_BODY_CHARS", 4000),
            cost_per_million_tokens: env_or("AI_COST_PER_MILLION_TOKENS", 0.40),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_pool_size: env_or("DATABASE_POOL_SIZE", 16),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| parse_list(&s)),
            ai: AiConfig::from_env()?,
            analysis: AnalysisConfig::from_env(),
        })
    }
}

/// Read an env var, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
