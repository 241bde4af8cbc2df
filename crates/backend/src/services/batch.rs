//! Batch analysis of many emails.
//!
//! Policy: items are split into sub-batches of `batch_size`; the items of one
//! sub-batch are analyzed concurrently and sub-batches run one after another.
//! Every item is bounded by `item_timeout`. There is no automatic retry: a
//! failed or timed-out item is reported through `on_error` and counted, and
//! the rest of the batch carries on.

use async_trait::async_trait;
use futures::future::join_all;
use ideabox_types::EmailAnalysis;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::email_processor::EmailProcessor;
use crate::models::{AnalysisContext, Email};

pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(Uuid, &str) + Send + Sync>;

pub struct BatchConfig {
    pub batch_size: usize,
    /// Count already-analyzed or archived items as skipped instead of analyzing them
    pub skip_analyzed: bool,
    pub item_timeout: Duration,
    /// Called after each sub-batch with (completed, total)
    pub on_progress: Option<ProgressCallback>,
    /// Called once per failed item
    pub on_error: Option<ErrorCallback>,
}

impl BatchConfig {
    pub fn new(batch_size: usize, item_timeout: Duration) -> Self {
        Self {
            batch_size,
            skip_analyzed: true,
            item_timeout,
            on_progress: None,
            on_error: None,
        }
    }

    pub fn on_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(Uuid, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

/// Final result of analyzing one item
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Success(EmailAnalysis),
    Failure(String),
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Outcomes of the items that reached the processor; skipped items are absent
    pub results: HashMap<Uuid, ItemOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub total_tokens_used: u64,
    pub estimated_cost: f64,
}

#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process_batch(
        &self,
        items: Vec<Email>,
        context: &AnalysisContext,
        config: BatchConfig,
    ) -> BatchOutcome;
}

/// Sub-batched, concurrently-processing implementation backed by `EmailProcessor`.
pub struct ConcurrentBatchProcessor {
    processor: Arc<EmailProcessor>,
    cost_per_million_tokens: f64,
}

impl ConcurrentBatchProcessor {
    pub fn new(processor: Arc<EmailProcessor>, cost_per_million_tokens: f64) -> Self {
        Self {
            processor,
            cost_per_million_tokens,
        }
    }

    async fn process_one(
        &self,
        email: &Email,
        context: &AnalysisContext,
        timeout: Duration,
    ) -> ItemOutcome {
        match tokio::time::timeout(timeout, self.processor.process(email, context)).await {
            Ok(Ok(processed)) => ItemOutcome::Success(processed.analysis),
            Ok(Err(e)) => ItemOutcome::Failure(e.to_string()),
            Err(_) => ItemOutcome::Failure(format!("analysis timed out after {:?}", timeout)),
        }
    }
}

pub fn estimate_cost(tokens: u64, cost_per_million_tokens: f64) -> f64 {
    tokens as f64 / 1_000_000.0 * cost_per_million_tokens
}

#[async_trait]
impl BatchProcessor for ConcurrentBatchProcessor {
    async fn process_batch(
        &self,
        items: Vec<Email>,
        context: &AnalysisContext,
        config: BatchConfig,
    ) -> BatchOutcome {
        let total = items.len();
        let batch_size = config.batch_size.max(1);
        let item_timeout = config.item_timeout;
        let mut outcome = BatchOutcome::default();
        let mut completed = 0;

        for chunk in items.chunks(batch_size) {
            let (to_process, skipped): (Vec<&Email>, Vec<&Email>) = chunk
                .iter()
                .partition(|e| !config.skip_analyzed || e.is_eligible_for_analysis());

            for email in &skipped {
                tracing::debug!(email_id = %email.id, "Skipping already analyzed email");
            }
            outcome.skipped_count += skipped.len();

            let results = join_all(to_process.iter().map(|email| async move {
                (email.id, self.process_one(email, context, item_timeout).await)
            }))
            .await;

            for (email_id, result) in results {
                match &result {
                    ItemOutcome::Success(analysis) => {
                        outcome.success_count += 1;
                        outcome.total_tokens_used += u64::from(analysis.tokens_used);
                    }
                    ItemOutcome::Failure(error) => {
                        outcome.failure_count += 1;
                        if let Some(on_error) = &config.on_error {
                            on_error(email_id, error);
                        }
                    }
                }
                outcome.results.insert(email_id, result);
            }

            completed += chunk.len();
            if let Some(on_progress) = &config.on_progress {
                on_progress(completed, total);
            }
        }

        outcome.estimated_cost =
            estimate_cost(outcome.total_tokens_used, self.cost_per_million_tokens);
        outcome
    }
}
