//! Analysis orchestration: bulk runs over a user's unanalyzed emails and
//! single-email analysis with a re-analysis guard.

use ideabox_types::{AnalysisRunSummary, EmailAnalysis, JsonWrapper};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use super::aggregator;
use super::batch::{BatchConfig, BatchProcessor};
use super::email_processor::{EmailProcessor, ProcessError, ProcessedEmail};
use crate::config::AnalysisConfig;
use crate::models::{AnalysisContext, Email};
use crate::repository::{Store, StoreError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The store could not produce the emails to analyze. Aborts the run.
    #[error("failed to fetch emails: {0}")]
    Fetch(StoreError),

    #[error("email not found")]
    NotFound,

    #[error("analysis failed: {0}")]
    Analysis(#[from] ProcessError),

    #[error("analysis did not finish within {0:?}")]
    Timeout(Duration),
}

/// Result of analyzing a single email on request
#[derive(Debug, Clone)]
pub enum SingleAnalysis {
    /// Stored analysis returned without calling the model
    AlreadyAnalyzed(EmailAnalysis),
    Analyzed(ProcessedEmail),
}

pub struct AnalysisService {
    store: Arc<dyn Store>,
    processor: Arc<EmailProcessor>,
    batch: Arc<dyn BatchProcessor>,
    config: AnalysisConfig,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn Store>,
        processor: Arc<EmailProcessor>,
        batch: Arc<dyn BatchProcessor>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            store,
            processor,
            batch,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Unanalyzed, unarchived emails of `user_id`, newest first, at most `max_emails`.
    pub async fn select_unanalyzed(
        &self,
        user_id: Uuid,
        max_emails: usize,
    ) -> Result<Vec<Email>, AnalysisError> {
        self.store
            .list_unanalyzed_emails(user_id, max_emails)
            .await
            .map_err(AnalysisError::Fetch)
    }

    /// Active clients of `user_id`. Lookup failures degrade to an empty context.
    pub async fn resolve_context(&self, user_id: Uuid) -> AnalysisContext {
        match self.store.list_active_clients(user_id).await {
            Ok(clients) => AnalysisContext::new(user_id, clients),
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    "Failed to load clients, analyzing without client context: {}",
                    e
                );
                AnalysisContext::empty(user_id)
            }
        }
    }

    /// Analyze up to `max_emails` of the user's unanalyzed emails.
    pub async fn run(
        &self,
        user_id: Uuid,
        max_emails: usize,
    ) -> Result<AnalysisRunSummary, AnalysisError> {
        let started = Instant::now();

        let emails = self.select_unanalyzed(user_id, max_emails).await?;
        if emails.is_empty() {
            tracing::info!(user_id = %user_id, "No unanalyzed emails");
            return Ok(AnalysisRunSummary {
                processing_time_ms: started.elapsed().as_millis() as u64,
                ..Default::default()
            });
        }

        let context = self.resolve_context(user_id).await;
        let submitted = emails.len();

        tracing::info!(
            user_id = %user_id,
            emails = submitted,
            clients = context.clients.len(),
            "Starting analysis run"
        );

        let config = BatchConfig::new(self.config.batch_size, self.config.item_timeout)
            .on_progress(move |completed, total| {
                tracing::info!(user_id = %user_id, "Analysis progress: {}/{}", completed, total);
            })
            .on_error(move |email_id, error| {
                tracing::warn!(user_id = %user_id, email_id = %email_id, "Email analysis failed: {}", error);
            });

        let outcome = self.batch.process_batch(emails, &context, config).await;
        let tally = aggregator::fold(&outcome.results);

        let accounted = outcome.success_count + outcome.failure_count + outcome.skipped_count;
        if accounted != submitted {
            tracing::warn!(
                user_id = %user_id,
                submitted,
                accounted,
                "Batch processor counts do not cover every submitted email"
            );
        }

        let summary = AnalysisRunSummary {
            success_count: outcome.success_count,
            failure_count: outcome.failure_count,
            skipped_count: outcome.skipped_count,
            actions_created: tally.actionable,
            tokens_used: outcome.total_tokens_used,
            estimated_cost: outcome.estimated_cost,
            processing_time_ms: started.elapsed().as_millis() as u64,
            categorized: tally.categorized,
        };

        tracing::info!(
            user_id = %user_id,
            success = summary.success_count,
            failed = summary.failure_count,
            skipped = summary.skipped_count,
            actions = summary.actions_created,
            tokens = summary.tokens_used,
            "Analysis run complete in {}ms",
            summary.processing_time_ms
        );

        Ok(summary)
    }

    /// Analyze one email. Unless `force` is set, an email that already has a
    /// stored analysis is returned as-is without calling the model.
    pub async fn analyze_email(
        &self,
        user_id: Uuid,
        email_id: Uuid,
        force: bool,
    ) -> Result<SingleAnalysis, AnalysisError> {
        let email = match self.store.get_email(user_id, email_id).await {
            Ok(email) => email,
            Err(StoreError::NotFound(_)) => return Err(AnalysisError::NotFound),
            Err(e) => return Err(AnalysisError::Fetch(e)),
        };

        if !force && email.analyzed_at.is_some() {
            if let Some(stored) = email.analysis.clone().map(JsonWrapper::into_inner) {
                tracing::debug!(email_id = %email_id, "Returning stored analysis");
                return Ok(SingleAnalysis::AlreadyAnalyzed(stored));
            }
        }

        let context = self.resolve_context(user_id).await;
        let processed = tokio::time::timeout(
            self.config.item_timeout,
            self.processor.process(&email, &context),
        )
        .await
        .map_err(|_| AnalysisError::Timeout(self.config.item_timeout))??;

        tracing::info!(
            email_id = %email_id,
            tokens = processed.analysis.tokens_used,
            "Analyzed email"
        );

        Ok(SingleAnalysis::Analyzed(processed))
    }
}
