//! Per-email analysis: call the model, persist the result, extract the action.

use chrono::Utc;
use ideabox_types::{
    ActionExtraction, ActionPriority, ActionStatus, ActionType, ClientMatch, EmailAnalysis,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::ai::{AnalysisModel, ModelError};
use crate::models::{AnalysisContext, Email, NewAction};
use crate::repository::{Store, StoreError};

/// Confidence assigned when the sender's domain identifies the client.
const DOMAIN_MATCH_CONFIDENCE: f32 = 0.8;

/// One email's analysis failed. Never fatal to a batch.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    #[error("failed to persist analysis: {0}")]
    Persist(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct ProcessedEmail {
    pub analysis: EmailAnalysis,
    pub action_id: Option<Uuid>,
}

pub struct EmailProcessor {
    store: Arc<dyn Store>,
    model: Arc<dyn AnalysisModel>,
}

impl EmailProcessor {
    pub fn new(store: Arc<dyn Store>, model: Arc<dyn AnalysisModel>) -> Self {
        Self { store, model }
    }

    pub async fn process(
        &self,
        email: &Email,
        context: &AnalysisContext,
    ) -> Result<ProcessedEmail, ProcessError> {
        let started = Instant::now();

        let result = self.model.analyze(email, context).await?;

        let client_match = result
            .client_match
            .filter(|m| context.find_client(m.client_id).is_some())
            .or_else(|| match_client_by_sender(email, context));

        let action = normalize_action(result.action, email);

        let analysis = EmailAnalysis {
            category: result.category,
            action,
            client_match,
            summary: result.summary,
            topics: result.topics,
            tokens_used: result.tokens_used,
            model: self.model.model_name().to_string(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            analyzed_at: Utc::now(),
        };

        // The analysis stamp goes last: until it lands the email stays
        // selectable, and the next attempt replaces this pending action.
        let replacement = analysis
            .action
            .has_action
            .then(|| new_action_for(email, &analysis));
        let action_id = self
            .store
            .replace_pending_action(email.id, replacement)
            .await?
            .map(|created| {
                tracing::debug!(email_id = %email.id, action_id = %created.id, "Created action");
                created.id
            });

        self.store.save_analysis(email.id, &analysis).await?;

        Ok(ProcessedEmail {
            analysis,
            action_id,
        })
    }
}

/// Attribute the email to a client whose domain or address matches the sender.
fn match_client_by_sender(email: &Email, context: &AnalysisContext) -> Option<ClientMatch> {
    let sender = email.sender_email.to_lowercase();
    let domain = sender.rsplit_once('@').map(|(_, d)| d)?;

    context
        .clients
        .iter()
        .find(|c| {
            c.email.as_deref().map(str::to_lowercase).as_deref() == Some(sender.as_str())
                || c.domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
        })
        .map(|c| ClientMatch {
            client_id: c.id,
            client_name: c.name.clone(),
            confidence: DOMAIN_MATCH_CONFIDENCE,
        })
}

fn normalize_action(mut action: ActionExtraction, email: &Email) -> ActionExtraction {
    if action.has_action && action.title.is_none() {
        action.title = Some(match email.subject.as_deref() {
            Some(subject) if !subject.trim().is_empty() => format!("Follow up: {}", subject.trim()),
            _ => format!("Follow up with {}", email.sender_email),
        });
    }
    action
}

fn new_action_for(email: &Email, analysis: &EmailAnalysis) -> NewAction {
    let action = &analysis.action;
    NewAction {
        user_id: email.user_id,
        email_id: Some(email.id),
        client_id: analysis.client_match.as_ref().map(|m| m.client_id),
        title: action.title.clone().unwrap_or_default(),
        description: action.description.clone(),
        action_type: action
            .action_type
            .unwrap_or(ActionType::Other)
            .as_str()
            .to_string(),
        priority: action
            .priority
            .unwrap_or(ActionPriority::Medium)
            .as_str()
            .to_string(),
        urgency_score: action.urgency_score.map(i32::from),
        status: ActionStatus::Pending.as_str().to_string(),
        due_date: action.due_date,
        estimated_minutes: action.estimated_minutes.map(|m| m as i32),
    }
}
