use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[cfg(feature = "diesel")]
mod json_wrapper;

#[cfg(feature = "diesel")]
pub use json_wrapper::JsonWrapper;

// ============================================================================
// Analysis Types
// ============================================================================

/// Category label the model assigns to an email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCategory {
    ActionRequired,
    ClientCommunication,
    Event,
    Newsletter,
    Promotional,
    Admin,
    Personal,
    Other,
}

impl EmailCategory {
    pub const ALL: [EmailCategory; 8] = [
        EmailCategory::ActionRequired,
        EmailCategory::ClientCommunication,
        EmailCategory::Event,
        EmailCategory::Newsletter,
        EmailCategory::Promotional,
        EmailCategory::Admin,
        EmailCategory::Personal,
        EmailCategory::Other,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            EmailCategory::ActionRequired => "action_required",
            EmailCategory::ClientCommunication => "client_communication",
            EmailCategory::Event => "event",
            EmailCategory::Newsletter => "newsletter",
            EmailCategory::Promotional => "promotional",
            EmailCategory::Admin => "admin",
            EmailCategory::Personal => "personal",
            EmailCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "action_required" => Some(EmailCategory::ActionRequired),
            "client_communication" => Some(EmailCategory::ClientCommunication),
            "event" => Some(EmailCategory::Event),
            "newsletter" => Some(EmailCategory::Newsletter),
            "promotional" => Some(EmailCategory::Promotional),
            "admin" => Some(EmailCategory::Admin),
            "personal" => Some(EmailCategory::Personal),
            "other" => Some(EmailCategory::Other),
            _ => None,
        }
    }

    /// Lenient parse for free-form model output ("Action Required", "action-required").
    /// Anything unrecognised becomes `Other`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        Self::from_str(&normalized).unwrap_or(EmailCategory::Other)
    }
}

/// Kind of follow-up an extracted action asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Respond,
    Review,
    Create,
    Schedule,
    Decide,
    FollowUp,
    Other,
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Respond => "respond",
            ActionType::Review => "review",
            ActionType::Create => "create",
            ActionType::Schedule => "schedule",
            ActionType::Decide => "decide",
            ActionType::FollowUp => "follow_up",
            ActionType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "respond" => Some(ActionType::Respond),
            "review" => Some(ActionType::Review),
            "create" => Some(ActionType::Create),
            "schedule" => Some(ActionType::Schedule),
            "decide" => Some(ActionType::Decide),
            "follow_up" => Some(ActionType::FollowUp),
            "other" => Some(ActionType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl ActionPriority {
    pub fn as_str(&self) -> &str {
        match self {
            ActionPriority::Low => "low",
            ActionPriority::Medium => "medium",
            ActionPriority::High => "high",
            ActionPriority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(ActionPriority::Low),
            "medium" => Some(ActionPriority::Medium),
            "high" => Some(ActionPriority::High),
            "urgent" => Some(ActionPriority::Urgent),
            _ => None,
        }
    }
}

/// Lifecycle of an action item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Dismissed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::InProgress => "in_progress",
            ActionStatus::Completed => "completed",
            ActionStatus::Dismissed => "dismissed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ActionStatus::Pending),
            "in_progress" => Some(ActionStatus::InProgress),
            "completed" => Some(ActionStatus::Completed),
            "dismissed" => Some(ActionStatus::Dismissed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Dismissed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Inactive,
    Archived,
}

impl ClientStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Inactive => "inactive",
            ClientStatus::Archived => "archived",
        }
    }
}

/// Action-extraction part of an analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionExtraction {
    pub has_action: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub action_type: Option<ActionType>,
    pub priority: Option<ActionPriority>,
    /// 1-10, higher is more urgent
    pub urgency_score: Option<u8>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_minutes: Option<u32>,
}

/// A known client the email was attributed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMatch {
    pub client_id: Uuid,
    pub client_name: String,
    pub confidence: f32,
}

/// Structured result of analyzing one email, stored as JSON on the email row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAnalysis {
    pub category: Option<EmailCategory>,
    pub action: ActionExtraction,
    pub client_match: Option<ClientMatch>,
    pub summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub tokens_used: u32,
    pub model: String,
    pub processing_time_ms: u64,
    pub analyzed_at: DateTime<Utc>,
}

/// Statistics for one bulk analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRunSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub actions_created: usize,
    pub tokens_used: u64,
    pub estimated_cost: f64,
    pub processing_time_ms: u64,
    pub categorized: BTreeMap<String, usize>,
}

impl AnalysisRunSummary {
    pub fn processed_count(&self) -> usize {
        self.success_count + self.failure_count + self.skipped_count
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAnalysisRequest {
    pub max_emails: Option<usize>,
}

/// Compact view of a fresh analysis for the UI toast
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub category: Option<EmailCategory>,
    pub has_action: bool,
    pub action_title: Option<String>,
    pub client_match: Option<String>,
    pub tokens_used: u32,
    pub processing_time_ms: u64,
}

impl From<&EmailAnalysis> for AnalysisSummary {
    fn from(analysis: &EmailAnalysis) -> Self {
        AnalysisSummary {
            category: analysis.category,
            has_action: analysis.action.has_action,
            action_title: analysis.action.title.clone(),
            client_match: analysis
                .client_match
                .as_ref()
                .map(|m| m.client_name.clone()),
            tokens_used: analysis.tokens_used,
            processing_time_ms: analysis.processing_time_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedEmailBody {
    pub success: bool,
    pub analysis: EmailAnalysis,
    pub summary: AnalysisSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlreadyAnalyzedBody {
    pub success: bool,
    pub already_analyzed: bool,
    pub analysis: EmailAnalysis,
    pub message: String,
}

/// Response of `POST /api/emails/:id/analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzeEmailResponse {
    AlreadyAnalyzed(AlreadyAnalyzedBody),
    Analyzed(AnalyzedEmailBody),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub total_emails: i64,
    pub unanalyzed_emails: i64,
    pub analyzed_emails: i64,
}

// ============================================================================
// Email / Account / Client / Action API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub thread_id: String,
    pub subject: Option<String>,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub snippet: Option<String>,
    pub received_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_archived: bool,
    pub category: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub client_id: Option<Uuid>,
    pub analysis: Option<EmailAnalysis>,
}

/// Query parameters for listing emails
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmailListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub category: Option<String>,
    pub unanalyzed: Option<bool>,
    pub archived: Option<bool>,
}

/// One page of a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: i64, page_size: i64, total: i64) -> Self {
        let has_more = page.saturating_mul(page_size) < total;
        Paginated {
            items,
            page,
            page_size,
            total,
            has_more,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAccountResponse {
    pub id: Uuid,
    pub email_address: String,
    pub display_name: Option<String>,
    pub provider: String,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub email_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub sync_type: String,
    pub status: String,
    pub emails_fetched: i32,
    pub emails_analyzed: i32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub domains: Vec<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub id: Uuid,
    pub email_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub action_type: String,
    pub priority: String,
    pub urgency_score: Option<i32>,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<ActionStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateActionRequest {
    pub status: ActionStatus,
}
