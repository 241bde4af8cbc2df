// Database models for Diesel
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use ideabox_types::{
    ActionResponse, ClientResponse, ClientStatus, EmailAccountResponse, EmailAnalysis,
    EmailResponse, JsonWrapper, SyncLogResponse,
};
use uuid::Uuid;

/// Email row as synced from Gmail
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::emails)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Email {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub gmail_id: String,
    pub thread_id: String,
    pub subject: Option<String>,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub snippet: Option<String>,
    pub body_text: Option<String>,
    pub received_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_archived: bool,
    pub category: Option<String>,
    pub analysis: Option<JsonWrapper<EmailAnalysis>>, // JSON stored as TEXT
    pub analyzed_at: Option<DateTime<Utc>>,
    pub client_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Email {
    /// An email is eligible for analysis iff it has never been analyzed and is not archived.
    pub fn is_eligible_for_analysis(&self) -> bool {
        self.analyzed_at.is_none() && !self.is_archived
    }
}

impl From<Email> for EmailResponse {
    fn from(email: Email) -> Self {
        EmailResponse {
            id: email.id,
            account_id: email.account_id,
            thread_id: email.thread_id,
            subject: email.subject,
            sender_email: email.sender_email,
            sender_name: email.sender_name,
            snippet: email.snippet,
            received_at: email.received_at,
            is_read: email.is_read,
            is_archived: email.is_archived,
            category: email.category,
            analyzed_at: email.analyzed_at,
            client_id: email.client_id,
            analysis: email.analysis.map(JsonWrapper::into_inner),
        }
    }
}

/// Known client used to attribute emails
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::clients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub domains: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active.as_str()
    }
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        ClientResponse {
            id: client.id,
            name: client.name,
            company: client.company,
            email: client.email,
            domains: client.domains,
            status: client.status,
        }
    }
}

/// Reference entities handed to the model for one analysis call.
/// Built fresh per call, never cached.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub user_id: Uuid,
    pub clients: Vec<Client>,
}

impl AnalysisContext {
    pub fn new(user_id: Uuid, clients: Vec<Client>) -> Self {
        Self { user_id, clients }
    }

    pub fn empty(user_id: Uuid) -> Self {
        Self::new(user_id, Vec::new())
    }

    pub fn find_client(&self, client_id: Uuid) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == client_id)
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::actions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Action {
    pub id: Uuid,
    pub user_id: Uuid,
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

impl From<Action> for ActionResponse {
    fn from(action: Action) -> Self {
        ActionResponse {
            id: action.id,
            email_id: action.email_id,
            client_id: action.client_id,
            title: action.title,
            description: action.description,
            action_type: action.action_type,
            priority: action.priority,
            urgency_score: action.urgency_score,
            status: action.status,
            due_date: action.due_date,
            estimated_minutes: action.estimated_minutes,
            created_at: action.created_at,
            completed_at: action.completed_at,
        }
    }
}

/// Insertable struct for actions extracted from an analysis
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::actions)]
pub struct NewAction {
    pub user_id: Uuid,
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
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmailAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email_address: String,
    pub display_name: Option<String>,
    pub provider: String,
    pub sync_status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl EmailAccount {
    pub fn into_response(self, email_count: i64) -> EmailAccountResponse {
        EmailAccountResponse {
            id: self.id,
            email_address: self.email_address,
            display_name: self.display_name,
            provider: self.provider,
            sync_status: self.sync_status,
            last_synced_at: self.last_synced_at,
            last_sync_error: self.last_sync_error,
            is_active: self.is_active,
            created_at: self.created_at,
            email_count,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::sync_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncLog {
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

impl From<SyncLog> for SyncLogResponse {
    fn from(log: SyncLog) -> Self {
        SyncLogResponse {
            id: log.id,
            account_id: log.account_id,
            sync_type: log.sync_type,
            status: log.status,
            emails_fetched: log.emails_fetched,
            emails_analyzed: log.emails_analyzed,
            error_message: log.error_message,
            started_at: log.started_at,
            completed_at: log.completed_at,
            duration_ms: log.duration_ms,
        }
    }
}
