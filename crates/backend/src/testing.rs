//! In-memory fakes and fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use ideabox_types::{ActionStatus, ClientStatus, EmailAnalysis, JsonWrapper};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::ai::{AnalysisModel, ModelAnalysis, ModelError};
use crate::db::{EmailFilter, PageWindow};
use crate::models::{Action, AnalysisContext, Client, Email, EmailAccount, NewAction, SyncLog};
use crate::repository::{
    AccountRepository, ActionRepository, ClientRepository, EmailRepository, StoreError,
    StoreResult,
};

/// Email owned by `user_id`, received `minutes_ago` minutes ago, never analyzed.
pub fn email(user_id: Uuid, minutes_ago: i64) -> Email {
    let received_at = Utc::now() - ChronoDuration::minutes(minutes_ago);
    let id = Uuid::new_v4();
    Email {
        id,
        user_id,
        account_id: Uuid::nil(),
        gmail_id: format!("gmail-{}", id.simple()),
        thread_id: format!("thread-{}", id.simple()),
        subject: Some("Quarterly planning".to_string()),
        sender_email: "sender@example.com".to_string(),
        sender_name: Some("Sam Sender".to_string()),
        snippet: Some("Can we meet next week?".to_string()),
        body_text: Some("Can we meet next week to go over the plan?".to_string()),
        received_at,
        is_read: false,
        is_archived: false,
        category: None,
        analysis: None,
        analyzed_at: None,
        client_id: None,
        created_at: received_at,
    }
}

/// Active client owned by `user_id`.
pub fn client(user_id: Uuid, name: &str) -> Client {
    Client {
        id: Uuid::new_v4(),
        user_id,
        name: name.to_string(),
        company: None,
        email: None,
        domains: vec![],
        status: ClientStatus::Active.as_str().to_string(),
        created_at: Utc::now(),
    }
}

pub fn account(user_id: Uuid, address: &str) -> EmailAccount {
    EmailAccount {
        id: Uuid::new_v4(),
        user_id,
        email_address: address.to_string(),
        display_name: None,
        provider: "gmail".to_string(),
        sync_status: "success".to_string(),
        last_synced_at: Some(Utc::now()),
        last_sync_error: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

fn unavailable() -> StoreError {
    StoreError::Query(diesel::result::Error::QueryBuilderError(
        "store offline".into(),
    ))
}

fn page<T>(items: Vec<T>, window: PageWindow) -> Vec<T> {
    items
        .into_iter()
        .skip(window.offset() as usize)
        .take(window.page_size as usize)
        .collect()
}

/// Mutex-backed store with switches for simulating outages.
#[derive(Default)]
pub struct MemoryStore {
    emails: Mutex<Vec<Email>>,
    clients: Mutex<Vec<Client>>,
    actions: Mutex<Vec<Action>>,
    accounts: Mutex<Vec<EmailAccount>>,
    sync_logs: Mutex<Vec<SyncLog>>,
    fail_emails: AtomicBool,
    fail_clients: AtomicBool,
    fail_counts: AtomicBool,
    fail_actions: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_emails(emails: Vec<Email>) -> Self {
        let store = Self::new();
        *store.emails.lock().unwrap() = emails;
        store
    }

    pub fn with_clients(self, clients: Vec<Client>) -> Self {
        *self.clients.lock().unwrap() = clients;
        self
    }

    pub fn with_accounts(self, accounts: Vec<EmailAccount>) -> Self {
        *self.accounts.lock().unwrap() = accounts;
        self
    }

    pub fn with_sync_logs(self, logs: Vec<SyncLog>) -> Self {
        *self.sync_logs.lock().unwrap() = logs;
        self
    }

    pub fn fail_email_queries(&self, fail: bool) {
        self.fail_emails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_client_queries(&self, fail: bool) {
        self.fail_clients.store(fail, Ordering::SeqCst);
    }

    pub fn fail_count_queries(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_action_writes(&self, fail: bool) {
        self.fail_actions.store(fail, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    fn check_emails(&self) -> StoreResult<()> {
        if self.fail_emails.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EmailRepository for MemoryStore {
    async fn list_unanalyzed_emails(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<Email>> {
        self.check_emails()?;
        let mut selected: Vec<Email> = self
            .emails
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && e.is_eligible_for_analysis())
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        selected.truncate(limit);
        Ok(selected)
    }

    async fn get_email(&self, user_id: Uuid, email_id: Uuid) -> StoreResult<Email> {
        self.check_emails()?;
        self.emails
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == email_id && e.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound("Email"))
    }

    async fn list_emails(
        &self,
        user_id: Uuid,
        filter: &EmailFilter,
        window: PageWindow,
    ) -> StoreResult<(Vec<Email>, i64)> {
        self.check_emails()?;
        let mut matching: Vec<Email> = self
            .emails
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| filter.category.is_none() || e.category == filter.category)
            .filter(|e| !filter.unanalyzed_only || e.analyzed_at.is_none())
            .filter(|e| filter.archived.map_or(true, |a| e.is_archived == a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        let total = matching.len() as i64;
        Ok((page(matching, window), total))
    }

    async fn count_emails(&self, user_id: Uuid, unanalyzed_only: bool) -> StoreResult<i64> {
        self.check_emails()?;
        let count = self
            .emails
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| !unanalyzed_only || e.is_eligible_for_analysis())
            .count();
        Ok(count as i64)
    }

    async fn save_analysis(&self, email_id: Uuid, analysis: &EmailAnalysis) -> StoreResult<()> {
        self.check_emails()?;
        let mut emails = self.emails.lock().unwrap();
        let email = emails
            .iter_mut()
            .find(|e| e.id == email_id)
            .ok_or(StoreError::NotFound("Email"))?;
        email.analysis = Some(JsonWrapper::new(analysis.clone()));
        email.category = analysis.category.map(|c| c.as_str().to_string());
        email.client_id = analysis.client_match.as_ref().map(|m| m.client_id);
        email.analyzed_at = Some(analysis.analyzed_at);
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn list_active_clients(&self, user_id: Uuid) -> StoreResult<Vec<Client>> {
        if self.fail_clients.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .clients
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id && c.is_active())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ActionRepository for MemoryStore {
    async fn replace_pending_action(
        &self,
        email_id: Uuid,
        replacement: Option<NewAction>,
    ) -> StoreResult<Option<Action>> {
        if self.fail_actions.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut actions = self.actions.lock().unwrap();
        actions.retain(|a| {
            a.email_id != Some(email_id) || a.status != ActionStatus::Pending.as_str()
        });

        let Some(action) = replacement else {
            return Ok(None);
        };
        let created = Action {
            id: Uuid::new_v4(),
            user_id: action.user_id,
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
            created_at: Utc::now(),
            completed_at: None,
        };
        actions.push(created.clone());
        Ok(Some(created))
    }

    async fn list_actions(
        &self,
        user_id: Uuid,
        status: Option<ActionStatus>,
        window: PageWindow,
    ) -> StoreResult<(Vec<Action>, i64)> {
        let mut matching: Vec<Action> = self
            .actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| status.map_or(true, |s| a.status == s.as_str()))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        Ok((page(matching, window), total))
    }

    async fn update_action_status(
        &self,
        user_id: Uuid,
        action_id: Uuid,
        status: ActionStatus,
    ) -> StoreResult<Action> {
        let mut actions = self.actions.lock().unwrap();
        let action = actions
            .iter_mut()
            .find(|a| a.id == action_id && a.user_id == user_id)
            .ok_or(StoreError::NotFound("Action"))?;
        action.status = status.as_str().to_string();
        action.completed_at = status.is_terminal().then(Utc::now);
        Ok(action.clone())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn list_accounts(&self, user_id: Uuid) -> StoreResult<Vec<EmailAccount>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_account_emails(&self, account_id: Uuid) -> StoreResult<i64> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let count = self
            .emails
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.account_id == account_id)
            .count();
        Ok(count as i64)
    }

    async fn list_sync_logs(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<SyncLog>> {
        let owned = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .any(|a| a.id == account_id && a.user_id == user_id);
        if !owned {
            return Err(StoreError::NotFound("Email account"));
        }
        let mut logs: Vec<SyncLog> = self
            .sync_logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.account_id == account_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }
}

/// Model fake answering from a per-email script. Unscripted emails get
/// `default_analysis()`.
#[derive(Default)]
pub struct ScriptedModel {
    responses: HashMap<Uuid, ModelAnalysis>,
    failures: HashSet<Uuid>,
    delays: HashMap<Uuid, Duration>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_analysis() -> ModelAnalysis {
        ModelAnalysis {
            category: Some(ideabox_types::EmailCategory::Other),
            action: Default::default(),
            client_match: None,
            summary: Some("Nothing to do".to_string()),
            topics: vec![],
            tokens_used: 100,
        }
    }

    pub fn respond(mut self, email_id: Uuid, analysis: ModelAnalysis) -> Self {
        self.responses.insert(email_id, analysis);
        self
    }

    pub fn fail(mut self, email_id: Uuid) -> Self {
        self.failures.insert(email_id);
        self
    }

    pub fn delay(mut self, email_id: Uuid, delay: Duration) -> Self {
        self.delays.insert(email_id, delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisModel for ScriptedModel {
    async fn analyze(
        &self,
        email: &Email,
        _context: &AnalysisContext,
    ) -> Result<ModelAnalysis, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&email.id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.contains(&email.id) {
            return Err(ModelError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        Ok(self
            .responses
            .get(&email.id)
            .cloned()
            .unwrap_or_else(Self::default_analysis))
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}
