//! Store abstractions used by the analysis services and HTTP handlers.
//!
//! The traits split the hosted datastore by collection. `PgStore` implements
//! all of them over the diesel-async pool; tests swap in an in-memory store.

use async_trait::async_trait;
use diesel_async::pooled_connection::deadpool::{Object, PoolError};
use diesel_async::AsyncPgConnection;
use ideabox_types::{ActionStatus, EmailAnalysis};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DbPool, EmailFilter, PageWindow};
use crate::models::{Action, Client, Email, EmailAccount, NewAction, SyncLog};

/// Failure talking to the store. Item selection treats these as fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection unavailable")]
    Unavailable(#[from] PoolError),

    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("{0} not found")]
    NotFound(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// Emails of `user_id` with no analysis timestamp that are not archived,
    /// newest first, at most `limit`.
    async fn list_unanalyzed_emails(&self, user_id: Uuid, limit: usize)
        -> StoreResult<Vec<Email>>;

    /// Fails with `NotFound` when the email does not exist or belongs to someone else.
    async fn get_email(&self, user_id: Uuid, email_id: Uuid) -> StoreResult<Email>;

    async fn list_emails(
        &self,
        user_id: Uuid,
        filter: &EmailFilter,
        window: PageWindow,
    ) -> StoreResult<(Vec<Email>, i64)>;

    async fn count_emails(&self, user_id: Uuid, unanalyzed_only: bool) -> StoreResult<i64>;

    /// Persist analysis JSON, category, client link and analysis timestamp.
    async fn save_analysis(&self, email_id: Uuid, analysis: &EmailAnalysis) -> StoreResult<()>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn list_active_clients(&self, user_id: Uuid) -> StoreResult<Vec<Client>>;
}

#[async_trait]
pub trait ActionRepository: Send + Sync {
    /// Delete the pending actions extracted from `email_id` and insert
    /// `replacement`, if any. Repeating the call leaves one pending action.
    async fn replace_pending_action(
        &self,
        email_id: Uuid,
        replacement: Option<NewAction>,
    ) -> StoreResult<Option<Action>>;

    async fn list_actions(
        &self,
        user_id: Uuid,
        status: Option<ActionStatus>,
        window: PageWindow,
    ) -> StoreResult<(Vec<Action>, i64)>;

    async fn update_action_status(
        &self,
        user_id: Uuid,
        action_id: Uuid,
        status: ActionStatus,
    ) -> StoreResult<Action>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn list_accounts(&self, user_id: Uuid) -> StoreResult<Vec<EmailAccount>>;

    /// Exact count of synced emails for one account.
    async fn count_account_emails(&self, account_id: Uuid) -> StoreResult<i64>;

    async fn list_sync_logs(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<SyncLog>>;
}

/// Everything the backend needs from the datastore.
pub trait Store: EmailRepository + ClientRepository + ActionRepository + AccountRepository {}

impl<T> Store for T where T: EmailRepository + ClientRepository + ActionRepository + AccountRepository
{}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<Object<AsyncPgConnection>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl EmailRepository for PgStore {
    async fn list_unanalyzed_emails(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<Email>> {
        let mut conn = self.conn().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(db::emails::list_unanalyzed(&mut conn, user_id, limit).await?)
    }

    async fn get_email(&self, user_id: Uuid, email_id: Uuid) -> StoreResult<Email> {
        let mut conn = self.conn().await?;
        db::emails::get_for_user(&mut conn, user_id, email_id)
            .await?
            .ok_or(StoreError::NotFound("Email"))
    }

    async fn list_emails(
        &self,
        user_id: Uuid,
        filter: &EmailFilter,
        window: PageWindow,
    ) -> StoreResult<(Vec<Email>, i64)> {
        let mut conn = self.conn().await?;
        Ok(db::emails::list_page(&mut conn, user_id, filter, window).await?)
    }

    async fn count_emails(&self, user_id: Uuid, unanalyzed_only: bool) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        Ok(db::emails::count_for_user(&mut conn, user_id, unanalyzed_only).await?)
    }

    async fn save_analysis(&self, email_id: Uuid, analysis: &EmailAnalysis) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        Ok(db::emails::save_analysis(&mut conn, email_id, analysis).await?)
    }
}

#[async_trait]
impl ClientRepository for PgStore {
    async fn list_active_clients(&self, user_id: Uuid) -> StoreResult<Vec<Client>> {
        let mut conn = self.conn().await?;
        Ok(db::clients::list_active(&mut conn, user_id).await?)
    }
}

#[async_trait]
impl ActionRepository for PgStore {
    async fn replace_pending_action(
        &self,
        email_id: Uuid,
        replacement: Option<NewAction>,
    ) -> StoreResult<Option<Action>> {
        let mut conn = self.conn().await?;
        Ok(db::actions::replace_pending_for_email(&mut conn, email_id, replacement).await?)
    }

    async fn list_actions(
        &self,
        user_id: Uuid,
        status: Option<ActionStatus>,
        window: PageWindow,
    ) -> StoreResult<(Vec<Action>, i64)> {
        let mut conn = self.conn().await?;
        Ok(db::actions::list_page(&mut conn, user_id, status, window).await?)
    }

    async fn update_action_status(
        &self,
        user_id: Uuid,
        action_id: Uuid,
        status: ActionStatus,
    ) -> StoreResult<Action> {
        let mut conn = self.conn().await?;
        db::actions::update_status(&mut conn, user_id, action_id, status)
            .await?
            .ok_or(StoreError::NotFound("Action"))
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn list_accounts(&self, user_id: Uuid) -> StoreResult<Vec<EmailAccount>> {
        let mut conn = self.conn().await?;
        Ok(db::email_accounts::list_for_user(&mut conn, user_id).await?)
    }

    async fn count_account_emails(&self, account_id: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        Ok(db::emails::count_for_account(&mut conn, account_id).await?)
    }

    async fn list_sync_logs(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<SyncLog>> {
        let mut conn = self.conn().await?;
        if !db::email_accounts::is_owned_by(&mut conn, user_id, account_id).await? {
            return Err(StoreError::NotFound("Email account"));
        }
        Ok(db::sync_logs::list_recent(&mut conn, account_id, limit).await?)
    }
}
