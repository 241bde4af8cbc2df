use chrono::Utc;
use diesel::prelude::*;
use diesel::result::QueryResult;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::models::{Action, Client, Email, EmailAccount, NewAction, SyncLog};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // The hosted store only accepts TLS connections
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str, max_size: usize) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).max_size(max_size).build()?;

    Ok(pool)
}

/// Offset/limit window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub page_size: i64,
}

impl PageWindow {
    pub const DEFAULT_PAGE_SIZE: i64 = 25;
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// Highest page whose offset still fits in an `i64` at any page size.
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_PAGE_SIZE;

    /// Clamp user-supplied paging values: pages to 1..=MAX_PAGE, sizes to 1..=MAX_PAGE_SIZE.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, Self::MAX_PAGE),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Optional filters for the email list
#[derive(Debug, Clone, Default)]
pub struct EmailFilter {
    pub category: Option<String>,
    pub unanalyzed_only: bool,
    pub archived: Option<bool>,
}

// Email database operations
pub mod emails {
    use super::*;
    use ideabox_types::{EmailAnalysis, JsonWrapper};

    /// Emails owned by `owner` that were never analyzed and are not archived,
    /// newest first.
    pub async fn list_unanalyzed(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        max: i64,
    ) -> QueryResult<Vec<Email>> {
        use crate::schema::emails::dsl::*;

        emails
            .filter(user_id.eq(owner))
            .filter(analyzed_at.is_null())
            .filter(is_archived.eq(false))
            .order_by(received_at.desc())
            .limit(max)
            .select(Email::as_select())
            .load(conn)
            .await
    }

    pub async fn get_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        email_id: Uuid,
    ) -> QueryResult<Option<Email>> {
        use crate::schema::emails::dsl::*;

        emails
            .filter(id.eq(email_id))
            .filter(user_id.eq(owner))
            .select(Email::as_select())
            .first(conn)
            .await
            .optional()
    }

    fn filtered(
        owner: Uuid,
        filter: &EmailFilter,
    ) -> crate::schema::emails::BoxedQuery<'static, diesel::pg::Pg> {
        use crate::schema::emails::dsl::*;

        let mut query = emails.filter(user_id.eq(owner)).into_boxed();

        if let Some(cat) = &filter.category {
            query = query.filter(category.eq(cat.clone()));
        }
        if filter.unanalyzed_only {
            query = query.filter(analyzed_at.is_null());
        }
        if let Some(archived) = filter.archived {
            query = query.filter(is_archived.eq(archived));
        }

        query
    }

    pub async fn list_page(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        filter: &EmailFilter,
        window: PageWindow,
    ) -> QueryResult<(Vec<Email>, i64)> {
        use crate::schema::emails::dsl::*;

        let items = filtered(owner, filter)
            .order_by(received_at.desc())
            .limit(window.page_size)
            .offset(window.offset())
            .select(Email::as_select())
            .load(conn)
            .await?;

        let total: i64 = filtered(owner, filter).count().get_result(conn).await?;

        Ok((items, total))
    }

    pub async fn count_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        unanalyzed_only: bool,
    ) -> QueryResult<i64> {
        use crate::schema::emails::dsl::*;

        let mut query = emails.filter(user_id.eq(owner)).into_boxed();
        if unanalyzed_only {
            query = query
                .filter(analyzed_at.is_null())
                .filter(is_archived.eq(false));
        }

        query.count().get_result(conn).await
    }

    pub async fn count_for_account(
        conn: &mut AsyncPgConnection,
        account: Uuid,
    ) -> QueryResult<i64> {
        use crate::schema::emails::dsl::*;

        emails
            .filter(account_id.eq(account))
            .count()
            .get_result(conn)
            .await
    }

    pub async fn save_analysis(
        conn: &mut AsyncPgConnection,
        email_id: Uuid,
        result: &EmailAnalysis,
    ) -> QueryResult<()> {
        use crate::schema::emails::dsl::*;

        diesel::update(emails.filter(id.eq(email_id)))
            .set((
                analysis.eq(JsonWrapper::new(result.clone())),
                category.eq(result.category.map(|c| c.as_str().to_string())),
                client_id.eq(result.client_match.as_ref().map(|m| m.client_id)),
                analyzed_at.eq(Some(result.analyzed_at)),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Client database operations
pub mod clients {
    use super::*;
    use ideabox_types::ClientStatus;

    pub async fn list_active(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> QueryResult<Vec<Client>> {
        use crate::schema::clients::dsl::*;

        clients
            .filter(user_id.eq(owner))
            .filter(status.eq(ClientStatus::Active.as_str()))
            .order_by(name.asc())
            .select(Client::as_select())
            .load(conn)
            .await
    }
}

// Action database operations
pub mod actions {
    use super::*;
    use ideabox_types::ActionStatus;

    pub async fn create(conn: &mut AsyncPgConnection, new_action: NewAction) -> QueryResult<Action> {
        use crate::schema::actions::dsl::*;

        diesel::insert_into(actions)
            .values(&new_action)
            .returning(Action::as_returning())
            .get_result(conn)
            .await
    }

    /// Pending actions of `source_email` are superseded by `replacement`.
    /// Actions the user already moved out of `pending` are left alone.
    pub async fn replace_pending_for_email(
        conn: &mut AsyncPgConnection,
        source_email: Uuid,
        replacement: Option<NewAction>,
    ) -> QueryResult<Option<Action>> {
        use crate::schema::actions::dsl::*;

        let removed = diesel::delete(
            actions
                .filter(email_id.eq(source_email))
                .filter(status.eq(ActionStatus::Pending.as_str())),
        )
        .execute(conn)
        .await?;
        if removed > 0 {
            tracing::debug!(email_id = %source_email, removed, "Replaced pending actions");
        }

        match replacement {
            Some(new_action) => create(conn, new_action).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list_page(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        status_filter: Option<ActionStatus>,
        window: PageWindow,
    ) -> QueryResult<(Vec<Action>, i64)> {
        use crate::schema::actions::dsl::*;

        let mut query = actions.filter(user_id.eq(owner)).into_boxed();
        let mut count_query = actions.filter(user_id.eq(owner)).into_boxed();
        if let Some(s) = status_filter {
            query = query.filter(status.eq(s.as_str().to_string()));
            count_query = count_query.filter(status.eq(s.as_str().to_string()));
        }

        let items = query
            .order_by(created_at.desc())
            .limit(window.page_size)
            .offset(window.offset())
            .select(Action::as_select())
            .load(conn)
            .await?;
        let total: i64 = count_query.count().get_result(conn).await?;

        Ok((items, total))
    }

    pub async fn update_status(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        action_id: Uuid,
        new_status: ActionStatus,
    ) -> QueryResult<Option<Action>> {
        use crate::schema::actions::dsl::*;

        let completed = if new_status.is_terminal() {
            Some(Utc::now())
        } else {
            None
        };

        diesel::update(actions.filter(id.eq(action_id)).filter(user_id.eq(owner)))
            .set((status.eq(new_status.as_str()), completed_at.eq(completed)))
            .returning(Action::as_returning())
            .get_result(conn)
            .await
            .optional()
    }
}

// Email account database operations
pub mod email_accounts {
    use super::*;

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> QueryResult<Vec<EmailAccount>> {
        use crate::schema::email_accounts::dsl::*;

        email_accounts
            .filter(user_id.eq(owner))
            .order_by(created_at.desc())
            .select(EmailAccount::as_select())
            .load(conn)
            .await
    }

    pub async fn is_owned_by(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        account: Uuid,
    ) -> QueryResult<bool> {
        use crate::schema::email_accounts::dsl::*;

        let count: i64 = email_accounts
            .filter(id.eq(account))
            .filter(user_id.eq(owner))
            .count()
            .get_result(conn)
            .await?;

        Ok(count > 0)
    }
}

// Sync log database operations
pub mod sync_logs {
    use super::*;

    pub async fn list_recent(
        conn: &mut AsyncPgConnection,
        account: Uuid,
        max: i64,
    ) -> QueryResult<Vec<SyncLog>> {
        use crate::schema::sync_logs::dsl::*;

        sync_logs
            .filter(account_id.eq(account))
            .order_by(started_at.desc())
            .limit(max)
            .select(SyncLog::as_select())
            .load(conn)
            .await
    }
}
