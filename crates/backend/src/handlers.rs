use axum::{
    body::Bytes,
    extract::{Extension, Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use futures::future::try_join_all;
use ideabox_types::{
    ActionListQuery, ActionResponse, AlreadyAnalyzedBody, AnalysisRunSummary, AnalysisStats,
    AnalysisSummary, AnalyzeEmailResponse, AnalyzedEmailBody, ClientResponse,
    EmailAccountResponse, EmailCategory, EmailListQuery, EmailResponse, Paginated,
    RunAnalysisRequest, SyncLogResponse, UpdateActionRequest,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::{EmailFilter, PageWindow};
use crate::error::{ApiError, ApiResult};
use crate::services::SingleAnalysis;
use crate::AppState;

/// Header that bypasses the already-analyzed guard on single-email analysis
pub const FORCE_REANALYZE_HEADER: &str = "x-force-reanalyze";

const DEFAULT_SYNC_LOG_LIMIT: i64 = 20;
const MAX_SYNC_LOG_LIMIT: i64 = 100;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

// Analysis handlers

pub async fn analyze_email(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(email_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<AnalyzeEmailResponse>> {
    let force = force_requested(&headers);

    let response = match state.analysis.analyze_email(user.id, email_id, force).await? {
        SingleAnalysis::AlreadyAnalyzed(analysis) => {
            AnalyzeEmailResponse::AlreadyAnalyzed(AlreadyAnalyzedBody {
                success: true,
                already_analyzed: true,
                analysis,
                message: format!(
                    "Email already analyzed. Send {}: true to analyze it again.",
                    FORCE_REANALYZE_HEADER
                ),
            })
        }
        SingleAnalysis::Analyzed(processed) => AnalyzeEmailResponse::Analyzed(AnalyzedEmailBody {
            success: true,
            summary: AnalysisSummary::from(&processed.analysis),
            analysis: processed.analysis,
        }),
    };

    Ok(Json(response))
}

fn force_requested(headers: &HeaderMap) -> bool {
    headers
        .get(FORCE_REANALYZE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

pub async fn run_analysis(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<Json<AnalysisRunSummary>> {
    let config = state.analysis.config();
    let requested = parse_run_request(&body)?.max_emails;
    let max_emails = config.clamp_max_emails(requested);
    let budget = config.run_timeout;

    tracing::info!(user_id = %user.id, max_emails, "Analysis run requested");

    let summary = tokio::time::timeout(budget, state.analysis.run(user.id, max_emails))
        .await
        .map_err(|_| ApiError::Timeout(budget))??;

    Ok(Json(summary))
}

/// An empty body means "use the defaults"; anything else must be a valid request.
fn parse_run_request(body: &[u8]) -> ApiResult<RunAnalysisRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunAnalysisRequest { max_emails: None });
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

pub async fn get_analysis_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<AnalysisStats>> {
    let (total, unanalyzed) = tokio::try_join!(
        state.store.count_emails(user.id, false),
        state.store.count_emails(user.id, true)
    )?;

    Ok(Json(AnalysisStats {
        total_emails: total,
        unanalyzed_emails: unanalyzed,
        analyzed_emails: total - unanalyzed,
    }))
}

// Email handlers

pub async fn list_emails(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<EmailListQuery>,
) -> ApiResult<Json<Paginated<EmailResponse>>> {
    if let Some(category) = &query.category {
        if EmailCategory::from_str(category).is_none() {
            return Err(ApiError::bad_request(format!(
                "Unknown category '{}'",
                category
            )));
        }
    }

    let window = PageWindow::new(query.page, query.page_size);
    let filter = EmailFilter {
        category: query.category,
        unanalyzed_only: query.unanalyzed.unwrap_or(false),
        archived: query.archived,
    };

    let (emails, total) = state.store.list_emails(user.id, &filter, window).await?;
    let items = emails.into_iter().map(Into::into).collect();

    Ok(Json(Paginated::new(
        items,
        window.page,
        window.page_size,
        total,
    )))
}

pub async fn get_email(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(email_id): Path<Uuid>,
) -> ApiResult<Json<EmailResponse>> {
    let email = state.store.get_email(user.id, email_id).await?;
    Ok(Json(email.into()))
}

// Email account handlers

pub async fn list_email_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<EmailAccountResponse>>> {
    let accounts = state.store.list_accounts(user.id).await?;

    // One failed count fails the whole listing
    let counts = try_join_all(
        accounts
            .iter()
            .map(|account| state.store.count_account_emails(account.id)),
    )
    .await?;

    let responses = accounts
        .into_iter()
        .zip(counts)
        .map(|(account, count)| account.into_response(count))
        .collect();

    Ok(Json(responses))
}

#[derive(Debug, Deserialize)]
pub struct SyncLogQuery {
    pub limit: Option<i64>,
}

pub async fn list_sync_logs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<SyncLogQuery>,
) -> ApiResult<Json<Vec<SyncLogResponse>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SYNC_LOG_LIMIT)
        .clamp(1, MAX_SYNC_LOG_LIMIT);

    let logs = state
        .store
        .list_sync_logs(user.id, account_id, limit)
        .await?;

    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

// Client handlers

pub async fn list_clients(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ClientResponse>>> {
    let clients = state.store.list_active_clients(user.id).await?;
    Ok(Json(clients.into_iter().map(Into::into).collect()))
}

// Action handlers

pub async fn list_actions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ActionListQuery>,
) -> ApiResult<Json<Paginated<ActionResponse>>> {
    let window = PageWindow::new(query.page, query.page_size);
    let (actions, total) = state
        .store
        .list_actions(user.id, query.status, window)
        .await?;

    Ok(Json(Paginated::new(
        actions.into_iter().map(Into::into).collect(),
        window.page,
        window.page_size,
        total,
    )))
}

pub async fn update_action(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(action_id): Path<Uuid>,
    Json(payload): Json<UpdateActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let action = state
        .store
        .update_action_status(user.id, action_id, payload.status)
        .await?;

    tracing::info!(action_id = %action_id, status = payload.status.as_str(), "Updated action");

    Ok(Json(action.into()))
}
