use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::handlers;
use crate::AppState;

/// All routes. Everything under `/api` requires authentication.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Analysis routes
        .route("/analysis/run", post(handlers::run_analysis))
        .route("/analysis/stats", get(handlers::get_analysis_stats))
        // Email routes
        .route("/emails", get(handlers::list_emails))
        .route("/emails/:id", get(handlers::get_email))
        .route("/emails/:id/analyze", post(handlers::analyze_email))
        // Email account routes
        .route("/accounts", get(handlers::list_email_accounts))
        .route("/accounts/:id/sync-logs", get(handlers::list_sync_logs))
        // Client routes
        .route("/clients", get(handlers::list_clients))
        // Action routes
        .route("/actions", get(handlers::list_actions))
        .route("/actions/:id", patch(handlers::update_action))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{create_token, AuthConfig};
    use crate::config::AnalysisConfig;
    use crate::db::PageWindow;
    use crate::handlers::FORCE_REANALYZE_HEADER;
    use crate::models::{Email, SyncLog};
    use crate::repository::Store;
    use crate::services::{AnalysisService, ConcurrentBatchProcessor, EmailProcessor};
    use crate::testing::{account, client, email, MemoryStore, ScriptedModel};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use chrono::Utc;
    use ideabox_types::{ActionExtraction, EmailCategory};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::assert_ok;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::ai::ModelAnalysis;

    struct Harness {
        app: Router,
        store: Arc<MemoryStore>,
        model: Arc<ScriptedModel>,
        token: String,
    }

    fn harness_with(
        user: Uuid,
        store: MemoryStore,
        model: ScriptedModel,
        config: AnalysisConfig,
    ) -> Harness {
        let store = Arc::new(store);
        let model = Arc::new(model);
        let auth_config = AuthConfig {
            jwt_secret: "router-test-secret".to_string(),
            audience: None,
            cookie_name: "auth_token".to_string(),
        };
        let token = create_token(&auth_config, user, Some("owner@example.com")).unwrap();

        let dyn_store: Arc<dyn Store> = store.clone();
        let processor = Arc::new(EmailProcessor::new(dyn_store.clone(), model.clone()));
        let batch = Arc::new(ConcurrentBatchProcessor::new(processor.clone(), 0.40));
        let analysis = Arc::new(AnalysisService::new(
            dyn_store.clone(),
            processor,
            batch,
            config,
        ));

        let state = AppState {
            store: dyn_store,
            analysis,
            auth_config: Arc::new(auth_config),
        };

        Harness {
            app: build_router(state),
            store,
            model,
            token,
        }
    }

    fn harness(user: Uuid, store: MemoryStore, model: ScriptedModel) -> Harness {
        harness_with(user, store, model, AnalysisConfig::default())
    }

    impl Harness {
        async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
            self.send_with(method, uri, body, &[]).await
        }

        async fn send_with(
            &self,
            method: Method,
            uri: &str,
            body: Option<Value>,
            extra_headers: &[(&str, &str)],
        ) -> Response {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            for (name, value) in extra_headers {
                builder = builder.header(*name, *value);
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            assert_ok!(self.app.clone().oneshot(request).await)
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness(Uuid::new_v4(), MemoryStore::new(), ScriptedModel::new());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = assert_ok!(h.app.clone().oneshot(request).await);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_requires_token() {
        let h = harness(Uuid::new_v4(), MemoryStore::new(), ScriptedModel::new());
        let request = Request::builder()
            .uri("/api/analysis/stats")
            .body(Body::empty())
            .unwrap();

        let response = assert_ok!(h.app.clone().oneshot(request).await);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Missing authentication");
    }

    #[tokio::test]
    async fn analyze_twice_returns_stored_analysis() {
        let user = Uuid::new_v4();
        let message = email(user, 0);
        let h = harness(
            user,
            MemoryStore::with_emails(vec![message.clone()]),
            ScriptedModel::new(),
        );
        let uri = format!("/api/emails/{}/analyze", message.id);

        let first = h.send(Method::POST, &uri, None).await;
        assert_eq!(first.status(), StatusCode::OK);
        let first = json_body(first).await;
        assert_eq!(first["success"], true);
        assert_eq!(first["summary"]["category"], "other");
        assert_eq!(first["summary"]["tokensUsed"], 100);
        assert!(first.get("alreadyAnalyzed").is_none());

        let second = json_body(h.send(Method::POST, &uri, None).await).await;
        assert_eq!(second["alreadyAnalyzed"], true);
        assert_eq!(second["analysis"], first["analysis"]);
        assert_eq!(h.model.calls(), 1);

        for _ in 0..2 {
            let forced = h
                .send_with(Method::POST, &uri, None, &[(FORCE_REANALYZE_HEADER, "true")])
                .await;
            assert_eq!(forced.status(), StatusCode::OK);
            assert!(json_body(forced).await.get("alreadyAnalyzed").is_none());
        }
        assert_eq!(h.model.calls(), 3);
    }

    #[tokio::test]
    async fn analyze_unknown_email_is_404() {
        let h = harness(Uuid::new_v4(), MemoryStore::new(), ScriptedModel::new());

        let response = h
            .send(
                Method::POST,
                &format!("/api/emails/{}/analyze", Uuid::new_v4()),
                None,
            )
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "Email not found");
    }

    #[tokio::test]
    async fn analyze_model_failure_is_500_with_generic_message() {
        let user = Uuid::new_v4();
        let message = email(user, 0);
        let h = harness(
            user,
            MemoryStore::with_emails(vec![message.clone()]),
            ScriptedModel::new().fail(message.id),
        );

        let response = h
            .send(Method::POST, &format!("/api/emails/{}/analyze", message.id), None)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Analysis failed");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn analyze_timeout_is_500_with_generic_message() {
        let user = Uuid::new_v4();
        let slow = email(user, 0);
        let config = AnalysisConfig {
            item_timeout: Duration::from_millis(50),
            ..AnalysisConfig::default()
        };
        let h = harness_with(
            user,
            MemoryStore::with_emails(vec![slow.clone()]),
            ScriptedModel::new().delay(slow.id, Duration::from_millis(500)),
            config,
        );

        let response = h
            .send(Method::POST, &format!("/api/emails/{}/analyze", slow.id), None)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Analysis failed");
    }

    #[tokio::test]
    async fn forced_reanalysis_keeps_one_pending_action() {
        let user = Uuid::new_v4();
        let message = email(user, 0);
        let model = ScriptedModel::new().respond(
            message.id,
            ModelAnalysis {
                category: Some(EmailCategory::ActionRequired),
                action: ActionExtraction {
                    has_action: true,
                    title: Some("Send the contract".to_string()),
                    ..Default::default()
                },
                ..ScriptedModel::default_analysis()
            },
        );
        let h = harness(user, MemoryStore::with_emails(vec![message.clone()]), model);
        let uri = format!("/api/emails/{}/analyze", message.id);

        for _ in 0..3 {
            let response = h
                .send_with(Method::POST, &uri, None, &[(FORCE_REANALYZE_HEADER, "true")])
                .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(h.model.calls(), 3);
        let pending = json_body(h.send(Method::GET, "/api/actions?status=pending", None).await).await;
        assert_eq!(pending["total"], 1);
        assert_eq!(h.store.actions().len(), 1);
    }

    #[tokio::test]
    async fn run_without_emails_returns_zeroed_summary() {
        let h = harness(Uuid::new_v4(), MemoryStore::new(), ScriptedModel::new());

        let response = h.send(Method::POST, "/api/analysis/run", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["successCount"], 0);
        assert_eq!(body["failureCount"], 0);
        assert_eq!(body["skippedCount"], 0);
        assert_eq!(body["actionsCreated"], 0);
        assert_eq!(body["tokensUsed"], 0);
        assert_eq!(body["estimatedCost"], 0.0);
        assert_eq!(body["categorized"], json!({}));
        assert_eq!(h.model.calls(), 0);
    }

    #[tokio::test]
    async fn run_respects_max_emails_and_reports_counts() {
        let user = Uuid::new_v4();
        let emails: Vec<Email> = (0..4).map(|i| email(user, i)).collect();
        let model = ScriptedModel::new()
            .respond(
                emails[0].id,
                ModelAnalysis {
                    category: Some(EmailCategory::ActionRequired),
                    action: ActionExtraction {
                        has_action: true,
                        title: Some("Reply to Sam".to_string()),
                        ..Default::default()
                    },
                    ..ScriptedModel::default_analysis()
                },
            )
            .fail(emails[1].id);
        let h = harness(user, MemoryStore::with_emails(emails), model);

        let response = h
            .send(
                Method::POST,
                "/api/analysis/run",
                Some(json!({ "maxEmails": 3 })),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["successCount"], 2);
        assert_eq!(body["failureCount"], 1);
        assert_eq!(body["actionsCreated"], 1);
        assert_eq!(body["tokensUsed"], 200);
        assert_eq!(body["categorized"]["action_required"], 1);
        assert_eq!(body["categorized"]["other"], 1);
        assert_eq!(h.store.actions().len(), 1);

        let stats = json_body(h.send(Method::GET, "/api/analysis/stats", None).await).await;
        assert_eq!(stats["totalEmails"], 4);
        assert_eq!(stats["unanalyzedEmails"], 2);
        assert_eq!(stats["analyzedEmails"], 2);
    }

    #[tokio::test]
    async fn run_rejects_malformed_body() {
        let user = Uuid::new_v4();
        let h = harness(
            user,
            MemoryStore::with_emails(vec![email(user, 0)]),
            ScriptedModel::new(),
        );

        let response = h
            .send(
                Method::POST,
                "/api/analysis/run",
                Some(json!({ "maxEmails": "abc" })),
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.model.calls(), 0);
    }

    #[tokio::test]
    async fn run_exceeding_budget_is_504() {
        let user = Uuid::new_v4();
        let slow = email(user, 0);
        let config = AnalysisConfig {
            run_timeout: Duration::from_millis(50),
            ..AnalysisConfig::default()
        };
        let h = harness_with(
            user,
            MemoryStore::with_emails(vec![slow.clone()]),
            ScriptedModel::new().delay(slow.id, Duration::from_millis(500)),
            config,
        );

        let response = h.send(Method::POST, "/api/analysis/run", None).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json_body(response).await["error"], "Request timed out");
    }

    #[tokio::test]
    async fn list_emails_paginates_and_validates_category() {
        let user = Uuid::new_v4();
        let emails: Vec<Email> = (0..5).map(|i| email(user, i)).collect();
        let h = harness(user, MemoryStore::with_emails(emails.clone()), ScriptedModel::new());

        let body = json_body(
            h.send(Method::GET, "/api/emails?page=2&pageSize=2", None)
                .await,
        )
        .await;
        assert_eq!(body["total"], 5);
        assert_eq!(body["hasMore"], true);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["items"][0]["id"], emails[2].id.to_string());

        let bad = h.send(Method::GET, "/api/emails?category=spam", None).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn huge_page_numbers_return_an_empty_page() {
        let user = Uuid::new_v4();
        let emails: Vec<Email> = (0..3).map(|i| email(user, i)).collect();
        let h = harness(user, MemoryStore::with_emails(emails), ScriptedModel::new());

        for uri in [
            "/api/emails?page=9223372036854775807",
            "/api/emails?page=9223372036854775807&pageSize=100",
            "/api/actions?page=9223372036854775807",
        ] {
            let response = h.send(Method::GET, uri, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let body = json_body(response).await;
            assert_eq!(body["items"], json!([]));
            assert_eq!(body["hasMore"], false);
            assert_eq!(body["page"], PageWindow::MAX_PAGE);
        }
    }

    #[tokio::test]
    async fn accounts_include_email_counts() {
        let user = Uuid::new_v4();
        let work = account(user, "work@example.com");
        let home = account(user, "home@example.com");
        let mut emails: Vec<Email> = (0..3).map(|i| email(user, i)).collect();
        emails[0].account_id = work.id;
        emails[1].account_id = work.id;
        emails[2].account_id = home.id;
        let store = MemoryStore::with_emails(emails).with_accounts(vec![work.clone(), home.clone()]);
        let h = harness(user, store, ScriptedModel::new());

        let body = json_body(h.send(Method::GET, "/api/accounts", None).await).await;
        let accounts = body.as_array().unwrap();
        assert_eq!(accounts.len(), 2);
        for account in accounts {
            let expected = if account["id"] == work.id.to_string() { 2 } else { 1 };
            assert_eq!(account["emailCount"], expected);
        }

        h.store.fail_count_queries(true);
        let failed = h.send(Method::GET, "/api/accounts", None).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn sync_logs_are_scoped_to_owner() {
        let user = Uuid::new_v4();
        let mine = account(user, "me@example.com");
        let theirs = account(Uuid::new_v4(), "them@example.com");
        let log = SyncLog {
            id: Uuid::new_v4(),
            account_id: mine.id,
            sync_type: "incremental".to_string(),
            status: "success".to_string(),
            emails_fetched: 12,
            emails_analyzed: 10,
            error_message: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            duration_ms: Some(850),
        };
        let store = MemoryStore::new()
            .with_accounts(vec![mine.clone(), theirs.clone()])
            .with_sync_logs(vec![log]);
        let h = harness(user, store, ScriptedModel::new());

        let body = json_body(
            h.send(
                Method::GET,
                &format!("/api/accounts/{}/sync-logs", mine.id),
                None,
            )
            .await,
        )
        .await;
        assert_eq!(body[0]["emailsFetched"], 12);

        let other = h
            .send(
                Method::GET,
                &format!("/api/accounts/{}/sync-logs", theirs.id),
                None,
            )
            .await;
        assert_eq!(other.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn clients_and_action_lifecycle() {
        let user = Uuid::new_v4();
        let message = email(user, 0);
        let model = ScriptedModel::new().respond(
            message.id,
            ModelAnalysis {
                action: ActionExtraction {
                    has_action: true,
                    title: Some("Book venue".to_string()),
                    ..Default::default()
                },
                ..ScriptedModel::default_analysis()
            },
        );
        let store = MemoryStore::with_emails(vec![message.clone()])
            .with_clients(vec![client(user, "Acme")]);
        let h = harness(user, store, model);

        let clients = json_body(h.send(Method::GET, "/api/clients", None).await).await;
        assert_eq!(clients[0]["name"], "Acme");

        h.send(Method::POST, &format!("/api/emails/{}/analyze", message.id), None)
            .await;

        let pending = json_body(h.send(Method::GET, "/api/actions?status=pending", None).await).await;
        assert_eq!(pending["total"], 1);
        let action_id = pending["items"][0]["id"].as_str().unwrap().to_string();

        let updated = h
            .send(
                Method::PATCH,
                &format!("/api/actions/{}", action_id),
                Some(json!({ "status": "completed" })),
            )
            .await;
        assert_eq!(updated.status(), StatusCode::OK);
        let updated = json_body(updated).await;
        assert_eq!(updated["status"], "completed");
        assert!(!updated["completedAt"].is_null());

        let missing = h
            .send(
                Method::PATCH,
                &format!("/api/actions/{}", Uuid::new_v4()),
                Some(json!({ "status": "dismissed" })),
            )
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
