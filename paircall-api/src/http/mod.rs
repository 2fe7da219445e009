// Module: http
// HTTP/JSON REST API over the signaling and credential services

pub mod call;
pub mod error;
pub mod health;
pub mod history;
pub mod token;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use paircall_core::service::{CallSignalingService, HistoryService, JoinCredentialService};
use paircall_core::store::DocumentStore;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub signaling: CallSignalingService,
    pub history: HistoryService,
    /// Absent when the transport API key/secret is not configured; the
    /// token endpoint reports a server error in that case.
    pub credential_service: Option<Arc<JoinCredentialService>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        credential_service: Option<Arc<JoinCredentialService>>,
    ) -> Self {
        Self {
            signaling: CallSignalingService::new(store.clone()),
            history: HistoryService::new(store),
            credential_service,
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::create_health_router())
        .route("/api/token", post(token::create_token))
        .route("/api/calls", post(call::create_call))
        .route("/api/calls/{id}", get(call::get_call))
        .route("/api/calls/{id}/accept", post(call::accept_call))
        .route("/api/calls/{id}/end", post(call::end_call))
        .route("/api/history/{user_id}", get(history::list_history))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use paircall_core::config::TransportConfig;
    use paircall_core::store::MemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn credential_service() -> Arc<JoinCredentialService> {
        Arc::new(
            JoinCredentialService::new(&TransportConfig {
                api_key: "devkey".to_string(),
                api_secret: "a-very-long-development-secret".to_string(),
                token_ttl_seconds: 3600,
            })
            .expect("credential service"),
        )
    }

    fn router(with_credentials: bool) -> Router {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let credentials = with_credentials.then(credential_service);
        create_router(AppState::new(store, credentials))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn test_token_happy_path() {
        let app = router(true);
        let response = app
            .oneshot(post_json(
                "/api/token",
                json!({
                    "roomName": "u1_u2",
                    "participantIdentity": "u1",
                    "participantName": "Alice"
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_token_missing_field_is_bad_request() {
        let app = router(true);
        let response = app
            .oneshot(post_json(
                "/api/token",
                json!({ "roomName": "u1_u2", "participantName": "Alice" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .is_some_and(|e| e.contains("participantIdentity")));
    }

    #[tokio::test]
    async fn test_token_without_server_credentials_is_server_error() {
        let app = router(false);
        let response = app
            .oneshot(post_json(
                "/api/token",
                json!({
                    "roomName": "u1_u2",
                    "participantIdentity": "u1",
                    "participantName": "Alice"
                }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_call_lifecycle_over_http() {
        let app = router(true);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/calls",
                json!({
                    "callerId": "u1",
                    "callerName": "Alice",
                    "calleeId": "u2",
                    "calleeName": "Bob"
                }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["roomId"], "u1_u2");
        let call_id = body["callId"].as_str().expect("call id").to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/calls/{call_id}/accept"),
                json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "accepted");

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/calls/{call_id}/end"), json!({})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ended");

        // Accepting an ended call is a conflict.
        let response = app
            .oneshot(post_json(
                &format!("/api/calls/{call_id}/accept"),
                json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_history_empty_for_unknown_user() {
        let app = router(true);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/history/u1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_health_probes() {
        let app = router(true);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
