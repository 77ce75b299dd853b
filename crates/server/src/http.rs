use std::sync::Arc;

use attache_core::activity::Activity;
use attache_db::DbPool;
use attache_hosting::{ActivityRouter, DispatchOutcome, TurnContext};
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApiState {
    pub activity_router: Arc<ActivityRouter>,
    pub db_pool: DbPool,
    pub agent_id: String,
    /// `None` runs the messages route in anonymous mode.
    pub bearer_token: Option<SecretString>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ApiError {
    fn new(message: impl Into<String>) -> Self {
        Self { error: message.into(), correlation_id: None }
    }

    fn with_correlation(message: impl Into<String>, correlation_id: &str) -> Self {
        Self { error: message.into(), correlation_id: Some(correlation_id.to_string()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agent: HealthCheck,
    pub auth_mode: &'static str,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/api/messages", post(post_messages))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/api/messages", get(get_messages))
        .route("/api/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Decodes the activity envelope and fans it out through the activity
/// router. Replies collected on the turn come back in the response body.
pub async fn post_messages(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ActivitiesResponse>, (StatusCode, Json<ApiError>)> {
    let activity: Activity = serde_json::from_slice(&body).map_err(|err| {
        warn!(
            event_name = "http.activity.rejected",
            error = %err,
            "activity envelope failed to decode"
        );
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(format!("invalid activity envelope: {err}"))),
        )
    })?;

    let turn = TurnContext::for_activity(&activity);
    info!(
        event_name = "http.activity.received",
        correlation_id = turn.correlation_id(),
        conversation_id = turn.conversation_id(),
        kind = activity.kind().as_str(),
        "activity accepted for dispatch"
    );

    match state.activity_router.dispatch(&activity, &turn).await {
        Ok(outcome) => {
            if let DispatchOutcome::Handled { handlers, responses } = outcome {
                info!(
                    event_name = "http.activity.handled",
                    correlation_id = turn.correlation_id(),
                    handlers,
                    responses,
                    "activity dispatch finished"
                );
            }
            Ok(Json(ActivitiesResponse { activities: turn.into_replies() }))
        }
        Err(err) => {
            error!(
                event_name = "http.activity.failed",
                correlation_id = turn.correlation_id(),
                error = %err,
                "handler failed while processing activity"
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::with_correlation(err.to_string(), turn.correlation_id())),
            ))
        }
    }
}

/// The original host answered GET on the messages route with a bare 200;
/// deployment probes depend on it.
pub async fn get_messages() -> StatusCode {
    StatusCode::OK
}

pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        agent: HealthCheck {
            status: "ready",
            detail: format!("agent `{}` initialized", state.agent_id),
        },
        auth_mode: if state.bearer_token.is_some() { "authenticated" } else { "anonymous" },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(err) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {err}") }
        }
    }
}

/// Guards the messages route. Passes everything through when no token is
/// configured; the anonymous mode is logged once at startup.
pub async fn require_bearer(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let Some(expected) = state.bearer_token.as_ref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected.expose_secret() => Ok(next.run(request).await),
        Some(_) => {
            warn!(event_name = "http.auth.rejected", "bearer token mismatch");
            Err(unauthorized())
        }
        None => {
            warn!(event_name = "http.auth.rejected", "missing bearer authorization header");
            Err(unauthorized())
        }
    }
}

fn unauthorized() -> (StatusCode, Json<ApiError>) {
    (StatusCode::UNAUTHORIZED, Json(ApiError::new("missing or invalid bearer token")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use attache_core::activity::ActivityKind;
    use attache_core::convo::INSTALL_FIRST_REPLY;
    use attache_db::connect_with_settings;
    use attache_hosting::{
        default_router, ActivityHandler, ActivityRouter, AgentInvoker, HandlerError,
        HandlerResult, MemoryConversationStore, TurnContext,
    };
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    use super::*;

    struct EchoAgent;

    #[async_trait]
    impl AgentInvoker for EchoAgent {
        async fn invoke(&self, prompt: &str, _turn: &TurnContext) -> String {
            format!("echo: {prompt}")
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ActivityHandler for FailingHandler {
        fn kind(&self) -> ActivityKind {
            ActivityKind::Message
        }

        async fn handle(
            &self,
            _activity: &attache_core::activity::Activity,
            _turn: &TurnContext,
        ) -> Result<HandlerResult, HandlerError> {
            Err(HandlerError::new("message", "handler exploded"))
        }
    }

    async fn api_state() -> ApiState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        let store = Arc::new(MemoryConversationStore::default());
        ApiState {
            activity_router: Arc::new(default_router(store, Arc::new(EchoAgent))),
            db_pool: pool,
            agent_id: "attache-agent".to_string(),
            bearer_token: None,
        }
    }

    fn message_request(token: Option<&str>) -> HttpRequest<Body> {
        let payload = serde_json::json!({
            "type": "message",
            "text": "hello",
            "conversation": {"id": "conv-http-1"}
        });
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri("/api/messages")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(payload.to_string())).expect("request")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn posting_an_activity_returns_the_reply_envelope() {
        let app = router(api_state().await);

        let response = app.oneshot(message_request(None)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let activities = body["activities"].as_array().expect("activities array");
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0]["type"], "message");
        assert_eq!(activities[0]["text"], INSTALL_FIRST_REPLY);
        assert_eq!(activities[0]["conversation"]["id"], "conv-http-1");
    }

    #[tokio::test]
    async fn undecodable_envelope_is_rejected_with_422() {
        let app = router(api_state().await);

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"type": 42}"#))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error text").contains("invalid activity envelope"));
    }

    #[tokio::test]
    async fn bearer_token_gates_the_messages_route() {
        let mut state = api_state().await;
        state.bearer_token = Some("sekrit".to_string().into());
        let app = router(state);

        let denied = app.clone().oneshot(message_request(None)).await.expect("response");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let wrong = app.clone().oneshot(message_request(Some("other"))).await.expect("response");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let allowed = app.clone().oneshot(message_request(Some("sekrit"))).await.expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);

        // Liveness stays open even when the messages route is locked down.
        let probe = HttpRequest::builder()
            .method("GET")
            .uri("/api/messages")
            .body(Body::empty())
            .expect("request");
        let probe_response = app.oneshot(probe).await.expect("response");
        assert_eq!(probe_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn handler_failure_maps_to_500_with_correlation_id() {
        let mut activity_router = ActivityRouter::new();
        activity_router.on_activity(FailingHandler);
        let mut state = api_state().await;
        state.activity_router = Arc::new(activity_router);
        let app = router(state);

        let response = app.oneshot(message_request(None)).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error text").contains("handler exploded"));
        assert!(body["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn unrouted_activity_kind_still_answers_200_with_no_replies() {
        // Only the failing message handler is registered, so installation
        // updates have no handler at all.
        let mut activity_router = ActivityRouter::new();
        activity_router.on_activity(FailingHandler);
        let mut state = api_state().await;
        state.activity_router = Arc::new(activity_router);
        let app = router(state);

        let payload = serde_json::json!({
            "type": "installationUpdate",
            "action": "add",
            "conversation": {"id": "conv-http-2"}
        });
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["activities"].as_array().expect("activities array").len(), 0);
    }

    #[tokio::test]
    async fn health_reports_auth_mode_and_database_state() {
        let state = api_state().await;
        let pool = state.db_pool.clone();

        let (status, Json(payload)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.auth_mode, "anonymous");
        assert_eq!(payload.database.status, "ready");
        assert!(payload.agent.detail.contains("attache-agent"));

        pool.close().await;
        let mut locked = state;
        locked.bearer_token = Some("sekrit".to_string().into());
        let (status, Json(payload)) = health(State(locked)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.auth_mode, "authenticated");
        assert_eq!(payload.database.status, "degraded");
    }
}
