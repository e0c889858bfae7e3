use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, post};
use axum::{Json, Router};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::{Config, SERVICE_NAME};
use crate::envelope::ProxyEnvelope;
use crate::error::ProxyError;
use crate::gateway::{self, GatewayReply, PlanGateway};
use crate::plan::Capability;

/// Per-process state handed to every handler. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn PlanGateway>,
}

impl AppState {
    pub fn new(config: Config, client: Client) -> Self {
        let gateway = gateway::from_config(client, &config);
        Self::with_gateway(config, gateway)
    }

    pub fn with_gateway(config: Config, gateway: Arc<dyn PlanGateway>) -> Self {
        Self {
            config: Arc::new(config),
            gateway,
        }
    }
}

type PlanPayload = Result<Json<Value>, JsonRejection>;

#[derive(Debug, Serialize)]
struct HealthFailure {
    status: &'static str,
    service: &'static str,
    error: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let mut app = Router::new().route("/health", get(health));
    for capability in Capability::ALL {
        app = app.route(capability.path(), plan_route(capability));
    }

    if let Some(dir) = &state.config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(cors).with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(
        address = %address,
        environment = %state.config.environment,
        "server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    info!("server shut down");
    Ok(())
}

fn plan_route(capability: Capability) -> MethodRouter<AppState> {
    post(move |state: State<AppState>, body: PlanPayload| proxy_plan(state, capability, body))
}

async fn proxy_plan(
    State(state): State<AppState>,
    capability: Capability,
    payload: PlanPayload,
) -> Response {
    match dispatch(&state, capability, payload).await {
        Ok(GatewayReply::Relayed(body)) => {
            ([(CONTENT_TYPE, "application/json")], body).into_response()
        }
        Ok(GatewayReply::Generated(text)) => Json(ProxyEnvelope::success(text)).into_response(),
        Err(err) => {
            warn!(
                capability = capability.as_str(),
                status = %err.status(),
                error = %err,
                "plan request failed"
            );
            err.into_response()
        }
    }
}

async fn dispatch(
    state: &AppState,
    capability: Capability,
    payload: PlanPayload,
) -> Result<GatewayReply, ProxyError> {
    let Json(body) = payload.map_err(|rejection| ProxyError::InvalidBody(rejection.body_text()))?;
    let user_data = body
        .get("userData")
        .filter(|value| !value.is_null())
        .ok_or(ProxyError::MissingUserData)?;

    state.gateway.generate(capability, &body, user_data).await
}

async fn health(State(state): State<AppState>) -> Response {
    match state.gateway.health().await {
        Ok(status) => Json(status).into_response(),
        Err(err) => {
            warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthFailure {
                    status: "error",
                    service: SERVICE_NAME,
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                warn!(error = %err, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                warn!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use super::{AppState, router};
    use crate::config::Config;
    use crate::error::ProxyError;
    use crate::gateway::{GatewayFuture, GatewayReply, PlanGateway};
    use crate::plan::Capability;

    const PLAN_BODY: &str = r#"{"userData":{"name":"Ana"}}"#;

    enum StubOutcome {
        Relay(&'static str),
        Generate(&'static str),
        Fail(fn() -> ProxyError),
    }

    struct StubGateway {
        calls: AtomicUsize,
        outcome: StubOutcome,
    }

    impl StubGateway {
        fn new(outcome: StubOutcome) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome,
            })
        }
    }

    impl PlanGateway for StubGateway {
        fn generate<'a>(
            &'a self,
            _capability: Capability,
            _body: &'a Value,
            _user_data: &'a Value,
        ) -> GatewayFuture<'a, GatewayReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match &self.outcome {
                StubOutcome::Relay(body) => {
                    Ok(GatewayReply::Relayed(Bytes::from_static(body.as_bytes())))
                }
                StubOutcome::Generate(text) => Ok(GatewayReply::Generated(text.to_string())),
                StubOutcome::Fail(make) => Err(make()),
            };
            Box::pin(async move { result })
        }

        fn health(&self) -> GatewayFuture<'_, Value> {
            let result = match &self.outcome {
                StubOutcome::Fail(make) => Err(make()),
                _ => Ok(json!({"status": "ok"})),
            };
            Box::pin(async move { result })
        }
    }

    fn test_state(gateway: Arc<StubGateway>) -> AppState {
        let config = Config::from_env_with(|_| None).expect("default config should be valid");
        AppState::with_gateway(config, gateway)
    }

    fn post_json(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn missing_user_data_short_circuits() {
        let gateway = StubGateway::new(StubOutcome::Generate("unused"));
        let app = router(test_state(gateway.clone()));

        for body in [r#"{}"#, r#"{"userData": null}"#, r#"{"other": 1}"#] {
            let response = app
                .clone()
                .oneshot(post_json("/api/generateWorkout", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                body_json(response).await,
                json!({"success": false, "error": "Missing userData"})
            );
        }
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_json_body_returns_envelope() {
        let gateway = StubGateway::new(StubOutcome::Generate("unused"));
        let app = router(test_state(gateway.clone()));

        let response = app
            .oneshot(post_json("/api/generateHealth", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid JSON body")
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn relayed_body_is_returned_unchanged() {
        let raw = r#"{"success":true,"response":"X","extra":{"b":1,"a":2}}"#;
        let gateway = StubGateway::new(StubOutcome::Relay(raw));
        let app = router(test_state(gateway.clone()));

        let response = app
            .oneshot(post_json("/api/generateNutrition", PLAN_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], raw.as_bytes());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generated_text_is_wrapped_in_success_envelope() {
        let gateway = StubGateway::new(StubOutcome::Generate("Drink water."));
        let app = router(test_state(gateway));

        let response = app
            .oneshot(post_json("/api/generateHealth", PLAN_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "response": "Drink water."})
        );
    }

    #[tokio::test]
    async fn gateway_errors_become_failure_envelopes() {
        let gateway = StubGateway::new(StubOutcome::Fail(|| ProxyError::UpstreamRejected {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "rate limited".to_string(),
        }));
        let app = router(test_state(gateway));

        let response = app
            .oneshot(post_json("/api/generateHealth", r#"{"userData":{}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "rate limited"})
        );
    }

    #[tokio::test]
    async fn failed_health_check_reports_error_shape() {
        let gateway = StubGateway::new(StubOutcome::Fail(|| ProxyError::NoCandidates));
        let app = router(test_state(gateway));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["service"], "salud-proxy");
        assert_eq!(json["error"], "No response generated from API");
    }
}
