//! HTTP server for the collaborator API and the Prometheus endpoint.
//!
//! The CRUD layer calls `/internal/*` once its database write has succeeded.
//! `/metrics` is served from the same listener and is never token-protected.

use crate::error::BrokerError;
use crate::state::Broker;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gradecast_proto::{NewValidationRequest, Snapshot, ValidationDecision};
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub broker: Arc<Broker>,
    /// Bearer token required on `/internal/*`, if configured.
    pub api_token: Option<Arc<str>>,
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let status = match self {
            BrokerError::InvalidDecisionStatus(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/internal/validation-requests", post(submit_request))
        .route(
            "/internal/validation-requests/pending",
            get(pending_requests),
        )
        .route(
            "/internal/validation-requests/:request_id/decision",
            post(record_decision),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve until the shutdown signal fires.
pub async fn run_http_server(
    listener: TcpListener,
    state: ApiState,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }

    let shutdown = async move {
        let _ = shutdown_rx.recv().await;
    };
    if let Err(e) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %e, "HTTP server error");
    }
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn submit_request(
    State(state): State<ApiState>,
    Json(request): Json<NewValidationRequest>,
) -> impl IntoResponse {
    let delivered = state.broker.submit_validation_request(request).await;
    (StatusCode::ACCEPTED, Json(json!({ "delivered": delivered })))
}

async fn record_decision(
    State(state): State<ApiState>,
    Path(request_id): Path<String>,
    Json(decision): Json<ValidationDecision>,
) -> Result<impl IntoResponse, BrokerError> {
    let delivery = state
        .broker
        .record_validation_decision(&request_id, decision)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "delivered": delivery }))))
}

async fn pending_requests(State(state): State<ApiState>) -> Json<Snapshot> {
    Json(state.broker.snapshot().await)
}

async fn require_token(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.api_token.as_deref() else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        next.run(req).await
    } else {
        warn!(path = %req.uri().path(), "Rejected collaborator call without valid token");
        StatusCode::UNAUTHORIZED.into_response()
    }
}
