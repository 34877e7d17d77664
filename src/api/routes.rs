use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::context::Context;
use crate::error::CognitoError;
use crate::router as operation_router;
use crate::SharedState;

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/", post(handle_operation))
        .route("/health", get(health))
        .route("/{pool_id}/.well-known/jwks.json", get(jwks))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "userpool-local",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /{poolId}/.well-known/jwks.json` — all pools share the one local
/// signing key.
async fn jwks(
    State(state): State<SharedState>,
    Path(_pool_id): Path<String>,
) -> impl IntoResponse {
    Json(state.tokens.jwks())
}

/// `POST /` with `X-Amz-Target: <Service>.<Operation>` — the single entry
/// point SDK clients speak to.
async fn handle_operation(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<serde_json::Value>, CognitoError> {
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            CognitoError::InvalidParameter("Missing x-amz-target header".into())
        })?;

    // the service prefix is not meaningful locally
    let operation = target.rsplit('.').next().unwrap_or(target).to_string();

    let request = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| CognitoError::InvalidParameter(format!("Invalid JSON body: {e}")))?
    };

    let ctx = Context::new();
    let response = operation_router::route(&state, &ctx, &operation, request).await?;
    Ok(Json(response))
}
