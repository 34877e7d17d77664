//! HTTP boundary.
//!
//! The whole operation surface is one POST route dispatched on the
//! `x-amz-target` header; the rest is the JWKS document and a health
//! check.

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::routes(state).layer(cors).layer(TraceLayer::new_for_http())
}
