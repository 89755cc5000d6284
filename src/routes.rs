//! Router assembly: generic model routes, auth routes, and common routes.

use crate::auth::handlers as auth_handlers;
use crate::handlers::{model, profile};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// Payloads are small declarative documents; anything bigger is a mistake.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Generic model endpoints: POST /fetch, POST /save.
pub fn model_routes(state: AppState) -> Router {
    Router::new()
        .route("/fetch", post(model::fetch))
        .route("/save", post(model::save))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES)))
        .with_state(state)
}

/// Auth and profile endpoints.
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/activate", post(auth_handlers::activate))
        .route("/auth/reset-password", post(auth_handlers::reset_password))
        .route(
            "/auth/reset-password/confirm",
            post(auth_handlers::reset_password_confirm),
        )
        .route("/auth/profile", get(profile::read).patch(profile::update))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES)))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Common routes (no state): GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}
