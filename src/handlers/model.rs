//! Generic model endpoints: fetch and save over the payload envelope.

use crate::auth::principal_from_headers;
use crate::error::AppError;
use crate::request::{Envelope, FetchVariables, SaveVariables};
use crate::response;
use crate::service;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use serde_json::Value;

fn parse_envelope<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AppError> {
    let env: Envelope<T> =
        serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(env.payload.variables)
}

pub async fn fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let vars: FetchVariables = parse_envelope(body)?;
    let principal = principal_from_headers(state.tokens.as_ref(), &headers);
    let result = service::fetch(
        &state.registry,
        state.storage.as_ref(),
        state.gate.as_ref(),
        &principal,
        &vars,
    )
    .await?;
    Ok(Json(response::fetch_body(&result)))
}

pub async fn save(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let vars: SaveVariables = parse_envelope(body)?;
    let principal = principal_from_headers(state.tokens.as_ref(), &headers);
    let result = service::save(
        &state.registry,
        state.storage.as_ref(),
        state.gate.as_ref(),
        &principal,
        &vars,
    )
    .await?;
    Ok(Json(response::save_body(&result)))
}
