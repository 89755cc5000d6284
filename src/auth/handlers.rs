//! Authentication handlers: login, register, activate, reset-password.
//! Thin glue over the collaborator traits; all storage access goes through
//! the same plan/record machinery as the generic endpoints.

use crate::auth::TokenPurpose;
use crate::error::AppError;
use crate::schema::SchemaHandle;
use crate::service::validation::RecordValidator;
use crate::state::AppState;
use crate::storage::{Projection, ProjectionSource, QueryPlan};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Fetch one user row by an exact match on `column`, projecting the key and
/// the auth-relevant columns.
async fn find_user_by(
    state: &AppState,
    column: &str,
    value: Value,
) -> Result<Option<(SchemaHandle, Map<String, Value>)>, AppError> {
    let schema = state.registry.resolve(&state.config.user_model)?;
    let cfg = &state.config;
    let mut fields = vec![
        schema.key_field.clone(),
        cfg.username_field.clone(),
        cfg.password_field.clone(),
        cfg.email_field.clone(),
        cfg.active_field.clone(),
    ];
    fields.dedup();
    let plan = QueryPlan {
        schema: schema.clone(),
        projection: fields
            .into_iter()
            .map(|f| Projection {
                alias: f.clone(),
                source: ProjectionSource::Column(f),
            })
            .collect(),
        predicate: Some(crate::service::filter::Predicate::Cmp {
            field: column.to_string(),
            op: crate::service::filter::CmpOp::Eq,
            value,
        }),
        sort: None,
        page: None,
        distinct: false,
    };
    let page = state.storage.query(&plan).await?;
    Ok(page.rows.into_iter().next().map(|row| (schema, row)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let cfg = &state.config;
    let found = find_user_by(&state, &cfg.username_field, json!(req.username)).await?;
    let Some((schema, user)) = found else {
        return Err(AppError::AuthFailed);
    };
    if !user
        .get(&cfg.active_field)
        .and_then(Value::as_bool)
        .unwrap_or(true)
    {
        return Err(AppError::AuthFailed);
    }
    let hashed = user
        .get(&cfg.password_field)
        .and_then(Value::as_str)
        .ok_or(AppError::AuthFailed)?;
    if !state.hasher.verify(&req.password, hashed) {
        return Err(AppError::AuthFailed);
    }
    let user_id = user
        .get(&schema.key_field)
        .and_then(Value::as_i64)
        .ok_or(AppError::AuthFailed)?;
    let token = state.tokens.issue(user_id, TokenPurpose::Session);
    Ok(Json(json!({ "token": token })))
}

/// Create an inactive account and mail an activation token. The body is the
/// user record itself; the password field is hashed before validation so the
/// stored record never sees the raw value.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Value::Object(mut record) = body else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    let cfg = &state.config;
    let schema = state.registry.resolve(&cfg.user_model)?;

    let raw_password = record
        .get(&cfg.password_field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is required", cfg.password_field)))?;
    record.insert(
        cfg.password_field.clone(),
        Value::String(state.hasher.hash(&raw_password)),
    );
    record.insert(cfg.active_field.clone(), Value::Bool(false));

    let validator = RecordValidator::synthesize(&schema);
    let record = validator.validate(&record)?;

    let email = record
        .get(&cfg.email_field)
        .and_then(Value::as_str)
        .map(str::to_string);
    let id = state.storage.create(&schema, &record).await?;

    if let (Some(email), Some(user_id)) = (email, id.as_i64()) {
        let token = state.tokens.issue(user_id, TokenPurpose::Activation);
        state
            .mailer
            .send(
                &email,
                "Activate your account",
                &format!("Use this token to activate your account: {}", token),
            )
            .await?;
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Check your email to activate your account."
        })),
    ))
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

pub async fn activate(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = state
        .tokens
        .verify(&req.token, TokenPurpose::Activation)
        .ok_or(AppError::AuthFailed)?;
    let schema = state.registry.resolve(&state.config.user_model)?;
    let mut patch = Map::new();
    patch.insert(state.config.active_field.clone(), Value::Bool(true));
    let found = state
        .storage
        .update(&schema, &json!(user_id), &patch)
        .await?;
    if !found {
        return Err(AppError::RecordNotFound(user_id.to_string()));
    }
    Ok(Json(json!({ "message": "Account activated." })))
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Always answers with the same message so the endpoint cannot be used to
/// probe which addresses have accounts.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<Value>, AppError> {
    let cfg = &state.config;
    if let Some((schema, user)) = find_user_by(&state, &cfg.email_field, json!(req.email)).await? {
        if let Some(user_id) = user.get(&schema.key_field).and_then(Value::as_i64) {
            let token = state.tokens.issue(user_id, TokenPurpose::PasswordReset);
            state
                .mailer
                .send(
                    &req.email,
                    "Password reset",
                    &format!("Use this token to reset your password: {}", token),
                )
                .await?;
        }
    }
    Ok(Json(json!({
        "message": "If the address is registered, a reset link has been sent."
    })))
}

#[derive(Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

pub async fn reset_password_confirm(
    State(state): State<AppState>,
    Json(req): Json<ResetConfirmRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = state
        .tokens
        .verify(&req.token, TokenPurpose::PasswordReset)
        .ok_or(AppError::AuthFailed)?;
    let schema = state.registry.resolve(&state.config.user_model)?;
    let mut patch = Map::new();
    patch.insert(
        state.config.password_field.clone(),
        Value::String(state.hasher.hash(&req.password)),
    );
    let found = state
        .storage
        .update(&schema, &json!(user_id), &patch)
        .await?;
    if !found {
        return Err(AppError::RecordNotFound(user_id.to_string()));
    }
    Ok(Json(json!({ "message": "Password updated." })))
}
