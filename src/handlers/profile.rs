//! User-info endpoints. Exposed and editable fields come from PluginConfig,
//! not from the request.

use crate::auth::principal_from_headers;
use crate::error::AppError;
use crate::service::validation::RecordValidator;
use crate::state::AppState;
use crate::storage::{Projection, ProjectionSource, QueryPlan};
use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

fn current_user_id(state: &AppState, headers: &HeaderMap) -> Result<i64, AppError> {
    principal_from_headers(state.tokens.as_ref(), headers)
        .user_id
        .ok_or(AppError::AuthFailed)
}

pub async fn read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let user_id = current_user_id(&state, &headers)?;
    let schema = state.registry.resolve(&state.config.user_model)?;
    let plan = QueryPlan {
        schema: schema.clone(),
        projection: state
            .config
            .profile_fields
            .iter()
            .map(|f| Projection {
                alias: f.clone(),
                source: ProjectionSource::Column(f.clone()),
            })
            .collect(),
        predicate: Some(crate::service::filter::Predicate::Cmp {
            field: schema.key_field.clone(),
            op: crate::service::filter::CmpOp::Eq,
            value: json!(user_id),
        }),
        sort: None,
        page: None,
        distinct: false,
    };
    let mut page = state.storage.query(&plan).await?;
    let row = page
        .rows
        .drain(..)
        .next()
        .ok_or_else(|| AppError::RecordNotFound(user_id.to_string()))?;
    Ok(Json(json!({ "data": row })))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let user_id = current_user_id(&state, &headers)?;
    let Value::Object(record) = body else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    for key in record.keys() {
        if !state.config.profile_editable_fields.contains(key) {
            return Err(AppError::BadRequest(format!(
                "field '{}' is not editable",
                key
            )));
        }
    }
    let schema = state.registry.resolve(&state.config.user_model)?;
    let validator = RecordValidator::synthesize(&schema);
    let patch = validator.validate_partial(&record)?;
    if patch.is_empty() {
        return Err(AppError::BadRequest(
            "body must contain at least one editable field".into(),
        ));
    }
    let found = state
        .storage
        .update(&schema, &json!(user_id), &patch)
        .await?;
    if !found {
        return Err(AppError::RecordNotFound(user_id.to_string()));
    }
    Ok(Json(json!({ "message": "Profile updated." })))
}
