//! Save engine: create-or-update of a batch of records with validators
//! synthesized from the resolved schema.

use crate::error::{AppError, FieldError};
use crate::permission::{Action, PermissionGate, Principal};
use crate::registry::ModelRegistry;
use crate::request::SaveVariables;
use crate::schema::KeyType;
use crate::service::validation::RecordValidator;
use crate::storage::Storage;
use serde_json::Value;

/// Upper bound on records per save request, checked before any per-record
/// work.
pub const MAX_BATCH: usize = 10;

pub const CREATED_MESSAGE: &str = "Record created successfully.";
pub const UPDATED_MESSAGE: &str = "Record updated successfully.";

#[derive(Debug)]
pub struct SaveResult {
    pub ids: Vec<Value>,
    pub messages: Vec<String>,
}

pub async fn save(
    registry: &ModelRegistry,
    storage: &dyn Storage,
    gate: &dyn PermissionGate,
    principal: &Principal,
    vars: &SaveVariables,
) -> Result<SaveResult, AppError> {
    let schema = registry.resolve(&vars.model_name)?;

    let batch = &vars.save_input;
    if batch.is_empty() {
        return Err(AppError::BadRequest(
            "'saveInput' must contain at least one record".into(),
        ));
    }
    if batch.len() > MAX_BATCH {
        return Err(AppError::TooManyRecords {
            limit: MAX_BATCH,
            got: batch.len(),
        });
    }

    // Explicit null id means create, same as an absent id.
    let id = vars.id.as_ref().filter(|v| !v.is_null());

    match id {
        Some(raw_id) => update_one(&schema, storage, gate, principal, raw_id, vars).await,
        None => create_batch(&schema, storage, gate, principal, vars).await,
    }
}

async fn update_one(
    schema: &crate::schema::SchemaHandle,
    storage: &dyn Storage,
    gate: &dyn PermissionGate,
    principal: &Principal,
    raw_id: &Value,
    vars: &SaveVariables,
) -> Result<SaveResult, AppError> {
    if !gate.check(schema, Action::Change, principal) {
        return Err(AppError::PermissionDenied);
    }
    if vars.save_input.len() != 1 {
        return Err(AppError::OnlyOneRecordToUpdate);
    }
    let id = schema
        .parse_key(raw_id)
        .map_err(AppError::InvalidIdentifierType)?;

    let validator = RecordValidator::synthesize(schema);
    let mut record = validator.validate(&vars.save_input[0])?;
    // the id variable targets the row; a key carried in the record would
    // silently rename it
    record.remove(&schema.key_field);
    if record.is_empty() {
        return Err(AppError::SchemaValidation(vec![FieldError::new(
            "saveInput",
            "record must contain at least one field",
        )]));
    }

    tracing::debug!(model = %schema.qualified_name(), id = %id, "update");
    let found = storage.update(schema, &id, &record).await?;
    if !found {
        return Err(AppError::RecordNotFound(display_id(&id)));
    }
    Ok(SaveResult {
        ids: vec![id],
        messages: vec![UPDATED_MESSAGE.to_string()],
    })
}

async fn create_batch(
    schema: &crate::schema::SchemaHandle,
    storage: &dyn Storage,
    gate: &dyn PermissionGate,
    principal: &Principal,
    vars: &SaveVariables,
) -> Result<SaveResult, AppError> {
    if !gate.check(schema, Action::Add, principal) {
        return Err(AppError::PermissionDenied);
    }

    // Validate the whole batch up front: the first failure aborts before any
    // record is written, so validation errors never leave partial batches.
    let validator = RecordValidator::synthesize(schema);
    let mut validated = Vec::with_capacity(vars.save_input.len());
    for record in &vars.save_input {
        let record = validator.validate(record)?;
        if schema.key_type == KeyType::Text && !record.contains_key(&schema.key_field) {
            return Err(AppError::SchemaValidation(vec![FieldError::new(
                &schema.key_field,
                "this field is required",
            )]));
        }
        validated.push(record);
    }

    let mut ids = Vec::with_capacity(validated.len());
    let mut messages = Vec::with_capacity(validated.len());
    for record in &validated {
        tracing::debug!(model = %schema.qualified_name(), "create");
        let id = storage.create(schema, record).await?;
        ids.push(id);
        messages.push(CREATED_MESSAGE.to_string());
    }
    Ok(SaveResult { ids, messages })
}

fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
