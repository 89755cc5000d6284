//! Dynamic validator synthesis: field-membership checks and per-record
//! validation rules built at request time from the resolved schema.
//!
//! Field constraints are not known until the model name resolves, so rules
//! are derived from introspected `FieldDescriptor`s instead of being declared
//! statically. The same membership check backs projection, filter, and sort
//! field validation on the fetch side.

use crate::error::{AppError, FieldError};
use crate::registry::ModelRegistry;
use crate::schema::{FieldDescriptor, FieldSelector, FieldType, KeyType, ModelSchema};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Check that every name in `names` resolves against the schema (own column,
/// `_id` form, key field, or a dotted related path whose target field exists).
/// Unknown names are reported as one batch, sorted for stable messages.
pub fn check_fields_exist<'a>(
    registry: &ModelRegistry,
    schema: &ModelSchema,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), AppError> {
    let mut unknown = Vec::new();
    for name in names {
        match schema.classify_field(name) {
            Some(FieldSelector::Related { fk, related_field }) => {
                let target = fk
                    .references
                    .as_deref()
                    .and_then(|q| registry.related_target(q));
                let ok = target
                    .map(|t| t.key_field == related_field || t.field(&related_field).is_some())
                    .unwrap_or(false);
                if !ok {
                    unknown.push(name.to_string());
                }
            }
            Some(_) => {}
            None => unknown.push(name.to_string()),
        }
    }
    if unknown.is_empty() {
        Ok(())
    } else {
        unknown.sort();
        unknown.dedup();
        Err(AppError::UnknownField(unknown))
    }
}

/// Type constraint applied to one field's value.
enum ValueRule {
    Text { max: Option<u32> },
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Email(Regex),
    Key,
}

struct FieldRule {
    /// Save-visible name (foreign keys in `_id` form).
    name: String,
    required: bool,
    nullable: bool,
    rule: ValueRule,
}

/// Per-record validator synthesized from a schema. Stateless after
/// synthesis: validating the same record twice yields identical results.
pub struct RecordValidator {
    rules: Vec<FieldRule>,
    known: HashSet<String>,
}

impl RecordValidator {
    pub fn synthesize(schema: &ModelSchema) -> Self {
        let mut rules: Vec<FieldRule> = schema
            .field_descriptors()
            .iter()
            .map(|f| FieldRule {
                name: f.save_name(),
                required: f.is_required(),
                nullable: f.nullable,
                rule: value_rule_for(f),
            })
            .collect();
        // Text-keyed models carry the identifier in the record itself; the
        // save engine enforces its presence on create.
        if schema.key_type == KeyType::Text {
            rules.push(FieldRule {
                name: schema.key_field.clone(),
                required: false,
                nullable: false,
                rule: ValueRule::Text { max: None },
            });
        }
        let known = rules.iter().map(|r| r.name.clone()).collect();
        RecordValidator { rules, known }
    }

    /// Validate one record. Extra fields are rejected as a batch before any
    /// per-field checks; field errors are collected, not short-circuited, so
    /// the caller sees every violated constraint at once.
    pub fn validate(&self, record: &Map<String, Value>) -> Result<Map<String, Value>, AppError> {
        let mut extras: Vec<String> = record
            .keys()
            .filter(|k| !self.known.contains(*k))
            .cloned()
            .collect();
        if !extras.is_empty() {
            extras.sort();
            return Err(AppError::UnknownField(extras));
        }

        let mut errors = Vec::new();
        let mut coerced = Map::new();
        for rule in &self.rules {
            match record.get(&rule.name) {
                None => {
                    if rule.required {
                        errors.push(FieldError::new(&rule.name, "this field is required"));
                    }
                }
                Some(Value::Null) => {
                    if !rule.nullable {
                        errors.push(FieldError::new(&rule.name, "this field may not be null"));
                    } else {
                        coerced.insert(rule.name.clone(), Value::Null);
                    }
                }
                Some(v) => match apply_rule(&rule.rule, v) {
                    Ok(out) => {
                        coerced.insert(rule.name.clone(), out);
                    }
                    Err(msg) => errors.push(FieldError::new(&rule.name, msg)),
                },
            }
        }
        if errors.is_empty() {
            Ok(coerced)
        } else {
            Err(AppError::SchemaValidation(errors))
        }
    }

    /// Validate only the fields present in the record; missing required
    /// fields are not an error. Used for partial updates (profile edits).
    pub fn validate_partial(
        &self,
        record: &Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        let mut extras: Vec<String> = record
            .keys()
            .filter(|k| !self.known.contains(*k))
            .cloned()
            .collect();
        if !extras.is_empty() {
            extras.sort();
            return Err(AppError::UnknownField(extras));
        }
        let mut errors = Vec::new();
        let mut coerced = Map::new();
        for rule in &self.rules {
            match record.get(&rule.name) {
                None => {}
                Some(Value::Null) => {
                    if !rule.nullable {
                        errors.push(FieldError::new(&rule.name, "this field may not be null"));
                    } else {
                        coerced.insert(rule.name.clone(), Value::Null);
                    }
                }
                Some(v) => match apply_rule(&rule.rule, v) {
                    Ok(out) => {
                        coerced.insert(rule.name.clone(), out);
                    }
                    Err(msg) => errors.push(FieldError::new(&rule.name, msg)),
                },
            }
        }
        if errors.is_empty() {
            Ok(coerced)
        } else {
            Err(AppError::SchemaValidation(errors))
        }
    }
}

fn value_rule_for(f: &FieldDescriptor) -> ValueRule {
    match f.field_type {
        FieldType::ShortText => ValueRule::Text { max: f.max_length },
        FieldType::LongText => ValueRule::Text { max: None },
        FieldType::Integer => ValueRule::Integer,
        FieldType::Float => ValueRule::Float,
        FieldType::Boolean => ValueRule::Boolean,
        FieldType::Date => ValueRule::Date,
        FieldType::DateTime => ValueRule::DateTime,
        // The pattern is a constant, so compilation cannot fail at runtime.
        FieldType::Email => ValueRule::Email(Regex::new(EMAIL_PATTERN).unwrap()),
        FieldType::ForeignKey => ValueRule::Key,
    }
}

fn apply_rule(rule: &ValueRule, v: &Value) -> Result<Value, String> {
    match rule {
        ValueRule::Text { max } => {
            let s = v
                .as_str()
                .ok_or_else(|| "must be a string".to_string())?;
            if let Some(max) = max {
                if s.chars().count() > *max as usize {
                    return Err(format!("must be at most {} characters", max));
                }
            }
            Ok(Value::String(s.to_string()))
        }
        ValueRule::Integer | ValueRule::Key => coerce_integer(v).ok_or_else(|| {
            if matches!(rule, ValueRule::Key) {
                "must be an integer key".to_string()
            } else {
                "must be a whole number".to_string()
            }
        }),
        ValueRule::Float => match v {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| "must be a number".to_string()),
            _ => Err("must be a number".to_string()),
        },
        ValueRule::Boolean => match v {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err("must be true or false".to_string()),
        },
        ValueRule::Date => {
            let s = v.as_str().ok_or_else(|| "must be a date string".to_string())?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|_| Value::String(s.to_string()))
                .map_err(|_| "must be an ISO-8601 date (YYYY-MM-DD)".to_string())
        }
        ValueRule::DateTime => {
            let s = v
                .as_str()
                .ok_or_else(|| "must be a datetime string".to_string())?;
            let ok = DateTime::parse_from_rfc3339(s).is_ok()
                || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok();
            if ok {
                Ok(Value::String(s.to_string()))
            } else {
                Err("must be an ISO-8601 datetime".to_string())
            }
        }
        ValueRule::Email(re) => {
            let s = v.as_str().ok_or_else(|| "must be a string".to_string())?;
            if re.is_match(s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err("must be a valid email address".to_string())
            }
        }
    }
}

/// Accept JSON integers and integer-looking strings; reject everything else.
fn coerce_integer(v: &Value) -> Option<Value> {
    match v {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(v.clone()),
        Value::String(s) => s.parse::<i64>().ok().map(|n| Value::Number(n.into())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistry;
    use crate::schema::{FieldDescriptor, FieldType, SchemaBuilder};
    use serde_json::json;

    fn schema() -> ModelSchema {
        SchemaBuilder::new("shop", "Customer")
            .field(FieldDescriptor::new("name", FieldType::ShortText).max_length(10))
            .field(FieldDescriptor::new("dob", FieldType::Date).nullable())
            .field(FieldDescriptor::new("email", FieldType::Email))
            .field(FieldDescriptor::new("age", FieldType::Integer).nullable())
            .field(FieldDescriptor::new("active", FieldType::Boolean).default_value(json!(true)))
            .field(FieldDescriptor::new("country", FieldType::ForeignKey).nullable().references("shop.Country"))
            .build()
    }

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn valid_record_is_coerced() {
        let v = RecordValidator::synthesize(&schema());
        let rec = obj(json!({
            "name": "alice",
            "dob": "2020-01-21",
            "email": "a@mail.com",
            "age": "41",
            "country_id": 3
        }));
        let out = v.validate(&rec).unwrap();
        assert_eq!(out["age"], json!(41));
        assert_eq!(out["country_id"], json!(3));
    }

    #[test]
    fn extra_fields_rejected_as_batch() {
        let v = RecordValidator::synthesize(&schema());
        let rec = obj(json!({"name": "a", "email": "a@mail.com", "zz": 1, "aa": 2}));
        match v.validate(&rec) {
            Err(AppError::UnknownField(names)) => assert_eq!(names, vec!["aa", "zz"]),
            other => panic!("expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn required_and_type_errors_name_the_field() {
        let v = RecordValidator::synthesize(&schema());
        let rec = obj(json!({"email": "not-an-email", "dob": "21/01/2020"}));
        match v.validate(&rec) {
            Err(AppError::SchemaValidation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"name"));
                assert!(fields.contains(&"email"));
                assert!(fields.contains(&"dob"));
            }
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn defaulted_field_is_not_required() {
        let v = RecordValidator::synthesize(&schema());
        let rec = obj(json!({"name": "a", "email": "a@mail.com"}));
        assert!(v.validate(&rec).is_ok());
    }

    #[test]
    fn null_only_allowed_when_nullable() {
        let v = RecordValidator::synthesize(&schema());
        let rec = obj(json!({"name": null, "email": "a@mail.com", "age": null}));
        match v.validate(&rec) {
            Err(AppError::SchemaValidation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "name");
            }
            other => panic!("expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn max_length_enforced_on_short_text() {
        let v = RecordValidator::synthesize(&schema());
        let rec = obj(json!({"name": "longer than ten chars", "email": "a@mail.com"}));
        assert!(matches!(v.validate(&rec), Err(AppError::SchemaValidation(_))));
    }

    #[test]
    fn validation_is_idempotent() {
        let v = RecordValidator::synthesize(&schema());
        let rec = obj(json!({"email": "bad"}));
        let first = format!("{:?}", v.validate(&rec));
        let second = format!("{:?}", v.validate(&rec));
        assert_eq!(first, second);
    }

    #[test]
    fn text_keyed_schema_admits_its_key_field() {
        let schema = SchemaBuilder::new("shop", "Tag")
            .key("code", crate::schema::KeyType::Text)
            .field(FieldDescriptor::new("label", FieldType::ShortText))
            .build();
        let v = RecordValidator::synthesize(&schema);
        let rec = obj(json!({"code": "vip", "label": "VIP"}));
        let out = v.validate(&rec).unwrap();
        assert_eq!(out["code"], json!("vip"));
        // the key stays optional at the validator level
        assert!(v.validate(&obj(json!({"label": "VIP"}))).is_ok());
    }

    #[test]
    fn membership_check_collects_unknowns() {
        let registry = ModelRegistry::builder()
            .model(schema())
            .model(
                SchemaBuilder::new("shop", "Country")
                    .field(FieldDescriptor::new("name", FieldType::ShortText))
                    .build(),
            )
            .build()
            .unwrap();
        let handle = registry.resolve("shop.Customer").unwrap();
        assert!(check_fields_exist(&registry, &handle, ["name", "email", "country__name"]).is_ok());
        match check_fields_exist(&registry, &handle, ["name", "ghost", "country__missing"]) {
            Err(AppError::UnknownField(names)) => {
                assert_eq!(names, vec!["country__missing", "ghost"]);
            }
            other => panic!("expected UnknownField, got {:?}", other),
        }
    }
}
