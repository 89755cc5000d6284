//! In-memory backend: evaluates query plans over JSON rows. Used by tests
//! and the demo server; behavior mirrors the SQL backend's semantics.

use crate::schema::{FieldDefault, FieldType, KeyType, ModelSchema};
use crate::service::filter::{CmpOp, Predicate};
use crate::storage::{
    ProjectionSource, QueryPage, QueryPlan, Storage, StorageError,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStorage {
    /// Rows per qualified model name, in insertion order. Row keys are the
    /// save-visible column names plus the key field.
    tables: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows directly, bypassing validation. Test/demo convenience.
    pub fn seed(&self, qualified: &str, rows: Vec<Map<String, Value>>) {
        self.tables
            .write()
            .unwrap()
            .entry(qualified.to_string())
            .or_default()
            .extend(rows);
    }

    fn next_int_key(rows: &[Map<String, Value>], key_field: &str) -> i64 {
        rows.iter()
            .filter_map(|r| r.get(key_field).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Emulate referential integrity: a non-null foreign key must point at an
    /// existing row of the target model.
    fn check_foreign_keys(
        tables: &HashMap<String, Vec<Map<String, Value>>>,
        schema: &ModelSchema,
        record: &Map<String, Value>,
    ) -> Result<(), StorageError> {
        for f in schema.field_descriptors() {
            if f.field_type != FieldType::ForeignKey {
                continue;
            }
            let Some(target) = f.references.as_deref() else { continue };
            let Some(v) = record.get(&f.save_name()) else { continue };
            if v.is_null() {
                continue;
            }
            let exists = tables
                .get(target)
                .map(|rows| rows.iter().any(|r| r.get("id").map(|k| values_equal(k, v)).unwrap_or(false)))
                .unwrap_or(false);
            if !exists {
                return Err(StorageError::Constraint(format!(
                    "foreign key violation: {} = {} has no match in {}",
                    f.save_name(),
                    v,
                    target
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn query(&self, plan: &QueryPlan) -> Result<QueryPage, StorageError> {
        let tables = self.tables.read().unwrap();
        let qualified = plan.schema.qualified_name();
        let empty = Vec::new();
        let rows = tables.get(&qualified).unwrap_or(&empty);

        let mut matched: Vec<&Map<String, Value>> = rows
            .iter()
            .filter(|row| {
                plan.predicate
                    .as_ref()
                    .map(|p| eval_predicate(p, row))
                    .unwrap_or(true)
            })
            .collect();

        if let Some(sort) = &plan.sort {
            matched.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&sort.column).unwrap_or(&Value::Null),
                    b.get(&sort.column).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                if sort.descending { ord.reverse() } else { ord }
            });
        }

        let mut projected: Vec<Map<String, Value>> = matched
            .iter()
            .map(|row| project_row(&tables, plan, row))
            .collect();

        if plan.distinct {
            let mut seen = HashSet::new();
            projected.retain(|row| seen.insert(Value::Object(row.clone()).to_string()));
        }

        let total = projected.len() as u64;
        let rows = match plan.page {
            Some(page) => projected
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.size as usize)
                .collect(),
            None => projected,
        };
        Ok(QueryPage { total, rows })
    }

    async fn create(
        &self,
        schema: &ModelSchema,
        record: &Map<String, Value>,
    ) -> Result<Value, StorageError> {
        let mut tables = self.tables.write().unwrap();
        Self::check_foreign_keys(&tables, schema, record)?;
        let rows = tables.entry(schema.qualified_name()).or_default();
        let id = match schema.key_type {
            KeyType::Int => Value::Number(Self::next_int_key(rows, &schema.key_field).into()),
            KeyType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            KeyType::Text => record
                .get(&schema.key_field)
                .cloned()
                .ok_or_else(|| StorageError::Constraint("text key must be supplied".into()))?,
        };
        let mut row = record.clone();
        // declared defaults fill absent columns, like DDL defaults would
        for f in schema.field_descriptors() {
            if let FieldDefault::Value(v) = &f.default {
                row.entry(f.save_name()).or_insert_with(|| v.clone());
            }
        }
        row.insert(schema.key_field.clone(), id.clone());
        rows.push(row);
        Ok(id)
    }

    async fn update(
        &self,
        schema: &ModelSchema,
        id: &Value,
        record: &Map<String, Value>,
    ) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().unwrap();
        Self::check_foreign_keys(&tables, schema, record)?;
        let rows = match tables.get_mut(&schema.qualified_name()) {
            Some(rows) => rows,
            None => return Ok(false),
        };
        let key_field = schema.key_field.clone();
        match rows
            .iter_mut()
            .find(|r| r.get(&key_field).map(|k| values_equal(k, id)).unwrap_or(false))
        {
            Some(row) => {
                for (k, v) in record {
                    row.insert(k.clone(), v.clone());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn project_row(
    tables: &HashMap<String, Vec<Map<String, Value>>>,
    plan: &QueryPlan,
    row: &Map<String, Value>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for p in &plan.projection {
        let value = match &p.source {
            ProjectionSource::Column(col) => row.get(col).cloned().unwrap_or(Value::Null),
            ProjectionSource::Related { fk_column, target, field } => {
                let key = row.get(fk_column).cloned().unwrap_or(Value::Null);
                related_value(tables, target, &key, field)
            }
        };
        out.insert(p.alias.clone(), value);
    }
    out
}

fn related_value(
    tables: &HashMap<String, Vec<Map<String, Value>>>,
    target: &ModelSchema,
    key: &Value,
    field: &str,
) -> Value {
    if key.is_null() {
        return Value::Null;
    }
    tables
        .get(&target.qualified_name())
        .and_then(|rows| {
            rows.iter().find(|r| {
                r.get(&target.key_field)
                    .map(|k| values_equal(k, key))
                    .unwrap_or(false)
            })
        })
        .and_then(|r| r.get(field).cloned())
        .unwrap_or(Value::Null)
}

fn eval_predicate(p: &Predicate, row: &Map<String, Value>) -> bool {
    match p {
        Predicate::Cmp { field, op, value } => {
            let cell = row.get(field).unwrap_or(&Value::Null);
            match op {
                CmpOp::Eq => values_equal(cell, value),
                CmpOp::Ne => !values_equal(cell, value),
                CmpOp::Gt => {
                    compare_values(cell, value).map(Ordering::is_gt).unwrap_or(false)
                }
            }
        }
        Predicate::In { field, values } => {
            let cell = row.get(field).unwrap_or(&Value::Null);
            values.iter().any(|v| values_equal(cell, v))
        }
        Predicate::Like { field, pattern, case_insensitive } => {
            let Some(cell) = row.get(field).and_then(Value::as_str) else {
                return false;
            };
            if *case_insensitive {
                cell.to_lowercase().contains(&pattern.to_lowercase())
            } else {
                cell.contains(pattern)
            }
        }
        Predicate::And(a, b) => eval_predicate(a, row) && eval_predicate(b, row),
        Predicate::Or(a, b) => eval_predicate(a, row) || eval_predicate(b, row),
    }
}

/// Loose equality: numbers compare by value so `1` and `1.0` match, matching
/// how the SQL backend compares after casts.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        // Nulls sort last ascending, like the SQL backend's NULLS LAST
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Greater),
        (_, Value::Null) => Some(Ordering::Less),
        _ => None,
    }
}
