//! PostgreSQL backend: renders query plans to parameterized SQL via
//! `crate::sql` and executes them with sqlx.

use crate::schema::ModelSchema;
use crate::sql::{self, BindValue, QueryBuf};
use crate::storage::{QueryPage, QueryPlan, Storage, StorageError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        PgStorage { pool }
    }

    fn bind<'q>(
        q: &'q QueryBuf,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(BindValue::from_json(p));
        }
        query
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn query(&self, plan: &QueryPlan) -> Result<QueryPage, StorageError> {
        let count_q = sql::count(plan);
        tracing::debug!(sql = %count_q.sql, "count");
        let count_row = Self::bind(&count_q)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        let total: i64 = count_row.try_get("total").map_err(map_err)?;

        let select_q = sql::select(plan);
        tracing::debug!(sql = %select_q.sql, params = ?select_q.params, "select");
        let rows = Self::bind(&select_q)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(QueryPage {
            total: total.max(0) as u64,
            rows: rows.iter().map(row_to_object).collect(),
        })
    }

    async fn create(
        &self,
        schema: &ModelSchema,
        record: &Map<String, Value>,
    ) -> Result<Value, StorageError> {
        let q = sql::insert(schema, record);
        tracing::debug!(sql = %q.sql, "insert");
        let row = Self::bind(&q).fetch_one(&self.pool).await.map_err(map_err)?;
        Ok(cell_to_value(&row, &schema.key_field))
    }

    async fn update(
        &self,
        schema: &ModelSchema,
        id: &Value,
        record: &Map<String, Value>,
    ) -> Result<bool, StorageError> {
        let q = sql::update(schema, id, record);
        tracing::debug!(sql = %q.sql, "update");
        let row = Self::bind(&q)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(row.is_some())
    }
}

/// Constraint violations (SQLSTATE class 23) keep their own error kind so the
/// engine can tag them separately from plain query failures.
fn map_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        let is_constraint = db
            .code()
            .map(|c| c.starts_with("23"))
            .unwrap_or(false)
            || db.constraint().is_some();
        if is_constraint {
            return StorageError::Constraint(db.message().to_string());
        }
    }
    StorageError::Query(e.to_string())
}

fn row_to_object(row: &PgRow) -> Map<String, Value> {
    use sqlx::Column;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}
