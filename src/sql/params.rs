//! Convert serde_json::Value to types that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A JSON value in a form bindable to a PostgreSQL placeholder. Placeholders
/// carry explicit casts (see `sql::builder`), so everything non-scalar binds
/// as text and the cast does the rest.
#[derive(Clone, Debug)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl BindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::Int(i)
                } else {
                    BindValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => BindValue::Text(s.clone()),
            other => BindValue::Text(other.to_string()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => <Option<i64> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            BindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            BindValue::Int(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::Float(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
        })
    }
}

impl sqlx::Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
