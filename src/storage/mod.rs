//! Storage boundary: ephemeral query plans and the backend trait.

pub mod memory;
pub mod postgres;

use crate::error::AppError;
use crate::schema::{ModelSchema, SchemaHandle};
use crate::service::filter::Predicate;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// One projected output column.
#[derive(Clone, Debug)]
pub struct Projection {
    /// Response key: the requested field name, verbatim.
    pub alias: String,
    pub source: ProjectionSource,
}

#[derive(Clone, Debug)]
pub enum ProjectionSource {
    /// Direct column of the model's table.
    Column(String),
    /// Dotted related path: follow the FK column to the target model and
    /// project one of its fields instead of the raw key.
    Related {
        fk_column: String,
        target: SchemaHandle,
        field: String,
    },
}

#[derive(Clone, Debug)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// 1-based pagination window; validated (>= 1) before plan construction.
#[derive(Clone, Copy, Debug)]
pub struct PageWindow {
    pub number: u64,
    pub size: u64,
}

impl PageWindow {
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.size
    }
}

/// Everything a backend needs to execute one fetch. Built fresh per request
/// and discarded after execution; never cached.
#[derive(Clone, Debug)]
pub struct QueryPlan {
    pub schema: SchemaHandle,
    pub projection: Vec<Projection>,
    pub predicate: Option<Predicate>,
    pub sort: Option<SortKey>,
    pub page: Option<PageWindow>,
    pub distinct: bool,
}

/// Count plus one page of projected rows. `total` is the match count before
/// the pagination window is applied.
#[derive(Debug)]
pub struct QueryPage {
    pub total: u64,
    pub rows: Vec<Map<String, Value>>,
}

/// Backend failures, split so constraint violations keep their own error
/// code instead of collapsing into generic query errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    Constraint(String),
    #[error("{0}")]
    Query(String),
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Constraint(msg) => AppError::StorageConstraint(msg),
            StorageError::Query(msg) => AppError::Query(msg),
        }
    }
}

/// Data-store interface consumed by the fetch and save engines. Each call is
/// independently transactional; the engines hold no locks and provide no
/// cross-request versioning (last write wins).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Execute a fetch plan: count matches pre-pagination, return the window.
    async fn query(&self, plan: &QueryPlan) -> Result<QueryPage, StorageError>;

    /// Insert one validated record; returns the new identifier.
    async fn create(
        &self,
        schema: &ModelSchema,
        record: &Map<String, Value>,
    ) -> Result<Value, StorageError>;

    /// Update the record with `id`. Returns false when no such record exists.
    async fn update(
        &self,
        schema: &ModelSchema,
        id: &Value,
        record: &Map<String, Value>,
    ) -> Result<bool, StorageError>;
}
