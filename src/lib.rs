//! Modelgate: configuration-driven CRUD, auth, and profile endpoints over
//! registered data models.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod permission;
pub mod registry;
pub mod request;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod storage;

pub use config::PluginConfig;
pub use error::{AppError, FieldError};
pub use permission::{Action, AllowAll, PermissionGate, Principal};
pub use registry::{ModelRegistry, RegistryBuilder};
pub use routes::{auth_routes, common_routes, model_routes};
pub use schema::{FieldDescriptor, FieldType, KeyType, ModelSchema, SchemaBuilder, SchemaHandle};
pub use service::{fetch, save, FetchResult, SaveResult};
pub use state::AppState;
pub use storage::{MemoryStorage, PgStorage, QueryPlan, Storage};
