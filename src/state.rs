//! Shared application state for all routes.

use crate::auth::{Mailer, PasswordHasher, TokenIssuer};
use crate::config::PluginConfig;
use crate::permission::PermissionGate;
use crate::registry::ModelRegistry;
use crate::storage::Storage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub storage: Arc<dyn Storage>,
    pub gate: Arc<dyn PermissionGate>,
    pub config: Arc<PluginConfig>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub mailer: Arc<dyn Mailer>,
}
