//! Authorization boundary consumed by the fetch and save engines.

use crate::schema::ModelSchema;

/// Action tag checked against a model before engine work starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    View,
    Add,
    Change,
}

/// Caller identity as seen by the gate. Anonymous for unauthenticated
/// requests; the plugin never inspects it beyond passing it through.
#[derive(Clone, Debug, Default)]
pub struct Principal {
    pub user_id: Option<i64>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Principal::default()
    }

    pub fn user(id: i64) -> Self {
        Principal { user_id: Some(id) }
    }
}

/// External collaborator deciding model access. Denial is always surfaced to
/// the caller as a generic message so schema existence does not leak.
pub trait PermissionGate: Send + Sync {
    fn check(&self, schema: &ModelSchema, action: Action, principal: &Principal) -> bool;
}

/// Default gate: everything allowed. Hosts supply their own policy.
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn check(&self, _schema: &ModelSchema, _action: Action, _principal: &Principal) -> bool {
        true
    }
}
