//! Response envelope helpers shared by the endpoint handlers.

use crate::service::{FetchResult, SaveResult};
use serde_json::{json, Value};

pub fn fetch_body(result: &FetchResult) -> Value {
    json!({
        "total": result.total,
        "data": result.data,
    })
}

pub fn save_body(result: &SaveResult) -> Value {
    json!({
        "data": [ { "id": result.ids } ],
        "message": result.messages,
    })
}
