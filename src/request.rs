//! Inbound payload envelope shared by fetch and save endpoints.

use serde::Deserialize;
use serde_json::Value;

/// All model endpoints take `{ "payload": { "variables": { ... } } }`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub payload: Payload<T>,
}

#[derive(Debug, Deserialize)]
pub struct Payload<T> {
    pub variables: T,
}

/// Fetch variables. Unknown keys are rejected so typos fail loudly instead
/// of silently widening the result set.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FetchVariables {
    pub model_name: String,
    /// Required and non-empty; checked by the engine so the error message is
    /// ours, not serde's.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Vec<FilterClauseInput>,
    #[serde(default)]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub sort: Option<SortInput>,
    #[serde(default)]
    pub distinct: Option<bool>,
}

/// One filter clause as received. Operator and combination tokens stay raw
/// strings here; the filter compiler owns their vocabulary and error text.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterClauseInput {
    pub operator: String,
    pub name: String,
    pub value: Vec<Value>,
    #[serde(default)]
    pub operation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortInput {
    pub field: String,
    pub order_by: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Save variables: absent/null `id` means create, present means update.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SaveVariables {
    pub model_name: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub save_input: Vec<serde_json::Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fetch_envelope_round_trips() {
        let body = json!({
            "payload": { "variables": {
                "modelName": "customer",
                "fields": ["name", "email"],
                "filters": [{"operator": "eq", "name": "phone_no", "value": ["123456"]}],
                "pageNumber": 1,
                "pageSize": 10,
                "sort": {"field": "name", "order_by": "desc"},
                "distinct": false
            }}
        });
        let env: Envelope<FetchVariables> = serde_json::from_value(body).unwrap();
        let vars = env.payload.variables;
        assert_eq!(vars.model_name, "customer");
        assert_eq!(vars.fields.as_deref(), Some(&["name".to_string(), "email".to_string()][..]));
        assert_eq!(vars.filters.len(), 1);
        assert_eq!(vars.sort.unwrap().order_by, SortDirection::Desc);
    }

    #[test]
    fn unknown_variable_keys_rejected() {
        let body = json!({
            "payload": { "variables": {
                "modelName": "customer",
                "fields": ["name"],
                "bogus": true
            }}
        });
        assert!(serde_json::from_value::<Envelope<FetchVariables>>(body).is_err());
    }

    #[test]
    fn save_with_null_id_is_create() {
        let body = json!({
            "payload": { "variables": {
                "modelName": "Customer",
                "id": null,
                "saveInput": [{"name": "test_user1"}]
            }}
        });
        let env: Envelope<SaveVariables> = serde_json::from_value(body).unwrap();
        let vars = env.payload.variables;
        // serde collapses explicit null into None; the engine treats both as create
        assert!(vars.id.is_none() || vars.id == Some(Value::Null));
        assert_eq!(vars.save_input.len(), 1);
    }
}
