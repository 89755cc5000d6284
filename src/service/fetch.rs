//! Fetch engine: declarative fetch variables into an executed query plan.

use crate::error::AppError;
use crate::permission::{Action, PermissionGate, Principal};
use crate::registry::ModelRegistry;
use crate::request::{FetchVariables, SortDirection};
use crate::schema::FieldSelector;
use crate::service::{filter, validation};
use crate::storage::{
    PageWindow, Projection, ProjectionSource, QueryPlan, SortKey, Storage,
};
use serde_json::{Map, Value};

#[derive(Debug)]
pub struct FetchResult {
    pub total: u64,
    pub data: Vec<Map<String, Value>>,
}

/// Linear pipeline: resolve, gate, validate, compile, execute. All local
/// validation happens before the storage call; only steps after plan
/// construction can surface backend errors.
pub async fn fetch(
    registry: &ModelRegistry,
    storage: &dyn Storage,
    gate: &dyn PermissionGate,
    principal: &Principal,
    vars: &FetchVariables,
) -> Result<FetchResult, AppError> {
    let schema = registry.resolve(&vars.model_name)?;

    if !gate.check(&schema, Action::View, principal) {
        return Err(AppError::PermissionDenied);
    }

    let fields = match vars.fields.as_deref() {
        Some(fields) if !fields.is_empty() => fields,
        _ => {
            return Err(AppError::BadRequest(
                "'fields' is required and must not be empty".into(),
            ))
        }
    };
    validation::check_fields_exist(registry, &schema, fields.iter().map(String::as_str))?;

    let page = parse_page(vars.page_number, vars.page_size)?;
    let predicate = filter::compile(&schema, &vars.filters)?;

    let mut projection = Vec::with_capacity(fields.len());
    for name in fields {
        // check_fields_exist already verified every name resolves
        let source = match schema.classify_field(name) {
            Some(FieldSelector::Own(f)) => ProjectionSource::Column(f.save_name()),
            Some(FieldSelector::Key) => ProjectionSource::Column(schema.key_field.clone()),
            Some(FieldSelector::Related { fk, related_field }) => {
                let target = fk
                    .references
                    .as_deref()
                    .and_then(|q| registry.related_target(q))
                    .ok_or_else(|| AppError::UnknownField(vec![name.clone()]))?;
                ProjectionSource::Related {
                    fk_column: fk.save_name(),
                    target,
                    field: related_field,
                }
            }
            None => return Err(AppError::UnknownField(vec![name.clone()])),
        };
        projection.push(Projection {
            alias: name.clone(),
            source,
        });
    }

    let sort = match &vars.sort {
        None => None,
        Some(sort) => {
            validation::check_fields_exist(registry, &schema, [sort.field.as_str()])?;
            let column = match schema.classify_field(&sort.field) {
                Some(FieldSelector::Own(f)) => f.save_name(),
                Some(FieldSelector::Key) => schema.key_field.clone(),
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "cannot sort on related path '{}'",
                        sort.field
                    )))
                }
            };
            Some(SortKey {
                column,
                descending: sort.order_by == SortDirection::Desc,
            })
        }
    };

    let plan = QueryPlan {
        schema: schema.clone(),
        projection,
        predicate,
        sort,
        page,
        distinct: vars.distinct.unwrap_or(true),
    };

    tracing::debug!(model = %schema.qualified_name(), distinct = plan.distinct, "fetch");
    let page = storage.query(&plan).await?;
    Ok(FetchResult {
        total: page.total,
        data: page.rows,
    })
}

/// The window applies only when both values are present; each value is still
/// range-checked individually so a lone `pageSize: 0` fails loudly.
fn parse_page(number: Option<i64>, size: Option<i64>) -> Result<Option<PageWindow>, AppError> {
    for v in [number, size].into_iter().flatten() {
        if v < 1 {
            return Err(AppError::InvalidPagination);
        }
    }
    match (number, size) {
        (Some(n), Some(s)) => Ok(Some(PageWindow {
            number: n as u64,
            size: s as u64,
        })),
        _ => Ok(None),
    }
}
