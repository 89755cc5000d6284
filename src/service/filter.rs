//! Filter compilation: structured clauses into one boolean predicate tree.
//!
//! Clauses combine strictly left-to-right. The default join is AND; a clause
//! whose `operation` is `or` joins itself onto the accumulated predicate with
//! OR instead. The join mode is a per-clause modifier, so clause order is
//! significant and must never be reordered.

use crate::error::AppError;
use crate::request::FilterClauseInput;
use crate::schema::{FieldDescriptor, FieldSelector, FieldType, KeyType, ModelSchema};
use serde_json::Value;

const OPERATORS: &str = "eq, in, not, gt, like, ilike";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FilterOp {
    Eq,
    In,
    Not,
    Gt,
    Like,
    Ilike,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combine {
    And,
    Or,
}

/// Comparison operator inside a compiled leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
}

/// Compiled boolean predicate over storage column names.
#[derive(Clone, Debug)]
pub enum Predicate {
    Cmp {
        field: String,
        op: CmpOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    Like {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

/// Compile filter clauses against a schema. Returns `None` for an empty list.
pub fn compile(
    schema: &ModelSchema,
    clauses: &[FilterClauseInput],
) -> Result<Option<Predicate>, AppError> {
    let mut acc: Option<Predicate> = None;
    for clause in clauses {
        let op = parse_operator(&clause.operator)?;
        let combine = parse_combine(clause.operation.as_deref())?;
        let leaf = compile_clause(schema, clause, op)?;
        acc = Some(match acc {
            None => leaf,
            Some(prev) => match combine {
                Combine::And => Predicate::And(Box::new(prev), Box::new(leaf)),
                Combine::Or => Predicate::Or(Box::new(prev), Box::new(leaf)),
            },
        });
    }
    Ok(acc)
}

fn parse_operator(token: &str) -> Result<FilterOp, AppError> {
    match token {
        "eq" => Ok(FilterOp::Eq),
        "in" => Ok(FilterOp::In),
        "not" => Ok(FilterOp::Not),
        "gt" => Ok(FilterOp::Gt),
        "like" => Ok(FilterOp::Like),
        "ilike" => Ok(FilterOp::Ilike),
        other => Err(AppError::FilterSemantic(format!(
            "unsupported operator '{}'; expected one of: {}",
            other, OPERATORS
        ))),
    }
}

fn parse_combine(token: Option<&str>) -> Result<Combine, AppError> {
    match token {
        None => Ok(Combine::And),
        Some("and") => Ok(Combine::And),
        Some("or") => Ok(Combine::Or),
        Some(other) => Err(AppError::FilterSemantic(format!(
            "unsupported combination mode '{}'; expected 'and' or 'or'",
            other
        ))),
    }
}

fn compile_clause(
    schema: &ModelSchema,
    clause: &FilterClauseInput,
    op: FilterOp,
) -> Result<Predicate, AppError> {
    // Filters address direct columns only; dotted related paths stay a
    // projection feature.
    let (column, target) = match schema.classify_field(&clause.name) {
        Some(FieldSelector::Own(f)) => (f.save_name(), FilterTarget::Field(f)),
        Some(FieldSelector::Key) => (schema.key_field.clone(), FilterTarget::Key(schema.key_type)),
        Some(FieldSelector::Related { .. }) => {
            return Err(AppError::FilterSemantic(format!(
                "cannot filter on related path '{}'",
                clause.name
            )))
        }
        None => return Err(AppError::UnknownField(vec![clause.name.clone()])),
    };

    if clause.value.is_empty() {
        return Err(AppError::FilterSemantic(format!(
            "operator '{}' requires at least one value",
            clause.operator
        )));
    }
    if matches!(op, FilterOp::Eq | FilterOp::Not) && clause.value.len() != 1 {
        return Err(AppError::FilterSemantic(format!(
            "multiple filter values are not supported for operator '{}'",
            clause.operator
        )));
    }

    match op {
        FilterOp::Eq | FilterOp::Not | FilterOp::Gt => {
            let value = coerce_value(&target, &clause.value[0])
                .ok_or_else(|| invalid_value(clause))?;
            let op = match op {
                FilterOp::Eq => CmpOp::Eq,
                FilterOp::Not => CmpOp::Ne,
                _ => CmpOp::Gt,
            };
            Ok(Predicate::Cmp { field: column, op, value })
        }
        FilterOp::In => {
            let values: Option<Vec<Value>> = clause
                .value
                .iter()
                .map(|v| coerce_value(&target, v))
                .collect();
            let values = values.ok_or_else(|| invalid_value(clause))?;
            Ok(Predicate::In { field: column, values })
        }
        FilterOp::Like | FilterOp::Ilike => {
            if !target.is_textual() {
                return Err(invalid_value(clause));
            }
            let pattern = clause.value[0]
                .as_str()
                .ok_or_else(|| invalid_value(clause))?;
            Ok(Predicate::Like {
                field: column,
                pattern: pattern.to_string(),
                case_insensitive: op == FilterOp::Ilike,
            })
        }
    }
}

enum FilterTarget<'a> {
    Field(&'a FieldDescriptor),
    Key(KeyType),
}

impl FilterTarget<'_> {
    fn is_textual(&self) -> bool {
        match self {
            FilterTarget::Field(f) => matches!(
                f.field_type,
                FieldType::ShortText | FieldType::LongText | FieldType::Email
            ),
            FilterTarget::Key(k) => matches!(k, KeyType::Text | KeyType::Uuid),
        }
    }
}

fn invalid_value(clause: &FilterClauseInput) -> AppError {
    AppError::InvalidFilterValue {
        field: clause.name.clone(),
        values: clause.value.clone(),
    }
}

/// Coerce one filter value to the column's type; `None` on mismatch. A silent
/// cast to string would mask caller bugs, so mismatches are errors.
fn coerce_value(target: &FilterTarget<'_>, v: &Value) -> Option<Value> {
    let field_type = match target {
        FilterTarget::Field(f) => f.field_type,
        FilterTarget::Key(KeyType::Int) => FieldType::Integer,
        FilterTarget::Key(_) => FieldType::ShortText,
    };
    match field_type {
        FieldType::Integer | FieldType::ForeignKey => match v {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(v.clone()),
            Value::String(s) => s.parse::<i64>().ok().map(|n| Value::Number(n.into())),
            _ => None,
        },
        FieldType::Float => match v {
            Value::Number(_) => Some(v.clone()),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        FieldType::Boolean => match v {
            Value::Bool(_) => Some(v.clone()),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            _ => None,
        },
        FieldType::ShortText
        | FieldType::LongText
        | FieldType::Email
        | FieldType::Date
        | FieldType::DateTime => v.as_str().map(|s| Value::String(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType, SchemaBuilder};
    use serde_json::json;

    fn schema() -> ModelSchema {
        SchemaBuilder::new("shop", "Customer")
            .field(FieldDescriptor::new("name", FieldType::ShortText))
            .field(FieldDescriptor::new("age", FieldType::Integer))
            .field(FieldDescriptor::new("country", FieldType::ForeignKey).references("shop.Country"))
            .build()
    }

    fn clause(operator: &str, name: &str, value: Vec<Value>, operation: Option<&str>) -> FilterClauseInput {
        FilterClauseInput {
            operator: operator.into(),
            name: name.into(),
            value,
            operation: operation.map(String::from),
        }
    }

    #[test]
    fn empty_clause_list_compiles_to_none() {
        assert!(compile(&schema(), &[]).unwrap().is_none());
    }

    #[test]
    fn eq_with_two_values_is_a_semantic_error() {
        let err = compile(
            &schema(),
            &[clause("eq", "name", vec![json!("a"), json!("b")], None)],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::FilterSemantic(_)));
        // same arity constraint for not
        let err = compile(
            &schema(),
            &[clause("not", "name", vec![json!("a"), json!("b")], None)],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::FilterSemantic(_)));
    }

    #[test]
    fn unknown_operator_lists_valid_set() {
        let err = compile(&schema(), &[clause("between", "age", vec![json!(1)], None)]).unwrap_err();
        match err {
            AppError::FilterSemantic(msg) => assert!(msg.contains("eq, in, not, gt, like, ilike")),
            other => panic!("expected FilterSemantic, got {:?}", other),
        }
    }

    #[test]
    fn unknown_field_surfaces_as_unknown_field() {
        let err = compile(&schema(), &[clause("eq", "ghost", vec![json!(1)], None)]).unwrap_err();
        assert!(matches!(err, AppError::UnknownField(_)));
    }

    #[test]
    fn type_mismatch_is_invalid_filter_value() {
        let err = compile(&schema(), &[clause("eq", "age", vec![json!("abc")], None)]).unwrap_err();
        match err {
            AppError::InvalidFilterValue { field, .. } => assert_eq!(field, "age"),
            other => panic!("expected InvalidFilterValue, got {:?}", other),
        }
        // like against a numeric column is also a mismatch
        let err = compile(&schema(), &[clause("like", "age", vec![json!("1")], None)]).unwrap_err();
        assert!(matches!(err, AppError::InvalidFilterValue { .. }));
    }

    #[test]
    fn numeric_strings_coerce_against_numeric_columns() {
        let p = compile(&schema(), &[clause("eq", "age", vec![json!("41")], None)])
            .unwrap()
            .unwrap();
        match p {
            Predicate::Cmp { value, .. } => assert_eq!(value, json!(41)),
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn foreign_key_filter_targets_suffixed_column() {
        let p = compile(&schema(), &[clause("eq", "country_id", vec![json!(2)], None)])
            .unwrap()
            .unwrap();
        match p {
            Predicate::Cmp { field, .. } => assert_eq!(field, "country_id"),
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn clauses_fold_left_to_right() {
        let p = compile(
            &schema(),
            &[
                clause("eq", "name", vec![json!("a")], None),
                clause("gt", "age", vec![json!(10)], Some("or")),
                clause("eq", "age", vec![json!(30)], Some("and")),
            ],
        )
        .unwrap()
        .unwrap();
        // ((name = a) OR (age > 10)) AND (age = 30)
        match p {
            Predicate::And(lhs, _) => assert!(matches!(*lhs, Predicate::Or(_, _))),
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn not_compiles_to_inequality_not_not_in() {
        let p = compile(&schema(), &[clause("not", "age", vec![json!(5)], None)])
            .unwrap()
            .unwrap();
        assert!(matches!(p, Predicate::Cmp { op: CmpOp::Ne, .. }));
    }
}
