//! Builds parameterized SELECT, INSERT, and UPDATE text from a query plan.
//!
//! Identifiers come from registered schemas, never from payloads, but are
//! still quoted. Values always bind through placeholders, with explicit
//! casts so text-bound values coerce to the column type server-side.

use crate::schema::{FieldType, KeyType, ModelSchema};
use crate::service::filter::{CmpOp, Predicate};
use crate::storage::{ProjectionSource, QueryPlan};
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "m";

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Cast suffix for a placeholder bound against `column`, if one is needed.
fn cast_for(schema: &ModelSchema, column: &str) -> Option<&'static str> {
    if column == schema.key_field {
        return match schema.key_type {
            KeyType::Int => Some("bigint"),
            KeyType::Uuid => Some("uuid"),
            KeyType::Text => None,
        };
    }
    let field = schema
        .fields
        .iter()
        .find(|f| f.save_name() == column || f.name == column)?;
    match field.field_type {
        FieldType::Integer | FieldType::ForeignKey => Some("bigint"),
        FieldType::Float => Some("double precision"),
        FieldType::Boolean => Some("boolean"),
        FieldType::Date => Some("date"),
        FieldType::DateTime => Some("timestamptz"),
        FieldType::ShortText | FieldType::LongText | FieldType::Email => None,
    }
}

fn placeholder(schema: &ModelSchema, column: &str, n: usize) -> String {
    match cast_for(schema, column) {
        Some(cast) => format!("${}::{}", n, cast),
        None => format!("${}", n),
    }
}

/// One LEFT JOIN per distinct (fk column, target) pair used by the
/// projection.
struct Join {
    alias: String,
    fk_column: String,
    target_table: String,
    target_key: String,
}

fn collect_joins(plan: &QueryPlan) -> Vec<Join> {
    let mut joins: Vec<Join> = Vec::new();
    for p in &plan.projection {
        if let ProjectionSource::Related { fk_column, target, .. } = &p.source {
            let already = joins
                .iter()
                .any(|j| j.fk_column == *fk_column && j.target_table == target.table);
            if !already {
                joins.push(Join {
                    alias: format!("rel{}", joins.len()),
                    fk_column: fk_column.clone(),
                    target_table: target.table.clone(),
                    target_key: target.key_field.clone(),
                });
            }
        }
    }
    joins
}

fn join_alias<'a>(joins: &'a [Join], fk_column: &str, target_table: &str) -> &'a str {
    joins
        .iter()
        .find(|j| j.fk_column == fk_column && j.target_table == target_table)
        .map(|j| j.alias.as_str())
        .unwrap_or(MAIN_ALIAS)
}

fn projection_list(plan: &QueryPlan, joins: &[Join]) -> String {
    plan.projection
        .iter()
        .map(|p| match &p.source {
            ProjectionSource::Column(col) => {
                format!("{}.{} AS {}", MAIN_ALIAS, quoted(col), quoted(&p.alias))
            }
            ProjectionSource::Related { fk_column, target, field } => {
                let alias = join_alias(joins, fk_column, &target.table);
                format!("{}.{} AS {}", alias, quoted(field), quoted(&p.alias))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_clause(joins: &[Join]) -> String {
    joins
        .iter()
        .map(|j| {
            format!(
                " LEFT JOIN {} {} ON {}.{} = {}.{}",
                quoted(&j.target_table),
                j.alias,
                j.alias,
                quoted(&j.target_key),
                MAIN_ALIAS,
                quoted(&j.fk_column)
            )
        })
        .collect::<Vec<_>>()
        .join("")
}

fn render_predicate(schema: &ModelSchema, p: &Predicate, q: &mut QueryBuf) -> String {
    match p {
        Predicate::Cmp { field, op, value } => {
            let n = q.push_param(value.clone());
            let op = match op {
                CmpOp::Eq => "=",
                CmpOp::Ne => "<>",
                CmpOp::Gt => ">",
            };
            format!(
                "{}.{} {} {}",
                MAIN_ALIAS,
                quoted(field),
                op,
                placeholder(schema, field, n)
            )
        }
        Predicate::In { field, values } => {
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| {
                    let n = q.push_param(v.clone());
                    placeholder(schema, field, n)
                })
                .collect();
            format!(
                "{}.{} IN ({})",
                MAIN_ALIAS,
                quoted(field),
                placeholders.join(", ")
            )
        }
        Predicate::Like { field, pattern, case_insensitive } => {
            let n = q.push_param(Value::String(format!("%{}%", escape_like(pattern))));
            let op = if *case_insensitive { "ILIKE" } else { "LIKE" };
            format!("{}.{} {} ${}", MAIN_ALIAS, quoted(field), op, n)
        }
        Predicate::And(a, b) => {
            let lhs = render_predicate(schema, a, q);
            let rhs = render_predicate(schema, b, q);
            format!("({} AND {})", lhs, rhs)
        }
        Predicate::Or(a, b) => {
            let lhs = render_predicate(schema, a, q);
            let rhs = render_predicate(schema, b, q);
            format!("({} OR {})", lhs, rhs)
        }
    }
}

/// The pattern is a substring match; LIKE metacharacters in it are literal.
fn escape_like(pattern: &str) -> String {
    pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn body(plan: &QueryPlan, joins: &[Join], q: &mut QueryBuf) -> String {
    let mut sql = format!(
        "FROM {} {}{}",
        quoted(&plan.schema.table),
        MAIN_ALIAS,
        join_clause(joins)
    );
    if let Some(p) = &plan.predicate {
        let rendered = render_predicate(&plan.schema, p, q);
        sql.push_str(&format!(" WHERE {}", rendered));
    }
    sql
}

/// Page query: projection, optional DISTINCT, sort, window.
pub fn select(plan: &QueryPlan) -> QueryBuf {
    let mut q = QueryBuf::new();
    let joins = collect_joins(plan);
    let distinct = if plan.distinct { "DISTINCT " } else { "" };
    let cols = projection_list(plan, &joins);
    let body = body(plan, &joins, &mut q);
    let order = match &plan.sort {
        Some(s) => format!(
            " ORDER BY {}.{} {}",
            MAIN_ALIAS,
            quoted(&s.column),
            if s.descending { "DESC" } else { "ASC" }
        ),
        None => String::new(),
    };
    let window = match plan.page {
        Some(page) => format!(" LIMIT {} OFFSET {}", page.size, page.offset()),
        None => String::new(),
    };
    q.sql = format!("SELECT {}{} {}{}{}", distinct, cols, body, order, window);
    q
}

/// Count query: matches pre-pagination, distinct-aware (counts de-duplicated
/// projected rows, same as the page query's universe).
pub fn count(plan: &QueryPlan) -> QueryBuf {
    let mut q = QueryBuf::new();
    let joins = collect_joins(plan);
    let distinct = if plan.distinct { "DISTINCT " } else { "" };
    let cols = projection_list(plan, &joins);
    let body = body(plan, &joins, &mut q);
    q.sql = format!(
        "SELECT COUNT(*) AS {} FROM (SELECT {}{} {}) sub",
        quoted("total"),
        distinct,
        cols,
        body
    );
    q
}

/// INSERT of a validated record; the key is generated by the store unless the
/// record carries one. Returns the key via RETURNING.
pub fn insert(schema: &ModelSchema, record: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    // caller-supplied key first (text-keyed models), then schema order so
    // generated SQL is stable
    if let Some(v) = record.get(&schema.key_field) {
        let n = q.push_param(v.clone());
        placeholders.push(placeholder(schema, &schema.key_field, n));
        cols.push(quoted(&schema.key_field));
    }
    for f in schema.field_descriptors() {
        let name = f.save_name();
        let Some(v) = record.get(&name) else { continue };
        let n = q.push_param(v.clone());
        placeholders.push(placeholder(schema, &name, n));
        cols.push(quoted(&name));
    }
    // every field nullable or defaulted: nothing to bind
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            quoted(&schema.table),
            quoted(&schema.key_field)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            quoted(&schema.table),
            cols.join(", "),
            placeholders.join(", "),
            quoted(&schema.key_field)
        )
    };
    q
}

/// UPDATE by key, setting every validated field present in the record.
pub fn update(schema: &ModelSchema, id: &Value, record: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::with_capacity(record.len());
    for f in schema.field_descriptors() {
        let name = f.save_name();
        let Some(v) = record.get(&name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(&name), placeholder(schema, &name, n)));
    }
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        quoted(&schema.table),
        sets.join(", "),
        quoted(&schema.key_field),
        placeholder(schema, &schema.key_field, id_param),
        quoted(&schema.key_field)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType, SchemaBuilder};
    use crate::service::filter::Predicate;
    use crate::storage::{PageWindow, Projection, ProjectionSource, SortKey};
    use serde_json::json;
    use std::sync::Arc;

    fn plan() -> QueryPlan {
        let country = Arc::new(
            SchemaBuilder::new("shop", "Country")
                .table("shop_country")
                .field(FieldDescriptor::new("name", FieldType::ShortText))
                .build(),
        );
        let schema = Arc::new(
            SchemaBuilder::new("shop", "Customer")
                .table("shop_customer")
                .field(FieldDescriptor::new("name", FieldType::ShortText))
                .field(FieldDescriptor::new("age", FieldType::Integer))
                .field(FieldDescriptor::new("country", FieldType::ForeignKey).references("shop.Country"))
                .build(),
        );
        QueryPlan {
            schema,
            projection: vec![
                Projection {
                    alias: "name".into(),
                    source: ProjectionSource::Column("name".into()),
                },
                Projection {
                    alias: "country__name".into(),
                    source: ProjectionSource::Related {
                        fk_column: "country_id".into(),
                        target: country,
                        field: "name".into(),
                    },
                },
            ],
            predicate: Some(Predicate::And(
                Box::new(Predicate::Cmp {
                    field: "age".into(),
                    op: CmpOp::Gt,
                    value: json!(30),
                }),
                Box::new(Predicate::Like {
                    field: "name".into(),
                    pattern: "ali".into(),
                    case_insensitive: true,
                }),
            )),
            sort: Some(SortKey {
                column: "name".into(),
                descending: true,
            }),
            page: Some(PageWindow { number: 2, size: 10 }),
            distinct: true,
        }
    }

    #[test]
    fn select_renders_joins_where_order_and_window() {
        let q = select(&plan());
        assert_eq!(
            q.sql,
            "SELECT DISTINCT m.\"name\" AS \"name\", rel0.\"name\" AS \"country__name\" \
             FROM \"shop_customer\" m \
             LEFT JOIN \"shop_country\" rel0 ON rel0.\"id\" = m.\"country_id\" \
             WHERE (m.\"age\" > $1::bigint AND m.\"name\" ILIKE $2) \
             ORDER BY m.\"name\" DESC LIMIT 10 OFFSET 10"
        );
        assert_eq!(q.params, vec![json!(30), json!("%ali%")]);
    }

    #[test]
    fn count_wraps_the_same_universe() {
        let q = count(&plan());
        assert!(q.sql.starts_with("SELECT COUNT(*) AS \"total\" FROM (SELECT DISTINCT"));
        assert!(!q.sql.contains("LIMIT"));
        assert!(!q.sql.contains("OFFSET"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn insert_follows_schema_order_and_returns_key() {
        let schema = SchemaBuilder::new("shop", "Customer")
            .table("shop_customer")
            .field(FieldDescriptor::new("name", FieldType::ShortText))
            .field(FieldDescriptor::new("age", FieldType::Integer))
            .build();
        let record = match json!({"age": 40, "name": "alice"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let q = insert(&schema, &record);
        assert_eq!(
            q.sql,
            "INSERT INTO \"shop_customer\" (\"name\", \"age\") VALUES ($1, $2::bigint) RETURNING \"id\""
        );
        assert_eq!(q.params, vec![json!("alice"), json!(40)]);
    }

    #[test]
    fn insert_of_empty_record_uses_default_values() {
        let schema = SchemaBuilder::new("shop", "Note")
            .table("shop_note")
            .field(FieldDescriptor::new("body", FieldType::LongText).nullable())
            .build();
        let q = insert(&schema, &Map::new());
        assert_eq!(
            q.sql,
            "INSERT INTO \"shop_note\" DEFAULT VALUES RETURNING \"id\""
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn insert_includes_supplied_text_key() {
        let schema = SchemaBuilder::new("shop", "Tag")
            .table("shop_tag")
            .key("code", crate::schema::KeyType::Text)
            .field(FieldDescriptor::new("label", FieldType::ShortText))
            .build();
        let record = match json!({"code": "vip", "label": "VIP"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let q = insert(&schema, &record);
        assert_eq!(
            q.sql,
            "INSERT INTO \"shop_tag\" (\"code\", \"label\") VALUES ($1, $2) RETURNING \"code\""
        );
        assert_eq!(q.params, vec![json!("vip"), json!("VIP")]);
    }

    #[test]
    fn update_binds_id_last_with_key_cast() {
        let schema = SchemaBuilder::new("shop", "Customer")
            .table("shop_customer")
            .field(FieldDescriptor::new("name", FieldType::ShortText))
            .build();
        let record = match json!({"name": "bob"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let q = update(&schema, &json!(7), &record);
        assert_eq!(
            q.sql,
            "UPDATE \"shop_customer\" SET \"name\" = $1 WHERE \"id\" = $2::bigint RETURNING \"id\""
        );
        assert_eq!(q.params, vec![json!("bob"), json!(7)]);
    }
}
