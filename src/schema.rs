//! Runtime model schemas: field descriptors, type tags, and introspection
//! helpers shared by the fetch and save engines.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Opaque reference to a registered model's schema. Cheap to clone; resolved
/// fresh from the registry on every request.
pub type SchemaHandle = Arc<ModelSchema>;

/// Store-native type tag for a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    ShortText,
    LongText,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Email,
    ForeignKey,
}

impl FieldType {
    /// Human name used in validation messages.
    pub fn label(self) -> &'static str {
        match self {
            FieldType::ShortText => "string",
            FieldType::LongText => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Email => "email",
            FieldType::ForeignKey => "foreign key",
        }
    }
}

/// Primary key type for parsing identifiers from payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    Int,
    Text,
    Uuid,
}

/// Declared default for a field. `NotProvided` is distinct from an explicit
/// null default: a nullable field with no default is still optional on save,
/// but a non-nullable field is required only when no default exists.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldDefault {
    NotProvided,
    Value(Value),
}

impl FieldDefault {
    pub fn is_provided(&self) -> bool {
        matches!(self, FieldDefault::Value(_))
    }
}

#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub default: FieldDefault,
    /// Qualified name of the referenced model (foreign-key fields only).
    pub references: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDescriptor {
            name: name.into(),
            field_type,
            nullable: false,
            max_length: None,
            default: FieldDefault::NotProvided,
            references: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn default_value(mut self, v: Value) -> Self {
        self.default = FieldDefault::Value(v);
        self
    }

    /// Mark as a foreign key to `target` (qualified model name).
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.references = Some(target.into());
        self
    }

    /// Externally visible name for save payloads: foreign keys are exposed
    /// with an `_id` suffix (`customer` -> `customer_id`) since the payload
    /// carries the raw key, not a nested record.
    pub fn save_name(&self) -> String {
        if self.field_type == FieldType::ForeignKey {
            format!("{}_id", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn is_required(&self) -> bool {
        !self.nullable && !self.default.is_provided()
    }
}

#[derive(Clone, Debug)]
pub struct ModelSchema {
    pub namespace: String,
    pub name: String,
    /// Backing table, `namespace_name` unless overridden at registration.
    pub table: String,
    pub key_field: String,
    pub key_type: KeyType,
    pub fields: Vec<FieldDescriptor>,
}

/// How a fetch-side field reference resolves against a schema.
#[derive(Debug)]
pub enum FieldSelector<'a> {
    /// The schema's own column: bare name, or the `_id` form of a foreign key.
    Own(&'a FieldDescriptor),
    /// Dotted path `fk__relatedField`; the related field name is validated
    /// against the target schema by the caller (needs registry access).
    Related {
        fk: &'a FieldDescriptor,
        related_field: String,
    },
    /// The key field itself.
    Key,
}

impl ModelSchema {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field descriptors in declaration order. This is the introspection
    /// surface both engines consume.
    pub fn field_descriptors(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Names accepted in save payloads (foreign keys in `_id` form). Models
    /// with a text key also accept the key field, since the store cannot
    /// generate one.
    pub fn save_field_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> =
            self.fields.iter().map(FieldDescriptor::save_name).collect();
        if self.key_type == KeyType::Text {
            names.insert(self.key_field.clone());
        }
        names
    }

    /// Resolve one fetch-side field reference. Accepts the bare field name,
    /// the `_id` form of a foreign key, the key field, and dotted related
    /// paths (`fk__field`).
    pub fn classify_field<'a>(&'a self, name: &str) -> Option<FieldSelector<'a>> {
        if name == self.key_field {
            return Some(FieldSelector::Key);
        }
        if let Some(f) = self.field(name) {
            return Some(FieldSelector::Own(f));
        }
        if let Some(bare) = name.strip_suffix("_id") {
            if let Some(f) = self.field(bare) {
                if f.field_type == FieldType::ForeignKey {
                    return Some(FieldSelector::Own(f));
                }
            }
        }
        if let Some((head, rest)) = name.split_once("__") {
            if let Some(f) = self.field(head) {
                if f.field_type == FieldType::ForeignKey && !rest.is_empty() {
                    return Some(FieldSelector::Related {
                        fk: f,
                        related_field: rest.to_string(),
                    });
                }
            }
        }
        None
    }

    /// Parse a payload identifier into the key type. `Err` carries the raw
    /// text for the invalid-identifier error.
    pub fn parse_key(&self, raw: &Value) -> Result<Value, String> {
        let display = match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self.key_type {
            KeyType::Int => match raw {
                Value::Number(n) if n.is_i64() => Ok(raw.clone()),
                Value::String(s) => s
                    .parse::<i64>()
                    .map(|n| Value::Number(n.into()))
                    .map_err(|_| display),
                _ => Err(display),
            },
            KeyType::Text => match raw {
                Value::String(_) => Ok(raw.clone()),
                _ => Err(display),
            },
            KeyType::Uuid => match raw {
                Value::String(s) => uuid::Uuid::parse_str(s)
                    .map(|u| Value::String(u.to_string()))
                    .map_err(|_| display),
                _ => Err(display),
            },
        }
    }
}

/// Schema under construction; finished by `RegistryBuilder::model`.
pub struct SchemaBuilder {
    namespace: String,
    name: String,
    table: Option<String>,
    key_field: String,
    key_type: KeyType,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        SchemaBuilder {
            namespace: namespace.into(),
            name: name.into(),
            table: None,
            key_field: "id".into(),
            key_type: KeyType::Int,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn key(mut self, field: impl Into<String>, key_type: KeyType) -> Self {
        self.key_field = field.into();
        self.key_type = key_type;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> ModelSchema {
        let table = self
            .table
            .unwrap_or_else(|| format!("{}_{}", self.namespace, self.name.to_lowercase()));
        ModelSchema {
            namespace: self.namespace,
            name: self.name,
            table,
            key_field: self.key_field,
            key_type: self.key_type,
            fields: self.fields,
        }
    }
}
