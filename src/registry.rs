//! Process-wide model registry: built once at startup, immutable afterwards,
//! looked up by exact or bare name per request.

use crate::error::AppError;
use crate::schema::{ModelSchema, SchemaHandle};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ModelRegistry {
    /// Declaration order preserved; small enough that linear scans beat a map
    /// for the bare-name case anyway.
    models: Vec<SchemaHandle>,
    /// Namespaces skipped by bare-name resolution (framework plumbing models).
    internal_namespaces: HashSet<String>,
}

impl ModelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolve a dotted (`namespace.Name`) or bare model identifier.
    ///
    /// Bare names match case-insensitively across all non-internal namespaces
    /// and resolve only when exactly one model matches. Zero and many matches
    /// both report `ModelNotFound`; ambiguity is deliberately not
    /// distinguished so callers cannot probe namespace layout.
    pub fn resolve(&self, name: &str) -> Result<SchemaHandle, AppError> {
        if let Some((namespace, bare)) = name.split_once('.') {
            return self
                .models
                .iter()
                .find(|m| m.namespace == namespace && m.name == bare)
                .cloned()
                .ok_or_else(|| AppError::ModelNotFound(name.to_string()));
        }
        let mut matches = self.models.iter().filter(|m| {
            !self.internal_namespaces.contains(&m.namespace)
                && m.name.eq_ignore_ascii_case(name)
        });
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(Arc::clone(found)),
            _ => Err(AppError::ModelNotFound(name.to_string())),
        }
    }

    /// Target schema of a foreign-key field, if the target is registered.
    pub fn related_target(&self, qualified: &str) -> Option<SchemaHandle> {
        let (namespace, bare) = qualified.split_once('.')?;
        self.models
            .iter()
            .find(|m| m.namespace == namespace && m.name == bare)
            .cloned()
    }

    pub fn handles(&self) -> &[SchemaHandle] {
        &self.models
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    models: Vec<ModelSchema>,
    internal_namespaces: HashSet<String>,
}

impl RegistryBuilder {
    pub fn model(mut self, schema: ModelSchema) -> Self {
        self.models.push(schema);
        self
    }

    /// Exclude a namespace from bare-name resolution. Its models stay
    /// reachable via the dotted form.
    pub fn internal_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.internal_namespaces.insert(namespace.into());
        self
    }

    /// Finish the registry. Duplicate qualified names are a startup
    /// configuration error, not a request-time one.
    pub fn build(self) -> Result<ModelRegistry, AppError> {
        let mut seen = HashSet::new();
        for m in &self.models {
            if !seen.insert(m.qualified_name()) {
                return Err(AppError::BadRequest(format!(
                    "duplicate model registration: {}",
                    m.qualified_name()
                )));
            }
        }
        Ok(ModelRegistry {
            models: self.models.into_iter().map(Arc::new).collect(),
            internal_namespaces: self.internal_namespaces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType, SchemaBuilder};

    fn registry() -> ModelRegistry {
        ModelRegistry::builder()
            .model(
                SchemaBuilder::new("shop", "Customer")
                    .field(FieldDescriptor::new("name", FieldType::ShortText))
                    .build(),
            )
            .model(
                SchemaBuilder::new("crm", "Lead")
                    .field(FieldDescriptor::new("name", FieldType::ShortText))
                    .build(),
            )
            .model(
                SchemaBuilder::new("crm", "Customer")
                    .field(FieldDescriptor::new("name", FieldType::ShortText))
                    .build(),
            )
            .model(
                SchemaBuilder::new("sys", "Session")
                    .field(FieldDescriptor::new("token", FieldType::ShortText))
                    .build(),
            )
            .internal_namespace("sys")
            .build()
            .unwrap()
    }

    #[test]
    fn dotted_name_is_exact() {
        let r = registry();
        assert_eq!(r.resolve("shop.Customer").unwrap().namespace, "shop");
        assert!(matches!(
            r.resolve("shop.Missing"),
            Err(AppError::ModelNotFound(_))
        ));
    }

    #[test]
    fn bare_name_is_case_insensitive_when_unique() {
        let r = registry();
        let lead = r.resolve("lead").unwrap();
        assert_eq!(lead.qualified_name(), "crm.Lead");
    }

    #[test]
    fn ambiguous_bare_name_reports_not_found() {
        let r = registry();
        // Customer exists in shop and crm; same error as a missing model.
        assert!(matches!(
            r.resolve("customer"),
            Err(AppError::ModelNotFound(_))
        ));
        assert!(matches!(r.resolve("nothere"), Err(AppError::ModelNotFound(_))));
    }

    #[test]
    fn internal_namespace_hidden_from_bare_resolution() {
        let r = registry();
        assert!(matches!(r.resolve("session"), Err(AppError::ModelNotFound(_))));
        assert!(r.resolve("sys.Session").is_ok());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let result = ModelRegistry::builder()
            .model(SchemaBuilder::new("a", "M").build())
            .model(SchemaBuilder::new("a", "M").build())
            .build();
        assert!(result.is_err());
    }
}
