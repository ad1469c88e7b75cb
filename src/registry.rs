//! Schema Registry
//!
//! Owns the ref store and the custom kind catalog, and is the entry point for
//! registering schemas and building validators, encoders and decoders.
//! A registry is cheap to clone; clones share the same store.

use std::sync::Arc;

use crate::compile::{Decoder, Encoder, Validator};
use crate::config::SchematicaConfig;
use crate::error::Result;
use crate::factory::SchemaFactory;
use crate::graph::{RefAnalysis, RefGraph};
use crate::kinds::{KindCatalog, PrimitiveKind};
use crate::schema::Schema;
use crate::store::SchemaStore;
use crate::template::{SchemaInput, SchemaSelector, SchemaTemplate};

/// The main schema registry
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Name → schema bindings, append-only
    store: SchemaStore,
    /// Custom primitive kinds
    kinds: KindCatalog,
    config: SchematicaConfig,
}

impl SchemaRegistry {
    /// Empty registry with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SchematicaConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SchematicaConfig {
        &self.config
    }

    /// Read handle to the ref store
    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// Make a custom primitive kind available to templates
    pub fn register_kind(&self, kind: Arc<dyn PrimitiveKind>) -> Result<()> {
        self.kinds.register(kind)
    }

    /// Register a built entity as-is, or compile and register a template.
    ///
    /// Unnamed schemas are returned without being stored. A name containing
    /// whitespace fails with `InvalidSchemaRef` and leaves the store unchanged.
    pub fn add_schema(&self, input: impl Into<SchemaInput>) -> Result<Schema> {
        match input.into() {
            SchemaInput::Template(template) => self.create_schema(template),
            SchemaInput::Schema(schema) => {
                self.store.publish(std::slice::from_ref(&schema))?;
                Ok(schema)
            }
        }
    }

    /// Compile a template against the current store and register the result
    /// (and any nested named schemas) in one atomic step.
    pub fn create_schema(&self, template: impl Into<SchemaTemplate>) -> Result<Schema> {
        let template = template.into();
        let output = SchemaFactory::new(&self.store, &self.kinds, &self.config).compile(&template)?;
        let published = self.store.publish(&output.named)?;
        tracing::debug!(
            schema = output.root.name().unwrap_or("<anonymous>"),
            published,
            total = self.store.len(),
            "created schema"
        );
        Ok(output.root)
    }

    /// Register templates in order, stopping at the first failure.
    /// Templates registered before the failure stay registered.
    pub fn add_templates(&self, templates: impl IntoIterator<Item = SchemaTemplate>) -> Result<Vec<Schema>> {
        templates
            .into_iter()
            .map(|template| self.create_schema(template))
            .collect()
    }

    /// Exact-match lookup
    pub fn get_schema(&self, name: &str) -> Result<Schema> {
        self.store.resolve(name)
    }

    fn select(&self, selector: impl Into<SchemaSelector>) -> Result<Schema> {
        match selector.into() {
            SchemaSelector::Name(name) => self.get_schema(&name),
            SchemaSelector::Schema(schema) => Ok(schema),
        }
    }

    /// Validator for a schema or a registered name
    pub fn build_validator(&self, selector: impl Into<SchemaSelector>) -> Result<Validator> {
        Validator::build(self.select(selector)?, &self.store, &self.config)
    }

    /// Encoder producing canonical text
    pub fn build_serializer(&self, selector: impl Into<SchemaSelector>) -> Result<Encoder> {
        Encoder::build(self.select(selector)?, &self.store, &self.config)
    }

    /// Decoder, the inverse of [`build_serializer`](Self::build_serializer)
    pub fn build_parser(&self, selector: impl Into<SchemaSelector>) -> Result<Decoder> {
        Decoder::build(self.select(selector)?, &self.store, &self.config)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    /// Snapshot of which registered schemas refer to which
    pub fn ref_graph(&self) -> RefGraph {
        RefGraph::from_store(&self.store)
    }

    /// Dangling refs and recursive groups among registered schemas
    pub fn analyze(&self) -> RefAnalysis {
        self.ref_graph().analyze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SchemaError};
    use crate::kinds::Check;
    use crate::schema::SchemaKind;
    use serde_json::{json, Value};

    fn point() -> Value {
        json!({ "name": "Point", "kind": "object", "fields": { "x": "number", "y": "number" } })
    }

    #[test]
    fn test_create_registry() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get_schema("Point").is_err());
    }

    #[test]
    fn test_create_and_get() {
        let registry = SchemaRegistry::new();
        let schema = registry.create_schema(point()).unwrap();

        assert!(registry.get_schema("Point").unwrap().ptr_eq(&schema));
        assert_eq!(registry.names(), vec!["Point"]);
        assert!(registry.contains("Point"));
        assert!(!registry.contains("point"));
    }

    #[test]
    fn test_anonymous_not_stored() {
        let registry = SchemaRegistry::new();
        let schema = registry.create_schema(json!({ "kind": "array", "items": "string" })).unwrap();
        assert_eq!(schema.name(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_schema_passthrough() {
        let registry = SchemaRegistry::new();
        let flag = Schema::named("Flag", SchemaKind::Boolean);
        let added = registry.add_schema(&flag).unwrap();
        assert!(added.ptr_eq(&flag));
        assert!(registry.get_schema("Flag").unwrap().ptr_eq(&flag));
    }

    #[test]
    fn test_immutability() {
        let registry = SchemaRegistry::new();
        let first = registry.create_schema(point()).unwrap();

        let err = registry.create_schema(point()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImmutabilityViolation);
        assert!(registry.get_schema("Point").unwrap().ptr_eq(&first));

        // The same entity again is accepted
        assert!(registry.add_schema(first.clone()).is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_whitespace_name_leaves_store_unchanged() {
        let registry = SchemaRegistry::new();
        let err = registry
            .create_schema(json!({
                "name": "Outer",
                "kind": "object",
                "fields": { "inner": { "name": "in ner", "kind": "null" } }
            }))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchemaRef);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_build_by_name_or_entity() {
        let registry = SchemaRegistry::new();
        registry.create_schema(point()).unwrap();

        let by_name = registry.build_validator("Point").unwrap();
        let by_entity = registry
            .build_validator(registry.get_schema("Point").unwrap())
            .unwrap();
        for value in [json!({ "x": 1, "y": 2 }), json!({ "x": "a" }), json!(null)] {
            assert_eq!(by_name.validate(&value), by_entity.validate(&value));
        }
    }

    #[test]
    fn test_build_unknown_name_suggests() {
        let registry = SchemaRegistry::new();
        registry.create_schema(point()).unwrap();
        match registry.build_validator("Pointt").unwrap_err() {
            SchemaError::UnknownRef { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("Point"))
            }
            other => panic!("Expected UnknownRef, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_kind() {
        struct Hex;
        impl PrimitiveKind for Hex {
            fn name(&self) -> &str {
                "hex"
            }
            fn check(&self, _params: &Value, value: &Value) -> Check {
                match value.as_str() {
                    Some(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit()) => Ok(()),
                    _ => Err(format!("{} is not a hex string", value)),
                }
            }
        }

        let registry = SchemaRegistry::new();
        registry.register_kind(Arc::new(Hex)).unwrap();
        registry
            .create_schema(json!({ "name": "Digest", "kind": "object", "fields": { "sha": "hex" } }))
            .unwrap();

        let validator = registry.build_validator("Digest").unwrap();
        assert!(validator.validate(&json!({ "sha": "deadbeef" })));
        assert!(!validator.validate(&json!({ "sha": "xyz" })));
    }

    #[test]
    fn test_analyze() {
        let registry = SchemaRegistry::new();
        registry
            .create_schema(json!({ "name": "A", "kind": "object", "fields": { "b": { "$ref": "B" } } }))
            .unwrap();
        assert!(!registry.analyze().is_complete());

        registry
            .create_schema(json!({ "name": "B", "kind": "object", "fields": { "a": { "$ref": "A" } } }))
            .unwrap();
        let analysis = registry.analyze();
        assert!(analysis.is_complete());
        assert_eq!(analysis.cycles, vec![vec!["A".to_string(), "B".to_string()]]);
    }

    #[test]
    fn test_ref_graph_queries() {
        let registry = SchemaRegistry::new();
        registry
            .create_schema(json!({ "name": "Money", "kind": "tuple", "items": ["string", "integer"] }))
            .unwrap();
        registry
            .create_schema(json!({ "name": "Line", "kind": "object", "fields": { "price": "Money" } }))
            .unwrap();
        registry
            .create_schema(json!({
                "name": "Order",
                "kind": "object",
                "fields": { "lines": { "kind": "array", "items": "Line" }, "total": "Money" }
            }))
            .unwrap();

        let graph = registry.ref_graph();
        assert_eq!(graph.schema_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.dependencies_of("Order"), vec!["Line", "Money"]);
        assert_eq!(graph.dependents_of("Money"), vec!["Line", "Order"]);
        assert_eq!(graph.closure("Order"), vec!["Line", "Money"]);
        assert!(graph.closure("Money").is_empty());
        assert!(graph.closure("Missing").is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = SchemaRegistry::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let registry = &registry;
                s.spawn(move || {
                    registry
                        .create_schema(json!({ "name": format!("S{}", i), "kind": "integer" }))
                        .unwrap();
                    // Everyone races for the same name; exactly one wins
                    let _ = registry.create_schema(json!({ "name": "Shared", "kind": "null" }));
                });
            }
        });
        assert_eq!(registry.len(), 9);
        assert!(registry.build_validator("Shared").unwrap().validate(&json!(null)));
    }
}
