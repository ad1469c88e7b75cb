//! Schema Factory
//!
//! Compiles a [`SchemaTemplate`] into a [`Schema`] graph.
//!
//! Named references are never inlined: `{"$ref": "Tree"}` becomes a `Ref` node
//! holding only `"Tree"`, resolved later by whichever artifact traverses it.
//! That is what lets a template name a schema that is not registered yet, or
//! the schema being registered. Anonymous structure has no name to stop on,
//! so it is expanded eagerly, bounded by `limits.max_template_depth`.
//!
//! Nested templates that carry a `name` are returned alongside the root so
//! the registry can bind them in the same atomic batch.

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::SchematicaConfig;
use crate::error::{Result, SchemaError};
use crate::kinds::{
    is_builtin, json_type, CustomKind, IntegerRules, KindCatalog, NumberRules, StringRules,
};
use crate::schema::{ArrayShape, Field, ObjectShape, Schema, SchemaKind};
use crate::store::{validate_name, SchemaStore};
use crate::template::SchemaTemplate;

/// Result of compiling one template
#[derive(Debug, Clone)]
pub struct FactoryOutput {
    pub root: Schema,
    /// Every named schema in the template, innermost first (root last, if named)
    pub named: Vec<Schema>,
}

/// Template compiler bound to a read view of the ref store and kind catalog
pub struct SchemaFactory<'a> {
    store: &'a SchemaStore,
    kinds: &'a KindCatalog,
    max_depth: usize,
    additional_fields: bool,
}

/// Per-call expansion state
struct Expansion {
    path: Vec<String>,
    named: Vec<Schema>,
}

impl Expansion {
    fn path(&self) -> String {
        if self.path.is_empty() {
            String::from("<root>")
        } else {
            self.path.join("/")
        }
    }

    fn error(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::compile(self.path(), message)
    }
}

impl<'a> SchemaFactory<'a> {
    pub fn new(store: &'a SchemaStore, kinds: &'a KindCatalog, config: &SchematicaConfig) -> Self {
        Self {
            store,
            kinds,
            max_depth: config.limits.max_template_depth,
            additional_fields: config.objects.additional_fields,
        }
    }

    /// Compile a template. Does not touch the store.
    pub fn compile(&self, template: &SchemaTemplate) -> Result<FactoryOutput> {
        let mut cx = Expansion {
            path: Vec::new(),
            named: Vec::new(),
        };
        let root = self.expand(template.as_value(), &mut cx, 0)?;

        tracing::debug!(
            root = root.name().unwrap_or("<anonymous>"),
            kind = %root.tag(),
            named = cx.named.len(),
            "compiled template"
        );
        Ok(FactoryOutput {
            root,
            named: cx.named,
        })
    }

    fn expand(&self, node: &Value, cx: &mut Expansion, depth: usize) -> Result<Schema> {
        if depth > self.max_depth {
            return Err(cx.error(format!(
                "template nesting exceeds {} levels (anonymous self-containment?)",
                self.max_depth
            )));
        }

        match node {
            Value::String(shorthand) => self.expand_shorthand(shorthand, cx),
            Value::Object(map) => self.expand_object(map, cx, depth),
            other => Err(cx.error(format!(
                "expected a kind name or template object, found {}",
                json_type(other)
            ))),
        }
    }

    fn expand_child(
        &self,
        segment: String,
        node: &Value,
        cx: &mut Expansion,
        depth: usize,
    ) -> Result<Schema> {
        cx.path.push(segment);
        let child = self.expand(node, cx, depth + 1);
        cx.path.pop();
        child
    }

    /// `"number"`, a custom kind name, or the name of a registered schema
    fn expand_shorthand(&self, shorthand: &str, cx: &mut Expansion) -> Result<Schema> {
        let kind = match shorthand {
            "string" => SchemaKind::String(StringRules::default()),
            "number" => SchemaKind::Number(NumberRules::default()),
            "integer" => SchemaKind::Integer(IntegerRules::default()),
            "boolean" => SchemaKind::Boolean,
            "null" => SchemaKind::Null,
            "any" => SchemaKind::Any,
            other if is_builtin(other) => {
                return Err(cx.error(format!("kind `{}` needs a template object", other)));
            }
            other => {
                if let Some(custom) = self.kinds.get(other) {
                    let params = custom.configure(&Map::new()).map_err(|e| cx.error(e))?;
                    SchemaKind::Custom(CustomKind::new(custom, params))
                } else if self.store.contains(other) {
                    tracing::trace!(target_schema = %other, "shorthand resolved to registered schema");
                    SchemaKind::Ref(other.to_string())
                } else {
                    return Err(cx.error(format!("unknown kind or schema name `{}`", other)));
                }
            }
        };
        Ok(Schema::new(kind))
    }

    fn expand_object(
        &self,
        map: &Map<String, Value>,
        cx: &mut Expansion,
        depth: usize,
    ) -> Result<Schema> {
        if let Some(target) = map.get("$ref") {
            if map.len() != 1 {
                return Err(cx.error("`$ref` cannot be combined with other keys"));
            }
            return self.reference(target, cx);
        }

        let name = match map.get("name") {
            None => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => {
                return Err(cx.error(format!("`name` must be a string, found {}", json_type(other))))
            }
        };
        let kind = match map.get("kind") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => {
                return Err(cx.error(format!("`kind` must be a string, found {}", json_type(other))))
            }
            None => return Err(cx.error("template object is missing `kind`")),
        };

        let kind = match kind {
            "string" => {
                allow_keys(map, kind, &["min_length", "max_length", "pattern"], cx)?;
                let pattern = match map.get("pattern") {
                    None => None,
                    Some(Value::String(p)) => Some(
                        Regex::new(p).map_err(|e| cx.error(format!("invalid pattern: {}", e)))?,
                    ),
                    Some(_) => return Err(cx.error("`pattern` must be a string")),
                };
                let rules = StringRules {
                    min_length: opt_usize(map, "min_length", cx)?,
                    max_length: opt_usize(map, "max_length", cx)?,
                    pattern,
                };
                if let Some(problem) = rules.bounds_error() {
                    return Err(cx.error(problem));
                }
                SchemaKind::String(rules)
            }
            "number" => {
                allow_keys(
                    map,
                    kind,
                    &["minimum", "maximum", "exclusive_minimum", "exclusive_maximum"],
                    cx,
                )?;
                let rules = NumberRules {
                    minimum: opt_f64(map, "minimum", cx)?,
                    maximum: opt_f64(map, "maximum", cx)?,
                    exclusive_minimum: opt_f64(map, "exclusive_minimum", cx)?,
                    exclusive_maximum: opt_f64(map, "exclusive_maximum", cx)?,
                };
                if let Some(problem) = rules.bounds_error() {
                    return Err(cx.error(problem));
                }
                SchemaKind::Number(rules)
            }
            "integer" => {
                allow_keys(map, kind, &["minimum", "maximum"], cx)?;
                let rules = IntegerRules {
                    minimum: opt_i64(map, "minimum", cx)?,
                    maximum: opt_i64(map, "maximum", cx)?,
                };
                if let Some(problem) = rules.bounds_error() {
                    return Err(cx.error(problem));
                }
                SchemaKind::Integer(rules)
            }
            "boolean" | "null" | "any" => {
                allow_keys(map, kind, &[], cx)?;
                match kind {
                    "boolean" => SchemaKind::Boolean,
                    "null" => SchemaKind::Null,
                    _ => SchemaKind::Any,
                }
            }
            "literal" => {
                allow_keys(map, kind, &["value"], cx)?;
                let value = required(map, "value", kind, cx)?;
                SchemaKind::Literal(value.clone())
            }
            "enum" => {
                allow_keys(map, kind, &["values"], cx)?;
                match required(map, "values", kind, cx)? {
                    Value::Array(values) if !values.is_empty() => SchemaKind::Enum(values.clone()),
                    _ => return Err(cx.error("`values` must be a non-empty array")),
                }
            }
            "object" => {
                allow_keys(map, kind, &["fields", "optional", "additional_fields"], cx)?;
                SchemaKind::Object(self.object_shape(map, cx, depth)?)
            }
            "array" => {
                allow_keys(map, kind, &["items", "min_items", "max_items"], cx)?;
                let items = required(map, "items", kind, cx)?;
                let shape = ArrayShape {
                    items: self.expand_child("items".to_string(), items, cx, depth)?,
                    min_items: opt_usize(map, "min_items", cx)?,
                    max_items: opt_usize(map, "max_items", cx)?,
                };
                if let (Some(min), Some(max)) = (shape.min_items, shape.max_items) {
                    if min > max {
                        return Err(cx.error(format!(
                            "min_items {} is greater than max_items {}",
                            min, max
                        )));
                    }
                }
                SchemaKind::Array(shape)
            }
            "tuple" => {
                allow_keys(map, kind, &["items"], cx)?;
                let Value::Array(items) = required(map, "items", kind, cx)? else {
                    return Err(cx.error("`items` must be an array of templates"));
                };
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.expand_child(format!("items[{}]", i), item, cx, depth))
                    .collect::<Result<Vec<_>>>()?;
                SchemaKind::Tuple(items)
            }
            "map" => {
                allow_keys(map, kind, &["values"], cx)?;
                let values = required(map, "values", kind, cx)?;
                SchemaKind::Map(self.expand_child("values".to_string(), values, cx, depth)?)
            }
            "union" => {
                allow_keys(map, kind, &["variants"], cx)?;
                let variants = match required(map, "variants", kind, cx)? {
                    Value::Array(variants) if !variants.is_empty() => variants,
                    _ => return Err(cx.error("`variants` must be a non-empty array")),
                };
                let variants = variants
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.expand_child(format!("variants[{}]", i), v, cx, depth))
                    .collect::<Result<Vec<_>>>()?;
                SchemaKind::Union(variants)
            }
            "ref" => {
                allow_keys(map, kind, &["ref"], cx)?;
                let target = required(map, "ref", kind, cx)?;
                self.reference(target, cx)?.kind().clone()
            }
            other => match self.kinds.get(other) {
                Some(custom) => {
                    let params: Map<String, Value> = map
                        .iter()
                        .filter(|(key, _)| key.as_str() != "kind" && key.as_str() != "name")
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    let params = custom.configure(&params).map_err(|e| cx.error(e))?;
                    SchemaKind::Custom(CustomKind::new(custom, params))
                }
                None => return Err(cx.error(format!("unknown kind `{}`", other))),
            },
        };

        match name {
            None => Ok(Schema::new(kind)),
            Some(name) => {
                if cx.named.iter().any(|s| s.name() == Some(name.as_str())) {
                    return Err(cx.error(format!(
                        "name `{}` is declared more than once in this template",
                        name
                    )));
                }
                let schema = Schema::named(name, kind);
                cx.named.push(schema.clone());
                Ok(schema)
            }
        }
    }

    fn object_shape(
        &self,
        map: &Map<String, Value>,
        cx: &mut Expansion,
        depth: usize,
    ) -> Result<ObjectShape> {
        let no_fields = Map::new();
        let declared = match map.get("fields") {
            None => &no_fields,
            Some(Value::Object(fields)) => fields,
            Some(_) => return Err(cx.error("`fields` must be an object of templates")),
        };

        let optional: Vec<&str> = match map.get("optional") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| n.as_str().ok_or_else(|| cx.error("`optional` must list field names")))
                .collect::<Result<_>>()?,
            Some(_) => return Err(cx.error("`optional` must be an array of field names")),
        };
        if let Some(unknown) = optional.iter().find(|n| !declared.contains_key(**n)) {
            return Err(cx.error(format!("optional field `{}` is not declared", unknown)));
        }

        let additional_fields = match map.get("additional_fields") {
            None => self.additional_fields,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => return Err(cx.error("`additional_fields` must be a boolean")),
        };

        let mut fields = Vec::with_capacity(declared.len());
        for (field_name, field_template) in declared {
            let schema =
                self.expand_child(format!("fields.{}", field_name), field_template, cx, depth)?;
            fields.push(Field {
                name: field_name.clone(),
                schema,
                required: !optional.contains(&field_name.as_str()),
            });
        }

        Ok(ObjectShape {
            fields,
            additional_fields,
        })
    }

    fn reference(&self, target: &Value, cx: &Expansion) -> Result<Schema> {
        let Some(name) = target.as_str() else {
            return Err(cx.error("reference target must be a schema name"));
        };
        validate_name(name).map_err(|e| cx.error(e.to_string()))?;
        if !self.store.contains(name) {
            tracing::trace!(target_schema = %name, "forward reference");
        }
        Ok(Schema::reference(name))
    }
}

fn allow_keys(
    map: &Map<String, Value>,
    kind: &str,
    allowed: &[&str],
    cx: &Expansion,
) -> Result<()> {
    match map
        .keys()
        .find(|key| !matches!(key.as_str(), "kind" | "name") && !allowed.contains(&key.as_str()))
    {
        Some(key) => Err(cx.error(format!("unknown key `{}` for kind `{}`", key, kind))),
        None => Ok(()),
    }
}

fn required<'m>(
    map: &'m Map<String, Value>,
    key: &str,
    kind: &str,
    cx: &Expansion,
) -> Result<&'m Value> {
    map.get(key)
        .ok_or_else(|| cx.error(format!("kind `{}` requires `{}`", kind, key)))
}

fn opt_usize(map: &Map<String, Value>, key: &str, cx: &Expansion) -> Result<Option<usize>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| cx.error(format!("`{}` must be a non-negative integer", key))),
    }
}

fn opt_i64(map: &Map<String, Value>, key: &str, cx: &Expansion) -> Result<Option<i64>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| cx.error(format!("`{}` must be an integer", key))),
    }
}

fn opt_f64(map: &Map<String, Value>, key: &str, cx: &Expansion) -> Result<Option<f64>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| cx.error(format!("`{}` must be a number", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::kinds::{Check, PrimitiveKind};
    use serde_json::json;
    use std::sync::Arc;

    fn compile_with(
        store: &SchemaStore,
        kinds: &KindCatalog,
        template: Value,
    ) -> Result<FactoryOutput> {
        let config = SchematicaConfig::default();
        SchemaFactory::new(store, kinds, &config).compile(&SchemaTemplate::new(template))
    }

    fn compile(template: Value) -> Result<FactoryOutput> {
        compile_with(&SchemaStore::new(), &KindCatalog::new(), template)
    }

    #[test]
    fn test_point_template() {
        let out = compile(json!({
            "name": "Point",
            "kind": "object",
            "fields": { "x": "number", "y": "number" }
        }))
        .unwrap();

        assert_eq!(out.root.name(), Some("Point"));
        assert_eq!(out.named.len(), 1);
        match out.root.kind() {
            SchemaKind::Object(shape) => {
                let names: Vec<&str> = shape.fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["x", "y"]);
                assert!(shape.fields.iter().all(|f| f.required));
                assert!(!shape.additional_fields);
            }
            other => panic!("Expected Object, got {:?}", other),
        }
    }

    #[test]
    fn test_refs_stay_lazy() {
        let out = compile(json!({
            "name": "Tree",
            "kind": "object",
            "fields": {
                "value": "integer",
                "children": { "kind": "array", "items": { "$ref": "Tree" } }
            }
        }))
        .unwrap();

        let SchemaKind::Object(shape) = out.root.kind() else {
            panic!("Expected Object");
        };
        let children = shape.field("children").unwrap();
        match children.schema.kind() {
            SchemaKind::Array(array) => assert_eq!(array.items.ref_name(), Some("Tree")),
            other => panic!("Expected Array, got {:?}", other),
        }
    }

    #[test]
    fn test_shorthand_resolves_registered_name() {
        let store = SchemaStore::new();
        store
            .publish(&[Schema::named("Point", SchemaKind::Boolean)])
            .unwrap();

        let out = compile_with(&store, &KindCatalog::new(), json!("Point")).unwrap();
        assert_eq!(out.root.ref_name(), Some("Point"));

        let err = compile(json!("Point")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileError);
    }

    #[test]
    fn test_optional_fields() {
        let out = compile(json!({
            "kind": "object",
            "fields": { "id": "integer", "label": "string" },
            "optional": ["label"]
        }))
        .unwrap();
        let SchemaKind::Object(shape) = out.root.kind() else {
            panic!("Expected Object");
        };
        assert!(shape.field("id").unwrap().required);
        assert!(!shape.field("label").unwrap().required);

        let err = compile(json!({
            "kind": "object",
            "fields": { "id": "integer" },
            "optional": ["nope"]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileError);
    }

    #[test]
    fn test_structural_errors() {
        let cases = vec![
            json!({ "kind": "array" }),
            json!({ "kind": "widget" }),
            json!({ "fields": {} }),
            json!({ "kind": "union", "variants": [] }),
            json!({ "kind": "string", "max_len": 3 }),
            json!({ "kind": "string", "pattern": "(" }),
            json!({ "kind": "integer", "minimum": 3, "maximum": 1 }),
            json!({ "kind": "array", "items": "number", "min_items": 2, "max_items": 1 }),
            json!({ "kind": "ref", "ref": "has space" }),
            json!({ "$ref": "A", "name": "B" }),
            json!("object"),
            json!(42),
        ];
        for case in cases {
            let err = compile(case.clone()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CompileError, "case {}", case);
        }
    }

    #[test]
    fn test_error_path_points_at_child() {
        let err = compile(json!({
            "kind": "object",
            "fields": { "tags": { "kind": "array", "items": "widget" } }
        }))
        .unwrap_err();
        match err {
            SchemaError::Compile { path, .. } => assert_eq!(path, "fields.tags/items"),
            other => panic!("Expected Compile, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_guard() {
        let mut template = json!("number");
        for _ in 0..100 {
            template = json!({ "kind": "array", "items": template });
        }
        let err = compile(template).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileError);
    }

    #[test]
    fn test_nested_names_collected() {
        let out = compile(json!({
            "name": "Line",
            "kind": "object",
            "fields": {
                "from": { "name": "Point", "kind": "object", "fields": { "x": "number" } },
                "to": { "$ref": "Point" }
            }
        }))
        .unwrap();

        let names: Vec<&str> = out.named.iter().filter_map(|s| s.name()).collect();
        assert_eq!(names, vec!["Point", "Line"]);

        let err = compile(json!({
            "name": "Dup",
            "kind": "tuple",
            "items": [{ "name": "Dup", "kind": "null" }]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileError);
    }

    #[test]
    fn test_custom_kind_params() {
        struct Prefixed;
        impl PrimitiveKind for Prefixed {
            fn name(&self) -> &str {
                "prefixed"
            }
            fn configure(&self, params: &Map<String, Value>) -> std::result::Result<Value, String> {
                match params.get("prefix") {
                    Some(Value::String(p)) => Ok(json!(p)),
                    _ => Err("`prefix` is required".to_string()),
                }
            }
            fn check(&self, params: &Value, value: &Value) -> Check {
                let prefix = params.as_str().unwrap_or_default();
                match value.as_str() {
                    Some(s) if s.starts_with(prefix) => Ok(()),
                    _ => Err(format!("expected a string starting with {}", prefix)),
                }
            }
        }

        let kinds = KindCatalog::new();
        kinds.register(Arc::new(Prefixed)).unwrap();
        let store = SchemaStore::new();

        let out = compile_with(&store, &kinds, json!({ "kind": "prefixed", "prefix": "id-" })).unwrap();
        match out.root.kind() {
            SchemaKind::Custom(custom) => {
                assert_eq!(custom.params(), &json!("id-"));
                assert!(custom.check(&json!("id-7")).is_ok());
            }
            other => panic!("Expected Custom, got {:?}", other),
        }

        let err = compile_with(&store, &kinds, json!("prefixed")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileError);
    }
}
