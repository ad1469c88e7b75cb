//! Schema entities
//!
//! The compiled, immutable representation of a schema: a kind tag, an optional
//! name and the kind's children and constraints. Entities are shared through
//! `Arc` and never change after construction. Named references (`SchemaKind::Ref`)
//! hold only the target name and are resolved when a compiled artifact
//! traverses them.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::kinds::{CustomKind, IntegerRules, NumberRules, StringRules};

/// Kind of a schema node and its kind-specific payload
#[derive(Debug, Clone)]
pub enum SchemaKind {
    String(StringRules),
    Number(NumberRules),
    Integer(IntegerRules),
    Boolean,
    Null,
    /// Any JSON value
    Any,
    /// Exactly this value
    Literal(Value),
    /// One of these values
    Enum(Vec<Value>),
    Object(ObjectShape),
    Array(ArrayShape),
    /// Fixed-length array, one schema per position
    Tuple(Vec<Schema>),
    /// String-keyed map with uniform values
    Map(Schema),
    /// First conforming variant wins
    Union(Vec<Schema>),
    /// Named indirection, resolved at traversal time
    Ref(String),
    Custom(CustomKind),
}

impl SchemaKind {
    /// Tag as it appears in templates
    pub fn tag(&self) -> &str {
        match self {
            SchemaKind::String(_) => "string",
            SchemaKind::Number(_) => "number",
            SchemaKind::Integer(_) => "integer",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Null => "null",
            SchemaKind::Any => "any",
            SchemaKind::Literal(_) => "literal",
            SchemaKind::Enum(_) => "enum",
            SchemaKind::Object(_) => "object",
            SchemaKind::Array(_) => "array",
            SchemaKind::Tuple(_) => "tuple",
            SchemaKind::Map(_) => "map",
            SchemaKind::Union(_) => "union",
            SchemaKind::Ref(_) => "ref",
            SchemaKind::Custom(custom) => custom.name(),
        }
    }
}

/// A field of an object schema
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
        }
    }
}

/// Fields of an object schema, in declaration order
#[derive(Debug, Clone)]
pub struct ObjectShape {
    pub fields: Vec<Field>,
    /// Accept (and round-trip) keys that are not declared
    pub additional_fields: bool,
}

impl ObjectShape {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            additional_fields: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Element schema and length bounds of an array schema
#[derive(Debug, Clone)]
pub struct ArrayShape {
    pub items: Schema,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl ArrayShape {
    pub fn new(items: Schema) -> Self {
        Self {
            items,
            min_items: None,
            max_items: None,
        }
    }
}

#[derive(Debug)]
struct SchemaEntity {
    name: Option<String>,
    kind: SchemaKind,
}

/// A compiled schema node. Clones share one immutable entity.
#[derive(Clone)]
pub struct Schema(Arc<SchemaEntity>);

impl Schema {
    /// Create an anonymous schema
    pub fn new(kind: SchemaKind) -> Self {
        Self(Arc::new(SchemaEntity { name: None, kind }))
    }

    /// Create a named schema. The name is checked when the schema is registered.
    pub fn named(name: impl Into<String>, kind: SchemaKind) -> Self {
        Self(Arc::new(SchemaEntity {
            name: Some(name.into()),
            kind,
        }))
    }

    pub fn string() -> Self {
        Self::new(SchemaKind::String(StringRules::default()))
    }

    pub fn number() -> Self {
        Self::new(SchemaKind::Number(NumberRules::default()))
    }

    pub fn integer() -> Self {
        Self::new(SchemaKind::Integer(IntegerRules::default()))
    }

    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    /// Reference to a named schema
    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(SchemaKind::Ref(name.into()))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.0.kind
    }

    pub fn tag(&self) -> &str {
        self.0.kind.tag()
    }

    /// Do both handles point at the same entity?
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Target name if this node is a reference
    pub fn ref_name(&self) -> Option<&str> {
        match &self.0.kind {
            SchemaKind::Ref(name) => Some(name),
            _ => None,
        }
    }

    /// Direct child schemas, in declaration order
    pub fn children(&self) -> Vec<&Schema> {
        match &self.0.kind {
            SchemaKind::Object(shape) => shape.fields.iter().map(|f| &f.schema).collect(),
            SchemaKind::Array(shape) => vec![&shape.items],
            SchemaKind::Tuple(items) | SchemaKind::Union(items) => items.iter().collect(),
            SchemaKind::Map(values) => vec![values],
            _ => Vec::new(),
        }
    }

    /// Names this schema depends on: every ref in its body, plus nested named
    /// schemas (whose own bodies are not descended into). Sorted, deduplicated.
    pub fn dependencies(&self) -> Vec<String> {
        fn collect(schema: &Schema, out: &mut Vec<String>) {
            for child in schema.children() {
                if let Some(name) = child.name() {
                    out.push(name.to_string());
                } else if let Some(target) = child.ref_name() {
                    out.push(target.to_string());
                } else {
                    collect(child, out);
                }
            }
        }

        let mut out = Vec::new();
        match self.ref_name() {
            Some(target) => out.push(target.to_string()),
            None => collect(self, &mut out),
        }
        out.sort();
        out.dedup();
        out
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
