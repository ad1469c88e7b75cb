//! Schema templates and registry call arguments
//!
//! A template is caller-authored JSON describing a shape; the factory compiles
//! it into a [`Schema`]. The registry API takes explicit sum types where a
//! caller may pass either a built entity or a template, or either an entity or
//! a name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::schema::Schema;

/// Declarative description of a shape. Never mutated by the registry.
///
/// ```json
/// { "name": "Point", "kind": "object", "fields": { "x": "number", "y": "number" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaTemplate(Value);

impl SchemaTemplate {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a template from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| SchemaError::compile("<root>", format!("template is not valid JSON: {}", e)))
    }

    /// Parse JSON text holding either one template or an array of templates
    pub fn many_from_json_str(text: &str) -> Result<Vec<Self>> {
        match Self::from_json_str(text)?.0 {
            Value::Array(items) => Ok(items.into_iter().map(Self).collect()),
            single => Ok(vec![Self(single)]),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Declared name of the root, if any
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }
}

impl From<Value> for SchemaTemplate {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Argument to `add_schema`: a built entity (registered as-is) or a template
#[derive(Debug, Clone)]
pub enum SchemaInput {
    Schema(Schema),
    Template(SchemaTemplate),
}

impl From<Schema> for SchemaInput {
    fn from(schema: Schema) -> Self {
        SchemaInput::Schema(schema)
    }
}

impl From<&Schema> for SchemaInput {
    fn from(schema: &Schema) -> Self {
        SchemaInput::Schema(schema.clone())
    }
}

impl From<SchemaTemplate> for SchemaInput {
    fn from(template: SchemaTemplate) -> Self {
        SchemaInput::Template(template)
    }
}

impl From<Value> for SchemaInput {
    fn from(value: Value) -> Self {
        SchemaInput::Template(SchemaTemplate(value))
    }
}

/// Argument to the `build_*` operations: a registered name or an entity
#[derive(Debug, Clone)]
pub enum SchemaSelector {
    Name(String),
    Schema(Schema),
}

impl From<&str> for SchemaSelector {
    fn from(name: &str) -> Self {
        SchemaSelector::Name(name.to_string())
    }
}

impl From<String> for SchemaSelector {
    fn from(name: String) -> Self {
        SchemaSelector::Name(name)
    }
}

impl From<Schema> for SchemaSelector {
    fn from(schema: Schema) -> Self {
        SchemaSelector::Schema(schema)
    }
}

impl From<&Schema> for SchemaSelector {
    fn from(schema: &Schema) -> Self {
        SchemaSelector::Schema(schema.clone())
    }
}

/// Dynamic callers pass JSON: a string selects by name, anything else is rejected
impl TryFrom<&Value> for SchemaSelector {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(SchemaSelector::Name(name.clone())),
            other => Err(SchemaError::InvalidArgs(format!(
                "expected a schema name or schema, got {}",
                other
            ))),
        }
    }
}

impl TryFrom<Value> for SchemaSelector {
    type Error = SchemaError;

    fn try_from(value: Value) -> Result<Self> {
        SchemaSelector::try_from(&value)
    }
}
