//! Primitive Kinds
//!
//! Constraint checking for leaf schema kinds. Built-in kinds carry typed rules
//! that the factory compiles once per template node. Anything else plugs in
//! through [`PrimitiveKind`] and is registered on a [`KindCatalog`].

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, SchemaError};

/// Outcome of a leaf check: `Err` carries a human-readable reason
pub type Check = std::result::Result<(), String>;

/// Kind names reserved by the template grammar
pub const BUILTIN_KINDS: &[&str] = &[
    "string", "number", "integer", "boolean", "null", "any", "literal", "enum", "object", "array",
    "tuple", "map", "union", "ref",
];

/// Is `name` one of the built-in kinds?
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_KINDS.contains(&name)
}

/// JSON type name of a value, for messages
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Built-in rules
// =============================================================================

/// Constraints for the `string` kind. Lengths count Unicode scalar values.
#[derive(Debug, Clone, Default)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
}

impl StringRules {
    pub fn check(&self, value: &Value) -> Check {
        let Some(s) = value.as_str() else {
            return Err(format!("expected string, found {}", json_type(value)));
        };
        let len = s.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                return Err(format!("string length {} is below minimum {}", len, min));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(format!("string length {} exceeds maximum {}", len, max));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(s) {
                return Err(format!("string does not match pattern /{}/", pattern.as_str()));
            }
        }
        Ok(())
    }

    pub(crate) fn bounds_error(&self) -> Option<String> {
        match (self.min_length, self.max_length) {
            (Some(min), Some(max)) if min > max => {
                Some(format!("min_length {} is greater than max_length {}", min, max))
            }
            _ => None,
        }
    }
}

/// Constraints for the `number` kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberRules {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
}

impl NumberRules {
    pub fn check(&self, value: &Value) -> Check {
        let Some(n) = value.as_f64() else {
            return Err(format!("expected number, found {}", json_type(value)));
        };
        if let Some(min) = self.minimum {
            if n < min {
                return Err(format!("{} is below minimum {}", n, min));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                return Err(format!("{} exceeds maximum {}", n, max));
            }
        }
        if let Some(min) = self.exclusive_minimum {
            if n <= min {
                return Err(format!("{} is not greater than {}", n, min));
            }
        }
        if let Some(max) = self.exclusive_maximum {
            if n >= max {
                return Err(format!("{} is not less than {}", n, max));
            }
        }
        Ok(())
    }

    pub(crate) fn bounds_error(&self) -> Option<String> {
        match (self.minimum, self.maximum) {
            (Some(min), Some(max)) if min > max => {
                Some(format!("minimum {} is greater than maximum {}", min, max))
            }
            _ => None,
        }
    }
}

/// Constraints for the `integer` kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegerRules {
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl IntegerRules {
    pub fn check(&self, value: &Value) -> Check {
        let Value::Number(n) = value else {
            return Err(format!("expected integer, found {}", json_type(value)));
        };
        // u64 values above i64::MAX are integers too, just larger than any i64 bound
        let (signed, above_i64) = match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => (i, false),
            (None, Some(_)) => (i64::MAX, true),
            (None, None) => return Err(format!("expected integer, found {}", n)),
        };
        if let Some(min) = self.minimum {
            if !above_i64 && signed < min {
                return Err(format!("{} is below minimum {}", n, min));
            }
        }
        if let Some(max) = self.maximum {
            if above_i64 || signed > max {
                return Err(format!("{} exceeds maximum {}", n, max));
            }
        }
        Ok(())
    }

    pub(crate) fn bounds_error(&self) -> Option<String> {
        match (self.minimum, self.maximum) {
            (Some(min), Some(max)) if min > max => {
                Some(format!("minimum {} is greater than maximum {}", min, max))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Custom kinds
// =============================================================================

/// A leaf kind supplied by the caller.
///
/// `configure` runs once when a template using the kind is compiled and may
/// reject or normalize the template's parameters. `check` runs on every value.
/// Values of custom kinds are encoded as canonical JSON.
pub trait PrimitiveKind: Send + Sync {
    /// Kind name as it appears in templates
    fn name(&self) -> &str;

    /// Validate and normalize the template parameters (every key except `kind` and `name`)
    fn configure(&self, params: &Map<String, Value>) -> std::result::Result<Value, String> {
        Ok(Value::Object(params.clone()))
    }

    /// Check a value against the configured parameters
    fn check(&self, params: &Value, value: &Value) -> Check;
}

/// A custom kind bound to its configured parameters
#[derive(Clone)]
pub struct CustomKind {
    kind: Arc<dyn PrimitiveKind>,
    params: Value,
}

impl CustomKind {
    pub fn new(kind: Arc<dyn PrimitiveKind>, params: Value) -> Self {
        Self { kind, params }
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn check(&self, value: &Value) -> Check {
        self.kind.check(&self.params, value)
    }
}

impl fmt::Debug for CustomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomKind")
            .field("name", &self.kind.name())
            .field("params", &self.params)
            .finish()
    }
}

/// Append-only catalog of custom kinds, shared by a registry and its factory
#[derive(Clone, Default)]
pub struct KindCatalog {
    custom: Arc<RwLock<HashMap<String, Arc<dyn PrimitiveKind>>>>,
}

impl KindCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom kind. Built-in names cannot be shadowed and a name is bound once.
    pub fn register(&self, kind: Arc<dyn PrimitiveKind>) -> Result<()> {
        let name = kind.name().to_string();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(SchemaError::InvalidArgs(format!(
                "kind name {:?} must be non-empty and contain no whitespace",
                name
            )));
        }
        if is_builtin(&name) {
            return Err(SchemaError::InvalidArgs(format!(
                "kind `{}` is built in and cannot be replaced",
                name
            )));
        }

        let mut custom = self.custom.write().unwrap_or_else(PoisonError::into_inner);
        if custom.contains_key(&name) {
            return Err(SchemaError::ImmutabilityViolation {
                name: format!("kind `{}`", name),
            });
        }
        tracing::debug!(kind = %name, "registered custom kind");
        custom.insert(name, kind);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PrimitiveKind>> {
        self.custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Custom kind names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for KindCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindCatalog")
            .field("custom", &self.names())
            .finish()
    }
}
