//! Validator Compiler
//!
//! Builds a predicate from a schema. Invalid data is never an error here: the
//! predicate answers `false`, and [`Validator::check`] says where and why.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::{first_variant, prepare, value_depth, Fault, PathSegment, Walk};
use crate::config::SchematicaConfig;
use crate::error::Result;
use crate::kinds::json_type;
use crate::schema::{ObjectShape, Schema, SchemaKind};
use crate::store::SchemaStore;

/// Where and why a value failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Instance path to the offending part of the value
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path == "<root>" {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Compiled validator for one schema. Cheap to clone and safe to share.
#[derive(Debug, Clone)]
pub struct Validator {
    root: Schema,
    store: SchemaStore,
    max_depth: usize,
}

impl Validator {
    pub fn build(root: Schema, store: &SchemaStore, config: &SchematicaConfig) -> Result<Self> {
        prepare(&root, store, config.limits.max_template_depth)?;
        let max_depth = value_depth(config)?;
        tracing::debug!(
            schema = root.name().unwrap_or("<anonymous>"),
            kind = %root.tag(),
            "built validator"
        );
        Ok(Self {
            root,
            store: store.clone(),
            max_depth,
        })
    }

    /// The schema this validator was built from
    pub fn schema(&self) -> &Schema {
        &self.root
    }

    /// Does `value` conform?
    pub fn validate(&self, value: &Value) -> bool {
        self.run(Walk::new(&self.store, self.max_depth).terse(), value)
            .is_ok()
    }

    /// Like [`validate`](Self::validate), reporting the first violation
    pub fn check(&self, value: &Value) -> std::result::Result<(), Violation> {
        self.run(Walk::new(&self.store, self.max_depth), value)
    }

    fn run(&self, mut walk: Walk<'_>, value: &Value) -> std::result::Result<(), Violation> {
        conform(&mut walk, &self.root, value).map_err(|fault| match fault {
            Fault::Mismatch { path, message } => Violation { path, message },
            Fault::UnknownRef { path, name } => {
                tracing::warn!(schema = %name, path = %path, "unresolved reference during validation");
                Violation {
                    path,
                    message: format!("unknown schema ref `{}`", name),
                }
            }
        })
    }

    /// The predicate as a plain closure
    pub fn into_fn(self) -> impl Fn(&Value) -> bool + Send + Sync + 'static {
        move |value| self.validate(value)
    }
}

/// Check `value` against `schema`, stopping at the first problem
pub(crate) fn conform(walk: &mut Walk<'_>, schema: &Schema, value: &Value) -> std::result::Result<(), Fault> {
    match schema.kind() {
        SchemaKind::String(rules) => rules.check(value).map_err(|m| walk.mismatch(m)),
        SchemaKind::Number(rules) => rules.check(value).map_err(|m| walk.mismatch(m)),
        SchemaKind::Integer(rules) => rules.check(value).map_err(|m| walk.mismatch(m)),
        SchemaKind::Custom(custom) => {
            walk.bounded(value)?;
            custom.check(value).map_err(|m| walk.mismatch(m))
        }
        SchemaKind::Boolean => expect_type(walk, value, value.is_boolean(), "boolean"),
        SchemaKind::Null => expect_type(walk, value, value.is_null(), "null"),
        SchemaKind::Any => walk.bounded(value),
        SchemaKind::Literal(expected) => {
            walk.bounded(value)?;
            if value == expected {
                Ok(())
            } else {
                Err(walk.mismatch(format!("expected literal {}, found {}", expected, value)))
            }
        }
        SchemaKind::Enum(values) => {
            walk.bounded(value)?;
            if values.contains(value) {
                Ok(())
            } else {
                Err(walk.mismatch(format!("{} is not one of the enumerated values", value)))
            }
        }
        SchemaKind::Object(shape) => conform_object(walk, shape, value),
        SchemaKind::Array(shape) => {
            let items = array_within(walk, value, shape.min_items, shape.max_items)?;
            for (i, item) in items.iter().enumerate() {
                walk.descend(PathSegment::Index(i), |w| conform(w, &shape.items, item))?;
            }
            Ok(())
        }
        SchemaKind::Tuple(schemas) => {
            let items = array_within(walk, value, Some(schemas.len()), Some(schemas.len()))?;
            for (i, (item_schema, item)) in schemas.iter().zip(items).enumerate() {
                walk.descend(PathSegment::Index(i), |w| conform(w, item_schema, item))?;
            }
            Ok(())
        }
        SchemaKind::Map(values) => {
            let entries = object_within(walk, value, "map")?;
            for (key, entry) in entries {
                walk.descend(PathSegment::Key(key.clone()), |w| conform(w, values, entry))?;
            }
            Ok(())
        }
        SchemaKind::Union(variants) => {
            first_variant(walk, variants, |w, variant| conform(w, variant, value))
        }
        SchemaKind::Ref(name) => walk.follow(name, |w, target| conform(w, target, value)),
    }
}

fn conform_object(walk: &mut Walk<'_>, shape: &ObjectShape, value: &Value) -> std::result::Result<(), Fault> {
    let object = object_within(walk, value, "object")?;

    for field in &shape.fields {
        match object.get(&field.name) {
            Some(field_value) => walk.descend(PathSegment::Field(field.name.clone()), |w| {
                conform(w, &field.schema, field_value)
            })?,
            None if field.required => {
                return Err(walk.mismatch(format!("missing required field `{}`", field.name)));
            }
            None => {}
        }
    }

    for (key, extra) in object.iter().filter(|(key, _)| shape.field(key).is_none()) {
        if !shape.additional_fields {
            return Err(walk.mismatch(format!("unexpected field `{}`", key)));
        }
        walk.descend(PathSegment::Field(key.clone()), |w| w.bounded(extra))?;
    }
    Ok(())
}

fn expect_type(walk: &Walk<'_>, value: &Value, ok: bool, expected: &str) -> std::result::Result<(), Fault> {
    if ok {
        Ok(())
    } else {
        Err(walk.mismatch(format!("expected {}, found {}", expected, json_type(value))))
    }
}

/// The value as an array whose length is within bounds
pub(crate) fn array_within<'v>(
    walk: &Walk<'_>,
    value: &'v Value,
    min: Option<usize>,
    max: Option<usize>,
) -> std::result::Result<&'v Vec<Value>, Fault> {
    let Some(items) = value.as_array() else {
        return Err(walk.mismatch(format!("expected array, found {}", json_type(value))));
    };
    walk.enter()?;
    if let Some(min) = min {
        if items.len() < min {
            return Err(walk.mismatch(format!("{} items, expected at least {}", items.len(), min)));
        }
    }
    if let Some(max) = max {
        if items.len() > max {
            return Err(walk.mismatch(format!("{} items, expected at most {}", items.len(), max)));
        }
    }
    Ok(items)
}

/// The value as an object, with room for one more level of nesting
pub(crate) fn object_within<'v>(
    walk: &Walk<'_>,
    value: &'v Value,
    what: &str,
) -> std::result::Result<&'v serde_json::Map<String, Value>, Fault> {
    let Some(object) = value.as_object() else {
        return Err(walk.mismatch(format!("expected {}, found {}", what, json_type(value))));
    };
    walk.enter()?;
    Ok(object)
}
