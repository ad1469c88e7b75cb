//! Compiler Backends
//!
//! Turns a [`Schema`] into executable artifacts: [`Validator`], [`Encoder`]
//! and [`Decoder`]. All three hold the root schema plus a handle to the ref
//! store and share the traversal state defined here:
//!
//! - an instance path (`.field`, `[3]`, `{key}`) for error messages
//! - a bound on container nesting, the same for every backend and never more
//!   than `serde_json` parses
//! - call-time resolution of `Ref` nodes. Refs followed since the last step
//!   into the value are remembered; following one of them again would loop
//!   without consuming input, so that branch fails instead.

pub mod decoder;
pub mod encoder;
pub mod validator;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use validator::{Validator, Violation};

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::config::{SchematicaConfig, MAX_VALUE_DEPTH};
use crate::error::{Result, SchemaError};
use crate::schema::{Schema, SchemaKind};
use crate::store::SchemaStore;

/// A step from a value into one of its parts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PathSegment {
    /// A declared object field
    Field(String),
    /// An array or tuple position
    Index(usize),
    /// A map entry
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{}", name),
            Self::Index(i) => write!(f, "[{}]", i),
            Self::Key(key) => write!(f, "{{{}}}", key),
        }
    }
}

/// Format an instance path as a string
pub fn format_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return String::from("<root>");
    }
    path.iter().map(|s| s.to_string()).collect::<String>()
}

/// Why a traversal stopped
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fault {
    /// The value does not fit the schema
    Mismatch { path: String, message: String },
    /// A ref names a schema that is not in the store
    UnknownRef { path: String, name: String },
}

impl Fault {
    /// Convert to a public error; mismatches become `wrap(path, message)`
    pub(crate) fn into_error(
        self,
        store: &SchemaStore,
        wrap: fn(String, String) -> SchemaError,
    ) -> SchemaError {
        match self {
            Fault::Mismatch { path, message } => wrap(path, message),
            Fault::UnknownRef { name, .. } => SchemaError::UnknownRef {
                suggestion: store.suggest(&name),
                name,
            },
        }
    }

    pub(crate) fn message(&self) -> String {
        match self {
            Fault::Mismatch { path, message } => format!("{}: {}", path, message),
            Fault::UnknownRef { path, name } => format!("{}: unknown schema ref `{}`", path, name),
        }
    }
}

/// Traversal state for one call of a compiled artifact
pub(crate) struct Walk<'s> {
    store: &'s SchemaStore,
    max_depth: usize,
    path: Vec<PathSegment>,
    /// Refs followed since the last descent into the value
    pending: Vec<String>,
    /// Collect per-variant reasons when a union fails
    explain: bool,
}

impl<'s> Walk<'s> {
    pub(crate) fn new(store: &'s SchemaStore, max_depth: usize) -> Self {
        Self {
            store,
            max_depth,
            path: Vec::new(),
            pending: Vec::new(),
            explain: true,
        }
    }

    /// A walk whose caller only needs to know whether it failed
    pub(crate) fn terse(mut self) -> Self {
        self.explain = false;
        self
    }

    pub(crate) fn path(&self) -> String {
        format_path(&self.path)
    }

    pub(crate) fn mismatch(&self, message: impl Into<String>) -> Fault {
        Fault::Mismatch {
            path: self.path(),
            message: message.into(),
        }
    }

    fn too_deep(&self) -> Fault {
        self.mismatch(format!("value nesting exceeds {} levels", self.max_depth))
    }

    /// Check that one more container fits at the current position.
    /// A container at path length `n` is nested `n + 1` deep.
    pub(crate) fn enter(&self) -> std::result::Result<(), Fault> {
        if self.path.len() >= self.max_depth {
            return Err(self.too_deep());
        }
        Ok(())
    }

    /// Check that a schema-free value fits below the current position
    pub(crate) fn bounded(&self, value: &Value) -> std::result::Result<(), Fault> {
        if nests_deeper(value, self.max_depth.saturating_sub(self.path.len())) {
            return Err(self.too_deep());
        }
        Ok(())
    }

    /// Step into a part of the value. Callers check nesting with
    /// [`enter`](Self::enter) or [`bounded`](Self::bounded) first.
    pub(crate) fn descend<T>(
        &mut self,
        segment: PathSegment,
        f: impl FnOnce(&mut Self) -> std::result::Result<T, Fault>,
    ) -> std::result::Result<T, Fault> {
        let pending = std::mem::take(&mut self.pending);
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        self.pending = pending;
        out
    }

    /// Resolve `name` in the store and continue with the target schema
    pub(crate) fn follow<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self, &Schema) -> std::result::Result<T, Fault>,
    ) -> std::result::Result<T, Fault> {
        if self.pending.iter().any(|n| n == name) {
            return Err(self.mismatch(format!(
                "reference cycle through `{}` consumes no input",
                name
            )));
        }
        let Some(target) = self.store.get(name) else {
            return Err(Fault::UnknownRef {
                path: self.path(),
                name: name.to_string(),
            });
        };
        tracing::trace!(schema = %name, path = %self.path(), "resolved ref");

        self.pending.push(name.to_string());
        let out = f(self, &target);
        self.pending.pop();
        out
    }
}

/// Does `value` hold containers nested more than `budget` deep?
fn nests_deeper(value: &Value, budget: usize) -> bool {
    match value {
        Value::Array(items) => budget == 0 || items.iter().any(|v| nests_deeper(v, budget - 1)),
        Value::Object(entries) => {
            budget == 0 || entries.values().any(|v| nests_deeper(v, budget - 1))
        }
        _ => false,
    }
}

/// Try `variants` in order and keep the first that `attempt` accepts.
///
/// If none fits and some variant hit an unresolvable ref, that ref is
/// reported, since the schema rather than the value is at fault.
pub(crate) fn first_variant<T>(
    walk: &mut Walk<'_>,
    variants: &[Schema],
    mut attempt: impl FnMut(&mut Walk<'_>, &Schema) -> std::result::Result<T, Fault>,
) -> std::result::Result<T, Fault> {
    let mut failures = Vec::new();
    let mut unknown = None;
    for variant in variants {
        match attempt(walk, variant) {
            Ok(out) => return Ok(out),
            Err(fault @ Fault::UnknownRef { .. }) if unknown.is_none() => unknown = Some(fault),
            Err(fault) if walk.explain => failures.push(fault),
            Err(_) => {}
        }
    }
    if let Some(fault) = unknown {
        return Err(fault);
    }
    if !walk.explain {
        return Err(walk.mismatch("matches no union variant"));
    }
    let reasons: Vec<String> = failures
        .iter()
        .enumerate()
        .map(|(i, fault)| format!("[{}] {}", i, fault.message()))
        .collect();
    Err(walk.mismatch(format!("matches no union variant ({})", reasons.join("; "))))
}

/// The configured value depth, if a decoder could honour it
pub(crate) fn value_depth(config: &SchematicaConfig) -> Result<usize> {
    match config.limits.max_value_depth {
        depth @ 1..=MAX_VALUE_DEPTH => Ok(depth),
        depth => Err(SchemaError::InvalidArgs(format!(
            "limits.max_value_depth must be between 1 and {}, got {}",
            MAX_VALUE_DEPTH, depth
        ))),
    }
}

/// Build-time checks shared by every backend.
///
/// The root's alias chain (`ref` → `ref` → …) is resolved now: a missing name
/// there is `UnknownRef` and a loop is `CompileError`. Refs anywhere else stay
/// lazy. The concrete root is then inspected for structural problems that
/// hand-built entities can carry.
pub(crate) fn prepare(root: &Schema, store: &SchemaStore, max_depth: usize) -> Result<()> {
    let mut chain: Vec<String> = Vec::new();
    let mut current = root.clone();
    while let Some(name) = current.ref_name().map(str::to_string) {
        if chain.contains(&name) {
            chain.push(name);
            return Err(SchemaError::compile(
                "<root>",
                format!("reference cycle consumes no input: {}", chain.join(" -> ")),
            ));
        }
        current = store.resolve(&name)?;
        chain.push(name);
    }

    let mut path = Vec::new();
    inspect(&current, &mut path, max_depth)
}

fn inspect(schema: &Schema, path: &mut Vec<String>, max_depth: usize) -> Result<()> {
    fn error(path: &[String], message: String) -> SchemaError {
        let at = if path.is_empty() {
            String::from("<root>")
        } else {
            path.join("/")
        };
        SchemaError::compile(at, message)
    }

    if path.len() > max_depth {
        return Err(error(path, format!("schema nesting exceeds {} levels", max_depth)));
    }

    match schema.kind() {
        SchemaKind::String(rules) => {
            if let Some(problem) = rules.bounds_error() {
                return Err(error(path, problem));
            }
        }
        SchemaKind::Number(rules) => {
            if let Some(problem) = rules.bounds_error() {
                return Err(error(path, problem));
            }
        }
        SchemaKind::Integer(rules) => {
            if let Some(problem) = rules.bounds_error() {
                return Err(error(path, problem));
            }
        }
        SchemaKind::Enum(values) if values.is_empty() => {
            return Err(error(path, "enum has no values".to_string()));
        }
        SchemaKind::Union(variants) if variants.is_empty() => {
            return Err(error(path, "union has no variants".to_string()));
        }
        SchemaKind::Object(shape) => {
            for (i, field) in shape.fields.iter().enumerate() {
                if shape.fields[..i].iter().any(|f| f.name == field.name) {
                    return Err(error(path, format!("field `{}` is declared twice", field.name)));
                }
            }
        }
        SchemaKind::Array(shape) => {
            if let (Some(min), Some(max)) = (shape.min_items, shape.max_items) {
                if min > max {
                    return Err(error(
                        path,
                        format!("min_items {} is greater than max_items {}", min, max),
                    ));
                }
            }
        }
        _ => {}
    }

    for (i, child) in schema.children().into_iter().enumerate() {
        path.push(format!("{}[{}]", schema.tag(), i));
        let result = inspect(child, path, max_depth);
        path.pop();
        result?;
    }
    Ok(())
}
