//! Encoder Compiler
//!
//! Canonical text for a conforming value is compact JSON with:
//! - object fields in declaration order, then (if the object admits them)
//!   undeclared fields sorted by key
//! - map entries, and objects inside `any`, literal, enum and custom values,
//!   sorted by key
//! - numbers as `serde_json::Number` prints them
//! - union values written through the first variant they conform to. Each
//!   variant is tried in place and its partial output dropped if it fails.
//!
//! Two equal conforming values therefore encode to the same bytes.

use serde_json::Value;

use super::validator::{array_within, conform, object_within};
use super::{first_variant, prepare, value_depth, Fault, PathSegment, Walk};
use crate::checksum::Checksum;
use crate::config::SchematicaConfig;
use crate::error::{Result, SchemaError};
use crate::schema::{ObjectShape, Schema, SchemaKind};
use crate::store::SchemaStore;

/// Compiled encoder for one schema
#[derive(Debug, Clone)]
pub struct Encoder {
    root: Schema,
    store: SchemaStore,
    max_depth: usize,
}

impl Encoder {
    pub fn build(root: Schema, store: &SchemaStore, config: &SchematicaConfig) -> Result<Self> {
        prepare(&root, store, config.limits.max_template_depth)?;
        let max_depth = value_depth(config)?;
        tracing::debug!(
            schema = root.name().unwrap_or("<anonymous>"),
            kind = %root.tag(),
            "built encoder"
        );
        Ok(Self {
            root,
            store: store.clone(),
            max_depth,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.root
    }

    /// Canonical text for `value`
    pub fn encode(&self, value: &Value) -> Result<String> {
        let mut out = String::new();
        self.encode_into(value, &mut out)?;
        Ok(out)
    }

    /// Append the canonical text for `value` to `out`. On error `out` is left as it was.
    pub fn encode_into(&self, value: &Value, out: &mut String) -> Result<()> {
        let mark = out.len();
        let mut walk = Walk::new(&self.store, self.max_depth);
        emit(&mut walk, &self.root, value, out).map_err(|fault| {
            out.truncate(mark);
            fault.into_error(&self.store, |path, message| SchemaError::Encode { path, message })
        })
    }

    /// SHA-256 of the canonical text, usable as a cache key
    pub fn fingerprint(&self, value: &Value) -> Result<Checksum> {
        Ok(Checksum::of_encoding(&self.encode(value)?))
    }

    pub fn into_fn(self) -> impl Fn(&Value) -> Result<String> + Send + Sync + 'static {
        move |value| self.encode(value)
    }
}

/// Write the canonical text of `value` under `schema`
pub(crate) fn emit(
    walk: &mut Walk<'_>,
    schema: &Schema,
    value: &Value,
    out: &mut String,
) -> std::result::Result<(), Fault> {
    match schema.kind() {
        SchemaKind::Object(shape) => emit_object(walk, shape, value, out),
        SchemaKind::Array(shape) => {
            let items = array_within(walk, value, shape.min_items, shape.max_items)?;
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                walk.descend(PathSegment::Index(i), |w| emit(w, &shape.items, item, out))?;
            }
            out.push(']');
            Ok(())
        }
        SchemaKind::Tuple(schemas) => {
            let items = array_within(walk, value, Some(schemas.len()), Some(schemas.len()))?;
            out.push('[');
            for (i, (item_schema, item)) in schemas.iter().zip(items).enumerate() {
                if i > 0 {
                    out.push(',');
                }
                walk.descend(PathSegment::Index(i), |w| emit(w, item_schema, item, out))?;
            }
            out.push(']');
            Ok(())
        }
        SchemaKind::Map(values) => {
            let entries = object_within(walk, value, "map")?;
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(walk, key, out)?;
                out.push(':');
                walk.descend(PathSegment::Key(key.clone()), |w| {
                    emit(w, values, &entries[key.as_str()], out)
                })?;
            }
            out.push('}');
            Ok(())
        }
        SchemaKind::Union(variants) => {
            let mark = out.len();
            first_variant(walk, variants, |w, variant| {
                emit(w, variant, value, out).map_err(|fault| {
                    out.truncate(mark);
                    fault
                })
            })
        }
        SchemaKind::Ref(name) => walk.follow(name, |w, target| emit(w, target, value, out)),
        _ => {
            conform(walk, schema, value)?;
            write_canonical(walk, value, out)
        }
    }
}

fn emit_object(
    walk: &mut Walk<'_>,
    shape: &ObjectShape,
    value: &Value,
    out: &mut String,
) -> std::result::Result<(), Fault> {
    let object = object_within(walk, value, "object")?;

    let mut extras: Vec<&String> = object.keys().filter(|key| shape.field(key).is_none()).collect();
    if let (false, Some(extra)) = (shape.additional_fields, extras.first()) {
        return Err(walk.mismatch(format!("unexpected field `{}`", extra)));
    }
    extras.sort();

    out.push('{');
    let mut first = true;
    for field in &shape.fields {
        let Some(field_value) = object.get(&field.name) else {
            if field.required {
                return Err(walk.mismatch(format!("missing required field `{}`", field.name)));
            }
            continue;
        };
        if !std::mem::take(&mut first) {
            out.push(',');
        }
        write_string(walk, &field.name, out)?;
        out.push(':');
        walk.descend(PathSegment::Field(field.name.clone()), |w| {
            emit(w, &field.schema, field_value, out)
        })?;
    }
    for key in extras {
        if !std::mem::take(&mut first) {
            out.push(',');
        }
        write_string(walk, key, out)?;
        out.push(':');
        walk.descend(PathSegment::Field(key.clone()), |w| {
            let extra = &object[key.as_str()];
            w.bounded(extra)?;
            write_canonical(w, extra, out)
        })?;
    }
    out.push('}');
    Ok(())
}

/// Schema-free canonical JSON: compact, object keys sorted.
/// The caller has already checked `value` with [`Walk::bounded`].
pub(crate) fn write_canonical(
    walk: &mut Walk<'_>,
    value: &Value,
    out: &mut String,
) -> std::result::Result<(), Fault> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(walk, s, out)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                walk.descend(PathSegment::Index(i), |w| write_canonical(w, item, out))?;
            }
            out.push(']');
        }
        Value::Object(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(walk, key, out)?;
                out.push(':');
                walk.descend(PathSegment::Key(key.clone()), |w| {
                    write_canonical(w, &entries[key.as_str()], out)
                })?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_string(walk: &Walk<'_>, s: &str, out: &mut String) -> std::result::Result<(), Fault> {
    let quoted = serde_json::to_string(s).map_err(|e| walk.mismatch(e.to_string()))?;
    out.push_str(&quoted);
    Ok(())
}
