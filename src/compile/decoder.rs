//! Decoder Compiler
//!
//! Inverse of the encoder: parses text and returns the value if it conforms.
//! For every conforming value `v`, `decode(encode(v)) == v`.

use serde_json::Value;

use super::encoder::emit;
use super::validator::conform;
use super::{prepare, value_depth, Walk};
use crate::config::SchematicaConfig;
use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::store::SchemaStore;

/// Compiled decoder for one schema
#[derive(Debug, Clone)]
pub struct Decoder {
    root: Schema,
    store: SchemaStore,
    max_depth: usize,
    require_canonical: bool,
}

fn decode_error(path: String, message: String) -> SchemaError {
    SchemaError::Decode { path, message }
}

impl Decoder {
    pub fn build(root: Schema, store: &SchemaStore, config: &SchematicaConfig) -> Result<Self> {
        prepare(&root, store, config.limits.max_template_depth)?;
        let max_depth = value_depth(config)?;
        tracing::debug!(
            schema = root.name().unwrap_or("<anonymous>"),
            kind = %root.tag(),
            require_canonical = config.decoder.require_canonical,
            "built decoder"
        );
        Ok(Self {
            root,
            store: store.clone(),
            max_depth,
            require_canonical: config.decoder.require_canonical,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.root
    }

    /// Parse `text` and check it against the schema
    pub fn decode(&self, text: &str) -> Result<Value> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| decode_error("<root>".to_string(), format!("malformed input: {}", e)))?;

        let mut walk = Walk::new(&self.store, self.max_depth);
        conform(&mut walk, &self.root, &value)
            .map_err(|fault| fault.into_error(&self.store, decode_error))?;

        if self.require_canonical {
            let mut canonical = String::with_capacity(text.len());
            let mut walk = Walk::new(&self.store, self.max_depth);
            emit(&mut walk, &self.root, &value, &mut canonical)
                .map_err(|fault| fault.into_error(&self.store, decode_error))?;
            if canonical != text {
                return Err(decode_error(
                    "<root>".to_string(),
                    "input is not in canonical form".to_string(),
                ));
            }
        }
        Ok(value)
    }

    /// Like [`decode`](Self::decode), for raw bytes (must be UTF-8)
    pub fn decode_slice(&self, bytes: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| decode_error("<root>".to_string(), format!("malformed input: {}", e)))?;
        self.decode(text)
    }

    pub fn into_fn(self) -> impl Fn(&str) -> Result<Value> + Send + Sync + 'static {
        move |text| self.decode(text)
    }
}
