//! Schema ref store
//!
//! Append-only mapping from name to [`Schema`]. The registry owns it; compiled
//! artifacts keep a handle to it so that references are looked up when they
//! are traversed. Bindings are never replaced or removed, so a reader can
//! never observe a published schema change.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use crate::error::{Result, SchemaError};
use crate::schema::Schema;

/// Check the naming rule: non-empty, no whitespace
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SchemaError::InvalidSchemaRef {
            name: name.to_string(),
            reason: "Schema names cannot be empty".to_string(),
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(SchemaError::InvalidSchemaRef {
            name: name.to_string(),
            reason: "Schema names cannot contain whitespace".to_string(),
        });
    }
    Ok(())
}

/// Shared, append-only name → schema map
#[derive(Clone, Default)]
pub struct SchemaStore {
    entries: Arc<RwLock<HashMap<String, Schema>>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Schema>> {
        // Bindings are immutable once inserted, so a poisoned lock still holds a consistent map
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<Schema> {
        self.read().get(name).cloned()
    }

    /// Look up a name, failing with `UnknownRef` (plus a suggestion) if unbound
    pub fn resolve(&self, name: &str) -> Result<Schema> {
        self.get(name).ok_or_else(|| SchemaError::UnknownRef {
            name: name.to_string(),
            suggestion: self.suggest(name),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Bound names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every binding, sorted by name
    pub fn entries(&self) -> Vec<(String, Schema)> {
        let mut entries: Vec<(String, Schema)> = self
            .read()
            .iter()
            .map(|(name, schema)| (name.clone(), schema.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Closest bound name to `query` (fuzzy)
    pub fn suggest(&self, query: &str) -> Option<String> {
        let matcher = SkimMatcherV2::default();
        self.read()
            .keys()
            .filter_map(|name| matcher.fuzzy_match(name, query).map(|score| (score, name)))
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, name)| name.clone())
    }

    /// Bind every named schema in `schemas`, all or nothing.
    ///
    /// Names are checked before the lock is taken; rebinding conflicts are
    /// checked under the write lock, so concurrent publishers are serialized
    /// and a failed call leaves the store untouched. Re-publishing the same
    /// entity under its bound name is a no-op. Returns the number of new bindings.
    pub fn publish(&self, schemas: &[Schema]) -> Result<usize> {
        for schema in schemas {
            if let Some(name) = schema.name() {
                validate_name(name)?;
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let mut staged: Vec<(&str, &Schema)> = Vec::new();
        for schema in schemas {
            let Some(name) = schema.name() else {
                continue;
            };
            let same_entity = entries
                .get(name)
                .or_else(|| staged.iter().find(|(n, _)| *n == name).map(|(_, s)| *s))
                .map(|existing| existing.ptr_eq(schema));
            match same_entity {
                Some(true) => continue,
                Some(false) => {
                    return Err(SchemaError::ImmutabilityViolation {
                        name: name.to_string(),
                    })
                }
                None => staged.push((name, schema)),
            }
        }

        let published = staged.len();
        for (name, schema) in staged {
            tracing::debug!(schema = %name, kind = %schema.tag(), "bound schema");
            entries.insert(name.to_string(), schema.clone());
        }
        Ok(published)
    }
}

impl fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaStore")
            .field("names", &self.names())
            .finish()
    }
}
