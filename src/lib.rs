//! Schematica Schema Registry
//!
//! A registry of named schemas that compiles declarative templates into
//! validators, canonical encoders and decoders.
//!
//! ## Features
//!
//! - **Lazy References**: `{"$ref": "Name"}` is resolved when data is traversed,
//!   so forward, self and mutual references all work
//! - **Append-Only Store**: a name is bound once and never rebound or removed
//! - **Canonical Encoding**: equal values encode to identical bytes
//! - **Custom Kinds**: plug leaf kinds in through [`PrimitiveKind`]
//!
//! ## Example
//!
//! ```no_run
//! use schematica::SchemaRegistry;
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new();
//! registry.create_schema(json!({
//!     "name": "Point",
//!     "kind": "object",
//!     "fields": { "x": "number", "y": "number" }
//! }))?;
//!
//! let is_point = registry.build_validator("Point")?;
//! assert!(is_point.validate(&json!({ "x": 1, "y": 2 })));
//!
//! let text = registry.build_serializer("Point")?.encode(&json!({ "x": 1, "y": 2 }))?;
//! assert_eq!(registry.build_parser("Point")?.decode(&text)?, json!({ "x": 1, "y": 2 }));
//! # Ok::<(), schematica::SchemaError>(())
//! ```

pub mod checksum;
pub mod compile;
pub mod config;
pub mod error;
pub mod factory;
pub mod graph;
pub mod kinds;
pub mod registry;
pub mod schema;
pub mod store;
pub mod template;

pub use checksum::Checksum;
pub use compile::{Decoder, Encoder, Validator, Violation};
pub use config::SchematicaConfig;
pub use error::{ErrorKind, Result, SchemaError};
pub use factory::{FactoryOutput, SchemaFactory};
pub use graph::{DanglingRef, RefAnalysis, RefGraph};
pub use kinds::{KindCatalog, PrimitiveKind};
pub use registry::SchemaRegistry;
pub use schema::{ArrayShape, Field, ObjectShape, Schema, SchemaKind};
pub use store::SchemaStore;
pub use template::{SchemaInput, SchemaSelector, SchemaTemplate};
