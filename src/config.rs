//! Configuration management for the schema registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schematica.toml)
//! - Environment variables (SCHEMATICA__*)
//!
//! ## Example config file (schematica.toml):
//! ```toml
//! [limits]
//! max_template_depth = 64
//! max_value_depth = 127
//!
//! [objects]
//! additional_fields = false
//!
//! [decoder]
//! require_canonical = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Deepest container nesting `serde_json` will parse, and so the most any
/// decoder can accept
pub const MAX_VALUE_DEPTH: usize = 127;

/// Main configuration for a registry and the artifacts it builds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchematicaConfig {
    /// Recursion bounds
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Defaults for object templates
    #[serde(default)]
    pub objects: ObjectConfig,

    /// Decoder settings
    #[serde(default)]
    pub decoder: DecoderConfig,
}

/// Recursion bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Deepest template nesting the factory expands
    #[serde(default = "default_max_template_depth")]
    pub max_template_depth: usize,

    /// Deepest container nesting the compiled artifacts accept (at most 127)
    #[serde(default = "default_max_value_depth")]
    pub max_value_depth: usize,
}

/// Defaults for object templates that do not say otherwise
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Accept undeclared fields
    #[serde(default)]
    pub additional_fields: bool,
}

/// Decoder settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Reject input that is valid but not byte-identical to the canonical encoding
    #[serde(default)]
    pub require_canonical: bool,
}

// Default value functions
fn default_max_template_depth() -> usize {
    64
}

fn default_max_value_depth() -> usize {
    MAX_VALUE_DEPTH
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_template_depth: default_max_template_depth(),
            max_value_depth: default_max_value_depth(),
        }
    }
}

impl SchematicaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, optionally from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "schematica.toml",
            ".schematica.toml",
            "config/schematica.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schematica", "schematica") {
            let xdg_config = config_dir.config_dir().join("schematica.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (SCHEMATICA__LIMITS__MAX_VALUE_DEPTH=...)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMATICA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: SchematicaConfig = builder.build()?.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    /// Reject settings that would make every build fail
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.limits.max_template_depth == 0 || self.limits.max_value_depth == 0 {
            return Err(ConfigError::Message(
                "limits.max_template_depth and limits.max_value_depth must be at least 1".to_string(),
            ));
        }
        if self.limits.max_value_depth > MAX_VALUE_DEPTH {
            return Err(ConfigError::Message(format!(
                "limits.max_value_depth is {}, but encoded values deeper than {} cannot be decoded",
                self.limits.max_value_depth, MAX_VALUE_DEPTH
            )));
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        std::fs::write(path, self.to_toml()?)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> std::io::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
