//! Error types for configuration resolution.
//!
//! "Not found" is never an error anywhere in this crate: a missing file, an
//! unset environment variable or an absent manifest key is just absence. The
//! variants here describe sources that exist but are broken.

use std::path::PathBuf;
use thiserror::Error;

/// A candidate config file exists but could not be turned into an object.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Config file at {path} has no default export and no named exports")]
    EmptyModule { path: PathBuf },

    #[error("Config file at {path} must export an object, found {found}")]
    NotAnObject { path: PathBuf, found: &'static str },

    #[error("No loader registered for extension '{extension}' ({path})")]
    UnsupportedExtension { path: PathBuf, extension: String },
}

impl ConfigLoadError {
    /// Path of the offending file.
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigLoadError::Read { path, .. }
            | ConfigLoadError::Parse { path, .. }
            | ConfigLoadError::EmptyModule { path }
            | ConfigLoadError::NotAnObject { path, .. }
            | ConfigLoadError::UnsupportedExtension { path, .. } => path,
        }
    }
}

/// An environment variable could not be coerced into the shape its default requires.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Environment variable {var} for config '{config_name}' must be {expected}, got '{value}'")]
pub struct EnvVarError {
    pub var: String,
    pub value: String,
    pub expected: &'static str,
    pub config_name: String,
}

/// A schema file could not be loaded or parsed.
#[derive(Error, Debug)]
#[error("Failed to load schema at {path}: {reason}")]
pub struct SchemaValidationError {
    pub path: PathBuf,
    pub reason: String,
}

/// Top-level error for resolution entry points.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] ConfigLoadError),

    #[error(transparent)]
    EnvVar(#[from] EnvVarError),

    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error("Default config must serialize to an object: {0}")]
    Serialize(String),

    #[error("Merged config for '{name}' does not match the default's type: {source}")]
    Deserialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl ConfigError {
    /// True for a malformed config file (as opposed to env or schema problems).
    pub fn is_load_error(&self) -> bool {
        matches!(self, ConfigError::Load(_))
    }
}

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
