//! Convention-based configuration resolution.
//!
//! A config is resolved from the caller's defaults plus, in increasing
//! precedence: environment variables, a `package.json` section, a file in
//! `~/.config/<name>/`, and a project-local file. Layers are deep-merged so
//! that any key a higher tier leaves out keeps its lower-tier value.
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use tierconf::{ConfigRequest, load_config};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct AppConfig {
//!     port: u16,
//!     host: String,
//! }
//!
//! # async fn run() -> tierconf::Result<()> {
//! let defaults = AppConfig { port: 3000, host: "localhost".into() };
//! // Reads e.g. ./myapp.config.ts, ~/.config/myapp/config.json, MYAPP_PORT.
//! let config = load_config(ConfigRequest::new("myapp", defaults)).await?;
//! println!("listening on {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod env;
pub mod error;
pub mod http;
pub mod loader;
pub mod merge;
pub mod metrics;
pub mod paths;
pub mod resolve;
pub mod source;
pub mod validate;
pub mod watcher;

pub use context::ResolutionContext;
pub use env::{EnvOptions, EnvSnapshot, apply_environment_variables};
pub use error::{ConfigError, ConfigLoadError, EnvVarError, Result, SchemaValidationError};
pub use http::{HttpOptions, load_config_http};
pub use loader::{
    LoadOptions, discover_config_files, generate_config_paths, load_from_path, try_load_from_paths,
};
pub use merge::{ArrayStrategy, deep_merge, deep_merge_with};
pub use resolve::{ConfigRequest, LenientResolution, Resolved, Resolver, load_config};
pub use source::{ConfigSource, SourceType};
pub use validate::{
    Schema, ValidationError, ValidationOptions, ValidationResult, ValidationRule,
    validate_configuration,
};
pub use watcher::{ConfigChangeEvent, LiveConfig, WatchOptions, watch_config};
