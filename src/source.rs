//! Provenance records for resolved configuration.
//!
//! Sources are reported alongside merged results for diagnostics. They never
//! drive merge order; the resolver's call sequence does.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Priority of a project-local config file.
pub const FILE_PRIORITY: u32 = 100;
/// Priority of a home-directory config file.
pub const HOME_FILE_PRIORITY: u32 = 90;
/// Priority of a `package.json` section.
pub const PACKAGE_PRIORITY: u32 = 75;
/// Priority of environment variable overrides.
pub const ENVIRONMENT_PRIORITY: u32 = 50;
/// Priority of the caller-supplied defaults.
pub const DEFAULT_PRIORITY: u32 = 0;

/// Kind of origin a configuration layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Environment,
    Package,
    Default,
    Http,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::File => write!(f, "file"),
            SourceType::Environment => write!(f, "environment"),
            SourceType::Package => write!(f, "package"),
            SourceType::Default => write!(f, "default"),
            SourceType::Http => write!(f, "http"),
        }
    }
}

/// One layer that contributed to a merged configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub priority: u32,
    pub timestamp: DateTime<Utc>,
}

impl ConfigSource {
    fn new(source_type: SourceType, priority: u32) -> Self {
        Self {
            source_type,
            path: None,
            endpoint: None,
            priority,
            timestamp: Utc::now(),
        }
    }

    /// A project-local config file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(SourceType::File, FILE_PRIORITY)
        }
    }

    /// A config file under the home directory.
    pub fn home_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(SourceType::File, HOME_FILE_PRIORITY)
        }
    }

    /// A section of `package.json`.
    pub fn package(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(SourceType::Package, PACKAGE_PRIORITY)
        }
    }

    pub fn environment() -> Self {
        Self::new(SourceType::Environment, ENVIRONMENT_PRIORITY)
    }

    pub fn default_config() -> Self {
        Self::new(SourceType::Default, DEFAULT_PRIORITY)
    }

    /// A remote endpoint (HTTP mode).
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::new(SourceType::Http, FILE_PRIORITY)
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.path, &self.endpoint) {
            (Some(path), _) => write!(f, "{} ({})", self.source_type, path.display()),
            (None, Some(endpoint)) => write!(f, "{} ({})", self.source_type, endpoint),
            (None, None) => write!(f, "{}", self.source_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_are_monotonic() {
        let file = ConfigSource::file("a.json");
        let home = ConfigSource::home_file("b.json");
        let package = ConfigSource::package("package.json");
        let env = ConfigSource::environment();
        let default = ConfigSource::default_config();

        assert!(file.priority > home.priority);
        assert!(home.priority > package.priority);
        assert!(package.priority > env.priority);
        assert!(env.priority > default.priority);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConfigSource::environment().to_string(), "environment");
        assert_eq!(
            ConfigSource::file("/x/app.config.ts").to_string(),
            "file (/x/app.config.ts)"
        );
        assert_eq!(
            ConfigSource::http("https://cfg.local/app").to_string(),
            "http (https://cfg.local/app)"
        );
    }

    #[test]
    fn test_serializes_type_field() {
        let json = serde_json::to_value(ConfigSource::package("package.json")).unwrap();
        assert_eq!(json["type"], "package");
        assert_eq!(json["priority"], 75);
        assert!(json.get("endpoint").is_none());
    }
}
