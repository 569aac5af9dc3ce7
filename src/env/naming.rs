//! Environment variable naming.
//!
//! A leaf at `server.maxRetries` under the config name `my-app` maps to:
//! - primary: `MY_APP_SERVER_MAX_RETRIES` (camelCase split per segment)
//! - fallback: `MY_APP_SERVER_MAXRETRIES` (segments plainly uppercased)

use heck::ToShoutySnakeCase;

/// Derive the variable prefix from a config name: uppercase, `-` becomes `_`.
pub fn env_prefix(config_name: &str) -> String {
    config_name.to_uppercase().replace('-', "_")
}

/// Primary variable name: every segment converted to `UPPER_SNAKE_CASE`.
pub fn primary_var_name(prefix: &str, path: &[String]) -> String {
    join(prefix, path.iter().map(|segment| segment.to_shouty_snake_case()))
}

/// Backward-compatible variable name: every segment uppercased as-is.
pub fn fallback_var_name(prefix: &str, path: &[String]) -> String {
    join(prefix, path.iter().map(|segment| segment.to_uppercase()))
}

fn join(prefix: &str, segments: impl Iterator<Item = String>) -> String {
    let mut name = prefix.to_string();
    for segment in segments {
        if !name.is_empty() {
            name.push('_');
        }
        name.push_str(&segment);
    }
    name
}
