//! Environment variable overrides.
//!
//! Every leaf of the default config gets two candidate variable names derived
//! from the config name (see [`naming`]). The first one present in the
//! environment snapshot is coerced to the leaf's inferred kind (see
//! [`coerce`]) and written into a partial override, which is then deep-merged
//! over the config.
//!
//! ## Example
//! With config name `myapp` and default `{ "port": 3000, "db": { "poolSize": 5 } }`:
//! - `MYAPP_PORT=8080` sets `port` to the number `8080`
//! - `MYAPP_DB_POOL_SIZE=10` (or the legacy `MYAPP_DB_POOLSIZE=10`) sets `db.poolSize`

pub mod coerce;
pub mod naming;

use crate::error::EnvVarError;
use crate::merge::deep_merge;
use crate::source::ConfigSource;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub use coerce::{KindTable, ValueKind, coerce};
pub use naming::{env_prefix, fallback_var_name, primary_var_name};

/// A frozen view of environment variables.
///
/// Resolution reads variables only through a snapshot so callers (and tests)
/// control exactly what is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// An empty environment.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A caller-supplied parser tried before the built-in coercion.
///
/// Return `Ok(Some(value))` to claim the variable, `Ok(None)` to pass. Errors
/// are logged and treated as a pass.
pub trait EnvParser: Send + Sync {
    fn parse(&self, var: &str, raw: &str, kind: ValueKind) -> anyhow::Result<Option<Value>>;
}

impl<F> EnvParser for F
where
    F: Fn(&str, &str, ValueKind) -> anyhow::Result<Option<Value>> + Send + Sync,
{
    fn parse(&self, var: &str, raw: &str, kind: ValueKind) -> anyhow::Result<Option<Value>> {
        self(var, raw, kind)
    }
}

/// Options for [`apply_environment_variables`].
#[derive(Clone, Default)]
pub struct EnvOptions {
    /// Overrides the prefix derived from the config name.
    pub prefix: Option<String>,
    /// Custom parsers, tried in order before built-in coercion.
    pub parsers: Vec<Arc<dyn EnvParser>>,
    /// Log each applied variable at info level instead of debug.
    pub verbose: bool,
}

impl std::fmt::Debug for EnvOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvOptions")
            .field("prefix", &self.prefix)
            .field("parsers", &self.parsers.len())
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl EnvOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_parser(mut self, parser: impl EnvParser + 'static) -> Self {
        self.parsers.push(Arc::new(parser));
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// A variable that was applied to the config.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedVar {
    pub var: String,
    pub path: Vec<String>,
    pub value: Value,
}

/// Result of applying environment overrides.
#[derive(Debug, Clone)]
pub struct EnvOverride {
    /// The config with overrides merged in.
    pub config: Value,
    /// Present when at least one variable was applied.
    pub source: Option<ConfigSource>,
    pub applied: Vec<AppliedVar>,
}

/// Apply environment overrides to `config`, inferring leaf kinds from it.
pub fn apply_environment_variables(
    config_name: &str,
    config: &Value,
    env: &EnvSnapshot,
    options: &EnvOptions,
) -> Result<EnvOverride, EnvVarError> {
    let kinds = KindTable::from_value(config);
    apply_with_kinds(config_name, config, &kinds, env, options)
}

/// Apply environment overrides using a precomputed kind table.
///
/// The caller's `config` is never modified; a merged copy is returned.
pub fn apply_with_kinds(
    config_name: &str,
    config: &Value,
    kinds: &KindTable,
    env: &EnvSnapshot,
    options: &EnvOptions,
) -> Result<EnvOverride, EnvVarError> {
    let prefix = options
        .prefix
        .clone()
        .unwrap_or_else(|| env_prefix(config_name));

    if prefix.is_empty() || !config.is_object() {
        return Ok(EnvOverride {
            config: config.clone(),
            source: None,
            applied: Vec::new(),
        });
    }

    let mut overrides = Map::new();
    let mut applied = Vec::new();

    for (path, kind) in kinds.iter() {
        let primary = primary_var_name(&prefix, path);
        let fallback = fallback_var_name(&prefix, path);

        let Some((var, raw)) = env
            .get(&primary)
            .map(|raw| (primary.clone(), raw))
            .or_else(|| env.get(&fallback).map(|raw| (fallback.clone(), raw)))
        else {
            continue;
        };

        let value = parse_with(options, &var, raw, kind, config_name)?;

        if options.verbose {
            info!(var = %var, path = %path.join("."), "Applied environment override");
        } else {
            debug!(var = %var, path = %path.join("."), "Applied environment override");
        }

        set_path(&mut overrides, path, value.clone());
        applied.push(AppliedVar {
            var,
            path: path.to_vec(),
            value,
        });
    }

    if applied.is_empty() {
        return Ok(EnvOverride {
            config: config.clone(),
            source: None,
            applied,
        });
    }

    Ok(EnvOverride {
        config: deep_merge(config.clone(), Value::Object(overrides)),
        source: Some(ConfigSource::environment()),
        applied,
    })
}

fn parse_with(
    options: &EnvOptions,
    var: &str,
    raw: &str,
    kind: ValueKind,
    config_name: &str,
) -> Result<Value, EnvVarError> {
    for parser in &options.parsers {
        match parser.parse(var, raw, kind) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => debug!(var = %var, error = %e, "Custom env parser failed, falling through"),
        }
    }
    coerce(kind, raw, var, config_name)
}

/// Write `value` at `path`, creating intermediate objects.
fn set_path(root: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = root;
    for segment in parents {
        let entry = cursor
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        cursor = next;
    }
    cursor.insert(last.clone(), value);
}
