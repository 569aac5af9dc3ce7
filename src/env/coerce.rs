//! Shape inference and string coercion for environment overrides.
//!
//! The kind of every leaf is computed once from the default config
//! ([`KindTable`]), so coercion is a pure function of `(kind, raw)`.

use crate::error::EnvVarError;
use serde_json::{Map, Number, Value};

/// The inferred type of a default leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Number,
    Array,
    Object,
    String,
    /// `null` default: no hint, fall back to heuristics.
    Unknown,
}

impl ValueKind {
    /// Kind of a runtime value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::String(_) => ValueKind::String,
            Value::Null => ValueKind::Unknown,
        }
    }

    /// Human-readable description used in error messages.
    pub fn expected(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "a boolean",
            ValueKind::Number => "a number",
            ValueKind::Array => "an array",
            ValueKind::Object => "a JSON object",
            ValueKind::String => "a string",
            ValueKind::Unknown => "any value",
        }
    }
}

/// Leaf paths of a default config paired with their kinds, in document order.
///
/// Non-empty objects are recursed into; arrays, scalars, `null` and empty
/// objects are leaves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KindTable {
    entries: Vec<(Vec<String>, ValueKind)>,
}

impl KindTable {
    /// Build the table from a config value. A non-object root yields no leaves.
    pub fn from_value(value: &Value) -> Self {
        let mut entries = Vec::new();
        if let Value::Object(map) = value {
            collect_leaves(map, &mut Vec::new(), &mut entries);
        }
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[String], ValueKind)> {
        self.entries.iter().map(|(path, kind)| (path.as_slice(), *kind))
    }

    /// Kind recorded for a leaf path.
    pub fn get(&self, path: &[&str]) -> Option<ValueKind> {
        self.entries
            .iter()
            .find(|(p, _)| p.len() == path.len() && p.iter().zip(path).all(|(a, b)| a == b))
            .map(|(_, kind)| *kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn collect_leaves(
    map: &Map<String, Value>,
    prefix: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, ValueKind)>,
) {
    for (key, value) in map {
        prefix.push(key.clone());
        match value {
            Value::Object(child) if !child.is_empty() => collect_leaves(child, prefix, out),
            other => out.push((prefix.clone(), ValueKind::of(other))),
        }
        prefix.pop();
    }
}

const BOOL_WORDS: [&str; 6] = ["true", "false", "1", "0", "yes", "no"];
const TRUE_WORDS: [&str; 3] = ["true", "1", "yes"];

/// Coerce a raw environment string into a value of the given kind.
///
/// Only the object case can fail; every other path degrades to a string.
pub fn coerce(
    kind: ValueKind,
    raw: &str,
    var: &str,
    config_name: &str,
) -> Result<Value, EnvVarError> {
    match kind {
        ValueKind::Boolean => Ok(Value::Bool(parse_bool(raw))),
        ValueKind::Number => Ok(parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string()))),
        ValueKind::Array => Ok(parse_array(raw)),
        ValueKind::Object => parse_object(raw, var, config_name),
        ValueKind::String => Ok(Value::String(raw.to_string())),
        ValueKind::Unknown => coerce_unhinted(raw, var, config_name),
    }
}

fn coerce_unhinted(raw: &str, var: &str, config_name: &str) -> Result<Value, EnvVarError> {
    let lowered = raw.trim().to_ascii_lowercase();
    if BOOL_WORDS.contains(&lowered.as_str()) {
        return Ok(Value::Bool(parse_bool(raw)));
    }
    if let Some(number) = parse_number(raw) {
        return Ok(number);
    }
    let trimmed = raw.trim();
    if trimmed.starts_with('[') || trimmed.contains(',') {
        return Ok(parse_array(raw));
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return parse_object(raw, var, config_name);
    }
    Ok(Value::String(raw.to_string()))
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    TRUE_WORDS.contains(&lowered.as_str())
}

/// Parse a string that is entirely a finite number.
pub(crate) fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    if let Ok(uint) = trimmed.parse::<u64>() {
        return Some(Value::Number(uint.into()));
    }
    // f64::from_str accepts "inf" and "NaN"; only plain decimal notation counts.
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn parse_array(raw: &str) -> Value {
    if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if raw.trim().is_empty() {
        return Value::Array(Vec::new());
    }
    Value::Array(
        raw.split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect(),
    )
}

fn parse_object(raw: &str, var: &str, config_name: &str) -> Result<Value, EnvVarError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(parsed @ Value::Object(_)) => Ok(parsed),
        _ => Err(EnvVarError {
            var: var.to_string(),
            value: raw.to_string(),
            expected: ValueKind::Object.expected(),
            config_name: config_name.to_string(),
        }),
    }
}
