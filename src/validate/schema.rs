//! Declarative schemas in the familiar JSON-Schema shape.

use crate::error::SchemaValidationError;
use crate::loader::script;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A JSON type name as used by `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeName {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl TypeName {
    /// The type of a value. Integral numbers report `Integer`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeName::Null,
            Value::Bool(_) => TypeName::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => TypeName::Integer,
            Value::Number(_) => TypeName::Number,
            Value::String(_) => TypeName::String,
            Value::Array(_) => TypeName::Array,
            Value::Object(_) => TypeName::Object,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeName::Number, Value::Number(_)) => true,
            (TypeName::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (other, value) => *other == TypeName::of(value),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeName::String => "string",
            TypeName::Number => "number",
            TypeName::Integer => "integer",
            TypeName::Boolean => "boolean",
            TypeName::Object => "object",
            TypeName::Array => "array",
            TypeName::Null => "null",
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `type` is either one name or a list of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    One(TypeName),
    Any(Vec<TypeName>),
}

impl SchemaType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            SchemaType::One(t) => t.matches(value),
            SchemaType::Any(types) => types.iter().any(|t| t.matches(value)),
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaType::One(t) => write!(f, "{t}"),
            SchemaType::Any(types) => {
                let names: Vec<&str> = types.iter().map(TypeName::as_str).collect();
                f.write_str(&names.join(" | "))
            }
        }
    }
}

impl From<TypeName> for SchemaType {
    fn from(t: TypeName) -> Self {
        SchemaType::One(t)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Schema {
    pub fn of_type(t: TypeName) -> Self {
        Self {
            schema_type: Some(t.into()),
            ..Self::default()
        }
    }

    /// An object schema with the given properties, all of them required.
    pub fn object<K: Into<String>>(properties: impl IntoIterator<Item = (K, Schema)>) -> Self {
        let properties: BTreeMap<String, Schema> =
            properties.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            schema_type: Some(TypeName::Object.into()),
            required: properties.keys().cloned().collect(),
            properties: Some(properties),
            ..Self::default()
        }
    }

    /// Derive a schema from an example value.
    ///
    /// Objects list every key as a required property and `null` accepts
    /// anything. Numbers infer as `number` so that an integral default still
    /// admits fractions. Arrays whose elements all infer alike use that item
    /// schema; otherwise items are only constrained to the element types seen.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Bool(_) => Self::of_type(TypeName::Boolean),
            Value::Number(_) => Self::of_type(TypeName::Number),
            Value::String(_) => Self::of_type(TypeName::String),
            Value::Array(items) => Self {
                items: Self::infer_items(items).map(Box::new),
                ..Self::of_type(TypeName::Array)
            },
            Value::Object(map) => Self::object(map.iter().map(|(k, v)| (k.clone(), Self::infer(v)))),
        }
    }

    fn infer_items(items: &[Value]) -> Option<Self> {
        let (first, rest) = items.split_first()?;
        let schema = Self::infer(first);
        if rest.iter().all(|item| Self::infer(item) == schema) {
            return Some(schema);
        }
        if items.iter().any(Value::is_null) {
            return None;
        }

        let mut types: Vec<TypeName> = Vec::new();
        for item in items {
            let type_name = match item {
                Value::Number(_) => TypeName::Number,
                other => TypeName::of(other),
            };
            if !types.contains(&type_name) {
                types.push(type_name);
            }
        }
        let schema_type = match types.as_slice() {
            [single] => SchemaType::One(*single),
            _ => SchemaType::Any(types),
        };
        Some(Self {
            schema_type: Some(schema_type),
            ..Self::default()
        })
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_enum(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = Some(values.into_iter().collect());
        self
    }

    pub fn closed(mut self) -> Self {
        self.additional_properties = Some(false);
        self
    }

    /// Load a schema file: `.json`, `.yaml`/`.yml`, or a script module whose
    /// default export is the schema object.
    pub async fn from_file(path: &Path) -> Result<Self, SchemaValidationError> {
        let fail = |reason: String| SchemaValidationError {
            path: path.to_path_buf(),
            reason,
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| fail(e.to_string()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let value: Value = match ext.as_str() {
            "json" => serde_json::from_str(&text).map_err(|e| fail(e.to_string()))?,
            "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|e| fail(e.to_string()))?,
            "ts" | "js" | "mjs" | "cjs" | "mts" | "cts" => script::evaluate(&text)
                .map_err(|e| fail(e.to_string()))?
                .export_value()
                .flatten()
                .ok_or_else(|| fail("module has no schema export".to_string()))?,
            other => return Err(fail(format!("unsupported schema file extension '{other}'"))),
        };

        if !value.is_object() {
            return Err(fail("schema must be an object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| fail(e.to_string()))
    }
}
