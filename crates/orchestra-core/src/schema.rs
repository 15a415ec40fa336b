use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-Schema primitive type, restricted to the set this system supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Whether a JSON value is at least shape-compatible with this type.
    /// Numbers are accepted for `Integer` only when they carry no fractional part.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Whether a value of `self` can feed an input declared as `target`
    /// without information loss serious enough to reject at Wire time.
    /// Anything coerces into a `String` slot (stringification is the
    /// Template Resolver's job for mixed interpolation); `Object` accepts
    /// anything structured; otherwise types must match exactly.
    pub fn coercible_into(&self, target: FieldType) -> bool {
        if *self == target {
            return true;
        }
        match target {
            FieldType::String => true,
            FieldType::Object => matches!(self, FieldType::Object | FieldType::Array),
            FieldType::Number => matches!(self, FieldType::Integer),
            FieldType::Integer => false,
            FieldType::Array => false,
            FieldType::Boolean => false,
        }
    }
}

/// Schema for a single field of an `input_schema` or `output_schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: Option<String>,
    /// Element schema, present when `field_type == Array`.
    #[serde(default)]
    pub items: Option<Box<FieldSchema>>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl FieldSchema {
    pub fn new(field_type: FieldType) -> Self {
        Self { field_type, description: None, items: None, default: None }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// The JSON-Schema-shaped object a block's `input_schema` or `output_schema` is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub fields: HashMap<String, FieldSchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ObjectSchema {
    /// Fills `object` with each field's `default` where absent. Does not
    /// touch fields already present, even if they fail validation.
    pub fn apply_defaults(&self, object: &mut serde_json::Map<String, Value>) {
        for (name, field) in &self.fields {
            if !object.contains_key(name) {
                if let Some(default) = &field.default {
                    object.insert(name.clone(), default.clone());
                }
            }
        }
    }

    /// Checks that every required field is present and every present field
    /// matches its declared type. Returns the names of offending fields.
    pub fn validate(&self, object: &serde_json::Map<String, Value>) -> Vec<String> {
        let mut problems = Vec::new();
        for name in &self.required {
            if !object.contains_key(name) {
                problems.push(name.clone());
            }
        }
        for (name, field) in &self.fields {
            if let Some(value) = object.get(name) {
                if !field.field_type.accepts(value) {
                    problems.push(name.clone());
                }
            }
        }
        problems
    }
}
