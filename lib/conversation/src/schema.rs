//! Input schemas for tools.
//!
//! A [`SchemaSpec`] is the structural contract of a tool's arguments: a flat
//! object whose fields have a type, a required flag and, for strings, an
//! optional set of allowed values. The same spec renders the JSON Schema
//! handed to the model and validates whatever the model sends back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;
use std::fmt;

/// JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// Returns the JSON Schema type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Returns true if the value has this type.
    #[must_use]
    pub fn matches(&self, value: &JsonValue) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Contract for a single argument field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Expected JSON type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field must be present and non-null.
    pub required: bool,
    /// Hint for the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allowed values for string fields. Empty means unrestricted.
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl FieldSpec {
    /// Creates a required field.
    #[must_use]
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            description: None,
            allowed: Vec::new(),
        }
    }

    /// Creates an optional field.
    #[must_use]
    pub fn optional(field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(field_type)
        }
    }

    /// Adds a description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts a string field to the given values.
    #[must_use]
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    fn to_json_schema(&self) -> JsonValue {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.field_type.as_str()));
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), json!(description));
        }
        if !self.allowed.is_empty() {
            schema.insert("enum".to_string(), json!(self.allowed));
        }
        JsonValue::Object(schema)
    }
}

/// What was wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The arguments were not a JSON object.
    NotAnObject { found: &'static str },
    /// A required field was absent or null.
    Missing,
    /// The field had the wrong JSON type.
    WrongType {
        expected: FieldType,
        found: &'static str,
    },
    /// The value is not one of the allowed values.
    NotAllowed { value: String, allowed: Vec<String> },
    /// The field is not part of the schema.
    Unknown,
}

/// A single schema violation, attributed to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Field name; empty for violations of the arguments object itself.
    pub field: String,
    /// What was wrong.
    pub violation: Violation,
}

impl FieldViolation {
    /// Creates a violation for a field.
    #[must_use]
    pub fn new(field: impl Into<String>, violation: Violation) -> Self {
        Self {
            field: field.into(),
            violation,
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.violation {
            Violation::NotAnObject { found } => {
                write!(f, "arguments must be a JSON object, got {found}")
            }
            Violation::Missing => write!(f, "`{field}`: required field is missing"),
            Violation::WrongType { expected, found } => {
                write!(f, "`{field}`: expected {expected}, got {found}")
            }
            Violation::NotAllowed { value, allowed } => {
                write!(
                    f,
                    "`{field}`: '{value}' is not one of [{}]",
                    allowed.join(", ")
                )
            }
            Violation::Unknown => write!(f, "`{field}`: unknown field"),
        }
    }
}

/// Structural contract for a tool's arguments object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSpec {
    fields: BTreeMap<String, FieldSpec>,
}

impl SchemaSpec {
    /// Creates a schema with no fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Returns a field's spec.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Returns the names of the required fields.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Renders the JSON Schema used to bind the tool to the model.
    #[must_use]
    pub fn to_json_schema(&self) -> JsonValue {
        let properties: Map<String, JsonValue> = self
            .fields
            .iter()
            .map(|(name, spec)| (name.clone(), spec.to_json_schema()))
            .collect();
        let required: Vec<&str> = self.required_fields().collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Validates arguments against the schema.
    ///
    /// Null values count as absent. Every violation is collected so the
    /// model can correct all of them in one retry.
    ///
    /// # Errors
    ///
    /// Returns the violations if the arguments do not conform.
    pub fn validate(&self, arguments: &JsonValue) -> Result<(), Vec<FieldViolation>> {
        let Some(object) = arguments.as_object() else {
            return Err(vec![FieldViolation::new(
                "",
                Violation::NotAnObject {
                    found: json_type_name(arguments),
                },
            )]);
        };

        let mut violations = Vec::new();

        for (name, spec) in &self.fields {
            match object.get(name) {
                None | Some(JsonValue::Null) => {
                    if spec.required {
                        violations.push(FieldViolation::new(name, Violation::Missing));
                    }
                }
                Some(value) if !spec.field_type.matches(value) => {
                    violations.push(FieldViolation::new(
                        name,
                        Violation::WrongType {
                            expected: spec.field_type,
                            found: json_type_name(value),
                        },
                    ));
                }
                Some(value) => {
                    if let Some(text) = value.as_str()
                        && !spec.allowed.is_empty()
                        && !spec.allowed.iter().any(|allowed| allowed == text)
                    {
                        violations.push(FieldViolation::new(
                            name,
                            Violation::NotAllowed {
                                value: text.to_string(),
                                allowed: spec.allowed.clone(),
                            },
                        ));
                    }
                }
            }
        }

        for name in object.keys() {
            if !self.fields.contains_key(name) {
                violations.push(FieldViolation::new(name, Violation::Unknown));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
