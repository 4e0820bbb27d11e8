//! Prompt definitions and generic response-schema descriptors
//!
//! A prompt definition is immutable configuration: a template, a system
//! message, and a set of response field descriptors. The descriptors are
//! plain values rendered into a JSON schema for the backend and
//! interpreted by one generic validator on the way back; no response
//! types are synthesized at call time.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use log::trace;

use crate::config::OrchestratorConfig;
use crate::error::ValidationIssue;
use crate::request::{CompletionRequest, Message};

/// Placeholder expanded with the analysis subject in templates
pub const SUBJECT_PLACEHOLDER: &str = "{subject}";

// ===== Field Descriptors =====

/// Structural type tag of one response field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind
{   String
  , Integer
  , Number
  , Boolean
  , Array(Box<FieldSpec>)
  , Object(Vec<(String, FieldSpec)>)
}

/// Descriptor of one required response field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec
{   pub kind: FieldKind
  , pub description: String
  , pub minimum: Option<f64>
  , pub maximum: Option<f64>
  , pub max_length: Option<usize>
}

impl FieldSpec
{   fn with_kind(kind: FieldKind, description: impl Into<String>) -> Self
    {   FieldSpec
        {   kind
          , description: description.into()
          , minimum: None
          , maximum: None
          , max_length: None
        }
    }

    pub fn string(description: impl Into<String>) -> Self
    {   FieldSpec::with_kind(FieldKind::String, description)
    }

    pub fn integer(description: impl Into<String>) -> Self
    {   FieldSpec::with_kind(FieldKind::Integer, description)
    }

    pub fn number(description: impl Into<String>) -> Self
    {   FieldSpec::with_kind(FieldKind::Number, description)
    }

    pub fn boolean(description: impl Into<String>) -> Self
    {   FieldSpec::with_kind(FieldKind::Boolean, description)
    }

    pub fn array(description: impl Into<String>, items: FieldSpec) -> Self
    {   FieldSpec::with_kind(
          FieldKind::Array(Box::new(items)),
          description
        )
    }

    pub fn object(
      description: impl Into<String>
    , fields: Vec<(String, FieldSpec)>
    ) -> Self
    {   FieldSpec::with_kind(FieldKind::Object(fields), description)
    }

    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self
    {   self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self
    {   self.max_length = Some(max_length);
        self
    }

    /// Render this descriptor as a JSON schema fragment
    pub fn to_schema(&self) -> Value
    {   let mut schema = match &self.kind
        {   FieldKind::String => json!({ "type": "string" })
          , FieldKind::Integer => json!({ "type": "integer" })
          , FieldKind::Number => json!({ "type": "number" })
          , FieldKind::Boolean => json!({ "type": "boolean" })
          , FieldKind::Array(items) => {
              json!({
                "type": "array",
                "items": items.to_schema()
              })
            }
          , FieldKind::Object(fields) => fields_to_schema(fields)
        };

        if let Some(map) = schema.as_object_mut()
        {   if !self.description.is_empty()
            {   map.insert(
                  "description".to_string(),
                  Value::String(self.description.clone())
                );
            }
            if let Some(minimum) = self.minimum
            {   map.insert("minimum".to_string(), json!(minimum));
            }
            if let Some(maximum) = self.maximum
            {   map.insert("maximum".to_string(), json!(maximum));
            }
            if let Some(max_length) = self.max_length
            {   map.insert("maxLength".to_string(), json!(max_length));
            }
        }

        schema
    }
}

/// Render an ordered field set as a strict JSON object schema
pub fn fields_to_schema(fields: &[(String, FieldSpec)]) -> Value
{   let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, spec) in fields
    {   properties.insert(name.clone(), spec.to_schema());
        required.push(Value::String(name.clone()));
    }
    json!({
      "type": "object",
      "properties": properties,
      "required": required,
      "additionalProperties": false
    })
}

/// Wrap a payload schema in the standard response envelope schema
pub fn wrap_envelope_schema(schema: &Value) -> Value
{   json!({
      "$schema": "http://json-schema.org/draft-07/schema#",
      "type": "object",
      "properties": {
        "success": {
          "type": "boolean",
          "description": "Whether the generation was successful"
        },
        "confidence": {
          "type": "number",
          "minimum": 0,
          "maximum": 1,
          "description": "Confidence score of the generation"
        },
        "data": schema
      },
      "required": ["success", "confidence", "data"],
      "additionalProperties": false
    })
}

// ===== Generic Validator =====

fn kind_name(kind: &FieldKind) -> &'static str
{   match kind
    {   FieldKind::String => "string"
      , FieldKind::Integer => "integer"
      , FieldKind::Number => "number"
      , FieldKind::Boolean => "boolean"
      , FieldKind::Array(_) => "array"
      , FieldKind::Object(_) => "object"
    }
}

fn validate_value(
  path: &str
, spec: &FieldSpec
, value: &Value
, issues: &mut Vec<ValidationIssue>
)
{   match (&spec.kind, value)
    {   (FieldKind::String, Value::String(s)) => {
          if let Some(max_length) = spec.max_length
          {   if s.chars().count() > max_length
              {   issues.push(ValidationIssue
                  {   field: path.to_string()
                    , message: format!(
                        "exceeds maximum length of {}", max_length
                      )
                  });
              }
          }
        }
      , (FieldKind::Boolean, Value::Bool(_)) => {}
      , (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
          check_range(path, spec, n.as_f64(), issues);
        }
      , (FieldKind::Number, Value::Number(n)) => {
          check_range(path, spec, n.as_f64(), issues);
        }
      , (FieldKind::Array(items), Value::Array(values)) => {
          for (i, item) in values.iter().enumerate()
          {   let item_path = format!("{}[{}]", path, i);
              validate_value(&item_path, items, item, issues);
          }
        }
      , (FieldKind::Object(fields), Value::Object(_)) => {
          validate_object(path, fields, value, issues);
        }
      , (kind, other) => {
          issues.push(ValidationIssue
          {   field: path.to_string()
            , message: format!(
                "expected {}, got {}",
                kind_name(kind),
                json_type_name(other)
              )
          });
        }
    }
}

fn check_range(
  path: &str
, spec: &FieldSpec
, value: Option<f64>
, issues: &mut Vec<ValidationIssue>
)
{   let Some(value) = value else { return };
    if let Some(minimum) = spec.minimum
    {   if value < minimum
        {   issues.push(ValidationIssue
            {   field: path.to_string()
              , message: format!("below minimum of {}", minimum)
            });
        }
    }
    if let Some(maximum) = spec.maximum
    {   if value > maximum
        {   issues.push(ValidationIssue
            {   field: path.to_string()
              , message: format!("above maximum of {}", maximum)
            });
        }
    }
}

fn json_type_name(value: &Value) -> &'static str
{   match value
    {   Value::Null => "null"
      , Value::Bool(_) => "boolean"
      , Value::Number(_) => "number"
      , Value::String(_) => "string"
      , Value::Array(_) => "array"
      , Value::Object(_) => "object"
    }
}

fn validate_object(
  path: &str
, fields: &[(String, FieldSpec)]
, value: &Value
, issues: &mut Vec<ValidationIssue>
)
{   let Some(map) = value.as_object() else
    {   issues.push(ValidationIssue
        {   field: path.to_string()
          , message: format!(
              "expected object, got {}",
              json_type_name(value)
            )
        });
        return;
    };

    for (name, spec) in fields
    {   let field_path = if path.is_empty()
        {   name.clone()
        } else
        {   format!("{}.{}", path, name)
        };
        match map.get(name)
        {   Some(field_value) => {
              validate_value(&field_path, spec, field_value, issues);
            }
          , None => {
              issues.push(ValidationIssue
              {   field: field_path
                , message: "required field is missing".to_string()
              });
            }
        }
    }
}

/// Validate a parsed payload against an ordered field set
pub fn validate(
  fields: &[(String, FieldSpec)]
, data: &Value
) -> Vec<ValidationIssue>
{   let mut issues = Vec::new();
    validate_object("", fields, data, &mut issues);
    issues
}

// ===== Prompt Definition =====

/// Immutable definition of one analysis dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition
{   /// Unique identifier for this prompt type
    pub name: String
  , /// Human readable description
    pub description: String
  , /// Instructions for the AI assistant
    pub system_message: String
  , /// Template with a {subject} placeholder
    pub template: String
  , /// Version of this prompt
    pub version: String
  , /// Ordered response field definitions
    pub response_fields: Vec<(String, FieldSpec)>
  , /// Reference data like theme codes, injected into the system
    /// message as lookup tables (category -> list of objects)
    pub reference_data: Option<Value>
}

impl PromptDefinition
{   /// Render the template with the analysis subject filled in
    pub fn render_template(&self, subject: &str) -> String
    {   self.template.replace(SUBJECT_PLACEHOLDER, subject)
    }

    /// JSON schema of the expected payload (pre-envelope)
    pub fn response_schema(&self) -> Value
    {   fields_to_schema(&self.response_fields)
    }

    /// Format reference data into a readable block for the model
    pub fn format_reference_data(&self) -> String
    {   let Some(Value::Object(categories)) = &self.reference_data else
        {   return String::new();
        };

        let mut out = Vec::new();
        for (category, items) in categories
        {   out.push(format!("\nAvailable {}:", category));
            if let Value::Array(entries) = items
            {   for entry in entries
                {   if let Value::Object(fields) = entry
                    {   let lines: Vec<String> = fields
                          .iter()
                          .map(|(k, v)| match v
                            {   Value::String(s) => format!("{}: {}", k, s)
                              , other => format!("{}: {}", k, other)
                            })
                          .collect();
                        out.push(format!("\n{}", lines.join("\n")));
                    }
                }
            }
        }
        out.join("\n")
    }

    /// Build the completion request for this prompt
    ///
    /// The response schema travels separately and is merged into the
    /// system message by the backend adapter.
    pub fn to_completion_request(
      &self
    , subject: &str
    , text: &str
    , config: &OrchestratorConfig
    ) -> CompletionRequest
    {   let reference = self.format_reference_data();
        let system_content = if reference.is_empty()
        {   self.system_message.clone()
        } else
        {   format!("{}\n\n{}", self.system_message, reference)
        };

        let rendered = self.render_template(subject);
        let user_content = if text.is_empty()
        {   rendered
        } else
        {   format!(
              "Here is the text to analyze:\n\n{}\n\n{}",
              text, rendered
            )
        };

        trace!(
          "Built completion request for prompt '{}' \
           (system: {} chars, user: {} chars)",
          self.name,
          system_content.len(),
          user_content.len()
        );

        CompletionRequest::new(
          vec![
            Message::system(system_content)
          , Message::user(user_content)
          ],
          config.temperature,
          config.max_tokens
        )
    }
}
