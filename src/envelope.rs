//! Parsing and normalization of the model response envelope
//!
//! Every schema-backed completion is required to come back as
//! `{data, success, confidence}`. Models wrap this inconsistently:
//! some nest the envelope inside its own `data` field, some omit
//! `success` or `confidence`, some fence the JSON in markdown.
//! `parse` absorbs all of that into exactly one envelope level.

use serde_json::Value;
use log::{debug, trace};

use crate::error::Error;

/// Normalized `{data, success, confidence}` response
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope
{   pub data: Value
  , pub success: bool
  , pub confidence: f64
}

/// Strip a markdown code fence around a JSON body, if present
fn strip_fence(raw: &str) -> &str
{   let trimmed = raw.trim();
    let without_open = trimmed
      .strip_prefix("```json")
      .or_else(|| trimmed.strip_prefix("```"));
    match without_open
    {   Some(rest) => rest
          .strip_suffix("```")
          .unwrap_or(rest)
          .trim()
      , None => trimmed
    }
}

/// Python-style truthiness over a JSON value; drives the `success`
/// default when the model omitted an explicit flag
fn is_truthy(value: &Value) -> bool
{   match value
    {   Value::Null => false
      , Value::Bool(b) => *b
      , Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0)
      , Value::String(s) => !s.is_empty()
      , Value::Array(items) => !items.is_empty()
      , Value::Object(map) => !map.is_empty()
    }
}

/// True when `value` carries a nested envelope inside its data field
fn has_nested_envelope(value: &Value) -> bool
{   match value.get("data")
    {   Some(Value::Object(inner)) => {
          inner.contains_key("data") && inner.contains_key("success")
        }
      , _ => false
    }
}

/// Parse raw model output into a single-level envelope
///
/// Decode failures surface the raw text for diagnosis. Unnesting is
/// total: depth is bounded by the actual nesting in the response.
pub fn parse(raw: &str) -> Result<Envelope, Error>
{   let body = strip_fence(raw);

    let mut value: Value = serde_json::from_str(body)
      .map_err(|e| {
        debug!("Envelope decode failed: {}", e);
        Error::Parsing
        {   message: e.to_string()
          , raw: raw.to_string()
        }
      })?;

    // Remove redundant wrapping until data no longer carries an
    // envelope of its own
    let mut depth = 0;
    while has_nested_envelope(&value)
    {   value = value["data"].take();
        depth += 1;
    }
    if depth > 0
    {   trace!("Unnested {} redundant envelope level(s)", depth);
    }

    let (data, explicit_success, confidence) = match &mut value
    {   Value::Object(map) if map.contains_key("data") => {
          let data = map["data"].take();
          let success = map.get("success").and_then(Value::as_bool);
          let confidence = map
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(1.0);
          (data, success, confidence)
        }
      , _ => {
          // Bare payload without any wrapper: treat the whole value
          // as data
          let confidence = value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(1.0);
          (value, None, confidence)
        }
    };

    // An explicit success flag wins over the truthiness default
    let success = explicit_success.unwrap_or_else(|| is_truthy(&data));

    Ok(Envelope
    {   data
      , success
      , confidence
    })
}
