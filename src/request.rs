//! Unified request, completion, and result types

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

// ===== Messages =====

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
  , Assistant
}

impl Role
{   /// Wire name used by every supported vendor
    pub fn as_str(&self) -> &'static str
    {   match self
        {   Role::System => "system"
          , Role::User => "user"
          , Role::Assistant => "assistant"
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message
{   pub role: Role
  , pub content: String
}

impl Message
{   pub fn system(content: impl Into<String>) -> Self
    {   Message
        {   role: Role::System
          , content: content.into()
        }
    }

    pub fn user(content: impl Into<String>) -> Self
    {   Message
        {   role: Role::User
          , content: content.into()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   Message
        {   role: Role::Assistant
          , content: content.into()
        }
    }
}

// ===== Completion Request =====

/// Generic completion request; max_tokens is mutable across retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest
{   /// Ordered messages; never empty after assembly by a prompt definition
    pub messages: Vec<Message>
  , /// Sampling temperature in [0, 2]
    pub temperature: f32
  , /// Completion budget; raised by the retry client on truncation
    pub max_tokens: usize
}

impl CompletionRequest
{   pub fn new(
      messages: Vec<Message>
    , temperature: f32
    , max_tokens: usize
    ) -> Self
    {   CompletionRequest
        {   messages
          , temperature
          , max_tokens
        }
    }
}

// ===== Usage =====

/// Token accounting for one or more completions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage
{   pub prompt_tokens: usize
  , pub completion_tokens: usize
  , pub total_tokens: usize
}

impl TokenUsage
{   /// Construct usage with the additivity invariant enforced
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self
    {   TokenUsage
        {   prompt_tokens
          , completion_tokens
          , total_tokens: prompt_tokens + completion_tokens
        }
    }

    pub fn zero() -> Self
    {   TokenUsage::new(0, 0)
    }

    /// Accumulate another usage figure, keeping totals consistent
    pub fn add(&mut self, other: &TokenUsage)
    {   self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens
          = self.prompt_tokens + self.completion_tokens;
    }
}

// ===== Completion Results =====

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason
{   Stop
  , Length
  , Other(String)
}

/// One successful model round trip, before envelope parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult
{   /// Raw model output text
    pub text: String
  , pub usage: TokenUsage
  , pub finish_reason: FinishReason
  , /// Provider that generated it
    pub provider: String
}

/// Vendor or transport failure reported by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendFailure
{   pub error: String
  , pub error_type: String
}

/// Tagged outcome of one backend attempt
///
/// Truncation carries partial usage as data, not as exception state,
/// so the retry loop can branch on an explicit tag.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome
{   Completed(CompletionResult)
  , Truncated
    {   usage: Option<TokenUsage>
    }
  , Failed(BackendFailure)
}

// ===== Orchestration Results =====

/// Aggregated result of one orchestration call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult
{   /// Payload per analysis dimension
    pub data: BTreeMap<String, Value>
  , pub usage: TokenUsage
  , /// Wall-clock duration in seconds
    pub duration: f64
  , pub tokens_per_second: f64
  , pub cost_estimate: f64
  , /// Lowest confidence reported across the covered dimensions
    pub confidence: f64
  , /// Non-fatal diagnostics collected while processing
    pub warnings: Vec<String>
}

/// Terminal failure of one orchestration call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResult
{   pub code: String
  , pub message: String
  , pub details: Value
}

impl ErrorResult
{   pub fn new(
      code: impl Into<String>
    , message: impl Into<String>
    , details: Value
    ) -> Self
    {   ErrorResult
        {   code: code.into()
          , message: message.into()
          , details
        }
    }
}

impl From<crate::error::Error> for ErrorResult
{   fn from(err: crate::error::Error) -> Self
    {   use crate::error::Error;
        let code = err.code().to_string();
        let message = err.to_string();
        let details = match err
        {   Error::Backend { provider, error, error_type, attempt } => {
              json!({
                "error": error,
                "error_type": error_type,
                "provider": provider,
                "attempt": attempt
              })
            }
          , Error::LengthLimitExceeded {
              provider
            , prompt_tokens
            , completion_tokens
            , total_tokens
            , max_tokens
            } => {
              json!({
                "provider": provider,
                "prompt_tokens": prompt_tokens,
                "completion_tokens": completion_tokens,
                "total_tokens": total_tokens,
                "max_tokens": max_tokens
              })
            }
          , Error::Parsing { message, raw } => {
              json!({
                "error": message,
                "raw_response": raw
              })
            }
          , Error::Validation(issues) => {
              json!({
                "validation_errors": issues.iter().map(|i| {
                  json!({
                    "field": i.field,
                    "error": i.message
                  })
                }).collect::<Vec<_>>()
              })
            }
          , Error::UnknownPrompt(name) => {
              json!({ "prompt_type": name })
            }
          , _ => Value::Null
        };

        ErrorResult
        {   code
          , message
          , details
        }
    }
}
