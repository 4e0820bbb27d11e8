//! Completion backend adapters
//!
//! One capability trait over interchangeable vendor adapters. Adapters
//! differ only in wiring and default model identifiers; calling code
//! never branches on vendor identity.

pub mod openai;
pub mod anthropic;

use async_trait::async_trait;
use serde_json::Value;

use crate::cost::CostRates;
use crate::request::{CompletionOutcome, CompletionRequest, Message, Role};

/// Adapter over one vendor's chat-completion call
///
/// Implementations report truncation and vendor failures as tagged
/// outcomes rather than errors, so the retry client can branch on the
/// recoverable class explicitly.
#[async_trait]
pub trait CompletionBackend: Send + Sync
{   /// Issue one completion attempt
    ///
    /// When a schema is given the backend must instruct the model to
    /// return JSON conforming to it (merged into the system message).
    async fn complete(
      &self
    , request: &CompletionRequest
    , schema: Option<&Value>
    ) -> CompletionOutcome;

    /// Vendor name used in errors and diagnostics
    fn provider_name(&self) -> &'static str;

    /// Token pricing for this backend's default model
    fn cost_rates(&self) -> CostRates
    {   CostRates::default()
    }
}

/// Format-instruction block carrying the response schema
pub(crate) fn schema_instruction(schema: &Value) -> String
{   let rendered = serde_json::to_string_pretty(schema)
      .unwrap_or_else(|_| schema.to_string());
    format!(
      "Respond only with a JSON object conforming to the following \
       schema. Return populated data, never the schema itself.\n\n{}",
      rendered
    )
}

/// Merge the schema instruction into the request's system message,
/// or prepend a new system message when there is none
pub(crate) fn messages_with_schema(
  messages: &[Message]
, schema: Option<&Value>
) -> Vec<Message>
{   let mut prepared: Vec<Message> = messages.to_vec();
    let Some(schema) = schema else
    {   return prepared;
    };

    let instruction = schema_instruction(schema);
    match prepared.iter_mut().find(|m| m.role == Role::System)
    {   Some(system) => {
          system.content
            = format!("{}\n\n{}", system.content, instruction);
        }
      , None => {
          prepared.insert(0, Message::system(instruction));
        }
    }
    prepared
}
