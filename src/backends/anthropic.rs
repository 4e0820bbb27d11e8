//! Anthropic messages adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use log::{debug, trace, error};

use crate::backends::{messages_with_schema, CompletionBackend};
use crate::config::BackendConfig;
use crate::cost::CostRates;
use crate::error::Error;
use crate::request::{
    BackendFailure, CompletionOutcome, CompletionRequest,
    CompletionResult, FinishReason, Role, TokenUsage,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize)]
struct WireMessage
{   role: String
  , content: String
}

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest
{   model: String
  , max_tokens: usize
  , temperature: f32
  , #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>
  , messages: Vec<WireMessage>
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock
{   #[serde(default)]
    text: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
struct WireUsage
{   input_tokens: usize
  , output_tokens: usize
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse
{   content: Vec<ContentBlock>
  , stop_reason: Option<String>
  , usage: Option<WireUsage>
}

// ===== Backend =====

/// Backend adapter for the Anthropic messages API
pub struct AnthropicBackend
{   http_client: reqwest::Client
  , api_key: String
  , api_base: String
  , model: String
}

impl AnthropicBackend
{   pub fn new(config: &BackendConfig) -> Result<Self, Error>
    {   let api_key = config.api_key.clone()
          .or_else(|| std::env::var(API_KEY_ENV).ok())
          .ok_or_else(|| {
            error!("No Anthropic API key configured");
            Error::MissingApiKey("anthropic".to_string())
          })?;

        let model = config.model.clone()
          .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        debug!("Initializing Anthropic backend with model: {}", model);

        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(
            config.timeout_secs.unwrap_or(120)
          ))
          .build()
          .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;

        Ok(AnthropicBackend
        {   http_client
          , api_key
          , api_base: config.api_base.clone()
              .unwrap_or_else(|| ANTHROPIC_API_BASE.to_string())
          , model
        })
    }

    fn failed(error: String, error_type: &str) -> CompletionOutcome
    {   error!("Anthropic backend failure ({}): {}", error_type, error);
        CompletionOutcome::Failed(BackendFailure
        {   error
          , error_type: error_type.to_string()
        })
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend
{   async fn complete(
      &self
    , request: &CompletionRequest
    , schema: Option<&Value>
    ) -> CompletionOutcome
    {   let prepared = messages_with_schema(&request.messages, schema);

        // The messages API takes the system prompt as a top-level
        // field rather than a message
        let system = prepared
          .iter()
          .find(|m| m.role == Role::System)
          .map(|m| m.content.clone());
        let messages: Vec<WireMessage> = prepared
          .iter()
          .filter(|m| m.role != Role::System)
          .map(|m| WireMessage
            {   role: m.role.as_str().to_string()
              , content: m.content.clone()
            })
          .collect();

        let wire_request = MessagesRequest
        {   model: self.model.clone()
          , max_tokens: request.max_tokens
          , temperature: request.temperature
          , system
          , messages
        };

        trace!(
          "Anthropic request: model={}, max_tokens={}, messages={}",
          wire_request.model,
          wire_request.max_tokens,
          wire_request.messages.len()
        );

        let response = match self.http_client
          .post(format!("{}/messages", self.api_base))
          .header("x-api-key", &self.api_key)
          .header("anthropic-version", ANTHROPIC_VERSION)
          .json(&wire_request)
          .send()
          .await
        {   Ok(r) => r
          , Err(e) => return Self::failed(e.to_string(), "http")
        };

        let status = response.status();
        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_| "Unknown error".to_string());
            return Self::failed(
              format!("Anthropic error {}: {}", status, error_text),
              "api"
            );
        }

        let messages_response: MessagesResponse
          = match response.json().await
        {   Ok(r) => r
          , Err(e) => return Self::failed(e.to_string(), "decode")
        };

        let usage = messages_response.usage
          .as_ref()
          .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens));

        let text: String = messages_response.content
          .iter()
          .filter_map(|block| block.text.as_deref())
          .collect::<Vec<_>>()
          .join("");

        let stop = messages_response.stop_reason
          .as_deref()
          .unwrap_or("end_turn");
        if stop == "max_tokens"
        {   debug!(
              "Anthropic completion truncated (usage: {:?})", usage
            );
            return CompletionOutcome::Truncated
            {   usage
            };
        }

        if text.is_empty()
        {   return Self::failed(
              "API response contained no text content".to_string(),
              "empty_response"
            );
        }

        let finish_reason = match stop
        {   "end_turn" | "stop_sequence" => FinishReason::Stop
          , other => FinishReason::Other(other.to_string())
        };

        CompletionOutcome::Completed(CompletionResult
        {   text
          , usage: usage.unwrap_or_else(TokenUsage::zero)
          , finish_reason
          , provider: self.provider_name().to_string()
        })
    }

    fn provider_name(&self) -> &'static str
    {   "anthropic"
    }

    fn cost_rates(&self) -> CostRates
    {   CostRates
        {   prompt_per_1k: 0.003
          , completion_per_1k: 0.015
        }
    }
}
