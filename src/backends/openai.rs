//! OpenAI chat-completions adapter

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
    CompletionResult, FinishReason, TokenUsage,
};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize)]
struct WireMessage
{   role: String
  , content: String
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat
{   #[serde(rename = "type")]
    format_type: String
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest
{   model: String
  , messages: Vec<WireMessage>
  , max_tokens: usize
  , temperature: f32
  , #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage
{   content: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice
{   message: ChatChoiceMessage
  , finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
struct WireUsage
{   prompt_tokens: usize
  , completion_tokens: usize
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse
{   choices: Vec<ChatChoice>
  , usage: Option<WireUsage>
}

// ===== Backend =====

/// Backend adapter for the OpenAI chat-completions API
pub struct OpenAiBackend
{   http_client: reqwest::Client
  , api_key: String
  , api_base: String
  , model: String
}

impl OpenAiBackend
{   pub fn new(config: &BackendConfig) -> Result<Self, Error>
    {   let api_key = config.api_key.clone()
          .or_else(|| std::env::var(API_KEY_ENV).ok())
          .ok_or_else(|| {
            error!("No OpenAI API key configured");
            Error::MissingApiKey("openai".to_string())
          })?;

        let model = config.model.clone()
          .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        debug!("Initializing OpenAI backend with model: {}", model);

        let http_client = reqwest::Client::builder()
          .timeout(Duration::from_secs(
            config.timeout_secs.unwrap_or(120)
          ))
          .build()
          .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;

        Ok(OpenAiBackend
        {   http_client
          , api_key
          , api_base: config.api_base.clone()
              .unwrap_or_else(|| OPENAI_API_BASE.to_string())
          , model
        })
    }

    fn failed(error: String, error_type: &str) -> CompletionOutcome
    {   error!("OpenAI backend failure ({}): {}", error_type, error);
        CompletionOutcome::Failed(BackendFailure
        {   error
          , error_type: error_type.to_string()
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend
{   async fn complete(
      &self
    , request: &CompletionRequest
    , schema: Option<&Value>
    ) -> CompletionOutcome
    {   let prepared = messages_with_schema(&request.messages, schema);
        let wire_request = ChatCompletionRequest
        {   model: self.model.clone()
          , messages: prepared
              .iter()
              .map(|m| WireMessage
                {   role: m.role.as_str().to_string()
                  , content: m.content.clone()
                })
              .collect()
          , max_tokens: request.max_tokens
          , temperature: request.temperature
          , response_format: schema.map(|_| ResponseFormat
            {   format_type: "json_object".to_string()
            })
        };

        trace!(
          "OpenAI request: model={}, max_tokens={}, messages={}",
          wire_request.model,
          wire_request.max_tokens,
          wire_request.messages.len()
        );

        let response = match self.http_client
          .post(format!("{}/chat/completions", self.api_base))
          .header("Authorization", format!("Bearer {}", self.api_key))
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
              format!("OpenAI error {}: {}", status, error_text),
              "api"
            );
        }

        let chat_response: ChatCompletionResponse
          = match response.json().await
        {   Ok(r) => r
          , Err(e) => return Self::failed(e.to_string(), "decode")
        };

        let usage = chat_response.usage
          .as_ref()
          .map(|u| TokenUsage::new(
            u.prompt_tokens, u.completion_tokens
          ));

        let Some(choice) = chat_response.choices.into_iter().next() else
        {   return Self::failed(
              "API response contained no choices".to_string(),
              "empty_response"
            );
        };

        let finish = choice.finish_reason.as_deref().unwrap_or("stop");
        if finish == "length"
        {   debug!(
              "OpenAI completion truncated (usage: {:?})", usage
            );
            return CompletionOutcome::Truncated
            {   usage
            };
        }

        let finish_reason = match finish
        {   "stop" => FinishReason::Stop
          , other => FinishReason::Other(other.to_string())
        };

        CompletionOutcome::Completed(CompletionResult
        {   text: choice.message.content.unwrap_or_default()
          , usage: usage.unwrap_or_else(TokenUsage::zero)
          , finish_reason
          , provider: self.provider_name().to_string()
        })
    }

    fn provider_name(&self) -> &'static str
    {   "openai"
    }

    fn cost_rates(&self) -> CostRates
    {   CostRates::default()
    }
}
