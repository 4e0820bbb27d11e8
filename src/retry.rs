//! Truncation-retry state machine around a completion backend
//!
//! This client is the only component allowed to re-issue a call.
//! Truncation is the one condition worth retrying: it is caused by an
//! under-provisioned token budget the caller can correct. Every other
//! failure is assumed non-transient within the request's lifetime and
//! surfaces immediately.

use serde_json::Value;
use std::time::{Duration, Instant};
use log::{debug, warn};

use crate::backends::CompletionBackend;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::request::{
    CompletionOutcome, CompletionRequest, CompletionResult, TokenUsage,
};

/// Backend wrapper that escalates token budgets on truncation
pub struct RetryingCompletionClient<B>
{   backend: B
  , config: RetryConfig
}

impl<B: CompletionBackend> RetryingCompletionClient<B>
{   pub fn new(backend: B, config: RetryConfig) -> Self
    {   RetryingCompletionClient
        {   backend
          , config
        }
    }

    pub fn backend(&self) -> &B
    {   &self.backend
    }

    /// Next completion budget after a truncated attempt
    ///
    /// Known partial usage scales from the truncated completion size
    /// (doubled for schema responses, which pay a JSON overhead);
    /// unknown usage falls back to scaling the current budget. The
    /// budget never decreases across attempts.
    fn escalated_budget(
      &self
    , current_max_tokens: usize
    , usage: Option<&TokenUsage>
    , has_schema: bool
    ) -> usize
    {   let grown = match usage
        {   Some(u) => {
              let factor = if has_schema
              {   self.config.schema_growth
              } else
              {   self.config.plain_growth
              };
              (u.completion_tokens as f32 * factor) as usize
            }
          , None => {
              (current_max_tokens as f32
                * self.config.blind_growth) as usize
            }
        };
        grown.max(current_max_tokens)
    }

    fn remaining(
      deadline: Option<Duration>
    , started: Instant
    ) -> Result<Option<Duration>, Error>
    {   let Some(deadline) = deadline else
        {   return Ok(None);
        };
        match deadline.checked_sub(started.elapsed())
        {   Some(left) if !left.is_zero() => Ok(Some(left))
          , _ => Err(Error::Timeout)
        }
    }

    /// Generate a completion, recovering from truncation by retrying
    /// with an escalated budget
    pub async fn complete(
      &self
    , request: &mut CompletionRequest
    , schema: Option<&Value>
    ) -> Result<CompletionResult, Error>
    {   let provider = self.backend.provider_name();
        let original_max_tokens = request.max_tokens;
        let deadline = self.config.deadline_ms.map(Duration::from_millis);
        let started = Instant::now();
        let mut last_usage: Option<TokenUsage> = None;

        for attempt in 1..=self.config.max_attempts
        {   let outcome = match Self::remaining(deadline, started)?
            {   Some(left) => {
                  match tokio::time::timeout(
                    left,
                    self.backend.complete(request, schema)
                  ).await
                  {   Ok(outcome) => outcome
                    , Err(_) => {
                        warn!(
                          "Deadline expired mid-attempt {} for {}",
                          attempt, provider
                        );
                        return Err(Error::Timeout);
                      }
                  }
                }
              , None => self.backend.complete(request, schema).await
            };

            match outcome
            {   CompletionOutcome::Completed(result) => {
                  if attempt > 1
                  {   debug!(
                        "Completion recovered on attempt {}; restoring \
                         max_tokens to {}",
                        attempt, original_max_tokens
                      );
                      request.max_tokens = original_max_tokens;
                  }
                  return Ok(result);
                }
              , CompletionOutcome::Truncated { usage } => {
                  let new_max_tokens = self.escalated_budget(
                    request.max_tokens,
                    usage.as_ref(),
                    schema.is_some()
                  );
                  warn!(
                    "Response truncated due to length limit \
                     (attempt {}/{}): max_tokens {} -> {}",
                    attempt,
                    self.config.max_attempts,
                    request.max_tokens,
                    new_max_tokens
                  );
                  last_usage = usage;
                  request.max_tokens = new_max_tokens;
                }
              , CompletionOutcome::Failed(failure) => {
                  return Err(Error::Backend
                  {   provider: provider.to_string()
                    , error: failure.error
                    , error_type: failure.error_type
                    , attempt
                  });
                }
            }
        }

        let usage = last_usage.unwrap_or_else(TokenUsage::zero);
        Err(Error::LengthLimitExceeded
        {   provider: provider.to_string()
          , prompt_tokens: usage.prompt_tokens
          , completion_tokens: usage.completion_tokens
          , total_tokens: usage.total_tokens
          , max_tokens: request.max_tokens
        })
    }
}
