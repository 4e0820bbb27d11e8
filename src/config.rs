//! Configuration for backends, retries, and orchestration defaults

use serde::{Deserialize, Serialize};

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig
{   /// API base URL (if custom)
    pub api_base: Option<String>
  , /// API key; falls back to the provider's conventional env var
    pub api_key: Option<String>
  , /// Model identifier; falls back to the provider default
    pub model: Option<String>
  , /// Request timeout in seconds
    pub timeout_secs: Option<u64>
}

impl Default for BackendConfig
{   fn default() -> Self
    {   BackendConfig
        {   api_base: None
          , api_key: None
          , model: None
          , timeout_secs: Some(120)
        }
    }
}

/// Truncation-retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig
{   /// Max completion attempts before giving up on truncation
    pub max_attempts: usize
  , /// Budget growth factor when a schema was supplied
    pub schema_growth: f32
  , /// Budget growth factor for plain-text completions
    pub plain_growth: f32
  , /// Budget growth factor when partial usage is unknown
    pub blind_growth: f32
  , /// Caller deadline across all attempts, in milliseconds
    pub deadline_ms: Option<u64>
}

impl Default for RetryConfig
{   fn default() -> Self
    {   RetryConfig
        {   max_attempts: 3
          , schema_growth: 2.0
          , plain_growth: 1.2
          , blind_growth: 1.5
          , deadline_ms: None
        }
    }
}

/// Orchestrator-wide request defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig
{   /// Sampling temperature applied to every prompt request
    pub temperature: f32
  , /// Initial completion budget per request
    pub max_tokens: usize
  , /// Confidence below this emits a warning on the result
    pub confidence_threshold: f64
  , /// Retry configuration for the completion client
    pub retry: RetryConfig
}

impl Default for OrchestratorConfig
{   fn default() -> Self
    {   OrchestratorConfig
        {   temperature: 0.1
          , max_tokens: 4000
          , confidence_threshold: 0.7
          , retry: RetryConfig::default()
        }
    }
}
