use std::fmt;

/// Stable error codes surfaced at the API boundary
pub const CODE_PROVIDER_ERROR: &str = "AI_PROVIDER_ERROR";
pub const CODE_LENGTH_LIMIT_EXCEEDED: &str = "AI_LENGTH_LIMIT_EXCEEDED";
pub const CODE_PARSING_ERROR: &str = "AI_PARSING_ERROR";
pub const CODE_VALIDATION_ERROR: &str = "AI_VALIDATION_ERROR";
pub const CODE_UNKNOWN_PROMPT: &str = "AI_UNKNOWN_PROMPT";
pub const CODE_EMPTY_RESPONSE: &str = "AI_EMPTY_RESPONSE";
pub const CODE_MISSING_API_KEY: &str = "AI_MISSING_API_KEY";
pub const CODE_TIMEOUT: &str = "AI_TIMEOUT";
pub const CODE_INVALID_CONFIGURATION: &str = "AI_INVALID_CONFIGURATION";
pub const CODE_OTHER: &str = "AI_ERROR";

/// Single validation failure against a response field spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue
{   /// Dotted path of the offending field
    pub field: String
  , /// What was wrong with it
    pub message: String
}

/// Custom error type for orchestration operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq)]
pub enum Error
{   /// Vendor or network failure unrelated to length; never retried
    Backend
    {   provider: String
      , error: String
      , error_type: String
      , attempt: usize
    }
  , /// Truncation persisted through every retry attempt
    LengthLimitExceeded
    {   provider: String
      , prompt_tokens: usize
      , completion_tokens: usize
      , total_tokens: usize
      , max_tokens: usize
    }
  , /// Response body was not valid structured data
    Parsing
    {   message: String
      , raw: String
    }
  , /// Parsed data failed structural validation against the field specs
    Validation(Vec<ValidationIssue>)
  , /// Requested prompt name is not in the catalog (caller bug)
    UnknownPrompt(String)
  , /// Backend returned no usable completion at all
    EmptyResponse
  , /// API key is missing for a provider
    MissingApiKey(String)
  , /// Caller-supplied deadline expired mid-flight
    Timeout
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Generic error
    Other(String)
}

impl Error
{   /// Stable string code for this error class
    pub fn code(&self) -> &'static str
    {   match self
        {   Error::Backend { .. } => CODE_PROVIDER_ERROR
          , Error::LengthLimitExceeded { .. } => CODE_LENGTH_LIMIT_EXCEEDED
          , Error::Parsing { .. } => CODE_PARSING_ERROR
          , Error::Validation(_) => CODE_VALIDATION_ERROR
          , Error::UnknownPrompt(_) => CODE_UNKNOWN_PROMPT
          , Error::EmptyResponse => CODE_EMPTY_RESPONSE
          , Error::MissingApiKey(_) => CODE_MISSING_API_KEY
          , Error::Timeout => CODE_TIMEOUT
          , Error::InvalidConfiguration(_) => CODE_INVALID_CONFIGURATION
          , Error::Other(_) => CODE_OTHER
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::Backend { provider, error, error_type, attempt } => {
              write!(f,
                "Backend error from {} on attempt {} ({}): {}",
                provider, attempt, error_type, error
              )
            }
          , Error::LengthLimitExceeded {
              provider, completion_tokens, max_tokens, ..
            } => {
              write!(f,
                "Response from {} still truncated at max_tokens {} \
                 (last completion: {} tokens)",
                provider, max_tokens, completion_tokens
              )
            }
          , Error::Parsing { message, .. } => {
              write!(f, "Failed to parse AI response: {}", message)
            }
          , Error::Validation(issues) => {
              write!(f, "Response validation failed: ")?;
              for (i, issue) in issues.iter().enumerate()
              {   if i > 0
                  {   write!(f, "; ")?;
                  }
                  write!(f, "{}: {}", issue.field, issue.message)?;
              }
              Ok(())
            }
          , Error::UnknownPrompt(name) => {
              write!(f, "Unknown prompt type: {}", name)
            }
          , Error::EmptyResponse => {
              write!(f, "Empty response from model")
            }
          , Error::MissingApiKey(provider) => {
              write!(f, "Missing API key for: {}", provider)
            }
          , Error::Timeout => {
              write!(f, "Request deadline exceeded")
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
