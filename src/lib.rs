pub mod error;
pub mod config;
pub mod request;
pub mod cost;
pub mod warnings;
pub mod envelope;
pub mod prompt;
pub mod combine;
pub mod catalog;
pub mod backends;
pub mod retry;
pub mod orchestrator;

/*

facets is an async library that runs a catalog of structured analysis
prompts against an LLM backend and returns validated, schema-shaped
results with cost and token accounting.

facets/
├── Cargo.toml            # Main manifest
├── src/
│   ├── lib.rs            # Re-exports and main documentation
│   ├── error.rs          # Custom error types and stable error codes
│   ├── config.rs         # Backend, retry, and orchestrator configuration
│   ├── request.rs        # Unified request/completion/result types
│   ├── cost.rs           # Token pricing and cost estimation
│   ├── warnings.rs       # Request-scoped non-fatal diagnostics
│   ├── envelope.rs       # Response envelope parsing and unnesting
│   ├── prompt.rs         # Prompt definitions, field specs, validation
│   ├── combine.rs        # Multi-dimension combined prompt assembly
│   ├── catalog.rs        # Named prompt registry with built-ins
│   ├── backends/         # Vendor-specific completion adapters
│   │   ├── mod.rs        # CompletionBackend trait + shared helpers
│   │   ├── openai.rs     # OpenAI chat-completions adapter
│   │   └── anthropic.rs  # Anthropic messages adapter
│   ├── retry.rs          # Truncation-retry client with budget escalation
│   └── orchestrator.rs   # Sequential / one-shot prompt orchestration
└── tests/                # Integration tests over a mock backend

*/

pub use crate::backends::CompletionBackend;
pub use crate::catalog::PromptCatalog;
pub use crate::combine::PromptCombiner;
pub use crate::config::{BackendConfig, OrchestratorConfig, RetryConfig};
pub use crate::cost::{CostEstimator, CostRates};
pub use crate::envelope::Envelope;
pub use crate::error::{Error, ValidationIssue};
pub use crate::orchestrator::PromptOrchestrator;
pub use crate::prompt::{FieldKind, FieldSpec, PromptDefinition};
pub use crate::request::{
    CompletionOutcome, CompletionRequest, CompletionResult, ErrorResult,
    FinishReason, Message, ProcessingResult, Role, TokenUsage,
};
pub use crate::retry::RetryingCompletionClient;
pub use crate::warnings::{Warning, WarningCode, WarningCollector, WarningSeverity};
