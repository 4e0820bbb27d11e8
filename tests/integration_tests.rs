use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use facets::backends::CompletionBackend;
use facets::catalog::PromptCatalog;
use facets::config::{OrchestratorConfig, RetryConfig};
use facets::error::{self, Error};
use facets::orchestrator::PromptOrchestrator;
use facets::request::{
    BackendFailure, CompletionOutcome, CompletionRequest,
    CompletionResult, FinishReason, Message, TokenUsage,
};
use facets::retry::RetryingCompletionClient;

// ===== Mock Backend =====

#[derive(Debug, Clone)]
struct RecordedCall
{   max_tokens: usize
  , has_schema: bool
}

/// Shared view of the calls a mock backend received
#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog
{   fn count(&self) -> usize
    {   self.0.lock().unwrap().len()
    }

    fn max_tokens(&self) -> Vec<usize>
    {   self.0.lock().unwrap().iter().map(|c| c.max_tokens).collect()
    }
}

/// Backend that replays a scripted sequence of outcomes
struct MockBackend
{   outcomes: Arc<Mutex<VecDeque<CompletionOutcome>>>
  , log: CallLog
  , delay: Option<Duration>
}

impl MockBackend
{   fn scripted(outcomes: Vec<CompletionOutcome>) -> (Self, CallLog)
    {   let _ = env_logger::builder().is_test(true).try_init();
        let log = CallLog::default();
        let backend = MockBackend
        {   outcomes: Arc::new(Mutex::new(outcomes.into()))
          , log: log.clone()
          , delay: None
        };
        (backend, log)
    }

    fn with_delay(mut self, delay: Duration) -> Self
    {   self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CompletionBackend for MockBackend
{   async fn complete(
      &self
    , request: &CompletionRequest
    , schema: Option<&Value>
    ) -> CompletionOutcome
    {   self.log.0.lock().unwrap().push(RecordedCall
        {   max_tokens: request.max_tokens
          , has_schema: schema.is_some()
        });
        if let Some(delay) = self.delay
        {   tokio::time::sleep(delay).await;
        }
        self.outcomes
          .lock()
          .unwrap()
          .pop_front()
          .unwrap_or_else(|| CompletionOutcome::Failed(BackendFailure
          {   error: "script exhausted".to_string()
            , error_type: "mock".to_string()
          }))
    }

    fn provider_name(&self) -> &'static str
    {   "mock"
    }
}

// ===== Scripted Outcomes =====

fn envelope_text(data: Value, confidence: f64) -> String
{   json!({
      "data": data,
      "success": true,
      "confidence": confidence
    }).to_string()
}

fn completed(
  data: Value
, confidence: f64
, usage: TokenUsage
) -> CompletionOutcome
{   CompletionOutcome::Completed(CompletionResult
    {   text: envelope_text(data, confidence)
      , usage
      , finish_reason: FinishReason::Stop
      , provider: "mock".to_string()
    })
}

fn identification_data() -> Value
{   json!({"value": 1, "reason": "mentioned directly"})
}

fn objectives_data() -> Value
{   json!({"objectives": []})
}

fn start_date_data(date: &str) -> Value
{   json!({"start_date": {
      "date": date,
      "context": "programme launch",
      "reason": "stated in the text"
    }})
}

fn orchestrator(
  outcomes: Vec<CompletionOutcome>
) -> (PromptOrchestrator<MockBackend>, CallLog)
{   let (backend, log) = MockBackend::scripted(outcomes);
    let orchestrator = PromptOrchestrator::new(
      backend,
      PromptCatalog::builtin(),
      OrchestratorConfig::default()
    );
    (orchestrator, log)
}

// ===== Retry Client =====

#[tokio::test]
async fn truncation_with_schema_doubles_the_completion_budget()
{   let (backend, log) = MockBackend::scripted(vec![
      CompletionOutcome::Truncated
      {   usage: Some(TokenUsage::new(50, 100))
      }
    , completed(identification_data(), 0.9, TokenUsage::new(60, 40))
    ]);
    let client = RetryingCompletionClient::new(
      backend, RetryConfig::default()
    );

    let schema = json!({"type": "object"});
    let mut request = CompletionRequest::new(
      vec![Message::user("analyze")], 0.1, 100
    );
    let result = client
      .complete(&mut request, Some(&schema))
      .await
      .unwrap();

    assert_eq!(log.max_tokens(), vec![100, 200]);
    assert_eq!(result.usage, TokenUsage::new(60, 40));
    // The caller's budget is restored after a recovered retry
    assert_eq!(request.max_tokens, 100);
}

#[tokio::test]
async fn truncation_without_schema_grows_the_budget_by_a_fifth()
{   let (backend, log) = MockBackend::scripted(vec![
      CompletionOutcome::Truncated
      {   usage: Some(TokenUsage::new(50, 100))
      }
    , completed(json!({"value": 1}), 1.0, TokenUsage::new(10, 10))
    ]);
    let client = RetryingCompletionClient::new(
      backend, RetryConfig::default()
    );

    let mut request = CompletionRequest::new(
      vec![Message::user("analyze")], 0.1, 100
    );
    client.complete(&mut request, None).await.unwrap();

    assert_eq!(log.max_tokens(), vec![100, 120]);
}

#[tokio::test]
async fn unknown_partial_usage_scales_the_current_budget()
{   let (backend, log) = MockBackend::scripted(vec![
      CompletionOutcome::Truncated
      {   usage: None
      }
    , completed(json!({"value": 1}), 1.0, TokenUsage::new(10, 10))
    ]);
    let client = RetryingCompletionClient::new(
      backend, RetryConfig::default()
    );

    let mut request = CompletionRequest::new(
      vec![Message::user("analyze")], 0.1, 100
    );
    client.complete(&mut request, None).await.unwrap();

    assert_eq!(log.max_tokens(), vec![100, 150]);
}

#[tokio::test]
async fn persistent_truncation_stops_after_three_attempts()
{   let truncated = || CompletionOutcome::Truncated
    {   usage: Some(TokenUsage::new(50, 100))
    };
    let (backend, log) = MockBackend::scripted(vec![
      truncated(), truncated(), truncated()
    ]);
    let client = RetryingCompletionClient::new(
      backend, RetryConfig::default()
    );

    let schema = json!({"type": "object"});
    let mut request = CompletionRequest::new(
      vec![Message::user("analyze")], 0.1, 100
    );
    let err = client
      .complete(&mut request, Some(&schema))
      .await
      .unwrap_err();

    assert_eq!(log.count(), 3);
    assert_eq!(err.code(), error::CODE_LENGTH_LIMIT_EXCEEDED);
    match err
    {   Error::LengthLimitExceeded { completion_tokens, .. } => {
          assert_eq!(completion_tokens, 100);
        }
      , other => panic!("expected length limit error, got {:?}", other)
    }
}

#[tokio::test]
async fn backend_failure_is_never_retried()
{   let (backend, log) = MockBackend::scripted(vec![
      CompletionOutcome::Failed(BackendFailure
      {   error: "rate limited".to_string()
        , error_type: "api".to_string()
      })
    ]);
    let client = RetryingCompletionClient::new(
      backend, RetryConfig::default()
    );

    let mut request = CompletionRequest::new(
      vec![Message::user("analyze")], 0.1, 100
    );
    let err = client.complete(&mut request, None).await.unwrap_err();

    assert_eq!(log.count(), 1);
    assert_eq!(err.code(), error::CODE_PROVIDER_ERROR);
}

#[tokio::test]
async fn expired_deadline_surfaces_a_timeout()
{   let (backend, _log) = MockBackend::scripted(vec![
      completed(json!({"value": 1}), 1.0, TokenUsage::new(10, 10))
    ]);
    let backend = backend.with_delay(Duration::from_millis(100));
    let config = RetryConfig
    {   deadline_ms: Some(5)
      , ..RetryConfig::default()
    };
    let client = RetryingCompletionClient::new(backend, config);

    let mut request = CompletionRequest::new(
      vec![Message::user("analyze")], 0.1, 100
    );
    let err = client.complete(&mut request, None).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
}

// ===== Orchestrator =====

#[tokio::test]
async fn single_prompt_returns_validated_data_and_cost()
{   let (orchestrator, log) = orchestrator(vec![
      completed(identification_data(), 0.9, TokenUsage::new(1000, 500))
    ]);

    let result = orchestrator
      .process_prompt("identification", "doc text", "Green Deal")
      .await
      .unwrap();

    assert_eq!(log.count(), 1);
    assert_eq!(result.data["identification"]["value"], 1);
    assert_eq!(result.usage, TokenUsage::new(1000, 500));
    assert!((result.cost_estimate - 0.0025).abs() < 1e-12);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn sequential_prompts_accumulate_usage_and_duration()
{   let (orchestrator, log) = orchestrator(vec![
      completed(identification_data(), 0.9, TokenUsage::new(100, 50))
    , completed(objectives_data(), 0.9, TokenUsage::new(80, 40))
    , completed(start_date_data("2020"), 0.9, TokenUsage::new(60, 30))
    ]);

    let result = orchestrator
      .process_selected_prompts(
        &["identification", "objectives", "start_date"],
        "doc text",
        "Green Deal"
      )
      .await
      .unwrap();

    assert_eq!(log.count(), 3);
    assert_eq!(result.usage.prompt_tokens, 240);
    assert_eq!(result.usage.completion_tokens, 120);
    assert_eq!(result.usage.total_tokens, 360);
    assert_eq!(result.data.len(), 3);
}

#[tokio::test]
async fn sequential_run_short_circuits_on_the_first_failure()
{   let (orchestrator, log) = orchestrator(vec![
      completed(identification_data(), 0.9, TokenUsage::new(100, 50))
    , CompletionOutcome::Failed(BackendFailure
      {   error: "service unavailable".to_string()
        , error_type: "api".to_string()
      })
      // Later prompts must never be attempted
    , completed(start_date_data("2020"), 0.9, TokenUsage::new(60, 30))
    , completed(json!({"budget_items": []}), 0.9, TokenUsage::new(60, 30))
    ]);

    let err = orchestrator
      .process_selected_prompts(
        &["identification", "objectives", "start_date", "budget"],
        "doc text",
        "Green Deal"
      )
      .await
      .unwrap_err();

    assert_eq!(log.count(), 2);
    assert_eq!(err.code, error::CODE_PROVIDER_ERROR);
    assert_eq!(err.details["error"], "service unavailable");
}

#[tokio::test]
async fn all_prompts_run_covers_the_whole_catalog_in_order()
{   let (orchestrator, log) = orchestrator(vec![
      completed(identification_data(), 0.9, TokenUsage::new(10, 5))
    , completed(objectives_data(), 0.9, TokenUsage::new(10, 5))
    , completed(start_date_data("2020"), 0.9, TokenUsage::new(10, 5))
    , completed(json!({"budget_items": []}), 0.9, TokenUsage::new(10, 5))
    , completed(json!({"themes": []}), 0.9, TokenUsage::new(10, 5))
    ]);

    let result = orchestrator
      .process_all_prompts("doc text", "Green Deal")
      .await
      .unwrap();

    assert_eq!(log.count(), 5);
    assert_eq!(
      result.data.keys().collect::<Vec<_>>(),
      vec!["budget", "identification", "objectives",
           "start_date", "themes"]
    );
    assert_eq!(result.usage.total_tokens, 75);
}

#[tokio::test]
async fn unknown_prompt_fails_without_calling_the_backend()
{   let (orchestrator, log) = orchestrator(vec![]);

    let err = orchestrator
      .process_prompt("nonexistent", "doc text", "Green Deal")
      .await
      .unwrap_err();

    assert_eq!(log.count(), 0);
    assert_eq!(err.code, error::CODE_UNKNOWN_PROMPT);
    assert_eq!(err.details["prompt_type"], "nonexistent");
}

#[tokio::test]
async fn schema_echo_is_rejected_as_a_validation_error()
{   let echoed = json!({
      "$schema": "http://json-schema.org/draft-07/schema#",
      "type": "object"
    });
    let (orchestrator, _log) = orchestrator(vec![
      completed(echoed, 1.0, TokenUsage::new(10, 5))
    ]);

    let err = orchestrator
      .process_prompt("identification", "doc text", "Green Deal")
      .await
      .unwrap_err();

    assert_eq!(err.code, error::CODE_VALIDATION_ERROR);
    assert!(err.details["raw_response"]["$schema"].is_string());
}

#[tokio::test]
async fn nonconforming_payload_fails_validation_with_field_paths()
{   let (orchestrator, _log) = orchestrator(vec![
      completed(
        json!({"value": "yes"}), 1.0, TokenUsage::new(10, 5)
      )
    ]);

    let err = orchestrator
      .process_prompt("identification", "doc text", "Green Deal")
      .await
      .unwrap_err();

    assert_eq!(err.code, error::CODE_VALIDATION_ERROR);
    let issues = err.details["validation_errors"].as_array().unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0]["field"], "value");
    assert_eq!(issues[1]["field"], "reason");
}

#[tokio::test]
async fn unparseable_response_surfaces_the_raw_text()
{   let (orchestrator, _log) = orchestrator(vec![
      CompletionOutcome::Completed(CompletionResult
      {   text: "not json at all".to_string()
        , usage: TokenUsage::new(10, 5)
        , finish_reason: FinishReason::Stop
        , provider: "mock".to_string()
      })
    ]);

    let err = orchestrator
      .process_prompt("identification", "doc text", "Green Deal")
      .await
      .unwrap_err();

    assert_eq!(err.code, error::CODE_PARSING_ERROR);
    assert_eq!(err.details["raw_response"], "not json at all");
}

#[tokio::test]
async fn nested_envelopes_are_unwrapped_before_validation()
{   let nested = json!({
      "data": identification_data(),
      "success": true,
      "confidence": 0.85
    });
    let (orchestrator, _log) = orchestrator(vec![
      completed(nested, 0.95, TokenUsage::new(10, 5))
    ]);

    let result = orchestrator
      .process_prompt("identification", "doc text", "Green Deal")
      .await
      .unwrap();

    assert_eq!(result.data["identification"]["value"], 1);
    assert!((result.confidence - 0.85).abs() < 1e-12);
}

#[tokio::test]
async fn low_confidence_adds_a_warning_to_the_result()
{   let (orchestrator, _log) = orchestrator(vec![
      completed(identification_data(), 0.5, TokenUsage::new(10, 5))
    ]);

    let result = orchestrator
      .process_prompt("identification", "doc text", "Green Deal")
      .await
      .unwrap();

    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("confidence threshold"));
    assert!((result.confidence - 0.5).abs() < 1e-12);
}

#[tokio::test]
async fn concurrent_requests_do_not_share_warnings()
{   let (orchestrator, _log) = orchestrator(vec![
      completed(identification_data(), 0.5, TokenUsage::new(10, 5))
    , completed(identification_data(), 0.95, TokenUsage::new(10, 5))
    ]);

    let (first, second) = tokio::join!(
      orchestrator.process_prompt("identification", "text a", "X"),
      orchestrator.process_prompt("identification", "text b", "X")
    );
    let first = first.unwrap();
    let second = second.unwrap();

    // Exactly one response was low-confidence; only the request that
    // received it carries the warning
    let (low, high) = if first.confidence < 0.7
    {   (first, second)
    } else
    {   (second, first)
    };
    assert_eq!(low.warnings.len(), 1);
    assert!(high.warnings.is_empty());
}

// ===== One-Shot =====

#[tokio::test]
async fn one_shot_issues_exactly_one_call_for_many_dimensions()
{   let combined = json!({
      "identification": identification_data(),
      "objectives": objectives_data()
    });
    let (orchestrator, log) = orchestrator(vec![
      completed(combined, 0.9, TokenUsage::new(200, 100))
    ]);

    let result = orchestrator
      .process_one_shot(
        &["identification", "objectives"], "doc text", "Green Deal"
      )
      .await
      .unwrap();

    assert_eq!(log.count(), 1);
    assert_eq!(result.data.len(), 2);
    assert_eq!(result.usage, TokenUsage::new(200, 100));

    // The same dimensions processed sequentially take one call each
    let (sequential, sequential_log) = self::orchestrator(vec![
      completed(identification_data(), 0.9, TokenUsage::new(100, 50))
    , completed(objectives_data(), 0.9, TokenUsage::new(100, 50))
    ]);
    sequential
      .process_selected_prompts(
        &["identification", "objectives"], "doc text", "Green Deal"
      )
      .await
      .unwrap();
    assert_eq!(sequential_log.count(), 2);
}

#[tokio::test]
async fn one_shot_with_no_names_covers_the_whole_catalog()
{   let combined = json!({
      "identification": identification_data(),
      "objectives": objectives_data(),
      "start_date": start_date_data("2020"),
      "budget": {"budget_items": []},
      "themes": {"themes": []}
    });
    let (orchestrator, log) = orchestrator(vec![
      completed(combined, 0.9, TokenUsage::new(300, 150))
    ]);

    let result = orchestrator
      .process_one_shot(&[], "doc text", "Green Deal")
      .await
      .unwrap();

    assert_eq!(log.count(), 1);
    assert_eq!(result.data.len(), 5);
}

#[tokio::test]
async fn one_shot_flags_inconsistent_dates_across_dimensions()
{   let combined = json!({
      "identification": {
        "value": 1,
        "reason": "mentioned",
        "start_date": {"date": "2019"}
      },
      "start_date": start_date_data("2021")
    });
    let (orchestrator, _log) = orchestrator(vec![
      completed(combined, 0.9, TokenUsage::new(100, 50))
    ]);

    let result = orchestrator
      .process_one_shot(
        &["identification", "start_date"], "doc text", "Green Deal"
      )
      .await
      .unwrap();

    assert!(result.warnings
      .iter()
      .any(|w| w.contains("Inconsistent dates")));
}

#[tokio::test]
async fn one_shot_warns_about_missing_dimensions()
{   let combined = json!({
      "identification": identification_data()
    });
    let (orchestrator, _log) = orchestrator(vec![
      completed(combined, 0.9, TokenUsage::new(100, 50))
    ]);

    let result = orchestrator
      .process_one_shot(
        &["identification", "objectives"], "doc text", "Green Deal"
      )
      .await
      .unwrap();

    assert_eq!(result.data.len(), 1);
    assert!(result.warnings
      .iter()
      .any(|w| w.contains("'objectives' missing")));
}

// ===== Request Assembly =====

#[tokio::test]
async fn prompt_requests_carry_the_schema_to_the_backend()
{   let (orchestrator, log) = orchestrator(vec![
      completed(identification_data(), 0.9, TokenUsage::new(10, 5))
    ]);

    orchestrator
      .process_prompt("identification", "doc text", "Green Deal")
      .await
      .unwrap();

    let calls = log.0.lock().unwrap();
    assert!(calls[0].has_schema);
    assert_eq!(
      calls[0].max_tokens,
      OrchestratorConfig::default().max_tokens
    );
}
