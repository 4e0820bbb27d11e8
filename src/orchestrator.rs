//! Prompt orchestration over the retrying completion client
//!
//! Turns named prompt definitions into completion calls, enforces the
//! response envelope, and aggregates results, usage, and cost across
//! either a sequence of narrow calls (one per dimension) or a single
//! combined call spanning every requested dimension.

use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use log::{debug, info, warn};

use crate::backends::CompletionBackend;
use crate::catalog::PromptCatalog;
use crate::combine::PromptCombiner;
use crate::config::OrchestratorConfig;
use crate::cost::CostEstimator;
use crate::envelope;
use crate::error::{Error, CODE_VALIDATION_ERROR};
use crate::prompt::{validate, wrap_envelope_schema, PromptDefinition};
use crate::request::{ErrorResult, ProcessingResult, TokenUsage};
use crate::retry::RetryingCompletionClient;
use crate::warnings::{WarningCollector, WarningCode, WarningSeverity};

/// Outcome of one prompt round trip, before aggregation
struct PromptRun
{   data: Value
  , confidence: f64
  , usage: TokenUsage
  , duration: f64
}

/// Orchestrator over a catalog of prompt definitions and one backend
pub struct PromptOrchestrator<B>
{   catalog: PromptCatalog
  , client: RetryingCompletionClient<B>
  , estimator: CostEstimator
  , config: OrchestratorConfig
}

impl<B: CompletionBackend> PromptOrchestrator<B>
{   pub fn new(
      backend: B
    , catalog: PromptCatalog
    , config: OrchestratorConfig
    ) -> Self
    {   let estimator = CostEstimator::new(backend.cost_rates());
        let client = RetryingCompletionClient::new(
          backend, config.retry.clone()
        );
        PromptOrchestrator
        {   catalog
          , client
          , estimator
          , config
        }
    }

    pub fn catalog(&self) -> &PromptCatalog
    {   &self.catalog
    }

    fn lookup(&self, name: &str)
      -> Result<&PromptDefinition, ErrorResult>
    {   self.catalog.get(name).ok_or_else(|| {
          warn!("Requested unknown prompt type: {}", name);
          Error::UnknownPrompt(name.to_string()).into()
        })
    }

    /// Detect the "schema echoed instead of data" failure mode
    fn schema_echo_error(
      provider: &str
    , parsed: &envelope::Envelope
    ) -> ErrorResult
    {   warn!("Model returned schema instead of data");
        ErrorResult::new(
          CODE_VALIDATION_ERROR,
          "AI returned schema instead of data",
          json!({
            "validation_errors": [{
              "error": "AI returned schema instead of data",
              "field": "data"
            }],
            "raw_response": parsed.data,
            "provider": provider,
            "confidence": parsed.confidence
          })
        )
    }

    fn note_low_confidence(
      &self
    , confidence: f64
    , warnings: &mut WarningCollector
    )
    {   if confidence < self.config.confidence_threshold
        {   warnings.add(
              format!(
                "Response below confidence threshold ({})",
                self.config.confidence_threshold
              ),
              WarningCode::LowConfidence,
              WarningSeverity::Medium
            );
        }
    }

    /// One prompt round trip: build, complete, parse, check, validate
    async fn run_prompt(
      &self
    , name: &str
    , text: &str
    , subject: &str
    , warnings: &mut WarningCollector
    ) -> Result<PromptRun, ErrorResult>
    {   let definition = self.lookup(name)?;
        let provider = self.client.backend().provider_name();

        let mut request = definition.to_completion_request(
          subject, text, &self.config
        );
        let schema = wrap_envelope_schema(&definition.response_schema());

        debug!("Processing prompt '{}' via {}", name, provider);
        let started = Instant::now();
        let result = self.client
          .complete(&mut request, Some(&schema))
          .await
          .map_err(ErrorResult::from)?;
        let duration = started.elapsed().as_secs_f64();

        let parsed = envelope::parse(&result.text)
          .map_err(ErrorResult::from)?;

        if parsed.data.get("$schema").is_some()
        {   return Err(Self::schema_echo_error(provider, &parsed));
        }

        let issues = validate(&definition.response_fields, &parsed.data);
        if !issues.is_empty()
        {   warn!(
              "Prompt '{}' failed validation with {} issue(s)",
              name, issues.len()
            );
            return Err(Error::Validation(issues).into());
        }

        self.note_low_confidence(parsed.confidence, warnings);

        debug!(
          "Prompt '{}' completed in {:.2}s ({} tokens)",
          name, duration, result.usage.total_tokens
        );

        Ok(PromptRun
        {   data: parsed.data
          , confidence: parsed.confidence
          , usage: result.usage
          , duration
        })
    }

    /// Assemble the final result and drain the warning collector
    fn finalize(
      &self
    , data: BTreeMap<String, Value>
    , usage: TokenUsage
    , duration: f64
    , confidence: f64
    , warnings: &mut WarningCollector
    ) -> ProcessingResult
    {   let tokens_per_second = if duration > 0.0
        {   usage.total_tokens as f64 / duration
        } else
        {   0.0
        };
        let cost_estimate = self.estimator.estimate(&usage);
        let warnings = warnings
          .drain()
          .into_iter()
          .map(|w| w.message)
          .collect();

        ProcessingResult
        {   data
          , usage
          , duration
          , tokens_per_second
          , cost_estimate
          , confidence
          , warnings
        }
    }

    /// Process a single named prompt against the text
    pub async fn process_prompt(
      &self
    , name: &str
    , text: &str
    , subject: &str
    ) -> Result<ProcessingResult, ErrorResult>
    {   let mut warnings = WarningCollector::new();
        let run = self
          .run_prompt(name, text, subject, &mut warnings)
          .await?;

        let mut data = BTreeMap::new();
        data.insert(name.to_string(), run.data);
        Ok(self.finalize(
          data, run.usage, run.duration, run.confidence, &mut warnings
        ))
    }

    /// Process every catalog prompt sequentially
    pub async fn process_all_prompts(
      &self
    , text: &str
    , subject: &str
    ) -> Result<ProcessingResult, ErrorResult>
    {   let names: Vec<String> = self.catalog
          .names()
          .into_iter()
          .map(String::from)
          .collect();
        self.process_selected_prompts(
          &names.iter().map(String::as_str).collect::<Vec<_>>(),
          text,
          subject
        ).await
    }

    /// Process the selected prompts sequentially, in order
    ///
    /// Calls are issued one at a time, never in parallel: this bounds
    /// the rate against the external service and keeps cumulative
    /// usage accounting deterministic. The first failing prompt
    /// terminates the run; no later prompt is attempted and none of
    /// its usage or cost is included.
    pub async fn process_selected_prompts(
      &self
    , names: &[&str]
    , text: &str
    , subject: &str
    ) -> Result<ProcessingResult, ErrorResult>
    {   info!(
          "Processing {} prompt(s) sequentially for '{}'",
          names.len(), subject
        );

        let mut warnings = WarningCollector::new();
        let mut data = BTreeMap::new();
        let mut usage = TokenUsage::zero();
        let mut duration = 0.0;
        let mut confidence = 1.0_f64;

        for name in names
        {   let run = self
              .run_prompt(name, text, subject, &mut warnings)
              .await?;
            data.insert(name.to_string(), run.data);
            usage.add(&run.usage);
            duration += run.duration;
            confidence = confidence.min(run.confidence);
        }

        Ok(self.finalize(
          data, usage, duration, confidence, &mut warnings
        ))
    }

    /// Process the selected prompts as one combined completion call
    ///
    /// Trades per-dimension isolation for one-round-trip latency and
    /// implicit cross-dimension consistency; the run fully succeeds or
    /// fully fails as a single unit.
    pub async fn process_one_shot(
      &self
    , names: &[&str]
    , text: &str
    , subject: &str
    ) -> Result<ProcessingResult, ErrorResult>
    {   let all_names: Vec<&str>;
        let requested: &[&str] = if names.is_empty()
        {   all_names = self.catalog.names();
            &all_names
        } else
        {   names
        };

        let mut definitions = Vec::with_capacity(requested.len());
        for name in requested
        {   definitions.push(self.lookup(name)?);
        }

        info!(
          "Processing one-shot combined call over {} dimension(s) \
           for '{}'",
          definitions.len(), subject
        );

        let combiner = PromptCombiner::new(definitions);
        let mut request
          = combiner.build_request(subject, text, &self.config);
        let schema = wrap_envelope_schema(&combiner.response_schema());
        let provider = self.client.backend().provider_name();

        let mut warnings = WarningCollector::new();
        let started = Instant::now();
        let result = self.client
          .complete(&mut request, Some(&schema))
          .await
          .map_err(ErrorResult::from)?;
        let duration = started.elapsed().as_secs_f64();

        let parsed = envelope::parse(&result.text)
          .map_err(ErrorResult::from)?;

        if parsed.data.get("$schema").is_some()
        {   return Err(Self::schema_echo_error(provider, &parsed));
        }

        let Some(payloads) = parsed.data.as_object() else
        {   return Err(ErrorResult::from(Error::Parsing
            {   message:
                  "combined response payload is not an object"
                    .to_string()
              , raw: result.text
            }));
        };

        let mut data = BTreeMap::new();
        for name in combiner.dimension_names()
        {   match payloads.get(name)
            {   Some(payload) => {
                  data.insert(name.to_string(), payload.clone());
                }
              , None => {
                  warnings.add(
                    format!("Dimension '{}' missing from response", name),
                    WarningCode::ValidationWarning,
                    WarningSeverity::High
                  );
                }
            }
        }

        check_cross_dimension_consistency(&data, &mut warnings);
        self.note_low_confidence(parsed.confidence, &mut warnings);

        Ok(self.finalize(
          data, result.usage, duration, parsed.confidence,
          &mut warnings
        ))
    }
}

/// Flag conflicting values shared across dimensions of one combined
/// response (budget amounts, start dates)
fn check_cross_dimension_consistency(
  data: &BTreeMap<String, Value>
, warnings: &mut WarningCollector
)
{   let mut budget_amounts = BTreeSet::new();
    let mut dates = BTreeSet::new();

    for payload in data.values()
    {   if let Some(items) = payload
          .get("budget_items")
          .and_then(Value::as_array)
        {   for item in items
            {   if let Some(amount)
                  = item.get("amount").and_then(Value::as_str)
                {   budget_amounts.insert(amount.to_string());
                }
            }
        }
        if let Some(date) = payload
          .get("start_date")
          .and_then(|d| d.get("date"))
          .and_then(Value::as_str)
        {   dates.insert(date.to_string());
        }
    }

    if budget_amounts.len() > 1
    {   warnings.add(
          format!(
            "Inconsistent budget amounts across dimensions: {:?}",
            budget_amounts
          ),
          WarningCode::InconsistentData,
          WarningSeverity::High
        );
    }
    if dates.len() > 1
    {   warnings.add(
          format!(
            "Inconsistent dates across dimensions: {:?}",
            dates
          ),
          WarningCode::InconsistentData,
          WarningSeverity::High
        );
    }
}
