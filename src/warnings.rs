//! Request-scoped collection of non-fatal diagnostics
//!
//! A collector is created fresh for every orchestration call and drained
//! exactly once when the final response is built. It is an owned value,
//! never a process-wide sink, so warnings from one in-flight request
//! cannot surface in another's response.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use log::debug;

/// Warning category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode
{   LowConfidence
  , InconsistentData
  , ValidationWarning
  , PerformanceWarning
  , ContentTruncated
}

/// Warning severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity
{   Low
  , Medium
  , High
  , Critical
}

/// One non-fatal diagnostic attached to an otherwise valid result
#[derive(Debug, Clone, PartialEq)]
pub struct Warning
{   pub message: String
  , pub code: WarningCode
  , pub severity: WarningSeverity
  , pub timestamp: SystemTime
}

/// Per-request warning sink
#[derive(Debug, Default)]
pub struct WarningCollector
{   warnings: Vec<Warning>
}

impl WarningCollector
{   pub fn new() -> Self
    {   WarningCollector
        {   warnings: Vec::new()
        }
    }

    /// Record a new warning; never aborts processing
    pub fn add(
      &mut self
    , message: impl Into<String>
    , code: WarningCode
    , severity: WarningSeverity
    )
    {   let message = message.into();
        debug!(
          "Collected warning [{:?}/{:?}]: {}",
          code, severity, message
        );
        self.warnings.push(Warning
        {   message
          , code
          , severity
          , timestamp: SystemTime::now()
        });
    }

    /// View collected warnings without consuming them
    pub fn get_all(&self) -> &[Warning]
    {   &self.warnings
    }

    /// Take every warning, leaving the collector empty
    pub fn drain(&mut self) -> Vec<Warning>
    {   std::mem::take(&mut self.warnings)
    }

    pub fn clear(&mut self)
    {   self.warnings.clear();
    }

    pub fn len(&self) -> usize
    {   self.warnings.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.warnings.is_empty()
    }
}
