//! One-shot combination of multiple prompt definitions
//!
//! The combiner holds a list of prompt definitions and builds one merged
//! completion request whose schema nests one sub-object per dimension.
//! It is plain composition over the definitions; nothing is subclassed
//! or mutated.

use serde_json::{json, Map, Value};
use log::debug;

use crate::config::OrchestratorConfig;
use crate::prompt::PromptDefinition;
use crate::request::{CompletionRequest, Message};

/// Default user template for a combined request
const COMBINED_TEMPLATE: &str
  = "Analyze the provided text for {subject} across all specified dimensions.";

/// Builder of one merged request spanning several analysis dimensions
#[derive(Debug, Clone)]
pub struct PromptCombiner<'a>
{   dimensions: Vec<&'a PromptDefinition>
}

impl<'a> PromptCombiner<'a>
{   pub fn new(dimensions: Vec<&'a PromptDefinition>) -> Self
    {   debug!(
          "Creating prompt combiner over {} dimension(s)",
          dimensions.len()
        );
        PromptCombiner
        {   dimensions
        }
    }

    pub fn dimension_names(&self) -> Vec<&str>
    {   self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    /// Union schema: one sub-schema per dimension, each taken verbatim
    /// from that dimension's own definition
    pub fn response_schema(&self) -> Value
    {   let mut properties = Map::new();
        let mut required = Vec::new();
        for definition in &self.dimensions
        {   properties.insert(
              definition.name.clone(),
              definition.response_schema()
            );
            required.push(Value::String(definition.name.clone()));
        }
        json!({
          "type": "object",
          "properties": properties,
          "required": required,
          "additionalProperties": false
        })
    }

    /// System message documenting every dimension's purpose and
    /// analysis instructions, plus per-dimension reference data
    fn build_system_message(&self, text: &str) -> String
    {   let mut system = format!(
          "You are a policy analysis expert. You will analyze the \
           following text across multiple dimensions.\n\n\
           TEXT TO ANALYZE:\n{}\n\nANALYSIS DIMENSIONS:\n",
          text
        );

        for definition in &self.dimensions
        {   system.push_str(&format!(
              "\n[{}]\nPurpose: {}\nAnalysis Instructions: {}\n---\n",
              definition.name.to_uppercase(),
              definition.description,
              definition.system_message
            ));
        }

        let reference_sections: Vec<(String, String)> = self.dimensions
          .iter()
          .filter(|d| d.reference_data.is_some())
          .map(|d| (d.name.to_uppercase(), d.format_reference_data()))
          .collect();

        if !reference_sections.is_empty()
        {   system.push_str("\n\nREFERENCE DATA BY DIMENSION:\n");
            for (name, block) in reference_sections
            {   system.push_str(&format!("\n[{}]\n{}", name, block));
            }
        }

        system
    }

    /// Build the single merged completion request
    pub fn build_request(
      &self
    , subject: &str
    , text: &str
    , config: &OrchestratorConfig
    ) -> CompletionRequest
    {   let system = self.build_system_message(text);
        let user = COMBINED_TEMPLATE.replace("{subject}", subject);

        debug!(
          "Built combined request over [{}] (system: {} chars)",
          self.dimension_names().join(", "),
          system.len()
        );

        CompletionRequest::new(
          vec![
            Message::system(system)
          , Message::user(user)
          ],
          config.temperature,
          config.max_tokens
        )
    }
}
