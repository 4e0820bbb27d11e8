//! Static registry of named prompt definitions
//!
//! The catalog is loaded once at process start and shared read-only
//! across all requests. Registration order is preserved so that
//! "all prompts" runs are deterministic.

use serde_json::json;
use log::debug;

use crate::prompt::{FieldSpec, PromptDefinition};

/// Ordered name -> definition registry
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog
{   prompts: Vec<PromptDefinition>
}

impl PromptCatalog
{   pub fn new() -> Self
    {   PromptCatalog
        {   prompts: Vec::new()
        }
    }

    /// Register a definition, replacing any existing one with the
    /// same name
    pub fn insert(&mut self, definition: PromptDefinition)
    {   debug!("Registering prompt definition '{}'", definition.name);
        match self.prompts.iter_mut()
          .find(|p| p.name == definition.name)
        {   Some(existing) => *existing = definition
          , None => self.prompts.push(definition)
        }
    }

    pub fn get(&self, name: &str) -> Option<&PromptDefinition>
    {   self.prompts.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str>
    {   self.prompts.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize
    {   self.prompts.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.prompts.is_empty()
    }

    /// Catalog of the builtin analysis dimensions
    pub fn builtin() -> Self
    {   let mut catalog = PromptCatalog::new();
        catalog.insert(identification_prompt());
        catalog.insert(objectives_prompt());
        catalog.insert(start_date_prompt());
        catalog.insert(budget_prompt());
        catalog.insert(themes_prompt());
        catalog
    }
}

// ===== Builtin Definitions =====

fn identification_prompt() -> PromptDefinition
{   PromptDefinition
    {   name: "identification".to_string()
      , description:
          "Determine if the initiative is discussed in the text"
            .to_string()
      , system_message:
          "You are an expert at identifying policy initiatives in text. \
           Your task is to determine if a specific initiative is discussed."
            .to_string()
      , template:
          "Using the information provided, determine whether {subject} \
           is discussed. Respond with 1 if yes, 0 if no, or 99 if uncertain."
            .to_string()
      , version: "1.0".to_string()
      , response_fields: vec![
          ( "value".to_string()
          , FieldSpec::integer(
              "1 if initiative is present, 0 if not, 99 if uncertain"
            ).with_range(0.0, 99.0)
          )
        , ( "reason".to_string()
          , FieldSpec::string(
              "Reasoning for the identification decision"
            ).with_max_length(200)
          )
        ]
      , reference_data: None
    }
}

fn objectives_prompt() -> PromptDefinition
{   let objective = FieldSpec::object(
      "Single objective with title, description and reasoning",
      vec![
        ( "title".to_string()
        , FieldSpec::string("Title or name of the objective")
        )
      , ( "text".to_string()
        , FieldSpec::string(
            "Detailed explanation of the objective"
          ).with_max_length(200)
        )
      , ( "reason".to_string()
        , FieldSpec::string(
            "Reasoning for why this was identified as an objective"
          ).with_max_length(200)
        )
      ]
    );

    PromptDefinition
    {   name: "objectives".to_string()
      , description:
          "Extract initiative objectives and their descriptions"
            .to_string()
      , system_message:
          "You are a policy expert analyzing initiative objectives. \
           Your task is to identify explicit objectives, aims, and \
           intended outcomes. Focus on clear statements of what the \
           initiative intends to achieve. Do not include activities or \
           implementation details unless they directly relate to goals."
            .to_string()
      , template:
          "Act as a policy expert and identify the {subject} \
           initiative's objectives. Look for explicit statements about \
           goals and aims, intended outcomes, and target achievements. \
           For each objective provide a clear title, a brief explanation, \
           and reasoning for why you identified it as an objective. \
           If no clear objectives are found, return an empty list."
            .to_string()
      , version: "1.0".to_string()
      , response_fields: vec![
          ( "objectives".to_string()
          , FieldSpec::array(
              "List of objectives with their descriptions and reasoning",
              objective
            )
          )
        ]
      , reference_data: None
    }
}

fn start_date_prompt() -> PromptDefinition
{   let start_date = FieldSpec::object(
      "Start date information for an initiative",
      vec![
        ( "date".to_string()
        , FieldSpec::string(
            "The start year of the initiative in YYYY format"
          )
        )
      , ( "context".to_string()
        , FieldSpec::string("Context or description of the date")
        )
      , ( "reason".to_string()
        , FieldSpec::string(
            "Reasoning for why this date was identified as the start date"
          ).with_max_length(200)
        )
      ]
    );

    PromptDefinition
    {   name: "start_date".to_string()
      , description: "Extract initiative start date".to_string()
      , system_message:
          "You are a data analyst extracting temporal information."
            .to_string()
      , template:
          "Using the information provided, determine the starting date \
           of the {subject} initiative if mentioned. Structure your \
           response with the date and what it refers to."
            .to_string()
      , version: "1.0".to_string()
      , response_fields: vec![
          ( "start_date".to_string()
          , start_date
          )
        ]
      , reference_data: None
    }
}

fn budget_prompt() -> PromptDefinition
{   let budget_item = FieldSpec::object(
      "Single budget item with amount, purpose, year and reasoning",
      vec![
        ( "amount".to_string()
        , FieldSpec::string("The monetary amount")
        )
      , ( "purpose".to_string()
        , FieldSpec::string("What the budget is allocated for")
        )
      , ( "year".to_string()
        , FieldSpec::string(
            "Temporal information about the identified budget item \
             (e.g. '2014', '2024-2034', 'next 10 years')"
          )
        )
      , ( "reason".to_string()
        , FieldSpec::string(
            "Reasoning for why this budget information was extracted"
          ).with_max_length(200)
        )
      ]
    );

    PromptDefinition
    {   name: "budget".to_string()
      , description:
          "Extract budget and monetary information".to_string()
      , system_message:
          "You are a financial analyst extracting monetary information \
           from policy documents. Your task is to identify and extract \
           any budget, funding, or monetary allocations. For each item, \
           provide the amount, its purpose, and explain why you \
           identified it as relevant. Extract as many items as possible."
            .to_string()
      , template:
          "Using the information provided, determine if there is any \
           monetary information such as budget or expenditure related to \
           the {subject} initiative. Include amounts, purposes, and any \
           temporal information if available. For each budget item, \
           explain why you consider it relevant to the initiative. \
           If no monetary information is found, return an empty list."
            .to_string()
      , version: "1.0".to_string()
      , response_fields: vec![
          ( "budget_items".to_string()
          , FieldSpec::array(
              "List of budget items with their amounts, purposes, \
               and reasoning",
              budget_item
            )
          )
        ]
      , reference_data: None
    }
}

fn themes_prompt() -> PromptDefinition
{   let theme = FieldSpec::object(
      "Single theme with code, label and reasoning",
      vec![
        ( "theme_code".to_string()
        , FieldSpec::string("Code of the theme")
        )
      , ( "label".to_string()
        , FieldSpec::string(
            "Label of the theme as provided in the reference data"
          )
        )
      , ( "reason".to_string()
        , FieldSpec::string(
            "Reasoning for why this theme applies"
          ).with_max_length(200)
        )
      ]
    );

    PromptDefinition
    {   name: "themes".to_string()
      , description:
          "Identify main and secondary themes of the initiative"
            .to_string()
      , system_message:
          "You are a policy analyst specializing in thematic \
           classification of STI initiatives. Your task is to identify \
           the main themes that best describe the initiative's focus. \
           Only select themes that are explicitly mentioned or clearly \
           implied in the text. Provide clear reasoning for each match."
            .to_string()
      , template:
          "Consider yourself an expert policy analyst. Identify which \
           theme(s) best describe the {subject} initiative. Match them \
           to the provided theme definitions and provide reasoning for \
           each match. Select one main theme and up to two secondary \
           themes. If no relevant themes are found, return an empty list."
            .to_string()
      , version: "1.0".to_string()
      , response_fields: vec![
          ( "themes".to_string()
          , FieldSpec::array(
              "List of themes, ordered by relevance (main theme first)",
              theme
            )
          )
        ]
      , reference_data: Some(json!({
          "themes": [
            { "code": "TH20"
            , "label": "Public research|Public research strategy"
            }
          , { "code": "TH21"
            , "label": "Public research|Institutional funding of public research"
            }
          , { "code": "TH31"
            , "label": "Innovation in firms|Financial support to business R&D"
            }
          , { "code": "TH42"
            , "label": "Knowledge exchange|Collaborative research and innovation"
            }
          , { "code": "TH52"
            , "label": "Human resources|Doctoral and postdoctoral researchers"
            }
          , { "code": "TH91"
            , "label": "Society|Mission-oriented innovation policies"
            }
          , { "code": "TH92"
            , "label": "Net zero transitions|Net zero transitions in energy"
            }
          ]
        }))
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn builtin_catalog_preserves_registration_order()
    {   let catalog = PromptCatalog::builtin();
        assert_eq!(
          catalog.names(),
          vec![
            "identification", "objectives", "start_date",
            "budget", "themes"
          ]
        );
    }

    #[test]
    fn insert_replaces_by_name()
    {   let mut catalog = PromptCatalog::builtin();
        let before = catalog.len();
        let mut replacement = identification_prompt();
        replacement.version = "2.0".to_string();
        catalog.insert(replacement);
        assert_eq!(catalog.len(), before);
        assert_eq!(catalog.get("identification").unwrap().version, "2.0");
    }

    #[test]
    fn unknown_name_is_absent()
    {   let catalog = PromptCatalog::builtin();
        assert!(catalog.get("nonexistent").is_none());
    }
}
