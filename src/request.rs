//! Request types: what the caller asks for, and what goes on the wire

use std::sync::OnceLock;
use regex::Regex;
use log::{debug, error};

use crate::config::ModelConfig;
use crate::error::Error;

/// Request-time reasoning profile ("deep reasoning" toggle)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReasoningProfile
{   /// Low temperature, no thinking budget
    #[default]
    Fast
  , /// Higher budget for internal reasoning
    Thorough
}

impl ReasoningProfile
{   /// Map the boolean flag used by front ends
    pub fn from_deep(deep: bool) -> Self
    {   if deep { ReasoningProfile::Thorough } else { ReasoningProfile::Fast }
    }
}

/// Image decoded from a `data:<mime>;base64,<payload>` URI.
/// The payload stays base64, which is what the API expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData
{   pub mime_type: String
  , pub data: String
}

impl ImageData
{   /// Split a data URI into mime type and base64 payload
    pub fn from_data_uri(uri: &str) -> Result<Self, Error>
    {   static DATA_URI: OnceLock<Regex> = OnceLock::new();
        let re = DATA_URI.get_or_init(|| {
          Regex::new(r"^data:(.+);base64,(.+)$").unwrap()
        });

        let caps = re.captures(uri).ok_or_else(|| {
          error!("Rejected image input without data URI header");
          Error::InvalidImage(
            "expected data:<mime>;base64,<payload>".to_string()
          )
        })?;

        debug!("Parsed data URI with mime type {}", &caps[1]);
        Ok(ImageData
        {   mime_type: caps[1].to_string()
          , data: caps[2].to_string()
        })
    }
}

/// The conversion to perform, carrying its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion
{   /// Text description to TikZ
    DescriptionToTikz(String)
  , /// Image to a written problem description
    ImageToDescription(ImageData)
  , /// Image to TikZ
    ImageToTikz(ImageData)
  , /// TikZ source to SVG
    TikzToSvg(String)
}

impl Conversion
{   /// Short name for logs
    pub fn name(&self) -> &'static str
    {   match self
        {   Conversion::DescriptionToTikz(_) => "description-to-tikz"
          , Conversion::ImageToDescription(_) => "image-to-description"
          , Conversion::ImageToTikz(_) => "image-to-tikz"
          , Conversion::TikzToSvg(_) => "tikz-to-svg"
        }
    }
}

/// A single generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest
{   pub conversion: Conversion
  , pub profile: ReasoningProfile
  , /// Overrides the profile's thinking budget when set
    pub thinking_budget: Option<u32>
}

impl GenerationRequest
{   pub fn new(conversion: Conversion, profile: ReasoningProfile) -> Self
    {   GenerationRequest
        {   conversion
          , profile
          , thinking_budget: None
        }
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self
    {   self.thinking_budget = Some(budget);
        self
    }

    /// Resolve model, temperature and thinking budget
    pub fn settings(&self, models: &ModelConfig) -> GenerationSettings
    {   let thorough = self.profile == ReasoningProfile::Thorough;
        let (model, temperature, budget) = match self.conversion
        {   Conversion::DescriptionToTikz(_) => (
              &models.pro_model
            , if thorough { 0.2 } else { 0.1 }
            , 10_000
            )
          , Conversion::ImageToDescription(_) => (
              &models.pro_model, 0.1, 0
            )
          , Conversion::ImageToTikz(_) => (
              &models.pro_model, 0.0, 16_000
            )
          , Conversion::TikzToSvg(_) => (
              &models.fast_model, 0.0, 15_000
            )
        };

        let profile_budget = if thorough && budget > 0
        {   Some(budget)
        } else
        {   None
        };

        GenerationSettings
        {   model: model.clone()
          , temperature
          , thinking_budget: self.thinking_budget.or(profile_budget)
        }
    }
}

/// Resolved sampling parameters for one call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings
{   pub model: String
  , pub temperature: f32
  , pub thinking_budget: Option<u32>
}

/// One piece of user content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part
{   Text(String)
  , InlineData(ImageData)
}

/// Provider-neutral content request
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest
{   /// Model name
    pub model: String
  , /// System instruction
    pub system_instruction: String
  , /// User content parts, in order
    pub parts: Vec<Part>
  , /// Temperature for sampling
    pub temperature: f32
  , /// Reasoning budget in tokens
    pub thinking_budget: Option<u32>
}
