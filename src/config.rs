//! Configuration for the Gemini provider and model selection

use serde::{Deserialize, Serialize};
use log::{debug, warn};

/// Default Gemini REST endpoint
pub const GEMINI_API_BASE: &str
  = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for the reasoning-heavy TikZ work
pub const DEFAULT_PRO_MODEL: &str = "gemini-2.5-pro";

/// Model used for fast SVG drawing
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";

/// Environment variables consulted by `AppConfig::from_env`, in order
pub const API_KEY_ENV_VARS: [&str; 2]
  = ["GEMINI_API_KEY", "VITE_GEMINI_API_KEY"];

/// Gemini provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiConfig
{   /// API key; checked on first use, never serialized
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>
  , /// API base URL (if custom)
    #[serde(default)]
    pub api_base: Option<String>
  , /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>
  , /// Enable detailed logging of request bodies
    #[serde(default)]
    pub verbose: Option<bool>
}

impl GeminiConfig
{   /// Config with only a key set
    pub fn with_api_key(key: impl Into<String>) -> Self
    {   GeminiConfig
        {   api_key: Some(key.into())
          , ..GeminiConfig::default()
        }
    }

    /// Base URL with any trailing slash removed
    pub fn api_base(&self) -> String
    {   self.api_base
          .as_deref()
          .unwrap_or(GEMINI_API_BASE)
          .trim_end_matches('/')
          .to_string()
    }
}

/// Model identifiers per workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig
{   /// Model for TikZ generation and image reading
    pub pro_model: String
  , /// Model for TikZ to SVG drawing
    pub fast_model: String
}

impl Default for ModelConfig
{   fn default() -> Self
    {   ModelConfig
        {   pro_model: DEFAULT_PRO_MODEL.to_string()
          , fast_model: DEFAULT_FAST_MODEL.to_string()
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig
{   /// Provider configuration
    pub gemini: GeminiConfig
  , /// Model selection
    #[serde(default)]
    pub models: ModelConfig
}

impl AppConfig
{   /// Read configuration from the process environment.
    ///
    /// A missing key is not an error here; the provider reports it
    /// when a request is made.
    pub fn from_env() -> Self
    {   let api_key = API_KEY_ENV_VARS
          .iter()
          .find_map(|name| non_empty_var(name));
        debug!(
          "Loaded config from env (api key present: {})",
          api_key.is_some()
        );

        let defaults = ModelConfig::default();
        AppConfig
        {   gemini: GeminiConfig
            {   api_key
              , api_base: non_empty_var("GEMINI_API_BASE")
              , timeout_secs: non_empty_var("GEMINI_TIMEOUT_SECS")
                  .and_then(|raw| parse_timeout_secs(&raw))
              , verbose: None
            }
          , models: ModelConfig
            {   pro_model: non_empty_var("GEMINI_PRO_MODEL")
                  .unwrap_or(defaults.pro_model)
              , fast_model: non_empty_var("GEMINI_FAST_MODEL")
                  .unwrap_or(defaults.fast_model)
            }
        }
    }
}

/// Parse a timeout in whole seconds; unparsable values are logged and
/// leave the transport default in place
pub fn parse_timeout_secs(raw: &str) -> Option<u64>
{   match raw.trim().parse()
    {   Ok(secs) => Some(secs)
      , Err(e) => {
          warn!("Ignoring GEMINI_TIMEOUT_SECS={:?}: {}", raw, e);
          None
        }
    }
}

fn non_empty_var(name: &str) -> Option<String>
{   std::env::var(name)
      .ok()
      .filter(|v| !v.trim().is_empty())
}
