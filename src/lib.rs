pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod prompt;
pub mod extract;
pub mod client;

/*

tikzsvg: an async-only client that asks Gemini to convert geometry
diagrams between TikZ and SVG (and to read them out of images), then
slices the usable markup out of whatever the model says.

tikzsvg/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports and channel interface
│   ├── main.rs         # Command-line front end
│   ├── error.rs        # Error type and classification
│   ├── config.rs       # Provider and model configuration
│   ├── request.rs      # Conversions, profiles, wire-neutral request
│   ├── prompt.rs       # System instruction and user content
│   ├── extract.rs      # TikZ/SVG extraction, streaming buffer
│   ├── client.rs       # Converter and channel backend
│   └── providers/
│       ├── mod.rs      # GenerativeModel trait
│       ├── gemini.rs   # Gemini REST client
│       └── sse.rs      # Server-Sent Events decoder
└── tests/

*/

pub use client::{Converter, ConverterBackend, ProgressSender};
pub use config::{AppConfig, GeminiConfig, ModelConfig};
pub use error::{Error, ErrorKind};
pub use extract::{extract_svg, extract_tikz, MarkupKind, StreamingExtractor};
pub use providers::{GeminiClient, GenerativeModel, TextStream};
pub use request::{
  Conversion, GenerationRequest, GenerationSettings, ImageData,
  ReasoningProfile
};

/// CONVERTER CHANNEL INTERFACE:

// ===== Convert =====

pub type ConvertReply = Result<String, crate::error::Error>;
pub type ConvertReplySender
  = tokio::sync::mpsc::UnboundedSender<ConvertReply>;

pub struct ConvertArgs
{   pub request: crate::request::GenerationRequest
  , /// Receives growing extractions; `None` means single-shot
    pub progress: Option<crate::client::ProgressSender>
  , pub reply: ConvertReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== ConverterHand (sender side) =====

pub struct ConverterHand
{   pub convert_tx
      : tokio::sync::mpsc::UnboundedSender<ConvertArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== ConverterFoot (receiver side) =====

pub struct ConverterFoot
{   pub convert_rx
      : tokio::sync::mpsc::UnboundedReceiver<ConvertArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}

/// Build a Gemini-backed converter from configuration
pub fn gemini_converter(config: AppConfig)
  -> Result<Converter<GeminiClient>, Error>
{   let client = GeminiClient::new(config.gemini)?;
    Ok(Converter::new(client, config.models))
}
