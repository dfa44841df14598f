//! Generative model providers

pub mod gemini;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Error;
use crate::request::ContentRequest;

// Re-export for convenience
pub use gemini::GeminiClient;

/// Text chunks as they arrive from a streamed call
pub type TextStream = BoxStream<'static, Result<String, Error>>;

/// A hosted model that turns a content request into text
#[async_trait]
pub trait GenerativeModel: Send + Sync
{   /// Fail fast when the provider cannot make calls at all
    fn ensure_ready(&self) -> Result<(), Error>
    {   Ok(())
    }

    /// Single-shot generation
    async fn generate(&self, request: &ContentRequest)
      -> Result<String, Error>;

    /// Streamed generation, yielding text chunks in order
    async fn generate_stream(&self, request: &ContentRequest)
      -> Result<TextStream, Error>;
}
