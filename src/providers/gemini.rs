use std::collections::VecDeque;
use std::time::Duration;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use log::{debug, trace, error, info};

use crate::config::GeminiConfig;
use crate::error::Error;
use crate::request::{ContentRequest, ImageData, Part};
use super::sse::SseDecoder;
use super::{GenerativeModel, TextStream};

// ===== Message Types =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData
{   pub mime_type: String
  , pub data: String
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart
{   #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiInlineData>
  , /// Set on reasoning-trace parts in responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiContent
{   #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>
  , #[serde(default)]
    pub parts: Vec<GeminiPart>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig
{   pub thinking_budget: u32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig
{   pub temperature: f32
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerateRequest
{   pub system_instruction: GeminiContent
  , pub contents: Vec<GeminiContent>
  , pub generation_config: GenerationConfig
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate
{   #[serde(default)]
    pub content: Option<GeminiContent>
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback
{   #[serde(default)]
    pub block_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerateResponse
{   #[serde(default)]
    pub candidates: Vec<Candidate>
  , #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>
}

impl GeminiGenerateResponse
{   /// Non-thought text of the first candidate, if it has any
    pub fn text(&self) -> Option<String>
    {   let content = self.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content.parts
          .iter()
          .filter(|p| p.thought != Some(true))
          .filter_map(|p| p.text.as_deref())
          .collect();
        if texts.is_empty() { None } else { Some(texts.concat()) }
    }

    /// Reason the prompt was refused, if it was
    pub fn block_reason(&self) -> Option<&str>
    {   self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }
}

impl From<&Part> for GeminiPart
{   fn from(part: &Part) -> Self
    {   match part
        {   Part::Text(text) => GeminiPart
            {   text: Some(text.clone())
              , ..GeminiPart::default()
            }
          , Part::InlineData(ImageData { mime_type, data }) => GeminiPart
            {   inline_data: Some(GeminiInlineData
                {   mime_type: mime_type.clone()
                  , data: data.clone()
                })
              , ..GeminiPart::default()
            }
        }
    }
}

impl From<&ContentRequest> for GeminiGenerateRequest
{   fn from(request: &ContentRequest) -> Self
    {   GeminiGenerateRequest
        {   system_instruction: GeminiContent
            {   role: None
              , parts: vec![GeminiPart
                {   text: Some(request.system_instruction.clone())
                  , ..GeminiPart::default()
                }]
            }
          , contents: vec![GeminiContent
            {   role: Some("user".to_string())
              , parts: request.parts.iter().map(GeminiPart::from).collect()
            }]
          , generation_config: GenerationConfig
            {   temperature: request.temperature
              , thinking_config: request.thinking_budget
                  .map(|thinking_budget| ThinkingConfig { thinking_budget })
            }
        }
    }
}

/// Parse one streamed event payload into its text, if any
pub fn parse_stream_payload(payload: &str)
  -> Result<Option<String>, Error>
{   let chunk: GeminiGenerateResponse
      = serde_json::from_str(payload).map_err(|e| {
        error!("Parse error in stream chunk: {}", e);
        Error::ParseError(e.to_string())
      })?;

    if let Some(reason) = chunk.block_reason()
    {   error!("Prompt blocked: {}", reason);
        return Err(Error::ApiError(
          format!("Gemini blocked the prompt: {}", reason)
        ));
    }
    Ok(chunk.text())
}

// ===== Gemini Client =====

/// Gemini REST client
pub struct GeminiClient
{   api_key: Option<String>
  , api_base: String
  , verbose: bool
  , http_client: reqwest::Client
}

impl GeminiClient
{   /// Build a client from explicit configuration
    pub fn new(config: GeminiConfig) -> Result<Self, Error>
    {   debug!("Creating GeminiClient");
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs
        {   builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().map_err(|e| {
          error!("Failed to build HTTP client: {}", e);
          Error::InvalidConfiguration(e.to_string())
        })?;

        Ok(GeminiClient
        {   api_base: config.api_base()
          , api_key: config.api_key
          , verbose: config.verbose.unwrap_or(false)
          , http_client
        })
    }

    pub fn has_api_key(&self) -> bool
    {   self.api_key.is_some()
    }

    fn get_api_key(&self) -> Result<&str, Error>
    {   self.api_key.as_deref().ok_or_else(|| {
          error!("No Gemini API key configured");
          Error::MissingApiKey("Gemini".to_string())
        })
    }

    /// Endpoint for a model action
    pub fn endpoint(&self, model: &str, action: &str) -> String
    {   format!("{}/models/{}:{}", self.api_base, model, action)
    }

    async fn post(
      &self
    , request: &ContentRequest
    , action: &str
    ) -> Result<reqwest::Response, Error>
    {   let api_key = self.get_api_key()?;
        let body = GeminiGenerateRequest::from(request);

        if self.verbose
        {   debug!(
              "Gemini request: {}",
              serde_json::to_string(&body).unwrap_or_default()
            );
        } else
        {   trace!(
              "Gemini request to {} with {} parts",
              request.model, request.parts.len()
            );
        }

        let response = self.http_client
          .post(self.endpoint(&request.model, action))
          .header("x-goog-api-key", api_key)
          .header("Content-Type", "application/json")
          .json(&body)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            Error::HttpError(e.to_string())
          })?;

        let status = response.status();
        trace!("Gemini response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Gemini API error ({}): {}", status, error_text);
            return Err(Error::ApiError(
              format!("Gemini error {}: {}", status, error_text)
            ));
        }

        Ok(response)
    }
}

struct StreamState<S>
{   bytes: S
  , decoder: SseDecoder
  , pending: VecDeque<Result<String, Error>>
  , done: bool
}

impl<S> StreamState<S>
{   fn queue(&mut self, payloads: Vec<String>)
    {   for payload in payloads
        {   match parse_stream_payload(&payload)
            {   Ok(Some(text)) => self.pending.push_back(Ok(text))
              , Ok(None) => trace!("Stream chunk without text")
              , Err(e) => {
                  self.pending.push_back(Err(e));
                  self.done = true;
                  break;
                }
            }
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient
{   fn ensure_ready(&self) -> Result<(), Error>
    {   self.get_api_key().map(|_| ())
    }

    async fn generate(&self, request: &ContentRequest)
      -> Result<String, Error>
    {   debug!("Handling generate for: {}", request.model);
        let response = self.post(request, "generateContent").await?;

        let reply: GeminiGenerateResponse
          = response.json().await.map_err(|e| {
            error!("Parse error: {}", e);
            Error::ParseError(e.to_string())
          })?;

        if let Some(reason) = reply.block_reason()
        {   error!("Prompt blocked: {}", reason);
            return Err(Error::ApiError(
              format!("Gemini blocked the prompt: {}", reason)
            ));
        }

        reply.text().ok_or_else(|| {
          error!("No text in response");
          Error::EmptyResponse
        })
    }

    async fn generate_stream(&self, request: &ContentRequest)
      -> Result<TextStream, Error>
    {   debug!("Handling generate_stream for: {}", request.model);
        let response = self
          .post(request, "streamGenerateContent?alt=sse")
          .await?;

        let state = StreamState
        {   bytes: Box::pin(response.bytes_stream())
          , decoder: SseDecoder::new()
          , pending: VecDeque::new()
          , done: false
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
          loop
          {   if let Some(item) = state.pending.pop_front()
              {   return Some((item, state));
              }
              if state.done
              {   return None;
              }
              match state.bytes.next().await
              {   Some(Ok(chunk)) => {
                    let payloads = state.decoder.feed(&chunk);
                    state.queue(payloads);
                  }
                , Some(Err(e)) => {
                    error!("Stream interrupted: {}", e);
                    state.pending.push_back(
                      Err(Error::HttpError(e.to_string()))
                    );
                    state.done = true;
                  }
                , None => {
                    info!("Gemini stream finished");
                    let payloads = state.decoder.finish();
                    state.queue(payloads);
                    state.done = true;
                  }
              }
          }
        });

        Ok(stream.boxed())
    }
}
