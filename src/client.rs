use std::sync::Arc;
use futures::StreamExt;
use tokio::sync::mpsc;
use log::{debug, trace, error, info};

use crate::config::ModelConfig;
use crate::error::Error;
use crate::extract::{MarkupKind, StreamingExtractor};
use crate::prompt::build_prompt;
use crate::providers::GenerativeModel;
use crate::request::{
  ContentRequest, Conversion, GenerationRequest, ImageData, ReasoningProfile
};
use crate::ConverterFoot;

/// Progress channel: receives growing extractions while streaming
pub type ProgressSender = mpsc::UnboundedSender<String>;

/// Orchestrates prompt building, the model call and extraction
pub struct Converter<M>
{   model: M
  , models: ModelConfig
}

impl<M: GenerativeModel> Converter<M>
{   pub fn new(model: M, models: ModelConfig) -> Self
    {   debug!(
          "Creating Converter (pro: {}, fast: {})",
          models.pro_model, models.fast_model
        );
        Converter { model, models }
    }

    pub fn model(&self) -> &M
    {   &self.model
    }

    /// Text description to TikZ
    pub async fn generate_tikz_from_description(
      &self
    , description: &str
    , profile: ReasoningProfile
    ) -> Result<String, Error>
    {   self.model.ensure_ready()?;
        let request = GenerationRequest::new(
          Conversion::DescriptionToTikz(description.to_string())
        , profile
        );
        self.run(&request, None).await
    }

    /// Image (data URI) to a written problem description
    pub async fn generate_description_from_image(
      &self
    , data_uri: &str
    ) -> Result<String, Error>
    {   self.model.ensure_ready()?;
        let image = ImageData::from_data_uri(data_uri)?;
        let request = GenerationRequest::new(
          Conversion::ImageToDescription(image)
        , ReasoningProfile::Fast
        );
        self.run(&request, None).await
    }

    /// TikZ to SVG; streams partial SVG when `progress` is given
    pub async fn generate_svg_from_tikz(
      &self
    , tikz: &str
    , profile: ReasoningProfile
    , progress: Option<&ProgressSender>
    ) -> Result<String, Error>
    {   self.model.ensure_ready()?;
        let request = GenerationRequest::new(
          Conversion::TikzToSvg(tikz.to_string())
        , profile
        );
        self.run(&request, progress).await
    }

    /// Image (data URI) to TikZ
    pub async fn generate_tikz_from_image(
      &self
    , data_uri: &str
    , profile: ReasoningProfile
    ) -> Result<String, Error>
    {   self.model.ensure_ready()?;
        let image = ImageData::from_data_uri(data_uri)?;
        let request = GenerationRequest::new(
          Conversion::ImageToTikz(image)
        , profile
        );
        self.run(&request, None).await
    }

    /// Run any prepared request
    pub async fn convert(
      &self
    , request: &GenerationRequest
    , progress: Option<&ProgressSender>
    ) -> Result<String, Error>
    {   self.model.ensure_ready()?;
        self.run(request, progress).await
    }

    /// Build the provider request for a generation request
    pub fn content_request(&self, request: &GenerationRequest)
      -> ContentRequest
    {   let prompt = build_prompt(&request.conversion);
        let settings = request.settings(&self.models);
        ContentRequest
        {   model: settings.model
          , system_instruction: prompt.system_instruction
          , parts: prompt.parts
          , temperature: settings.temperature
          , thinking_budget: settings.thinking_budget
        }
    }

    async fn run(
      &self
    , request: &GenerationRequest
    , progress: Option<&ProgressSender>
    ) -> Result<String, Error>
    {   let name = request.conversion.name();
        let kind = markup_kind(&request.conversion);
        let content = self.content_request(request);
        debug!(
          "Running {} on {} (temperature {}, budget {:?})",
          name, content.model, content.temperature,
          content.thinking_budget
        );

        let result = match progress
        {   Some(tx) => self.run_streaming(&content, kind, tx).await
          , None => self.model
              .generate(&content)
              .await
              .map(|text| kind.extract(&text))
        };

        if let Err(e) = &result
        {   error!("{} failed: {}", name, e);
        }
        result
    }

    async fn run_streaming(
      &self
    , content: &ContentRequest
    , kind: MarkupKind
    , progress: &ProgressSender
    ) -> Result<String, Error>
    {   let mut stream = self.model.generate_stream(content).await?;
        let mut extractor = StreamingExtractor::new(kind);
        let mut chunks = 0usize;

        while let Some(chunk) = stream.next().await
        {   let chunk = chunk?;
            chunks += 1;
            if let Some(current) = extractor.push(&chunk)
            {   if progress.send(current).is_err()
                {   trace!("Progress receiver dropped");
                }
            }
        }

        debug!(
          "Stream ended after {} chunks ({} bytes)",
          chunks, extractor.buffer().len()
        );
        Ok(extractor.finish())
    }
}

/// Extractor applied to each conversion's output
pub fn markup_kind(conversion: &Conversion) -> MarkupKind
{   match conversion
    {   Conversion::DescriptionToTikz(_)
      | Conversion::ImageToTikz(_) => MarkupKind::Tikz
      , Conversion::ImageToDescription(_) => MarkupKind::Plain
      , Conversion::TikzToSvg(_) => MarkupKind::Svg
    }
}

/// Channel front door for a converter - owns the task
pub struct ConverterBackend
{   hand: crate::ConverterHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl ConverterBackend
{   /// Create and spawn a new backend
    /// Returns immediately - spawns background task
    pub fn new<M>(converter: Converter<M>) -> Self
    where M: GenerativeModel + 'static
    {   debug!("Creating ConverterBackend with task ownership");

        let (convert_tx, convert_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::ConverterHand
        {   convert_tx
          , kill_process_tx
        };

        let foot = crate::ConverterFoot
        {   convert_rx
          , kill_process_rx
        };

        let converter = Arc::new(converter);
        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, converter).await
        });

        ConverterBackend
        {   hand
          , _task_handle
        }
    }

    /// Queue a conversion - returns almost immediately
    pub async fn convert(
      &self
    , request: GenerationRequest
    , progress: Option<ProgressSender>
    ) -> Result<
        mpsc::UnboundedReceiver<crate::ConvertReply>,
        Error
      >
    {   debug!("convert queuing {}", request.conversion.name());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::ConvertArgs
        {   request
          , progress
          , reply: reply_tx
        };

        self.hand.convert_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            Error::Other("Backend disconnected".to_string())
          })?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), Error>
    {   debug!("Shutting down ConverterBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillProcessArgs
        {   reply: reply_tx
        };

        self.hand.kill_process_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            Error::Other("Backend already shutdown".to_string())
          })?;

        // Wait for shutdown confirmation
        match reply_rx.recv().await
        {   Some(result) => {
              debug!("Backend shutdown confirmed");
              result
            }
          , None => {
              error!("Backend dropped shutdown reply");
              Err(Error::Other(
                "Backend stopped without confirming".to_string()
              ))
            }
        }
    }
}

/// Main backend event loop
///
/// Each conversion is spawned onto its own task so the loop only routes.
async fn run_backend_loop<M>(
  foot: ConverterFoot
, converter: Arc<Converter<M>>
)
where M: GenerativeModel + 'static
{   debug!("Starting ConverterBackend event loop");
    let ConverterFoot
    {   mut convert_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = convert_rx.recv() => {
          debug!("Received Convert: {}", cmd.request.conversion.name());
          let converter = Arc::clone(&converter);
          tokio::spawn(async move {
            let result = converter
              .convert(&cmd.request, cmd.progress.as_ref())
              .await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("ConverterBackend shutting down");
          break;
        }
      , else => {
          debug!("All command channels closed");
          break;
        }
      }
    }
}
