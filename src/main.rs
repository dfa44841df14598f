use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use base64::Engine;
use clap::Parser;
use log::{debug, error};
use tokio::sync::mpsc;

use tikzsvg::{
  AppConfig, Conversion, Error, GenerationRequest, GenerativeModel,
  ImageData, ReasoningProfile
};

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about = "Convert geometry diagrams between TikZ and SVG with Gemini"
)]
pub struct App
{   #[command(subcommand)]
    pub command: SubCommands

  , #[clap(flatten)]
    global: Global
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global
{   /// Use the thorough reasoning profile
    #[clap(long, global = true)]
    deep: bool

  , /// Override the reasoning budget in tokens
    #[clap(long, global = true)]
    thinking_budget: Option<u32>

  , /// Print partial output to stderr as it streams
    #[clap(long, global = true)]
    stream: bool
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommands
{   /// Generate TikZ from a text description
    Tikz
    {   description: String
    }
  , /// Describe the geometry problem in an image
    Describe
    {   image: PathBuf
    }
  , /// Generate TikZ from an image
    ImageTikz
    {   image: PathBuf
    }
  , /// Draw SVG from TikZ read from a file or stdin
    Svg
    {   file: Option<PathBuf>
    }
}

#[tokio::main]
async fn main()
{   env_logger::init();
    let app = App::parse();

    if let Err(e) = run(app, AppConfig::from_env()).await
    {   error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(app: App, config: AppConfig) -> Result<(), Error>
{   let converter = tikzsvg::gemini_converter(config)?;
    converter.model().ensure_ready()?;

    let conversion = match &app.command
    {   SubCommands::Tikz { description } => {
          Conversion::DescriptionToTikz(description.clone())
        }
      , SubCommands::Describe { image } => {
          Conversion::ImageToDescription(load_image(image)?)
        }
      , SubCommands::ImageTikz { image } => {
          Conversion::ImageToTikz(load_image(image)?)
        }
      , SubCommands::Svg { file } => {
          Conversion::TikzToSvg(read_source(file.as_deref())?)
        }
    };

    let mut request = GenerationRequest::new(
      conversion
    , ReasoningProfile::from_deep(app.global.deep)
    );
    request.thinking_budget = app.global.thinking_budget;

    let output = if app.global.stream
    {   let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
          let mut updates = 0usize;
          while let Some(partial) = rx.recv().await
          {   updates += 1;
              eprintln!("--- partial #{} ---\n{}", updates, partial);
          }
          updates
        });
        let output = converter.convert(&request, Some(&tx)).await;
        drop(tx);
        let updates = printer.await.unwrap_or(0);
        debug!("Received {} progress updates", updates);
        output?
    } else
    {   converter.convert(&request, None).await?
    };

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", output)
      .map_err(|e| Error::Other(e.to_string()))?;
    Ok(())
}

fn read_source(file: Option<&Path>) -> Result<String, Error>
{   match file
    {   Some(path) => std::fs::read_to_string(path).map_err(|e| {
          Error::Other(format!("{}: {}", path.display(), e))
        })
      , None => {
          let mut buf = String::new();
          std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| Error::Other(e.to_string()))?;
          Ok(buf)
        }
    }
}

/// Read an image file into a data URI and parse it back
fn load_image(path: &Path) -> Result<ImageData, Error>
{   let bytes = std::fs::read(path).map_err(|e| {
      Error::Other(format!("{}: {}", path.display(), e))
    })?;
    let mime = mime_for(path).ok_or_else(|| {
      Error::InvalidImage(format!(
        "unsupported image type: {}", path.display()
      ))
    })?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    ImageData::from_data_uri(&format!("data:{};base64,{}", mime, encoded))
}

fn mime_for(path: &Path) -> Option<&'static str>
{   let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str()
    {   "png" => Some("image/png")
      , "jpg" | "jpeg" => Some("image/jpeg")
      , "webp" => Some("image/webp")
      , "gif" => Some("image/gif")
      , "heic" => Some("image/heic")
      , _ => None
    }
}
