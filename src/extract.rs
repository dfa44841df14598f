//! Pull TikZ or SVG markup out of free-form model text.
//!
//! Both extractors are pure and idempotent, so they can be re-run on a
//! growing buffer after every streamed chunk.

use std::sync::OnceLock;
use regex::Regex;
use log::trace;

const SVG_OPEN: &str = "<svg";
const SVG_CLOSE: &str = "</svg>";

/// Return the first `tikzpicture` environment, delimiters included.
///
/// Without one, the text is returned with code-fence markers removed and
/// outer whitespace trimmed.
pub fn extract_tikz(text: &str) -> String
{   static TIKZ_BLOCK: OnceLock<Regex> = OnceLock::new();
    static FENCE: OnceLock<Regex> = OnceLock::new();

    let block = TIKZ_BLOCK.get_or_init(|| {
      Regex::new(r"(?s)\\begin\{tikzpicture\}.*?\\end\{tikzpicture\}").unwrap()
    });
    if let Some(m) = block.find(text)
    {   return m.as_str().to_string();
    }

    let fence = FENCE.get_or_init(|| {
      Regex::new(r"```latex|```tikz|```").unwrap()
    });
    // Stripping can splice new fences or a whole block together.
    let mut stripped = text.to_string();
    while fence.is_match(&stripped)
    {   stripped = fence.replace_all(&stripped, "").into_owned();
    }
    match block.find(&stripped)
    {   Some(m) => m.as_str().to_string()
      , None => stripped.trim().to_string()
    }
}

/// Return the `<svg>` element: first opening tag through last closing tag.
///
/// Empty when there is no opening tag. Without a closing tag after it the
/// fragment runs to the end of the text (a stream still in progress).
pub fn extract_svg(text: &str) -> String
{   let start = match text.find(SVG_OPEN)
    {   Some(idx) => idx
      , None => return String::new()
    };

    let tail = &text[start..];
    match tail.rfind(SVG_CLOSE)
    {   Some(end) => tail[..end + SVG_CLOSE.len()].to_string()
      , None => tail.trim_end().to_string()
    }
}

/// Which extractor applies to a conversion's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind
{   Tikz
  , Svg
  , /// Prose, returned trimmed
    Plain
}

impl MarkupKind
{   pub fn extract(&self, text: &str) -> String
    {   match self
        {   MarkupKind::Tikz => extract_tikz(text)
          , MarkupKind::Svg => extract_svg(text)
          , MarkupKind::Plain => text.trim().to_string()
        }
    }
}

/// Append-only buffer that re-extracts on every chunk
#[derive(Debug, Clone)]
pub struct StreamingExtractor
{   kind: MarkupKind
  , buffer: String
}

impl StreamingExtractor
{   pub fn new(kind: MarkupKind) -> Self
    {   StreamingExtractor
        {   kind
          , buffer: String::new()
        }
    }

    /// Append a chunk; returns the current extraction when non-empty
    pub fn push(&mut self, chunk: &str) -> Option<String>
    {   self.buffer.push_str(chunk);
        let current = self.kind.extract(&self.buffer);
        trace!(
          "Buffer at {} bytes, extracted {} bytes",
          self.buffer.len(), current.len()
        );
        if current.is_empty() { None } else { Some(current) }
    }

    /// Everything received so far
    pub fn buffer(&self) -> &str
    {   &self.buffer
    }

    /// Final extraction over the complete buffer
    pub fn finish(self) -> String
    {   self.kind.extract(&self.buffer)
    }
}
