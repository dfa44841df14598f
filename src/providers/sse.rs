//! Minimal Server-Sent Events decoder for streamed responses

use log::trace;

/// Splits a byte stream into `data:` payloads, one per event
#[derive(Debug, Default)]
pub struct SseDecoder
{   line: Vec<u8>
  , data: Vec<String>
}

impl SseDecoder
{   pub fn new() -> Self
    {   SseDecoder::default()
    }

    /// Feed raw bytes, returning the payloads of completed events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String>
    {   let mut events = Vec::new();
        for &b in bytes
        {   if b == b'\n'
            {   let line = std::mem::take(&mut self.line);
                self.process_line(line, &mut events);
            } else
            {   self.line.push(b);
            }
        }
        events
    }

    /// Flush a trailing event the server did not terminate
    pub fn finish(&mut self) -> Vec<String>
    {   let mut events = Vec::new();
        if !self.line.is_empty()
        {   let line = std::mem::take(&mut self.line);
            self.process_line(line, &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn process_line(&mut self, mut raw: Vec<u8>, events: &mut Vec<String>)
    {   if raw.last() == Some(&b'\r')
        {   raw.pop();
        }

        if raw.is_empty()
        {   self.dispatch(events);
            return;
        }

        let line = String::from_utf8_lossy(&raw);
        if let Some(rest) = line.strip_prefix("data:")
        {   let value = rest.strip_prefix(' ').unwrap_or(rest);
            self.data.push(value.to_string());
        } else
        {   trace!("Ignoring SSE line: {}", line);
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>)
    {   if !self.data.is_empty()
        {   events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}
