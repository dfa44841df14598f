use std::fmt;

/// Custom error type for conversion requests
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// No API key configured for the provider
    MissingApiKey(String)
  , /// Invalid configuration (bad timeout, client build failure)
    InvalidConfiguration(String)
  , /// Image payload is not a `data:<mime>;base64,<payload>` URI
    InvalidImage(String)
  , /// HTTP request error
    HttpError(String)
  , /// API returned an error response
    ApiError(String)
  , /// Failed to parse API response
    ParseError(String)
  , /// Response carried no usable text
    EmptyResponse
  , /// Generic error
    Other(String)
}

/// Broad classes of failure a caller may react to differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind
{   /// Credential absent or configuration unusable
    Configuration
  , /// Caller-supplied input was rejected before any call
    InputValidation
  , /// The external call failed or returned nothing usable
    Upstream
  , /// Plumbing failure inside this crate
    Internal
}

impl Error
{   /// Classify the error
    pub fn kind(&self) -> ErrorKind
    {   match self
        {   Error::MissingApiKey(_)
          | Error::InvalidConfiguration(_) => ErrorKind::Configuration
          , Error::InvalidImage(_) => ErrorKind::InputValidation
          , Error::HttpError(_)
          | Error::ApiError(_)
          | Error::ParseError(_)
          | Error::EmptyResponse => ErrorKind::Upstream
          , Error::Other(_) => ErrorKind::Internal
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::MissingApiKey(provider) => {
              write!(f, "Missing API key for: {}", provider)
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::InvalidImage(msg) => {
              write!(f, "Invalid image input: {}", msg)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError(msg) => {
              write!(f, "API error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::EmptyResponse => {
              write!(f, "API response contained no text")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
