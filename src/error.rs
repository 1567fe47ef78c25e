use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response Status: {0}")]
    HttpStatusError(u16),

    #[error("Failed to parse metadata response: {0}")]
    ParseError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),
}

impl PreviewError {
    /// Maps a transport-level reqwest failure onto the taxonomy.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PreviewError::TimeoutError(e.to_string())
        } else if e.is_decode() {
            PreviewError::ParseError(e.to_string())
        } else {
            PreviewError::NetworkError(e.to_string())
        }
    }

    pub fn log(&self) {
        match self {
            PreviewError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            PreviewError::NetworkError(e) => {
                error!(error = %e, "Error fetching metadata");
            }
            PreviewError::HttpStatusError(status) => {
                error!(status = %status, "Error fetching metadata");
            }
            PreviewError::ParseError(e) => {
                error!(error = %e, "Metadata response was not valid JSON");
            }
            PreviewError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            PreviewError::UnknownAttribute(name) => {
                warn!(attribute = %name, "Ignoring unknown attribute");
            }
        }
    }
}
