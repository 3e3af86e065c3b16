//! Error types for rill-ai

use thiserror::Error;

/// Result type alias using rill-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Longest gateway response body kept for diagnostics, in bytes.
const MAX_DIAGNOSTIC_BODY: usize = 2048;

/// Errors that can occur while opening or consuming a completion stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing credential or invalid request settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream answered with a non-success status
    #[error("Gateway returned HTTP {status}: {body}")]
    Gateway { status: u16, body: String },

    /// The stream could not be opened at all
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Chunk delivery failed after the stream opened
    #[error("Stream read failed: {0}")]
    StreamRead(String),

    /// A single event line could not be parsed
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The in-flight request was cancelled by the user
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Create a gateway error, trimming the diagnostic body
    pub fn gateway(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into().trim().to_string();
        if body.len() > MAX_DIAGNOSTIC_BODY {
            let mut cut = MAX_DIAGNOSTIC_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }
        Self::Gateway { status, body }
    }

    /// Whether text accumulated before this error should stay on the turn
    pub fn keeps_partial_content(&self) -> bool {
        matches!(self, Error::StreamRead(_) | Error::Cancelled)
    }

    /// Whether this error happened before any stream was established
    pub fn is_pre_stream(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::Gateway { .. } | Error::Connection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_content_kept_for_mid_stream_failures() {
        assert!(Error::StreamRead("reset".into()).keeps_partial_content());
        assert!(Error::Cancelled.keeps_partial_content());
        assert!(!Error::gateway(500, "").keeps_partial_content());
        assert!(!Error::Connection("refused".into()).keeps_partial_content());
    }

    #[test]
    fn test_pre_stream_classification() {
        assert!(Error::Configuration("x".into()).is_pre_stream());
        assert!(Error::gateway(429, "slow down").is_pre_stream());
        assert!(!Error::StreamRead("x".into()).is_pre_stream());
    }

    #[test]
    fn test_gateway_body_is_trimmed() {
        let e = Error::gateway(500, format!("  {}  ", "x".repeat(5000)));
        match e {
            Error::Gateway { status, body } => {
                assert_eq!(status, 500);
                assert!(body.ends_with("..."));
                assert_eq!(body.len(), MAX_DIAGNOSTIC_BODY + 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_gateway_body_trim_respects_char_boundary() {
        let e = Error::gateway(500, "é".repeat(2000));
        let Error::Gateway { body, .. } = e else {
            panic!("expected gateway error");
        };
        assert!(body.ends_with("..."));
        assert!(body.len() <= MAX_DIAGNOSTIC_BODY + 3);
    }

    #[test]
    fn test_display_mentions_status() {
        let e = Error::gateway(401, r#"{"error":"No auth credentials found"}"#);
        let text = e.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("No auth credentials"));
    }
}
