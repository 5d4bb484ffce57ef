//! CDP error types.

use flowhands_core::SurfaceError;
use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to connect to Chrome.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Chrome not found or not running with remote debugging.
    #[error("Chrome not available at {0}. Start Chrome with: chrome --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol error.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (for endpoint discovery).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Navigation failed.
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// JavaScript execution error.
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// Timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Session closed.
    #[error("Session closed")]
    SessionClosed,

    /// Invalid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}

impl From<CdpError> for SurfaceError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::JavaScript(msg) => SurfaceError::Script(msg),
            CdpError::SessionClosed | CdpError::WebSocket(_) => SurfaceError::Closed,
            other => SurfaceError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_error_mapping() {
        assert!(matches!(
            SurfaceError::from(CdpError::JavaScript("boom".to_string())),
            SurfaceError::Script(ref m) if m == "boom"
        ));
        assert!(matches!(
            SurfaceError::from(CdpError::SessionClosed),
            SurfaceError::Closed
        ));
        assert!(matches!(
            SurfaceError::from(CdpError::Timeout("Request Runtime.evaluate timed out".to_string())),
            SurfaceError::Backend(_)
        ));
    }

    #[test]
    fn test_protocol_error_display() {
        let err = CdpError::Protocol {
            code: -32000,
            message: "No node with given id found".to_string(),
        };
        assert_eq!(err.to_string(), "CDP error: No node with given id found (code: -32000)");
    }
}
