//! Error taxonomy of the automation core.

use std::time::Duration;

use thiserror::Error;

use crate::model::UploadedAsset;

/// Failure of the concrete automation backend (browser, CDP, test page).
#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    /// The backend rejected or failed the operation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// In-page script threw.
    #[error("Script error: {0}")]
    Script(String),

    /// The element handle no longer refers to a live element.
    #[error("Stale element: {0}")]
    StaleElement(String),

    /// The page or connection went away.
    #[error("Surface closed")]
    Closed,
}

/// Failure of the ambient network primitive.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Request(e.to_string())
    }
}

/// Errors reported by the orchestration core.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A UI control could not be located by any strategy.
    #[error("Control not found: {0}")]
    NotFound(String),

    /// Another generation is in flight on this orchestrator.
    #[error("A generation is already in progress")]
    Busy,

    /// The prompt input did not hold the submitted text after writing it.
    #[error("Prompt was not accepted by the input")]
    PromptNotSet,

    /// The generate control is absent.
    #[error("Generate control not found")]
    GenerateControlNotFound,

    /// A frame upload step failed; `partial` holds the assets confirmed so far.
    #[error("Upload of {label} failed: {cause}")]
    Upload {
        label: String,
        cause: String,
        partial: Vec<UploadedAsset>,
    },

    /// A hard wait bound was exceeded.
    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The upstream API answered with a non-2xx status.
    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    /// No proof-of-humanity token could be obtained.
    #[error("Proof-of-humanity token unavailable: {0}")]
    ProofOfHumanity(String),

    #[error("Automation surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FlowError {
    /// Stable machine-readable code used in routed replies.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::NotFound(_) => "not_found",
            FlowError::Busy => "busy",
            FlowError::PromptNotSet => "prompt_not_set",
            FlowError::GenerateControlNotFound => "generate_control_not_found",
            FlowError::Upload { .. } => "upload_error",
            FlowError::Timeout(_) => "timeout",
            FlowError::UpstreamHttp { .. } => "upstream_http_error",
            FlowError::ProofOfHumanity(_) => "proof_of_humanity_error",
            FlowError::Surface(_) => "surface_error",
            FlowError::Transport(_) => "transport_error",
            FlowError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FlowError::Timeout(_))
    }
}
