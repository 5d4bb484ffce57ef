//! # flowhands Core
//!
//! Orchestration of video generations on the Flow web tool.
//!
//! ## Components
//!
//! - [`ElementLocator`] - Ordered selector fallback over a [`PageSurface`]
//! - [`NetworkObserver`] - Passive capture of the page's API responses
//! - [`SettingsConfigurator`] - Mode, aspect ratio, output count and model
//! - [`FrameUploader`] - Reference frame upload with server-side confirmation
//! - [`GenerationOrchestrator`] - One generation at a time, end to end
//! - [`RequestRouter`] - Command envelopes in, correlated replies out
//! - [`UpstreamClient`] - Direct calls to the generation API
//!
//! The browser itself stays behind [`PageSurface`] and [`NetworkTap`], so
//! everything here runs against the scripted page in `testing` as well.

pub mod completion;
pub mod configurator;
pub mod error;
pub mod locator;
pub mod model;
pub mod observer;
pub mod orchestrator;
pub mod poll;
pub mod router;
pub mod surface;
pub mod transport;
pub mod uploader;
pub mod upstream;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use completion::{CompletionSignal, CompletionSlot};
pub use configurator::{ConfigureReport, SettingsConfigurator, SettingsRequest};
pub use error::{FlowError, SurfaceError, TransportError};
pub use locator::{ElementLocator, Pick};
pub use model::{
    AspectRatio, FrameAsset, GenerationMode, GenerationRecord, GenerationRequest, GenerationResult,
    OrchestratorState, UploadedAsset, VideoModel,
};
pub use observer::{NetworkObserver, NetworkTap, ObservedCall, SlotTap};
pub use orchestrator::{
    GenerationOrchestrator, GenerationOutcome, StatusReport, TestSettingsReport, TestSettingsRequest,
};
pub use poll::PollPolicy;
pub use router::{Command, CommandMessage, CommandReply, ReplyStatus, RequestRouter, decode_frame};
pub use surface::{ElementHandle, FilePayload, PageSurface};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportSlot};
pub use uploader::{FrameUploader, UploadLedger, UploadOutcome};
pub use upstream::{ProofOfHumanity, TextToVideoRequest, UpstreamClient};
