//! Owned completion slot fed by generation-status traffic.
//!
//! The slot is armed for one generation at a time. Signals offered while it
//! is disarmed are dropped, which is how late results from a timed-out or
//! finished generation are kept away from the next one. Reading is a single
//! read-then-clear under one lock.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::GenerationResult;
use crate::observer::{HandlerId, NetworkObserver};

const STATUS_SUCCESSFUL: &str = "MEDIA_GENERATION_STATUS_SUCCESSFUL";
const STATUS_SUCCEEDED: &str = "MEDIA_GENERATION_STATUS_SUCCEEDED";
const STATUS_FAILED: &str = "MEDIA_GENERATION_STATUS_FAILED";

/// Terminal signal for a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSignal {
    Complete {
        video_url: String,
        operation_id: String,
    },
    Failed {
        reason: String,
    },
}

impl From<CompletionSignal> for GenerationResult {
    fn from(signal: CompletionSignal) -> Self {
        match signal {
            CompletionSignal::Complete {
                video_url,
                operation_id,
            } => GenerationResult::Complete {
                video_url,
                operation_id,
            },
            CompletionSignal::Failed { reason } => GenerationResult::Failed { reason },
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    armed_for: Option<String>,
    pending: Option<CompletionSignal>,
}

/// Single-owner result slot. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct CompletionSlot {
    state: Arc<Mutex<SlotState>>,
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept signals for `generation_id`, discarding anything pending.
    pub fn arm(&self, generation_id: &str) {
        let mut state = self.state.lock();
        if let Some(stale) = state.pending.take() {
            debug!(?stale, "discarding stale completion signal");
        }
        state.armed_for = Some(generation_id.to_string());
    }

    /// Stop accepting signals and drop anything pending.
    pub fn disarm(&self) {
        let mut state = self.state.lock();
        state.armed_for = None;
        state.pending = None;
    }

    pub fn armed_for(&self) -> Option<String> {
        self.state.lock().armed_for.clone()
    }

    /// Offer a signal. Returns whether it was accepted.
    ///
    /// The first signal after arming wins; later ones are dropped until it
    /// has been taken.
    pub fn offer(&self, signal: CompletionSignal) -> bool {
        let mut state = self.state.lock();
        let Some(generation) = state.armed_for.clone() else {
            debug!(?signal, "completion slot disarmed, signal ignored");
            return false;
        };
        if state.pending.is_some() {
            debug!(generation = %generation, "completion already pending, signal ignored");
            return false;
        }
        info!(generation = %generation, ?signal, "completion signal received");
        state.pending = Some(signal);
        true
    }

    /// Read and clear the pending signal.
    pub fn take(&self) -> Option<CompletionSignal> {
        self.state.lock().pending.take()
    }
}

/// Extract a terminal signal from a status-check response body.
///
/// Operations that are still running yield nothing. A successful operation
/// without a video URL counts as a failure.
pub fn parse_status_payload(body: &Value) -> Option<CompletionSignal> {
    let operations = body.get("operations")?.as_array()?;
    for op in operations {
        let status = op.get("status").and_then(Value::as_str).unwrap_or_default();
        let operation = op.get("operation");

        if status == STATUS_SUCCESSFUL || status == STATUS_SUCCEEDED {
            let operation_id = operation
                .and_then(|o| o.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let video_url = operation
                .and_then(|o| o.pointer("/metadata/video/fifeUrl"))
                .and_then(Value::as_str);
            return Some(match video_url {
                Some(url) => CompletionSignal::Complete {
                    video_url: url.to_string(),
                    operation_id,
                },
                None => CompletionSignal::Failed {
                    reason: "No video URL in response".to_string(),
                },
            });
        }

        if status == STATUS_FAILED {
            let reason = operation
                .and_then(|o| o.pointer("/metadata/error/message"))
                .and_then(Value::as_str)
                .unwrap_or("Generation failed")
                .to_string();
            return Some(CompletionSignal::Failed { reason });
        }
    }
    None
}

/// Feed `slot` from responses whose URL contains `marker`.
pub fn watch_status(observer: &NetworkObserver, marker: &str, slot: CompletionSlot) -> HandlerId {
    observer.on_url_containing(marker, move |body| {
        if let Some(signal) = parse_status_payload(body) {
            if !slot.offer(signal) {
                warn!("status response arrived while no generation was awaiting it");
            }
        }
    })
}
