//! Sequential frame upload through the tool's upload slots.
//!
//! Each frame goes slot click, file input, crop confirmation, then a wait
//! for the server's upload response. The response, not the DOM, is the
//! success signal. Frames are never uploaded concurrently: the n-th
//! confirmed asset is attributed to the n-th frame.

use std::sync::Arc;

use flowhands_config::{SelectorsConfig, TimingConfig};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::configurator::settle;
use crate::error::{FlowError, SurfaceError};
use crate::locator::{ElementLocator, Pick};
use crate::model::{FrameAsset, UploadedAsset};
use crate::observer::{HandlerId, NetworkObserver};
use crate::poll::{PollPolicy, poll, poll_until};
use crate::surface::{ElementHandle, FilePayload, PageSurface};

#[derive(Debug, Default)]
struct LedgerState {
    armed: bool,
    assets: Vec<UploadedAsset>,
}

/// Ordered record of confirmed uploads. Clones share the same ledger.
#[derive(Debug, Clone, Default)]
pub struct UploadLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl UploadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh upload run.
    pub fn arm(&self) {
        let mut state = self.state.lock();
        state.armed = true;
        state.assets.clear();
    }

    /// Stop accepting confirmations. Already recorded assets are kept.
    pub fn disarm(&self) {
        self.state.lock().armed = false;
    }

    pub fn count(&self) -> usize {
        self.state.lock().assets.len()
    }

    pub fn assets(&self) -> Vec<UploadedAsset> {
        self.state.lock().assets.clone()
    }

    /// Record an upload response. Returns `false` for bodies without an
    /// asset id and for responses arriving outside an upload run.
    pub fn accept(&self, body: &Value) -> bool {
        let Some((server_asset_id, width, height)) = parse_upload_payload(body) else {
            return false;
        };
        let mut state = self.state.lock();
        if !state.armed {
            debug!(asset = %server_asset_id, "upload confirmation outside an upload run, ignored");
            return false;
        }
        let sequence_index = state.assets.len();
        info!(sequence_index, asset = %server_asset_id, "upload confirmed");
        state.assets.push(UploadedAsset {
            sequence_index,
            server_asset_id,
            width,
            height,
        });
        true
    }
}

/// Asset id and dimensions from an upload response.
///
/// The id lives at `mediaGenerationId.mediaGenerationId`; a flat string id
/// is accepted too. Dimensions are optional and default to zero.
pub fn parse_upload_payload(body: &Value) -> Option<(String, u32, u32)> {
    let media = body.get("mediaGenerationId")?;
    let id = match media {
        Value::String(id) => id.clone(),
        other => other.get("mediaGenerationId")?.as_str()?.to_string(),
    };
    if id.is_empty() {
        return None;
    }
    let dimension = |key: &str| {
        body.get(key)
            .or_else(|| media.get(key))
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    Some((id, dimension("width"), dimension("height")))
}

/// Feed `ledger` from responses whose URL contains `marker`.
pub fn watch_uploads(observer: &NetworkObserver, marker: &str, ledger: UploadLedger) -> HandlerId {
    observer.on_url_containing(marker, move |body| {
        ledger.accept(body);
    })
}

/// Result of an upload run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub assets: Vec<UploadedAsset>,
    /// `false` when fewer confirmations than frames were observed in time.
    pub complete: bool,
    /// Soft problems such as an unconfirmed crop dialog.
    pub warnings: Vec<String>,
}

pub struct FrameUploader<'a> {
    surface: &'a dyn PageSurface,
    selectors: &'a SelectorsConfig,
    timing: &'a TimingConfig,
    ledger: &'a UploadLedger,
}

impl<'a> FrameUploader<'a> {
    pub fn new(
        surface: &'a dyn PageSurface,
        selectors: &'a SelectorsConfig,
        timing: &'a TimingConfig,
        ledger: &'a UploadLedger,
    ) -> Self {
        Self {
            surface,
            selectors,
            timing,
            ledger,
        }
    }

    /// Upload `frames` in order.
    ///
    /// A step that cannot proceed fails with [`FlowError::Upload`] carrying
    /// the assets confirmed so far. Missing confirmations within the poll
    /// budget are not an error: the partial list comes back with
    /// `complete == false`.
    pub async fn upload(&self, frames: &[FrameAsset]) -> Result<UploadOutcome, FlowError> {
        if frames.is_empty() {
            return Ok(UploadOutcome {
                complete: true,
                ..Default::default()
            });
        }

        self.ledger.arm();
        let result = self.run(frames).await;
        self.ledger.disarm();
        result
    }

    async fn run(&self, frames: &[FrameAsset]) -> Result<UploadOutcome, FlowError> {
        let slots = self.discover_slots(frames.len()).await.map_err(|cause| FlowError::Upload {
            label: frames[0].label.clone(),
            cause,
            partial: Vec::new(),
        })?;
        debug!(slots = slots.len(), frames = frames.len(), "upload slots found");

        let mut warnings = Vec::new();
        for (index, (frame, slot)) in frames.iter().zip(&slots).enumerate() {
            let step = self.upload_one(index, frame, slot, &mut warnings).await;
            if let Err(cause) = step {
                return Err(FlowError::Upload {
                    label: frame.label.clone(),
                    cause,
                    partial: self.ledger.assets(),
                });
            }

            let policy = PollPolicy::attempts(
                self.timing.upload_poll_interval(),
                self.timing.upload_poll_attempts,
            );
            let ledger = self.ledger;
            let confirmed = poll_until(policy, || async move {
                (ledger.count() > index).then_some(())
            })
            .await;
            if confirmed.is_none() {
                warn!(
                    frame = %frame.label,
                    confirmed = self.ledger.count(),
                    expected = frames.len(),
                    "upload confirmation not observed, returning partial list"
                );
                return Ok(UploadOutcome {
                    assets: self.ledger.assets(),
                    complete: false,
                    warnings,
                });
            }
        }

        let mut assets = self.ledger.assets();
        assets.truncate(frames.len());
        info!(count = assets.len(), "all frames uploaded");
        Ok(UploadOutcome {
            assets,
            complete: true,
            warnings,
        })
    }

    /// Poll for at least `needed` upload slots.
    async fn discover_slots(&self, needed: usize) -> Result<Vec<ElementHandle>, String> {
        let policy = PollPolicy::attempts(
            self.timing.slot_poll_interval(),
            self.timing.slot_poll_attempts,
        );
        let selector = self.selectors.upload_slot.as_str();
        let found = poll(policy, || async move {
            let slots = self.surface.query_all(selector).await?;
            Ok::<_, SurfaceError>((slots.len() >= needed).then_some(slots))
        })
        .await
        .map_err(|e| e.to_string())?;
        found.ok_or_else(|| format!("expected {} upload slots, found fewer", needed))
    }

    async fn upload_one(
        &self,
        index: usize,
        frame: &FrameAsset,
        slot: &ElementHandle,
        warnings: &mut Vec<String>,
    ) -> Result<(), String> {
        debug!(index, frame = %frame.label, "uploading frame");
        self.surface.click(slot).await.map_err(|e| e.to_string())?;
        settle(self.timing.file_input_wait()).await;

        let locator = ElementLocator::new(self.surface);
        let input = locator
            .find(&self.selectors.file_input, Pick::Last)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "file input did not appear".to_string())?;

        let payload = FilePayload {
            name: FrameAsset::file_name(index),
            mime_type: frame.mime_type.clone(),
            bytes: frame.bytes.clone(),
        };
        self.surface
            .set_files(&input, &[payload])
            .await
            .map_err(|e| e.to_string())?;
        settle(self.timing.crop_wait()).await;

        let crop = locator
            .find(&self.selectors.crop_confirm, Pick::First)
            .await
            .map_err(|e| e.to_string())?;
        match crop {
            Some(button) => {
                self.surface.click(&button).await.map_err(|e| e.to_string())?;
                settle(self.timing.crop_settle()).await;
            }
            None => {
                warn!(frame = %frame.label, "crop confirmation not found, upload unverified");
                warnings.push(format!("{}: crop confirmation not found", frame.label));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "uploader_tests.rs"]
mod tests;
