//! Generation request, result and state types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Most frames a single request may carry (first and last frame).
pub const MAX_FRAMES: usize = 2;

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(alias = "Landscape (16:9)", alias = "landscape", alias = "16:9")]
    Landscape,
    #[serde(alias = "Portrait (9:16)", alias = "portrait", alias = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Text of the matching option in the tool's dropdown.
    pub fn option_label(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "Landscape (16:9)",
            AspectRatio::Portrait => "Portrait (9:16)",
        }
    }

    /// Value used by the upstream API.
    pub fn api_value(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "VIDEO_ASPECT_RATIO_LANDSCAPE",
            AspectRatio::Portrait => "VIDEO_ASPECT_RATIO_PORTRAIT",
        }
    }
}

/// Supported video models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoModel {
    #[serde(rename = "Veo 3.1 - Fast", alias = "veo31_fast")]
    Veo31Fast,
    #[serde(rename = "Veo 3.1 - Fast [Lower Priority]", alias = "veo31_fast_relaxed")]
    Veo31FastLowerPriority,
    #[serde(rename = "Veo 3.1 - Quality", alias = "veo31_quality")]
    Veo31Quality,
    #[serde(rename = "Veo 2 - Fast", alias = "veo2_fast")]
    Veo2Fast,
    #[serde(rename = "Veo 2 - Quality", alias = "veo2_quality")]
    Veo2Quality,
}

impl VideoModel {
    pub const ALL: [VideoModel; 5] = [
        VideoModel::Veo31Fast,
        VideoModel::Veo31FastLowerPriority,
        VideoModel::Veo31Quality,
        VideoModel::Veo2Fast,
        VideoModel::Veo2Quality,
    ];

    /// Text of the matching option in the tool's dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            VideoModel::Veo31Fast => "Veo 3.1 - Fast",
            VideoModel::Veo31FastLowerPriority => "Veo 3.1 - Fast [Lower Priority]",
            VideoModel::Veo31Quality => "Veo 3.1 - Quality",
            VideoModel::Veo2Fast => "Veo 2 - Fast",
            VideoModel::Veo2Quality => "Veo 2 - Quality",
        }
    }

    /// Resolve a free-form label; the longest matching label wins so that
    /// "Veo 3.1 - Fast [Lower Priority]" is not read as "Veo 3.1 - Fast".
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .filter(|m| label.contains(m.label()))
            .max_by_key(|m| m.label().len())
            .copied()
    }

    /// Model key understood by the upstream text-to-video endpoint.
    pub fn api_key(&self, aspect: AspectRatio) -> String {
        let base = match self {
            VideoModel::Veo31Fast => "veo_3_1_t2v_fast_ultra",
            VideoModel::Veo31FastLowerPriority => "veo_3_1_t2v_fast_ultra_relaxed",
            VideoModel::Veo31Quality => "veo_3_1_t2v_quality_ultra",
            VideoModel::Veo2Fast => "veo_2_t2v_fast",
            VideoModel::Veo2Quality => "veo_2_t2v_quality",
        };
        if aspect == AspectRatio::Portrait && !base.contains("_portrait") {
            if base.contains("fast") {
                return base.replacen("fast", "fast_portrait", 1);
            }
            if base.contains("quality") {
                return base.replacen("quality", "quality_portrait", 1);
            }
        }
        base.to_string()
    }
}

/// Generation mode offered by the tool's mode dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationMode {
    #[serde(rename = "Text to Video", alias = "text_to_video")]
    TextToVideo,
    #[serde(rename = "Frames to Video", alias = "frames_to_video")]
    FramesToVideo,
    #[serde(rename = "Ingredients to Video", alias = "ingredients_to_video")]
    IngredientsToVideo,
}

impl GenerationMode {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::TextToVideo => "Text to Video",
            GenerationMode::FramesToVideo => "Frames to Video",
            GenerationMode::IngredientsToVideo => "Ingredients to Video",
        }
    }
}

/// A binary image to be uploaded as a generation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAsset {
    pub label: String,
    pub bytes: Bytes,
    pub mime_type: String,
}

impl FrameAsset {
    pub fn png(label: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
            mime_type: "image/png".to_string(),
        }
    }

    /// Deterministic upload file name for the frame at `index`.
    pub fn file_name(index: usize) -> String {
        format!("frame_{}.png", index)
    }
}

/// A single generation request, consumed once by an orchestrator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: String,
    pub prompt: String,
    /// `None` leaves the tool's current aspect ratio untouched.
    pub aspect_ratio: Option<AspectRatio>,
    /// `None` leaves the tool's current model untouched.
    pub model: Option<VideoModel>,
    pub output_count: Option<u32>,
    pub mode: Option<GenerationMode>,
    pub create_new_project: bool,
    pub frames: Vec<FrameAsset>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: format!("gen_{}", uuid::Uuid::new_v4().simple()),
            prompt: prompt.into(),
            aspect_ratio: None,
            model: None,
            output_count: None,
            mode: None,
            create_new_project: false,
            frames: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_aspect_ratio(mut self, aspect: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect);
        self
    }

    pub fn with_model(mut self, model: VideoModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_output_count(mut self, count: u32) -> Self {
        self.output_count = Some(count);
        self
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_new_project(mut self, create: bool) -> Self {
        self.create_new_project = create;
        self
    }

    pub fn with_frame(mut self, frame: FrameAsset) -> Self {
        self.frames.push(frame);
        self
    }

    /// Check the invariants that do not need the page.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.prompt.trim().is_empty() {
            return Err(FlowError::InvalidRequest("prompt is empty".to_string()));
        }
        if self.frames.len() > MAX_FRAMES {
            return Err(FlowError::InvalidRequest(format!(
                "at most {} frames are supported, got {}",
                MAX_FRAMES,
                self.frames.len()
            )));
        }
        if self.output_count == Some(0) {
            return Err(FlowError::InvalidRequest(
                "output count must be positive".to_string(),
            ));
        }
        if self.frames.iter().any(|f| f.bytes.is_empty()) {
            return Err(FlowError::InvalidRequest("frame data is empty".to_string()));
        }
        Ok(())
    }

    /// Mode to select: explicit, or frames mode when frames are attached.
    pub fn effective_mode(&self) -> Option<GenerationMode> {
        self.mode.or_else(|| {
            (!self.frames.is_empty()).then_some(GenerationMode::FramesToVideo)
        })
    }
}

/// A server-side asset created from an uploaded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub sequence_index: usize,
    pub server_asset_id: String,
    pub width: u32,
    pub height: u32,
}

/// Final outcome of one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationResult {
    Complete {
        video_url: String,
        operation_id: String,
    },
    Failed {
        reason: String,
    },
    TimedOut,
}

/// Orchestrator state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    ConfiguringSettings,
    UploadingFrames,
    SubmittingPrompt,
    AwaitingResult,
    Done { result: GenerationResult },
}

impl OrchestratorState {
    /// Whether a request is in flight.
    pub fn is_active(&self) -> bool {
        !matches!(self, OrchestratorState::Idle | OrchestratorState::Done { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::ConfiguringSettings => "configuring_settings",
            OrchestratorState::UploadingFrames => "uploading_frames",
            OrchestratorState::SubmittingPrompt => "submitting_prompt",
            OrchestratorState::AwaitingResult => "awaiting_result",
            OrchestratorState::Done { .. } => "done",
        }
    }
}

/// History entry for a finished generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub request_id: String,
    pub prompt: String,
    pub model: Option<String>,
    pub result: GenerationResult,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
