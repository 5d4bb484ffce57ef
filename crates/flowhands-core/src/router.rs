//! Command relay between a control surface and the orchestrator.
//!
//! Each command gets exactly one terminal reply. Work runs in its own task
//! and races the router timeout through a single-shot channel: whichever
//! finishes first answers, and a late result is dropped. Timing out does
//! not cancel the work.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, warn};

use crate::error::FlowError;
use crate::model::{AspectRatio, FrameAsset, GenerationMode, GenerationRequest, GenerationResult, VideoModel};
use crate::orchestrator::{GenerationOrchestrator, TestSettingsRequest};

/// Completed replies kept for `reply_for` lookups.
const REPLY_CACHE_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    Generate,
    TestSettings,
    UploadFrames,
    GetStatus,
}

/// Inbound message from the control surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    pub command: Command,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl CommandMessage {
    pub fn new(command: Command, payload: Value) -> Self {
        Self {
            command,
            request_id: None,
            payload,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Started,
    Complete,
    Error,
    TestComplete,
}

/// Reply to a command. `fields` are flattened next to `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub request_id: String,
    pub status: ReplyStatus,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CommandReply {
    fn new(request_id: &str, status: ReplyStatus, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            request_id: request_id.to_string(),
            status,
            fields,
        }
    }

    pub fn error(request_id: &str, err: &FlowError) -> Self {
        let mut fields = json!({
            "error": err.to_string(),
            "code": err.code(),
        });
        match err {
            FlowError::Upload { partial, .. } => {
                fields["partial"] = json!(partial);
            }
            FlowError::UpstreamHttp { status, body } => {
                fields["httpStatus"] = json!(status);
                fields["body"] = json!(body);
            }
            _ => {}
        }
        Self::new(request_id, ReplyStatus::Error, fields)
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ReplyStatus::Started
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Frame as sent by a control surface: base64 or a `data:` URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FramePayload {
    #[serde(default, alias = "name")]
    label: Option<String>,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FramesPayload {
    #[serde(default)]
    frames: Vec<FramePayload>,
    first_frame: Option<String>,
    last_frame: Option<String>,
}

impl FramesPayload {
    fn into_assets(self) -> Result<Vec<FrameAsset>, FlowError> {
        let mut frames = self.frames;
        if let Some(data) = self.first_frame {
            frames.push(FramePayload {
                label: Some("First Frame".to_string()),
                data,
            });
        }
        if let Some(data) = self.last_frame {
            frames.push(FramePayload {
                label: Some("Last Frame".to_string()),
                data,
            });
        }
        frames
            .into_iter()
            .enumerate()
            .map(|(i, frame)| {
                let label = frame.label.unwrap_or_else(|| format!("Frame {}", i + 1));
                let (mime_type, bytes) = decode_frame(&frame.data)
                    .map_err(|e| FlowError::InvalidRequest(format!("{}: {}", label, e)))?;
                Ok(FrameAsset {
                    label,
                    bytes: bytes.into(),
                    mime_type,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePayload {
    prompt: String,
    aspect_ratio: Option<AspectRatio>,
    model: Option<VideoModel>,
    output_count: Option<u32>,
    mode: Option<GenerationMode>,
    #[serde(default)]
    create_new_project: bool,
    #[serde(flatten)]
    frames: FramesPayload,
}

/// Decode base64 or a `data:<mime>;base64,` URL. Plain base64 is PNG.
pub fn decode_frame(data: &str) -> Result<(String, Vec<u8>), String> {
    let (mime_type, encoded) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, encoded) = rest
                .split_once(',')
                .ok_or_else(|| "malformed data URL".to_string())?;
            let mime = header.strip_suffix(";base64").ok_or_else(|| "data URL is not base64".to_string())?;
            (if mime.is_empty() { "image/png" } else { mime }, encoded)
        }
        None => ("image/png", data),
    };
    let bytes = BASE64.decode(encoded.trim()).map_err(|e| e.to_string())?;
    Ok((mime_type.to_string(), bytes))
}

fn parse<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, FlowError> {
    let payload = if payload.is_null() { json!({}) } else { payload };
    serde_json::from_value(payload).map_err(|e| FlowError::InvalidRequest(e.to_string()))
}

/// Terminal replies awaiting collection. The oldest is evicted when full.
#[derive(Default)]
struct ReplyCache {
    replies: HashMap<String, CommandReply>,
    order: VecDeque<String>,
}

impl ReplyCache {
    fn insert(&mut self, reply: CommandReply) {
        let id = reply.request_id.clone();
        if self.replies.insert(id.clone(), reply).is_some() {
            self.order.retain(|existing| existing != &id);
        }
        self.order.push_back(id);
        while self.replies.len() > REPLY_CACHE_LIMIT {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.replies.remove(&oldest).is_some() {
                warn!(request_id = %oldest, "uncollected reply evicted");
            }
        }
    }

    fn take(&mut self, request_id: &str) -> Option<CommandReply> {
        let reply = self.replies.remove(request_id)?;
        self.order.retain(|id| id != request_id);
        Some(reply)
    }
}

pub struct RequestRouter {
    orchestrator: Arc<GenerationOrchestrator>,
    timeout: Duration,
    replies: Arc<Mutex<ReplyCache>>,
}

impl RequestRouter {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>, timeout: Duration) -> Self {
        Self {
            orchestrator,
            timeout,
            replies: Arc::new(Mutex::new(ReplyCache::default())),
        }
    }

    pub fn orchestrator(&self) -> &Arc<GenerationOrchestrator> {
        &self.orchestrator
    }

    /// Run a command and wait for its single terminal reply.
    pub async fn dispatch(&self, message: CommandMessage) -> CommandReply {
        let request_id = message
            .request_id
            .clone()
            .unwrap_or_else(|| format!("req_{}", uuid::Uuid::new_v4().simple()));
        debug!(request_id = %request_id, command = ?message.command, "command received");

        if message.command == Command::GetStatus {
            let status = self.orchestrator.status();
            return CommandReply::new(&request_id, ReplyStatus::Complete, json!(status));
        }

        let (tx, rx) = oneshot::channel();
        let orchestrator = self.orchestrator.clone();
        let id = request_id.clone();
        let span = tracing::info_span!("command", request_id = %request_id, command = ?message.command);
        tokio::spawn(
            async move {
                let reply = execute(&orchestrator, &id, message).await;
                if tx.send(reply).is_err() {
                    warn!("reply arrived after the request was answered, discarded");
                }
            }
            .instrument(span),
        );

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => CommandReply::new(
                &request_id,
                ReplyStatus::Error,
                json!({"error": "command task ended without a reply", "code": "internal"}),
            ),
            Err(_) => {
                warn!(request_id = %request_id, timeout_secs = self.timeout.as_secs(), "command timed out");
                CommandReply::error(&request_id, &FlowError::Timeout(self.timeout))
            }
        }
    }

    /// Start a command and return a `started` acknowledgement. The terminal
    /// reply is available from [`reply_for`](Self::reply_for) once ready.
    pub fn submit(self: &Arc<Self>, message: CommandMessage) -> CommandReply {
        let request_id = message
            .request_id
            .clone()
            .unwrap_or_else(|| format!("req_{}", uuid::Uuid::new_v4().simple()));
        let message = CommandMessage {
            request_id: Some(request_id.clone()),
            ..message
        };

        let router = self.clone();
        tokio::spawn(async move {
            let reply = router.dispatch(message).await;
            router.replies.lock().insert(reply);
        });

        info!(request_id = %request_id, "command started");
        CommandReply::new(&request_id, ReplyStatus::Started, json!({}))
    }

    /// Take the terminal reply of a submitted command, if it has arrived.
    pub fn reply_for(&self, request_id: &str) -> Option<CommandReply> {
        self.replies.lock().take(request_id)
    }
}

async fn execute(orchestrator: &GenerationOrchestrator, request_id: &str, message: CommandMessage) -> CommandReply {
    let result = match message.command {
        Command::Generate => generate(orchestrator, request_id, message.payload).await,
        Command::TestSettings => test_settings(orchestrator, request_id, message.payload).await,
        Command::UploadFrames => upload_frames(orchestrator, request_id, message.payload).await,
        Command::GetStatus => Ok(CommandReply::new(
            request_id,
            ReplyStatus::Complete,
            json!(orchestrator.status()),
        )),
    };
    result.unwrap_or_else(|e| CommandReply::error(request_id, &e))
}

async fn generate(
    orchestrator: &GenerationOrchestrator,
    request_id: &str,
    payload: Value,
) -> Result<CommandReply, FlowError> {
    let payload: GeneratePayload = parse(payload)?;
    let mut request = GenerationRequest::new(payload.prompt).with_id(request_id);
    request.aspect_ratio = payload.aspect_ratio;
    request.model = payload.model;
    request.output_count = payload.output_count;
    request.mode = payload.mode;
    request.create_new_project = payload.create_new_project;
    request.frames = payload.frames.into_assets()?;

    let outcome = orchestrator.generate(request).await?;
    let mut fields = json!({
        "settings": outcome.settings,
        "uploads": outcome.uploads,
    });
    let status = match outcome.result {
        GenerationResult::Complete {
            video_url,
            operation_id,
        } => {
            fields["videoUrl"] = json!(video_url);
            fields["operationId"] = json!(operation_id);
            ReplyStatus::Complete
        }
        GenerationResult::Failed { reason } => {
            fields["error"] = json!(reason);
            fields["code"] = json!("generation_failed");
            ReplyStatus::Error
        }
        GenerationResult::TimedOut => {
            fields["code"] = json!("timeout");
            ReplyStatus::Error
        }
    };
    Ok(CommandReply::new(request_id, status, fields))
}

async fn test_settings(
    orchestrator: &GenerationOrchestrator,
    request_id: &str,
    payload: Value,
) -> Result<CommandReply, FlowError> {
    let request: TestSettingsRequest = parse(payload)?;
    let report = orchestrator.test_settings(request).await?;
    Ok(CommandReply::new(request_id, ReplyStatus::TestComplete, json!(report)))
}

async fn upload_frames(
    orchestrator: &GenerationOrchestrator,
    request_id: &str,
    payload: Value,
) -> Result<CommandReply, FlowError> {
    let payload: FramesPayload = parse(payload)?;
    let frames = payload.into_assets()?;
    if frames.is_empty() {
        return Err(FlowError::InvalidRequest("no frames given".to_string()));
    }
    let outcome = orchestrator.upload_frames(frames).await?;
    let media_ids: Vec<&str> = outcome
        .assets
        .iter()
        .map(|a| a.server_asset_id.as_str())
        .collect();
    Ok(CommandReply::new(
        request_id,
        ReplyStatus::Complete,
        json!({
            "mediaIds": media_ids,
            "assets": outcome.assets,
            "uploadComplete": outcome.complete,
            "warnings": outcome.warnings,
        }),
    ))
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
