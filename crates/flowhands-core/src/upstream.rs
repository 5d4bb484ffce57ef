//! Direct client for the tool's generation API.
//!
//! Requests carry a bearer token from the session endpoint and a
//! proof-of-humanity token from the challenge widget. Non-2xx answers are
//! returned verbatim as [`FlowError::UpstreamHttp`]. Nothing is retried:
//! generation is billable and not idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flowhands_config::UpstreamConfig;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::completion::{CompletionSignal, parse_status_payload};
use crate::error::{FlowError, TransportError};
use crate::model::{AspectRatio, VideoModel};
use crate::poll::{PollPolicy, poll};
use crate::transport::{HttpRequest, Transport};

const CONTENT_TYPE: &str = "text/plain;charset=UTF-8";
const STATUS_ACTIVE: &str = "MEDIA_GENERATION_STATUS_ACTIVE";
const SEED_MODULUS: i64 = 50_000;

/// Source of proof-of-humanity tokens.
#[async_trait]
pub trait ProofOfHumanity: Send + Sync {
    async fn token(&self, site_key: &str, action: &str) -> Result<String, FlowError>;
}

/// One text-to-video request.
#[derive(Debug, Clone)]
pub struct TextToVideoRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub model: VideoModel,
    /// Caller-chosen correlation id; random when `None`.
    pub scene_id: Option<String>,
    pub seed: Option<u32>,
}

impl TextToVideoRequest {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio, model: VideoModel) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio,
            model,
            scene_id: None,
            seed: None,
        }
    }
}

/// Handle on an operation started upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRef {
    pub name: String,
    pub scene_id: String,
}

/// Accepted generation submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedGeneration {
    pub project_id: String,
    pub scene_id: String,
    pub operations: Vec<OperationRef>,
    /// Response body, parsed when it is JSON, verbatim text otherwise.
    pub body: Value,
}

pub struct UpstreamClient {
    transport: Arc<dyn Transport>,
    proof: Arc<dyn ProofOfHumanity>,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(transport: Arc<dyn Transport>, proof: Arc<dyn ProofOfHumanity>, config: UpstreamConfig) -> Self {
        Self {
            transport,
            proof,
            config,
        }
    }

    /// Bearer token from the session endpoint.
    pub async fn access_token(&self) -> Result<String, FlowError> {
        let mut request = HttpRequest::get(&self.config.session_url);
        if let Some(cookie) = &self.config.cookie {
            request = request.header("cookie", cookie);
        }
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(FlowError::UpstreamHttp {
                status: response.status,
                body: response.text(),
            });
        }
        let body: Value = serde_json::from_slice(&response.body)
            .map_err(|e| TransportError::InvalidResponse(format!("session response: {}", e)))?;
        body.get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                TransportError::InvalidResponse("session response has no access_token".to_string()).into()
            })
    }

    /// Request envelope for the text-to-video endpoint.
    pub fn build_envelope(
        &self,
        recaptcha_token: &str,
        project_id: &str,
        scene_id: &str,
        request: &TextToVideoRequest,
        now_millis: i64,
    ) -> Value {
        let seed = request
            .seed
            .map(i64::from)
            .unwrap_or(now_millis.rem_euclid(SEED_MODULUS));
        json!({
            "clientContext": {
                "recaptchaContext": {
                    "token": recaptcha_token,
                    "applicationType": self.config.recaptcha_application_type,
                },
                "sessionId": format!(";{}", now_millis),
                "projectId": project_id,
                "tool": self.config.tool,
                "userPaygateTier": self.config.paygate_tier,
            },
            "requests": [{
                "aspectRatio": request.aspect_ratio.api_value(),
                "seed": seed,
                "textInput": { "prompt": request.prompt },
                "videoModelKey": request.model.api_key(request.aspect_ratio),
                "metadata": { "sceneId": scene_id },
            }],
        })
    }

    /// Submit one text-to-video generation.
    pub async fn generate_text_video(&self, request: &TextToVideoRequest) -> Result<SubmittedGeneration, FlowError> {
        let access_token = self.access_token().await?;
        let recaptcha = self
            .proof
            .token(&self.config.site_key, &self.config.recaptcha_action)
            .await?;

        let project_id = uuid::Uuid::new_v4().to_string();
        let scene_id = request
            .scene_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let envelope = self.build_envelope(
            &recaptcha,
            &project_id,
            &scene_id,
            request,
            Utc::now().timestamp_millis(),
        );

        let body = self.post(&self.config.generate_url, &access_token, &envelope).await?;
        let operations = operation_refs(&body, &scene_id);
        info!(scene_id = %scene_id, operations = operations.len(), "generation submitted");
        Ok(SubmittedGeneration {
            project_id,
            scene_id,
            operations,
            body,
        })
    }

    /// One status check for `operations`. Returns the first terminal
    /// signal, if any operation has finished.
    pub async fn check_status(&self, operations: &[OperationRef]) -> Result<Option<CompletionSignal>, FlowError> {
        let access_token = self.access_token().await?;
        let payload = json!({
            "operations": operations
                .iter()
                .map(|op| json!({
                    "operation": { "name": op.name },
                    "sceneId": op.scene_id,
                    "status": STATUS_ACTIVE,
                }))
                .collect::<Vec<_>>(),
        });
        let body = self.post(&self.config.status_url, &access_token, &payload).await?;
        Ok(parse_status_payload(&body))
    }

    /// Check status until an operation finishes or `policy` is exhausted.
    pub async fn await_operations(
        &self,
        operations: &[OperationRef],
        policy: PollPolicy,
    ) -> Result<CompletionSignal, FlowError> {
        poll(policy, move || self.check_status(operations))
            .await?
            .ok_or(FlowError::Timeout(policy.max_wait))
    }

    async fn post(&self, url: &str, access_token: &str, payload: &Value) -> Result<Value, FlowError> {
        let request = HttpRequest::post(url, payload.to_string())
            .header("content-type", CONTENT_TYPE)
            .header("authorization", format!("Bearer {}", access_token));
        debug!(url, "upstream request");
        let response = self.transport.send(request).await?;
        let text = response.text();
        if !response.is_success() {
            return Err(FlowError::UpstreamHttp {
                status: response.status,
                body: text,
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

fn operation_refs(body: &Value, fallback_scene: &str) -> Vec<OperationRef> {
    body.get("operations")
        .and_then(Value::as_array)
        .map(|ops| {
            ops.iter()
                .filter_map(|op| {
                    let name = op.pointer("/operation/name")?.as_str()?.to_string();
                    let scene_id = op
                        .get("sceneId")
                        .and_then(Value::as_str)
                        .unwrap_or(fallback_scene)
                        .to_string();
                    Some(OperationRef { name, scene_id })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "upstream_tests.rs"]
mod tests;
