//! Generation state machine.
//!
//! One orchestrator drives one page. A generation runs configure, optional
//! upload, prompt submission, the generate click, then waits for the
//! completion slot. Only one request is in flight at a time; a second call
//! is rejected with [`FlowError::Busy`] before anything touches the page.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use flowhands_config::{Config, SelectorsConfig, TimingConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info, warn};

use crate::completion::{CompletionSlot, watch_status};
use crate::configurator::{ConfigureReport, SettingsConfigurator, SettingsRequest, settle};
use crate::error::FlowError;
use crate::locator::{ElementLocator, Pick};
use crate::model::{
    FrameAsset, GenerationRecord, GenerationRequest, GenerationResult, MAX_FRAMES,
    OrchestratorState,
};
use crate::observer::{HandlerId, NetworkObserver, NetworkTap};
use crate::poll::{PollPolicy, poll};
use crate::surface::PageSurface;
use crate::uploader::{FrameUploader, UploadLedger, UploadOutcome, watch_uploads};

/// Finished generations kept for status reports.
const HISTORY_LIMIT: usize = 50;

/// Prompt written by a settings dry run when none is given.
const TEST_PROMPT: &str = "TEST";

/// Successful (non-timeout, non-error) end of a generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub request_id: String,
    pub result: GenerationResult,
    pub settings: Option<ConfigureReport>,
    pub uploads: Option<UploadOutcome>,
}

/// Settings dry run: configure and fill the prompt, never generate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSettingsRequest {
    #[serde(flatten)]
    pub settings: SettingsRequest,
    pub prompt: Option<String>,
    #[serde(default)]
    pub create_new_project: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSettingsReport {
    pub settings: ConfigureReport,
    pub prompt_set: bool,
    pub generate_control_found: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub is_generating: bool,
    pub generation_count: usize,
    pub state: OrchestratorState,
    pub history: Vec<GenerationRecord>,
}

/// Clears the busy flag when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct GenerationOrchestrator {
    surface: Arc<dyn PageSurface>,
    tap: Arc<dyn NetworkTap>,
    observer: Arc<NetworkObserver>,
    selectors: SelectorsConfig,
    timing: TimingConfig,
    flow_url: String,
    completion: CompletionSlot,
    ledger: UploadLedger,
    handlers: Vec<HandlerId>,
    busy: AtomicBool,
    state: Mutex<OrchestratorState>,
    history: Mutex<VecDeque<GenerationRecord>>,
    generation_count: AtomicUsize,
}

impl GenerationOrchestrator {
    /// Build an orchestrator and register its upload and status handlers
    /// on `observer`.
    pub fn new(
        surface: Arc<dyn PageSurface>,
        tap: Arc<dyn NetworkTap>,
        observer: Arc<NetworkObserver>,
        config: &Config,
    ) -> Self {
        let completion = CompletionSlot::new();
        let ledger = UploadLedger::new();
        let handlers = vec![
            watch_status(&observer, &config.observer.status_marker, completion.clone()),
            watch_uploads(&observer, &config.observer.upload_marker, ledger.clone()),
        ];

        Self {
            surface,
            tap,
            observer,
            selectors: config.selectors.clone(),
            timing: config.timing.clone(),
            flow_url: config.browser.flow_url.clone(),
            completion,
            ledger,
            handlers,
            busy: AtomicBool::new(false),
            state: Mutex::new(OrchestratorState::Idle),
            history: Mutex::new(VecDeque::new()),
            generation_count: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            is_generating: self.is_busy(),
            generation_count: self.generation_count.load(Ordering::SeqCst),
            state: self.state(),
            history: self.history.lock().iter().cloned().collect(),
        }
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, FlowError> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| FlowError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }

    fn set_state(&self, state: OrchestratorState) {
        let mut current = self.state.lock();
        if *current != state {
            info!(from = current.name(), to = state.name(), "state transition");
            *current = state;
        }
    }

    /// Run one generation to completion.
    ///
    /// Returns the outcome once the completion slot yields a signal, or
    /// [`FlowError::Timeout`] after the configured maximum wait. Any other
    /// error aborts the request. The orchestrator is free again afterwards
    /// regardless of outcome.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutcome, FlowError> {
        let _busy = self.acquire()?;
        request.validate()?;

        let span = tracing::info_span!("generation", request_id = %request.id);
        async {
            info!(prompt_len = request.prompt.len(), frames = request.frames.len(), "generation started");

            let result = match self.tap.install(self.observer.clone()).await {
                Ok(()) => {
                    let result = self.run_generation(&request).await;
                    if let Err(e) = self.tap.uninstall().await {
                        warn!(error = %e, "network tap uninstall failed");
                    }
                    result
                }
                Err(e) => Err(FlowError::from(e)),
            };
            self.completion.disarm();

            let terminal = match &result {
                Ok(outcome) => outcome.result.clone(),
                Err(FlowError::Timeout(_)) => GenerationResult::TimedOut,
                Err(e) => GenerationResult::Failed {
                    reason: e.to_string(),
                },
            };
            match &result {
                Ok(_) => info!(outcome = ?terminal, "generation finished"),
                Err(e) if e.is_timeout() => warn!(error = %e, "generation timed out"),
                Err(e) => error!(error = %e, "generation aborted"),
            }
            self.finish(&request, terminal);
            result
        }
        .instrument(span)
        .await
    }

    async fn run_generation(&self, request: &GenerationRequest) -> Result<GenerationOutcome, FlowError> {
        self.set_state(OrchestratorState::ConfiguringSettings);
        if request.create_new_project {
            self.open_new_project().await?;
        }
        let settings = self.apply_settings(&SettingsRequest::from_generation(request)).await;

        let uploads = if request.frames.is_empty() {
            None
        } else {
            self.set_state(OrchestratorState::UploadingFrames);
            Some(self.upload_best_effort(&request.frames).await)
        };

        self.set_state(OrchestratorState::SubmittingPrompt);
        self.submit_prompt(&request.prompt).await?;
        let generate = ElementLocator::new(self.surface.as_ref())
            .find(&self.selectors.generate_button, Pick::First)
            .await?
            .ok_or(FlowError::GenerateControlNotFound)?;

        // Armed before the click so an immediate status response is kept.
        self.completion.arm(&request.id);
        self.surface.click(&generate).await?;
        settle(self.timing.generate_settle()).await;
        debug!("generate clicked");

        self.set_state(OrchestratorState::AwaitingResult);
        let policy = PollPolicy::new(self.timing.result_poll_interval(), self.timing.result_max_wait());
        let completion = &self.completion;
        let signal = poll(policy, || async move { Ok::<_, FlowError>(completion.take()) }).await?;

        match signal {
            Some(signal) => Ok(GenerationOutcome {
                request_id: request.id.clone(),
                result: signal.into(),
                settings,
                uploads,
            }),
            None => Err(FlowError::Timeout(self.timing.result_max_wait())),
        }
    }

    fn finish(&self, request: &GenerationRequest, result: GenerationResult) {
        let record = GenerationRecord {
            request_id: request.id.clone(),
            prompt: request.prompt.clone(),
            model: request.model.map(|m| m.label().to_string()),
            result: result.clone(),
            finished_at: Utc::now(),
        };
        {
            let mut history = self.history.lock();
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(record);
        }
        self.generation_count.fetch_add(1, Ordering::SeqCst);
        self.set_state(OrchestratorState::Done { result });
    }

    /// Configure without generating, reporting whether the generate control
    /// is present.
    pub async fn test_settings(&self, request: TestSettingsRequest) -> Result<TestSettingsReport, FlowError> {
        let _busy = self.acquire()?;
        let result = self.run_test_settings(&request).await;
        self.set_state(OrchestratorState::Idle);
        result
    }

    async fn run_test_settings(&self, request: &TestSettingsRequest) -> Result<TestSettingsReport, FlowError> {
        self.set_state(OrchestratorState::ConfiguringSettings);
        if request.create_new_project {
            self.open_new_project().await?;
        }
        let settings = self
            .apply_settings(&request.settings)
            .await
            .unwrap_or_default();

        self.set_state(OrchestratorState::SubmittingPrompt);
        let prompt = request.prompt.as_deref().unwrap_or(TEST_PROMPT);
        let prompt_set = match self.submit_prompt(prompt).await {
            Ok(()) => true,
            Err(FlowError::NotFound(_) | FlowError::PromptNotSet) => false,
            Err(e) => return Err(e),
        };
        let generate_control_found = ElementLocator::new(self.surface.as_ref())
            .find(&self.selectors.generate_button, Pick::First)
            .await?
            .is_some();

        info!(prompt_set, generate_control_found, "settings test complete");
        Ok(TestSettingsReport {
            settings,
            prompt_set,
            generate_control_found,
        })
    }

    /// Upload frames without generating.
    pub async fn upload_frames(&self, frames: Vec<FrameAsset>) -> Result<UploadOutcome, FlowError> {
        let _busy = self.acquire()?;
        if frames.len() > MAX_FRAMES {
            return Err(FlowError::InvalidRequest(format!(
                "at most {} frames are supported, got {}",
                MAX_FRAMES,
                frames.len()
            )));
        }
        if frames.iter().any(|f| f.bytes.is_empty()) {
            return Err(FlowError::InvalidRequest("frame data is empty".to_string()));
        }

        self.tap.install(self.observer.clone()).await?;
        self.set_state(OrchestratorState::UploadingFrames);
        let result = FrameUploader::new(self.surface.as_ref(), &self.selectors, &self.timing, &self.ledger)
            .upload(&frames)
            .await;
        if let Err(e) = self.tap.uninstall().await {
            warn!(error = %e, "network tap uninstall failed");
        }
        self.set_state(OrchestratorState::Idle);
        result
    }

    /// Open a fresh project from the tool's home page.
    pub async fn create_new_project(&self) -> Result<(), FlowError> {
        let _busy = self.acquire()?;
        self.open_new_project().await
    }

    async fn open_new_project(&self) -> Result<(), FlowError> {
        let url = self.surface.current_url().await?;
        if !is_home(&url, &self.flow_url) {
            debug!(from = %url, "navigating to tool home");
            self.surface.navigate(&self.flow_url).await?;
            settle(self.timing.navigation_settle()).await;
        }

        let policy = PollPolicy::attempts(
            self.timing.project_poll_interval(),
            self.timing.project_poll_attempts,
        );
        let opened = poll(policy, || async {
            let locator = ElementLocator::new(self.surface.as_ref());
            let Some(button) = locator.find(&self.selectors.new_project_button, Pick::First).await? else {
                return Ok::<_, FlowError>(None);
            };
            self.surface.click(&button).await?;
            settle(self.timing.navigation_settle()).await;
            let url = self.surface.current_url().await?;
            Ok(url.contains("/project/").then_some(url))
        })
        .await?;

        match opened {
            Some(url) => {
                info!(url = %url, "new project created");
                Ok(())
            }
            None => Err(FlowError::NotFound("new project".to_string())),
        }
    }

    /// Best-effort settings; failures are logged, never returned.
    async fn apply_settings(&self, settings: &SettingsRequest) -> Option<ConfigureReport> {
        if *settings == SettingsRequest::default() {
            return None;
        }
        let configurator = SettingsConfigurator::new(self.surface.as_ref(), &self.selectors, &self.timing);
        match configurator.configure(settings).await {
            Ok(report) => {
                if !report.panel_opened {
                    warn!("settings panel could not be opened, continuing with current settings");
                }
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "settings could not be applied, continuing");
                None
            }
        }
    }

    /// Upload frames; failures degrade to a partial, incomplete outcome.
    async fn upload_best_effort(&self, frames: &[FrameAsset]) -> UploadOutcome {
        let uploader = FrameUploader::new(self.surface.as_ref(), &self.selectors, &self.timing, &self.ledger);
        match uploader.upload(frames).await {
            Ok(outcome) => {
                if !outcome.complete {
                    warn!(
                        confirmed = outcome.assets.len(),
                        expected = frames.len(),
                        "frame upload incomplete, generating anyway"
                    );
                }
                outcome
            }
            Err(FlowError::Upload { label, cause, partial }) => {
                warn!(frame = %label, cause = %cause, "frame upload failed, generating anyway");
                UploadOutcome {
                    assets: partial,
                    complete: false,
                    warnings: vec![format!("{}: {}", label, cause)],
                }
            }
            Err(e) => {
                warn!(error = %e, "frame upload failed, generating anyway");
                UploadOutcome {
                    warnings: vec![e.to_string()],
                    ..Default::default()
                }
            }
        }
    }

    /// Write the prompt and read it back.
    async fn submit_prompt(&self, prompt: &str) -> Result<(), FlowError> {
        let textarea = ElementLocator::new(self.surface.as_ref())
            .require(&self.selectors.textarea, Pick::First, "prompt textarea")
            .await?;
        self.surface.set_value(&textarea, prompt).await?;
        let actual = self.surface.read_value(&textarea).await?;
        if actual != prompt {
            warn!(expected_len = prompt.len(), actual_len = actual.len(), "prompt read-back mismatch");
            return Err(FlowError::PromptNotSet);
        }
        settle(self.timing.prompt_settle()).await;
        debug!("prompt set");
        Ok(())
    }
}

impl Drop for GenerationOrchestrator {
    fn drop(&mut self) {
        for id in &self.handlers {
            self.observer.remove_handler(*id);
        }
    }
}

/// Whether `url` is the tool's landing page rather than a project.
fn is_home(url: &str, flow_url: &str) -> bool {
    let base = flow_url.trim_end_matches('/');
    url.starts_with(base) && !url.contains("/project/")
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
