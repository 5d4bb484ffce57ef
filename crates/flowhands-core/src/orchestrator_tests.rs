use super::*;
use crate::error::TransportError;
use crate::model::{AspectRatio, VideoModel};
use crate::observer::{ObservedCall, SlotTap};
use crate::testing::{Effect, FLOW_HOME, FLOW_PROJECT, FakeElement, FakePage, flow_page};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportSlot};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;
use tokio::time::Instant;

const STATUS_URL: &str =
    "https://aisandbox-pa.googleapis.com/v1/video:batchCheckAsyncVideoGenerationStatus";
const UPLOAD_URL: &str = "https://aisandbox-pa.googleapis.com/v1:uploadUserImage";

struct Offline;

#[async_trait]
impl Transport for Offline {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Request("offline".to_string()))
    }
}

struct Harness {
    page: Arc<FakePage>,
    observer: Arc<NetworkObserver>,
    tap: Arc<SlotTap>,
    orchestrator: Arc<GenerationOrchestrator>,
}

impl Harness {
    fn new() -> Self {
        Self::with_page(flow_page())
    }

    fn with_page(page: FakePage) -> Self {
        let mut config = Config::default();
        config.timing = TimingConfig::instant();
        let page = Arc::new(page);
        let observer = Arc::new(NetworkObserver::new(&config.observer));
        let tap = Arc::new(SlotTap::new(Arc::new(TransportSlot::new(Arc::new(Offline)))));
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            page.clone(),
            tap.clone(),
            observer.clone(),
            &config,
        ));
        Self {
            page,
            observer,
            tap,
            orchestrator,
        }
    }

    /// The generate click is answered by a finished status response.
    fn complete_on_generate(&self, video_url: &str) {
        let observer = self.observer.clone();
        let video_url = video_url.to_string();
        self.page.on_click(
            "generate",
            Effect::callback(move || observer.record(status_call(success_body(&video_url)))),
        );
    }

    /// Every crop confirmation is answered by an upload response.
    fn confirm_uploads(&self) {
        let observer = self.observer.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        self.page.on_click(
            "crop",
            Effect::callback(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                observer.record(ObservedCall {
                    url: UPLOAD_URL.to_string(),
                    status: Some(200),
                    response_body: Bytes::from(
                        json!({"mediaGenerationId": {"mediaGenerationId": format!("asset-{n}")}})
                            .to_string(),
                    ),
                    ..Default::default()
                });
            }),
        );
    }
}

fn success_body(video_url: &str) -> serde_json::Value {
    json!({
        "operations": [{
            "operation": {"name": "op-7", "metadata": {"video": {"fifeUrl": video_url}}},
            "status": "MEDIA_GENERATION_STATUS_SUCCESSFUL"
        }]
    })
}

fn status_call(body: serde_json::Value) -> ObservedCall {
    ObservedCall {
        url: STATUS_URL.to_string(),
        method: "POST".to_string(),
        status: Some(200),
        response_body: Bytes::from(body.to_string()),
        ..Default::default()
    }
}

fn frame(label: &str) -> FrameAsset {
    FrameAsset::png(label, vec![0x89, b'P', b'N', b'G'])
}

#[tokio::test(start_paused = true)]
async fn test_text_generation_completes() {
    let h = Harness::new();
    h.complete_on_generate("https://video/1.mp4");

    let request = GenerationRequest::new("a red fox in snow")
        .with_aspect_ratio(AspectRatio::Portrait)
        .with_model(VideoModel::Veo2Fast);
    let outcome = h.orchestrator.generate(request).await.unwrap();

    assert_eq!(
        outcome.result,
        GenerationResult::Complete {
            video_url: "https://video/1.mp4".to_string(),
            operation_id: "op-7".to_string(),
        }
    );
    assert!(outcome.uploads.is_none());
    assert_eq!(outcome.settings.unwrap().applied, vec!["aspect_ratio", "model"]);
    assert_eq!(h.page.value_of("prompt").as_deref(), Some("a red fox in snow"));
    assert!(h.page.was_clicked("generate"));

    assert!(!h.orchestrator.is_busy());
    assert!(!h.tap.is_installed());
    assert!(matches!(
        h.orchestrator.state(),
        OrchestratorState::Done {
            result: GenerationResult::Complete { .. }
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_frames_generation_uploads_in_order() {
    let h = Harness::new();
    h.confirm_uploads();
    h.complete_on_generate("https://video/2.mp4");

    let request = GenerationRequest::new("morph")
        .with_frame(frame("First Frame"))
        .with_frame(frame("Last Frame"));
    let outcome = h.orchestrator.generate(request).await.unwrap();

    let uploads = outcome.uploads.unwrap();
    assert!(uploads.complete);
    let indexed: Vec<_> = uploads
        .assets
        .iter()
        .map(|a| (a.sequence_index, a.server_asset_id.clone()))
        .collect();
    assert_eq!(
        indexed,
        vec![(0, "asset-1".to_string()), (1, "asset-2".to_string())]
    );
    assert!(h.page.was_clicked("opt-mode-frames"));

    // Uploads happen before the prompt is submitted and generation triggered.
    let clicked = h.page.clicked();
    let last_crop = clicked.iter().rposition(|k| k == "crop").unwrap();
    let generate = clicked.iter().position(|k| k == "generate").unwrap();
    assert!(last_crop < generate);
}

#[tokio::test(start_paused = true)]
async fn test_text_generation_never_uploads() {
    let h = Harness::new();
    h.complete_on_generate("https://video/3.mp4");

    h.orchestrator
        .generate(GenerationRequest::new("no frames"))
        .await
        .unwrap();

    assert!(h.page.files_for("file-input").is_empty());
    assert!(!h.page.clicked().iter().any(|k| k.starts_with("slot-")));
}

#[tokio::test(start_paused = true)]
async fn test_prompt_mismatch_never_clicks_generate() {
    let h = Harness::new();
    h.page.reject_input("prompt");
    h.complete_on_generate("https://video/never.mp4");

    let err = h
        .orchestrator
        .generate(GenerationRequest::new("lost words"))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::PromptNotSet));
    assert!(!h.page.was_clicked("generate"));
    assert!(!h.orchestrator.is_busy());
    assert!(!h.tap.is_installed());
    assert!(matches!(
        h.orchestrator.state(),
        OrchestratorState::Done {
            result: GenerationResult::Failed { .. }
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_missing_generate_control() {
    let h = Harness::new();
    h.page.remove("generate");

    let err = h
        .orchestrator
        .generate(GenerationRequest::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::GenerateControlNotFound));
}

#[tokio::test(start_paused = true)]
async fn test_missing_textarea_aborts() {
    let h = Harness::new();
    h.page.remove("prompt");

    let err = h
        .orchestrator
        .generate(GenerationRequest::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::NotFound(ref what) if what == "prompt textarea"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_late_signal_is_ignored() {
    let h = Harness::new();
    let start = Instant::now();

    let err = h
        .orchestrator
        .generate(GenerationRequest::new("slow"))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Timeout(d) if d == Duration::from_secs(360)));
    assert_eq!(start.elapsed(), Duration::from_secs(360));
    assert_eq!(
        h.orchestrator.state(),
        OrchestratorState::Done {
            result: GenerationResult::TimedOut
        }
    );

    h.observer.record(status_call(success_body("https://video/late.mp4")));
    assert_eq!(
        h.orchestrator.state(),
        OrchestratorState::Done {
            result: GenerationResult::TimedOut
        }
    );
    assert_eq!(h.orchestrator.status().generation_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_completion_found_by_polling() {
    let h = Harness::new();
    let observer = h.observer.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(9)).await;
        observer.record(status_call(success_body("https://video/9.mp4")));
    });
    let start = Instant::now();

    let outcome = h
        .orchestrator
        .generate(GenerationRequest::new("wait for it"))
        .await
        .unwrap();

    assert!(matches!(outcome.result, GenerationResult::Complete { .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_is_reported() {
    let h = Harness::new();
    let observer = h.observer.clone();
    h.page.on_click(
        "generate",
        Effect::callback(move || {
            observer.record(status_call(json!({"operations": [{
                "status": "MEDIA_GENERATION_STATUS_FAILED",
                "operation": {"metadata": {"error": {"message": "unsafe prompt"}}}
            }]})))
        }),
    );

    let outcome = h
        .orchestrator
        .generate(GenerationRequest::new("x"))
        .await
        .unwrap();
    assert_eq!(
        outcome.result,
        GenerationResult::Failed {
            reason: "unsafe prompt".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_generate_is_busy_and_touches_nothing() {
    let h = Harness::new();
    let orchestrator = h.orchestrator.clone();
    let first = tokio::spawn(async move {
        orchestrator
            .generate(GenerationRequest::new("first"))
            .await
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.orchestrator.state(), OrchestratorState::AwaitingResult);
    assert!(h.orchestrator.status().is_generating);

    let mutations = h.page.mutations();
    let err = h
        .orchestrator
        .generate(GenerationRequest::new("second"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Busy));
    assert!(matches!(
        h.orchestrator.test_settings(TestSettingsRequest::default()).await,
        Err(FlowError::Busy)
    ));
    assert_eq!(h.page.mutations(), mutations);

    h.observer.record(status_call(success_body("https://video/first.mp4")));
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome.result, GenerationResult::Complete { .. }));

    // Free again.
    h.complete_on_generate("https://video/next.mp4");
    assert!(h.orchestrator.generate(GenerationRequest::new("next")).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_settings_failure_is_not_fatal() {
    let h = Harness::new();
    h.page.remove("model-button");
    h.page.remove("tune");
    h.complete_on_generate("https://video/4.mp4");

    let outcome = h
        .orchestrator
        .generate(GenerationRequest::new("x").with_model(VideoModel::Veo31Quality))
        .await
        .unwrap();

    assert!(!outcome.settings.unwrap().panel_opened);
    assert!(matches!(outcome.result, GenerationResult::Complete { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_upload_failure_is_not_fatal() {
    let h = Harness::new();
    // Frames mode never reveals any slot.
    h.page.remove("slot-0");
    h.page.remove("slot-1");
    h.complete_on_generate("https://video/5.mp4");

    let outcome = h
        .orchestrator
        .generate(GenerationRequest::new("x").with_frame(frame("First Frame")))
        .await
        .unwrap();

    let uploads = outcome.uploads.unwrap();
    assert!(!uploads.complete);
    assert!(uploads.assets.is_empty());
    assert_eq!(uploads.warnings.len(), 1);
    assert!(h.page.was_clicked("generate"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_rejected_without_touching_page() {
    let h = Harness::new();
    let err = h
        .orchestrator
        .generate(GenerationRequest::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::InvalidRequest(_)));
    assert_eq!(h.page.mutations(), 0);
    assert!(!h.orchestrator.is_busy());
}

fn home_page() -> FakePage {
    let page = flow_page().with_url(FLOW_HOME);
    page.add(
        FakeElement::new("new-project")
            .matching("button")
            .text("New project")
            .on_click(Effect::navigate(FLOW_PROJECT)),
    );
    page
}

#[tokio::test(start_paused = true)]
async fn test_new_project_before_generation() {
    let h = Harness::with_page(home_page());
    h.complete_on_generate("https://video/6.mp4");

    h.orchestrator
        .generate(GenerationRequest::new("x").with_new_project(true))
        .await
        .unwrap();

    assert!(h.page.navigations().is_empty());
    assert_eq!(h.page.clicked()[0], "new-project");
}

#[tokio::test(start_paused = true)]
async fn test_new_project_navigates_home_first() {
    let page = home_page().with_url("https://labs.google/fx/tools/flow/project/old");
    let h = Harness::with_page(page);

    h.orchestrator.create_new_project().await.unwrap();

    assert_eq!(h.page.navigations(), vec![FLOW_HOME.to_string()]);
    assert!(h.page.was_clicked("new-project"));
}

#[tokio::test(start_paused = true)]
async fn test_new_project_missing_aborts() {
    let h = Harness::with_page(flow_page().with_url(FLOW_HOME));
    let start = Instant::now();

    let err = h
        .orchestrator
        .generate(GenerationRequest::new("x").with_new_project(true))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::NotFound(ref what) if what == "new project"));
    assert_eq!(start.elapsed(), Duration::from_millis(4500));
    assert!(!h.page.was_clicked("generate"));
}

#[tokio::test(start_paused = true)]
async fn test_settings_dry_run() {
    let h = Harness::new();

    let report = h
        .orchestrator
        .test_settings(TestSettingsRequest {
            settings: SettingsRequest {
                aspect_ratio: Some("Landscape (16:9)".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(report.generate_control_found);
    assert!(report.prompt_set);
    assert_eq!(report.settings.applied, vec!["aspect_ratio"]);
    assert_eq!(h.page.value_of("prompt").as_deref(), Some("TEST"));
    assert!(!h.page.was_clicked("generate"));
    assert_eq!(h.orchestrator.state(), OrchestratorState::Idle);
    assert_eq!(h.orchestrator.status().generation_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_settings_dry_run_without_generate_control() {
    let h = Harness::new();
    h.page.remove("generate");
    h.page.remove("prompt");

    let report = h
        .orchestrator
        .test_settings(TestSettingsRequest::default())
        .await
        .unwrap();

    assert!(!report.generate_control_found);
    assert!(!report.prompt_set);
}

#[tokio::test(start_paused = true)]
async fn test_upload_frames_alone() {
    let h = Harness::new();
    h.page.set_visible("slot-0", true);
    h.page.set_visible("slot-1", true);
    h.confirm_uploads();

    let outcome = h
        .orchestrator
        .upload_frames(vec![frame("First Frame")])
        .await
        .unwrap();

    assert!(outcome.complete);
    assert_eq!(outcome.assets[0].server_asset_id, "asset-1");
    assert!(!h.tap.is_installed());
    assert!(!h.page.was_clicked("generate"));

    let err = h
        .orchestrator
        .upload_frames(vec![frame("a"), frame("b"), frame("c")])
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::InvalidRequest(_)));
}

#[tokio::test(start_paused = true)]
async fn test_status_history() {
    let h = Harness::new();
    h.complete_on_generate("https://video/h.mp4");

    h.orchestrator
        .generate(
            GenerationRequest::new("history")
                .with_id("req-1")
                .with_model(VideoModel::Veo31Fast),
        )
        .await
        .unwrap();

    let status = h.orchestrator.status();
    assert!(!status.is_generating);
    assert_eq!(status.generation_count, 1);
    assert_eq!(status.history.len(), 1);
    assert_eq!(status.history[0].request_id, "req-1");
    assert_eq!(status.history[0].model.as_deref(), Some("Veo 3.1 - Fast"));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["isGenerating"], false);
    assert_eq!(json["state"]["state"], "done");
}

#[test]
fn test_is_home() {
    assert!(is_home(FLOW_HOME, FLOW_HOME));
    assert!(is_home("https://labs.google/fx/tools/flow", FLOW_HOME));
    assert!(!is_home(FLOW_PROJECT, FLOW_HOME));
    assert!(!is_home("https://example.com/", FLOW_HOME));
}

#[test]
fn test_dropping_orchestrator_removes_handlers() {
    let h = Harness::new();
    assert_eq!(h.observer.handler_count(), 2);
    let Harness {
        orchestrator,
        observer,
        ..
    } = h;
    drop(orchestrator);
    assert_eq!(observer.handler_count(), 0);
}
