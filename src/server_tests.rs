use super::*;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use flowhands_config::TimingConfig;
use flowhands_core::testing::{Effect, FakePage, flow_page};
use flowhands_core::{
    GenerationOrchestrator, HttpRequest, HttpResponse, NetworkObserver, ObservedCall, SlotTap,
    Transport, TransportError, TransportSlot,
};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

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
    router: Arc<RequestRouter>,
}

fn harness() -> Harness {
    let mut config = Config::default();
    config.timing = TimingConfig::instant();
    let page = Arc::new(flow_page());
    let observer = Arc::new(NetworkObserver::new(&config.observer));
    let tap = Arc::new(SlotTap::new(Arc::new(TransportSlot::new(Arc::new(Offline)))));
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        page.clone(),
        tap,
        observer.clone(),
        &config,
    ));
    Harness {
        page,
        observer,
        router: Arc::new(RequestRouter::new(orchestrator, Duration::from_secs(420))),
    }
}

impl Harness {
    fn app(&self) -> Router {
        create_router(self.router.clone())
    }

    fn complete_on_generate(&self, video_url: &'static str) {
        let observer = self.observer.clone();
        self.page.on_click(
            "generate",
            Effect::callback(move || {
                observer.record(ObservedCall {
                    url: "https://aisandbox-pa.googleapis.com/v1/video:batchCheckAsyncVideoGenerationStatus"
                        .to_string(),
                    status: Some(200),
                    response_body: json!({"operations": [{
                        "operation": {"name": "op-1", "metadata": {"video": {"fifeUrl": video_url}}},
                        "status": "MEDIA_GENERATION_STATUS_SUCCESSFUL"
                    }]})
                    .to_string()
                    .into(),
                    ..Default::default()
                })
            }),
        );
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let response = h.app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({"status": "ok", "busy": false}));
}

#[tokio::test]
async fn test_status_endpoint() {
    let h = harness();
    let response = h.app().oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["isGenerating"], json!(false));
    assert_eq!(body["generationCount"], json!(0));
}

#[tokio::test(start_paused = true)]
async fn test_generate_command() {
    let h = harness();
    h.complete_on_generate("https://video/r.mp4");

    let response = h
        .app()
        .oneshot(post_json(
            "/commands",
            json!({"command": "generate", "requestId": "g-1", "payload": {"prompt": "city at dusk"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["requestId"], "g-1");
    assert_eq!(body["status"], "complete");
    assert_eq!(body["videoUrl"], "https://video/r.mp4");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_is_bad_request() {
    let h = harness();
    let response = h
        .app()
        .oneshot(post_json(
            "/commands",
            json!({"command": "generate", "payload": {"prompt": "   "}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn test_unknown_command_rejected() {
    let h = harness();
    let response = h
        .app()
        .oneshot(post_json("/commands", json!({"command": "reboot"})))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test(start_paused = true)]
async fn test_async_command_and_reply() {
    let h = harness();
    h.complete_on_generate("https://video/a.mp4");

    let response = h
        .app()
        .oneshot(post_json(
            "/commands/async",
            json!({"command": "generate", "requestId": "a-1", "payload": {"prompt": "waves"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ack = body_json(response).await;
    assert_eq!(ack, json!({"requestId": "a-1", "status": "started"}));

    let mut reply = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let response = h.app().oneshot(get("/commands/a-1")).await.unwrap();
        if response.status() == StatusCode::OK {
            reply = Some(body_json(response).await);
            break;
        }
    }
    let reply = reply.expect("terminal reply");
    assert_eq!(reply["status"], "complete");
    assert_eq!(reply["videoUrl"], "https://video/a.mp4");

    // Replies are handed out once.
    let response = h.app().oneshot(get("/commands/a-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_reply_not_found() {
    let h = harness();
    let response = h.app().oneshot(get("/commands/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["requestId"], "nope");
}

#[test]
fn test_reply_status_codes() {
    let reply = |status: ReplyStatus, code: Option<&str>| {
        let mut fields = serde_json::Map::new();
        if let Some(code) = code {
            fields.insert("code".to_string(), json!(code));
        }
        CommandReply {
            request_id: "r".to_string(),
            status,
            fields,
        }
    };
    assert_eq!(reply_status_code(&reply(ReplyStatus::Complete, None)), StatusCode::OK);
    assert_eq!(reply_status_code(&reply(ReplyStatus::TestComplete, None)), StatusCode::OK);
    assert_eq!(
        reply_status_code(&reply(ReplyStatus::Error, Some("busy"))),
        StatusCode::CONFLICT
    );
    assert_eq!(
        reply_status_code(&reply(ReplyStatus::Error, Some("generation_failed"))),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        reply_status_code(&reply(ReplyStatus::Error, Some("surface_error"))),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
