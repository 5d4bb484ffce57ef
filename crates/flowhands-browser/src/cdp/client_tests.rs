use super::*;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT_URL: &str = "https://labs.google/fx/tools/flow/project/p-1";

/// Answers one CDP command; `None` closes the socket instead.
fn scripted_reply(req: &Value) -> Option<Value> {
    let result = match req["method"].as_str().unwrap_or("") {
        "Target.attachToTarget" => json!({"sessionId": "S1"}),
        "Runtime.evaluate" => {
            if req["sessionId"] != "S1" {
                return Some(json!({"error": {"code": -32001, "message": "Session not found"}}));
            }
            match req["params"]["expression"].as_str().unwrap_or("") {
                "document.readyState" => json!({"result": {"type": "string", "value": "complete"}}),
                "window.location.href" => json!({"result": {"type": "string", "value": PROJECT_URL}}),
                "boom()" => json!({
                    "result": {"type": "object"},
                    "exceptionDetails": {
                        "text": "Uncaught",
                        "exception": {"type": "object", "description": "ReferenceError: boom is not defined"}
                    }
                }),
                _ => json!({"result": {"type": "number", "value": 2}}),
            }
        }
        "Page.navigate" => {
            if req["params"]["url"].as_str().unwrap_or("").contains("invalid") {
                json!({"frameId": "F1", "errorText": "net::ERR_NAME_NOT_RESOLVED"})
            } else {
                json!({"frameId": "F1"})
            }
        }
        "Target.closeTarget" => {
            return Some(json!({"error": {"code": -32602, "message": "No target with given id found"}}));
        }
        "Browser.close" => return None,
        _ => json!({}),
    };
    Some(json!({"result": result}))
}

async fn fake_browser() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let req: Value = serde_json::from_str(&text).unwrap();
            match scripted_reply(&req) {
                Some(mut reply) => {
                    reply["id"] = req["id"].clone();
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = ws.close(None).await;
                    break;
                }
            }
        }
    });
    format!("ws://{}/devtools/browser/test", addr)
}

async fn discovery(ws_url: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Browser": "Chrome/131.0.6778.86",
            "Protocol-Version": "1.3",
            "webSocketDebuggerUrl": ws_url
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "T1", "type": "page", "title": "Flow", "url": PROJECT_URL},
            {"id": "W1", "type": "service_worker", "title": "sw", "url": "https://labs.google/sw.js"}
        ])))
        .mount(&server)
        .await;
    server
}

async fn connected() -> (MockServer, CdpClient) {
    let ws_url = fake_browser().await;
    let server = discovery(&ws_url).await;
    let client = CdpClient::connect(&format!("{}/", server.uri())).await.unwrap();
    assert_eq!(client.browser_ws_url(), ws_url);
    (server, client)
}

#[tokio::test]
async fn test_attach_and_evaluate() {
    let (_server, client) = connected().await;
    let page = client.attach_page("T1").await.unwrap();
    assert_eq!(page.target_id(), "T1");
    assert_eq!(page.session_id(), "S1");
    assert_eq!(page.evaluate("1 + 1").await.unwrap(), json!(2));
    assert_eq!(page.get_url().await.unwrap(), PROJECT_URL);
}

#[tokio::test]
async fn test_evaluate_exception() {
    let (_server, client) = connected().await;
    let page = client.attach_page("T1").await.unwrap();
    let err = page.evaluate("boom()").await.unwrap_err();
    assert!(matches!(err, CdpError::JavaScript(ref m) if m == "ReferenceError: boom is not defined"));
}

#[tokio::test]
async fn test_navigate() {
    let (_server, client) = connected().await;
    let page = client.attach_page("T1").await.unwrap();
    page.navigate("https://labs.google/fx/tools/flow/").await.unwrap();
    let err = page.navigate("https://invalid.example/").await.unwrap_err();
    assert!(matches!(err, CdpError::NavigationFailed(ref m) if m.contains("ERR_NAME_NOT_RESOLVED")));
}

#[tokio::test]
async fn test_protocol_error() {
    let (_server, client) = connected().await;
    let err = client.close_page("missing").await.unwrap_err();
    assert!(matches!(err, CdpError::Protocol { code: -32602, .. }));
}

#[tokio::test]
async fn test_closed_socket_fails_pending_call() {
    let (_server, client) = connected().await;
    let err = client.call("Browser.close", None).await.unwrap_err();
    assert!(matches!(err, CdpError::SessionClosed));
}

#[tokio::test]
async fn test_list_pages_skips_workers() {
    let (_server, client) = connected().await;
    let pages = client.list_pages().await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].id, "T1");
}

#[tokio::test]
async fn test_connect_without_chrome() {
    let server = MockServer::start().await;
    let err = CdpClient::connect(&server.uri()).await.err().unwrap();
    assert!(matches!(err, CdpError::ChromeNotAvailable(_)));
}
