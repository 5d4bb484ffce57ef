use super::*;
use crate::cdp::CdpError;
use crate::host::scripted::ScriptedHost;
use bytes::Bytes;

fn surface(host: &Arc<ScriptedHost>) -> CdpSurface {
    CdpSurface::new(host.clone())
}

#[test]
fn test_query_script_escapes_selector() {
    let script = query_script(r#"textarea[placeholder="Describe"]"#);
    assert!(script.contains(r#"document.querySelectorAll("textarea[placeholder=\"Describe\"]")"#));
    assert!(script.contains("data-fh-id"));
}

#[tokio::test]
async fn test_query_all_returns_tagged_handles() {
    let host = Arc::new(ScriptedHost::new(|_| Ok(json!(["fh-1", "fh-2"]))));
    let handles = surface(&host).query_all("button").await.unwrap();
    assert_eq!(handles, vec![ElementHandle::new("fh-1"), ElementHandle::new("fh-2")]);
    assert!(host.last().contains(r#"querySelectorAll("button")"#));
}

#[tokio::test]
async fn test_query_all_rejects_non_array() {
    let host = Arc::new(ScriptedHost::new(|_| Ok(Value::Null)));
    let err = surface(&host).query_all("button").await.unwrap_err();
    assert!(matches!(err, SurfaceError::Backend(_)));
}

#[tokio::test]
async fn test_invalid_selector_is_script_error() {
    let host = Arc::new(ScriptedHost::new(|_| {
        Err(CdpError::JavaScript(
            "SyntaxError: '##' is not a valid selector".to_string(),
        ))
    }));
    let err = surface(&host).query_all("##").await.unwrap_err();
    assert!(matches!(err, SurfaceError::Script(_)));
}

#[tokio::test]
async fn test_stale_element() {
    let host = Arc::new(ScriptedHost::new(|_| Ok(json!({"stale": true}))));
    let err = surface(&host)
        .click(&ElementHandle::new("fh-9"))
        .await
        .unwrap_err();
    assert!(matches!(err, SurfaceError::StaleElement(ref id) if id == "fh-9"));
    assert!(host.last().contains(r#"("fh-9", null)"#));
}

#[tokio::test]
async fn test_text_and_value() {
    let host = Arc::new(ScriptedHost::new(|expr| {
        if expr.contains("textContent") {
            Ok(json!({"value": "Veo 3.1 - Fast"}))
        } else {
            Ok(json!({"value": "a prompt"}))
        }
    }));
    let s = surface(&host);
    let handle = ElementHandle::new("fh-1");
    assert_eq!(s.text_of(&handle).await.unwrap(), "Veo 3.1 - Fast");
    assert_eq!(s.read_value(&handle).await.unwrap(), "a prompt");
}

#[tokio::test]
async fn test_set_value_passes_text_as_json() {
    let host = Arc::new(ScriptedHost::new(|_| Ok(json!({"value": true}))));
    surface(&host)
        .set_value(&ElementHandle::new("fh-3"), "say \"hi\"\nthen leave")
        .await
        .unwrap();
    let script = host.last();
    assert!(script.contains(r#"("fh-3", "say \"hi\"\nthen leave")"#));
    assert!(script.contains("new Event('input'"));
}

#[tokio::test]
async fn test_set_files_encodes_bytes() {
    let host = Arc::new(ScriptedHost::new(|_| Ok(json!({"value": 1}))));
    let file = FilePayload {
        name: "frame_0.png".to_string(),
        mime_type: "image/png".to_string(),
        bytes: Bytes::from_static(b"hello"),
    };
    surface(&host)
        .set_files(&ElementHandle::new("fh-4"), &[file])
        .await
        .unwrap();
    let script = host.last();
    assert!(script.contains(r#""data":"aGVsbG8=""#));
    assert!(script.contains(r#""name":"frame_0.png""#));
    assert!(script.contains("new DataTransfer()"));
}

#[tokio::test]
async fn test_set_files_count_mismatch() {
    let host = Arc::new(ScriptedHost::new(|_| Ok(json!({"value": 0}))));
    let file = FilePayload {
        name: "frame_0.png".to_string(),
        mime_type: "image/png".to_string(),
        bytes: Bytes::from_static(b"x"),
    };
    let err = surface(&host)
        .set_files(&ElementHandle::new("fh-4"), &[file])
        .await
        .unwrap_err();
    assert!(matches!(err, SurfaceError::Backend(_)));
}

#[tokio::test]
async fn test_navigate_and_url() {
    let host = Arc::new(ScriptedHost::new(|_| {
        Ok(json!("https://labs.google/fx/tools/flow/project/p-1"))
    }));
    let s = surface(&host);
    s.navigate("https://labs.google/fx/tools/flow/").await.unwrap();
    assert_eq!(
        host.navigations.lock().as_slice(),
        ["https://labs.google/fx/tools/flow/".to_string()]
    );
    assert!(s.current_url().await.unwrap().contains("/project/"));
}

#[tokio::test]
async fn test_closed_session() {
    let host = Arc::new(ScriptedHost::new(|_| Err(CdpError::SessionClosed)));
    let err = surface(&host).dismiss().await.unwrap_err();
    assert!(matches!(err, SurfaceError::Closed));
}
