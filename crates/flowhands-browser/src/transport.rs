//! [`Transport`] that performs calls with the page's own `fetch`, so they
//! carry the tab's cookies and origin.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use flowhands_core::{HttpRequest, HttpResponse, Transport, TransportError};
use serde_json::{Value, json};
use tracing::debug;

use crate::host::ScriptHost;

const FETCH: &str = r#"(async (req) => {
  const init = { method: req.method, headers: req.headers, credentials: 'include' };
  if (req.body !== null) init.body = req.body;
  const resp = await fetch(req.url, init);
  return {
    status: resp.status,
    headers: Array.from(resp.headers.entries()),
    body: await resp.text(),
  };
})"#;

pub struct PageTransport {
    host: Arc<dyn ScriptHost>,
}

impl PageTransport {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host }
    }
}

fn fetch_script(request: &HttpRequest) -> String {
    let headers: serde_json::Map<String, Value> = request
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let req = json!({
        "method": request.method,
        "url": request.url,
        "headers": headers,
        "body": request.body.as_ref().map(|b| String::from_utf8_lossy(b).into_owned()),
    });
    format!("{}({})", FETCH, req)
}

fn parse_response(value: &Value) -> Result<HttpResponse, TransportError> {
    let status = value
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())
        .ok_or_else(|| TransportError::InvalidResponse(format!("no status in {}", value)))?;
    let headers = value
        .get("headers")
        .and_then(Value::as_array)
        .map(|pairs| {
            pairs
                .iter()
                .filter_map(|p| Some((p.get(0)?.as_str()?.to_string(), p.get(1)?.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default();
    let body = value.get("body").and_then(Value::as_str).unwrap_or_default();
    Ok(HttpResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
    })
}

#[async_trait]
impl Transport for PageTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "in-page fetch");
        let value = self
            .host
            .evaluate(&fetch_script(&request))
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        parse_response(&value)
    }
}
