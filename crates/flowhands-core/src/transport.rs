//! The ambient network-call primitive.
//!
//! Outbound calls made on behalf of the page go through a [`TransportSlot`].
//! The slot holds the current [`Transport`] and can be swapped at runtime,
//! which is how the network observer wraps and later restores it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::Client;
use reqwest::header::{HeaderName, HeaderValue};

use crate::error::TransportError;

/// Outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Response as delivered to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Something that performs HTTP calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Swappable holder of the current transport.
pub struct TransportSlot {
    current: RwLock<Arc<dyn Transport>>,
}

impl TransportSlot {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            current: RwLock::new(transport),
        }
    }

    pub fn current(&self) -> Arc<dyn Transport> {
        self.current.read().clone()
    }

    /// Install `transport`, returning the one it replaced.
    pub fn replace(&self, transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
        std::mem::replace(&mut *self.current.write(), transport)
    }
}

#[async_trait]
impl Transport for TransportSlot {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        // Clone out so the lock is not held across the call.
        let transport = self.current();
        transport.send(request).await
    }
}

/// Transport over a plain `reqwest` client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let mut req = self.client.request(method, &request.url);

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Request(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Request(e.to_string()))?;
            req = req.header(name, value);
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
