//! Read-only observation of outbound network calls.
//!
//! [`NetworkObserver`] keeps a bounded log of every call it is shown and
//! dispatches the parsed JSON response of calls whose URL contains a
//! registered marker. Calls reach it either through [`ObservingTransport`]
//! (in-process) or through a page-level hook that forwards what it saw via
//! [`NetworkObserver::record`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flowhands_config::ObserverConfig;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{SurfaceError, TransportError};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportSlot};

/// Callback for responses of interest.
pub type ResponseHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registration handle returned by [`NetworkObserver::on_url_containing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A call as seen by whoever intercepted it.
#[derive(Debug, Clone, Default)]
pub struct ObservedCall {
    pub url: String,
    pub method: String,
    pub request_headers: Vec<(String, String)>,
    pub request_body: Option<String>,
    /// `None` when the call failed before a response arrived.
    pub status: Option<u16>,
    pub response_body: Bytes,
}

/// Log entry for one observed call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedExchange {
    pub url: String,
    pub method: String,
    pub request_headers: Vec<(String, String)>,
    pub request_body: Option<String>,
    pub status: Option<u16>,
    pub response_prefix: String,
    pub captured_at: DateTime<Utc>,
}

struct Registration {
    id: HandlerId,
    marker: String,
    handler: ResponseHandler,
}

/// Shared observer. Safe to call from any task at any time.
pub struct NetworkObserver {
    prefix_limit: usize,
    capacity: usize,
    handlers: RwLock<Vec<Registration>>,
    log: Mutex<VecDeque<CapturedExchange>>,
    next_id: AtomicU64,
}

impl NetworkObserver {
    pub fn new(config: &ObserverConfig) -> Self {
        Self {
            prefix_limit: config.body_prefix_limit,
            capacity: config.log_capacity.max(1),
            handlers: RwLock::new(Vec::new()),
            log: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Call `handler` with the parsed JSON body of every response whose URL
    /// contains `marker`. Non-JSON bodies are skipped.
    pub fn on_url_containing(
        &self,
        marker: impl Into<String>,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let marker = marker.into();
        debug!(marker = %marker, handler = id.0, "response handler registered");
        self.handlers.write().push(Registration {
            id,
            marker,
            handler: Arc::new(handler),
        });
        id
    }

    pub fn remove_handler(&self, id: HandlerId) {
        self.handlers.write().retain(|r| r.id != id);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Log a call and dispatch it to matching handlers.
    ///
    /// Never fails: undecodable bodies are logged lossily. The exchange is
    /// logged before dispatch. Handlers must not panic; release builds abort.
    pub fn record(&self, call: ObservedCall) {
        let exchange = CapturedExchange {
            response_prefix: prefix(&call.response_body, self.prefix_limit),
            url: call.url,
            method: call.method,
            request_headers: call.request_headers,
            request_body: call.request_body,
            status: call.status,
            captured_at: Utc::now(),
        };
        trace!(url = %exchange.url, status = ?exchange.status, "exchange captured");

        let url = exchange.url.clone();
        {
            let mut log = self.log.lock();
            if log.len() == self.capacity {
                log.pop_front();
            }
            log.push_back(exchange);
        }

        let matching: Vec<ResponseHandler> = self
            .handlers
            .read()
            .iter()
            .filter(|r| url.contains(r.marker.as_str()))
            .map(|r| r.handler.clone())
            .collect();

        if matching.is_empty() {
            return;
        }
        match serde_json::from_slice::<Value>(&call.response_body) {
            Ok(body) => {
                for handler in matching {
                    handler(&body);
                }
            }
            Err(e) => {
                debug!(url = %url, error = %e, "matched response is not JSON, skipped");
            }
        }
    }

    /// Most recent exchanges, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<CapturedExchange> {
        let log = self.log.lock();
        let skip = log.len().saturating_sub(limit);
        log.iter().skip(skip).cloned().collect()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Wrap the transport currently in `slot`. Dropping the guard (or
    /// calling [`ObserverGuard::uninstall`]) puts the original back.
    pub fn install(self: &Arc<Self>, slot: &Arc<TransportSlot>) -> ObserverGuard {
        let original = slot.current();
        let wrapper = Arc::new(ObservingTransport {
            inner: original.clone(),
            observer: self.clone(),
        });
        slot.replace(wrapper);
        debug!("network observer installed");
        ObserverGuard {
            slot: slot.clone(),
            original: Some(original),
        }
    }
}

fn prefix(body: &[u8], limit: usize) -> String {
    String::from_utf8_lossy(body).chars().take(limit).collect()
}

/// Pass-through transport that shows every call to an observer.
pub struct ObservingTransport {
    inner: Arc<dyn Transport>,
    observer: Arc<NetworkObserver>,
}

#[async_trait]
impl Transport for ObservingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut call = ObservedCall {
            url: request.url.clone(),
            method: request.method.clone(),
            request_headers: request.headers.clone(),
            request_body: request
                .body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            ..Default::default()
        };

        let result = self.inner.send(request).await;
        if let Ok(response) = &result {
            call.status = Some(response.status);
            // Bytes clones share the buffer; the caller's copy is untouched.
            call.response_body = response.body.clone();
        }
        self.observer.record(call);
        result
    }
}

/// Restores the wrapped transport when dropped.
pub struct ObserverGuard {
    slot: Arc<TransportSlot>,
    original: Option<Arc<dyn Transport>>,
}

impl ObserverGuard {
    pub fn uninstall(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(original) = self.original.take() {
            self.slot.replace(original);
            debug!("network observer uninstalled");
        }
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Installs an observer on some network primitive for the duration of a
/// request.
#[async_trait]
pub trait NetworkTap: Send + Sync {
    async fn install(&self, observer: Arc<NetworkObserver>) -> Result<(), SurfaceError>;

    /// Must be safe to call when nothing is installed.
    async fn uninstall(&self) -> Result<(), SurfaceError>;
}

/// [`NetworkTap`] over an in-process [`TransportSlot`].
pub struct SlotTap {
    slot: Arc<TransportSlot>,
    guard: Mutex<Option<ObserverGuard>>,
}

impl SlotTap {
    pub fn new(slot: Arc<TransportSlot>) -> Self {
        Self {
            slot,
            guard: Mutex::new(None),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.guard.lock().is_some()
    }
}

#[async_trait]
impl NetworkTap for SlotTap {
    async fn install(&self, observer: Arc<NetworkObserver>) -> Result<(), SurfaceError> {
        let mut guard = self.guard.lock();
        // Re-installing replaces the previous wrapper rather than stacking.
        if let Some(previous) = guard.take() {
            previous.uninstall();
        }
        *guard = Some(observer.install(&self.slot));
        Ok(())
    }

    async fn uninstall(&self) -> Result<(), SurfaceError> {
        if let Some(guard) = self.guard.lock().take() {
            guard.uninstall();
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
