//! In-page `fetch` and `XMLHttpRequest` hook feeding a [`NetworkObserver`].
//!
//! The hook queues every exchange inside the page, keeping the full body only
//! for marker matches and the logged prefix for the rest. A pump task drains
//! the queue on an interval and records each entry with the observer. A page
//! navigation discards the hook, so the pump reinstalls it when it finds it
//! missing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use flowhands_config::ObserverConfig;
use flowhands_core::{NetworkObserver, NetworkTap, ObservedCall, SurfaceError};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cdp::CdpError;
use crate::host::ScriptHost;

const HOOK: &str = include_str!("fetch_hook.js");
const DRAIN: &str = "window.__fhHook ? window.__fhHook.drain() : null";
const RESTORE: &str = "window.__fhHook ? (window.__fhHook.restore(), true) : false";

struct Pump {
    task: JoinHandle<()>,
    observer: Arc<NetworkObserver>,
}

/// [`NetworkTap`] that wraps the page's `fetch` and XHR.
pub struct PageFetchHook {
    host: Arc<dyn ScriptHost>,
    install_script: String,
    interval: Duration,
    pump: Mutex<Option<Pump>>,
}

impl PageFetchHook {
    /// Hook capturing every call; bodies of calls matching an observer
    /// marker are kept whole.
    pub fn new(host: Arc<dyn ScriptHost>, config: &ObserverConfig) -> Self {
        let markers = vec![config.upload_marker.clone(), config.status_marker.clone()];
        Self {
            host,
            install_script: install_script(&markers, config.body_prefix_limit),
            interval: Duration::from_millis(config.pump_interval_ms.max(1)),
            pump: Mutex::new(None),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.pump.lock().is_some()
    }

    fn stop_pump(&self) -> Option<Arc<NetworkObserver>> {
        self.pump.lock().take().map(|pump| {
            pump.task.abort();
            pump.observer
        })
    }
}

fn install_script(markers: &[String], prefix_limit: usize) -> String {
    let markers = Value::from(markers.to_vec());
    format!("({})({}, {})", HOOK.trim_end(), markers, prefix_limit)
}

/// Move queued exchanges from the page into `observer`. Returns `false`
/// when the hook is no longer present.
async fn drain(host: &dyn ScriptHost, observer: &NetworkObserver) -> Result<bool, CdpError> {
    let drained = host.evaluate(DRAIN).await?;
    let Some(entries) = drained.as_array() else {
        return Ok(false);
    };
    for entry in entries {
        match captured_call(entry) {
            Some(call) => observer.record(call),
            None => trace!(entry = %entry, "unreadable capture skipped"),
        }
    }
    Ok(true)
}

fn captured_call(entry: &Value) -> Option<ObservedCall> {
    let url = entry.get("url")?.as_str()?.to_string();
    let request_headers = entry
        .get("requestHeaders")
        .and_then(Value::as_array)
        .map(|pairs| {
            pairs
                .iter()
                .filter_map(|pair| {
                    let name = pair.get(0)?.as_str()?;
                    let value = pair.get(1)?.as_str()?;
                    Some((name.to_string(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();
    Some(ObservedCall {
        url,
        method: entry
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_string(),
        request_headers,
        request_body: entry
            .get("requestBody")
            .and_then(Value::as_str)
            .map(str::to_string),
        status: entry
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok()),
        response_body: Bytes::from(
            entry
                .get("body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
    })
}

async fn run_pump(
    host: Arc<dyn ScriptHost>,
    observer: Arc<NetworkObserver>,
    install_script: String,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;
        match drain(host.as_ref(), &observer).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("fetch hook missing after navigation, reinstalling");
                if let Err(e) = host.evaluate(&install_script).await {
                    warn!(error = %e, "fetch hook reinstall failed");
                }
            }
            Err(CdpError::SessionClosed) => {
                warn!("page session closed, fetch hook pump stopped");
                break;
            }
            Err(e) => warn!(error = %e, "fetch hook drain failed"),
        }
    }
}

#[async_trait]
impl NetworkTap for PageFetchHook {
    async fn install(&self, observer: Arc<NetworkObserver>) -> Result<(), SurfaceError> {
        // Re-installing replaces the running pump rather than adding one.
        self.stop_pump();
        let outcome = self.host.evaluate(&self.install_script).await?;
        debug!(outcome = %outcome, "fetch hook installed");

        let task = tokio::spawn(run_pump(
            self.host.clone(),
            observer.clone(),
            self.install_script.clone(),
            self.interval,
        ));
        *self.pump.lock() = Some(Pump { task, observer });
        Ok(())
    }

    async fn uninstall(&self) -> Result<(), SurfaceError> {
        let Some(observer) = self.stop_pump() else {
            return Ok(());
        };
        if let Err(e) = drain(self.host.as_ref(), &observer).await {
            debug!(error = %e, "final drain failed");
        }
        self.host.evaluate(RESTORE).await?;
        debug!("fetch hook removed");
        Ok(())
    }
}

impl Drop for PageFetchHook {
    fn drop(&mut self) {
        self.stop_pump();
    }
}

#[cfg(test)]
#[path = "fetch_hook_tests.rs"]
mod tests;
