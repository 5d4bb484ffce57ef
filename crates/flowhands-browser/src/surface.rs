//! [`PageSurface`] over a CDP page.
//!
//! Elements are tagged with a `data-fh-id` attribute the first time a query
//! returns them; handles carry that id. A handle whose element has left the
//! document reports [`SurfaceError::StaleElement`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flowhands_core::{ElementHandle, FilePayload, PageSurface, SurfaceError};
use serde_json::{Value, json};
use tracing::trace;

use crate::host::ScriptHost;

const CLICK: &str = r#"el.scrollIntoView({ block: 'center', inline: 'center' });
  el.click();
  return { value: true };"#;

const TEXT: &str = "return { value: el.textContent || '' };";

const MARKUP: &str = "return { value: el.innerHTML };";

const SET_VALUE: &str = r#"el.focus();
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, arg);
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return { value: true };"#;

const READ_VALUE: &str = "return { value: el.value ?? '' };";

const SET_FILES: &str = r#"const dt = new DataTransfer();
  for (const f of arg) {
    const bin = atob(f.data);
    const bytes = new Uint8Array(bin.length);
    for (let i = 0; i < bin.length; i++) bytes[i] = bin.charCodeAt(i);
    dt.items.add(new File([bytes], f.name, { type: f.type }));
  }
  el.files = dt.files;
  el.dispatchEvent(new Event('change', { bubbles: true }));
  el.dispatchEvent(new Event('input', { bubbles: true }));
  return { value: el.files.length };"#;

const DISMISS: &str = r#"(() => {
  document.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', code: 'Escape', bubbles: true }));
  document.body.click();
  return true;
})()"#;

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn query_script(selector: &str) -> String {
    format!(
        r#"(() => {{
  window.__fhSeq = window.__fhSeq || 0;
  return Array.from(document.querySelectorAll({selector})).map((el) => {{
    if (!el.hasAttribute('data-fh-id')) {{
      window.__fhSeq += 1;
      el.setAttribute('data-fh-id', 'fh-' + window.__fhSeq);
    }}
    return el.getAttribute('data-fh-id');
  }});
}})()"#,
        selector = js_string(selector)
    )
}

fn element_script(element: &ElementHandle, body: &str, arg: &Value) -> String {
    format!(
        r#"((id, arg) => {{
  const el = document.querySelector('[data-fh-id="' + id + '"]');
  if (!el || !el.isConnected) return {{ stale: true }};
  {body}
}})({id}, {arg})"#,
        id = js_string(element.id()),
    )
}

/// CDP-backed page surface.
pub struct CdpSurface {
    host: Arc<dyn ScriptHost>,
}

impl CdpSurface {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host }
    }

    async fn on_element(&self, element: &ElementHandle, body: &str, arg: Value) -> Result<Value, SurfaceError> {
        let result = self
            .host
            .evaluate(&element_script(element, body, &arg))
            .await?;
        if result.get("stale").and_then(Value::as_bool) == Some(true) {
            return Err(SurfaceError::StaleElement(element.id().to_string()));
        }
        Ok(result.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn string_of(&self, element: &ElementHandle, body: &str) -> Result<String, SurfaceError> {
        let value = self.on_element(element, body, Value::Null).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl PageSurface for CdpSurface {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, SurfaceError> {
        let result = self.host.evaluate(&query_script(selector)).await?;
        let ids = result
            .as_array()
            .ok_or_else(|| SurfaceError::Backend(format!("query returned {}", result)))?;
        let handles: Vec<ElementHandle> = ids
            .iter()
            .filter_map(Value::as_str)
            .map(ElementHandle::new)
            .collect();
        trace!(selector, count = handles.len(), "query");
        Ok(handles)
    }

    async fn text_of(&self, element: &ElementHandle) -> Result<String, SurfaceError> {
        self.string_of(element, TEXT).await
    }

    async fn markup_of(&self, element: &ElementHandle) -> Result<String, SurfaceError> {
        self.string_of(element, MARKUP).await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), SurfaceError> {
        self.on_element(element, CLICK, Value::Null).await?;
        Ok(())
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), SurfaceError> {
        self.on_element(element, SET_VALUE, json!(value)).await?;
        Ok(())
    }

    async fn read_value(&self, element: &ElementHandle) -> Result<String, SurfaceError> {
        self.string_of(element, READ_VALUE).await
    }

    async fn set_files(
        &self,
        element: &ElementHandle,
        files: &[FilePayload],
    ) -> Result<(), SurfaceError> {
        let payload: Vec<Value> = files
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "type": f.mime_type,
                    "data": STANDARD.encode(&f.bytes),
                })
            })
            .collect();
        let assigned = self.on_element(element, SET_FILES, Value::Array(payload)).await?;
        if assigned.as_u64() != Some(files.len() as u64) {
            return Err(SurfaceError::Backend(format!(
                "file input accepted {} of {} files",
                assigned,
                files.len()
            )));
        }
        Ok(())
    }

    async fn dismiss(&self) -> Result<(), SurfaceError> {
        self.host.evaluate(DISMISS).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SurfaceError> {
        let url = self.host.evaluate("window.location.href").await?;
        Ok(url.as_str().unwrap_or_default().to_string())
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.host.navigate(url).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;
