//! Proof-of-humanity tokens from the reCAPTCHA Enterprise widget loaded by
//! the tool page.

use std::sync::Arc;

use async_trait::async_trait;
use flowhands_core::FlowError;
use flowhands_core::upstream::ProofOfHumanity;
use serde_json::Value;
use tracing::debug;

use crate::host::ScriptHost;

const EXECUTE: &str = r#"(async (siteKey, action) => {
  const g = window.grecaptcha && window.grecaptcha.enterprise;
  if (!g) throw new Error('grecaptcha.enterprise is not loaded');
  await new Promise((resolve) => g.ready(resolve));
  return await g.execute(siteKey, { action });
})"#;

pub struct PageRecaptcha {
    host: Arc<dyn ScriptHost>,
}

impl PageRecaptcha {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl ProofOfHumanity for PageRecaptcha {
    async fn token(&self, site_key: &str, action: &str) -> Result<String, FlowError> {
        let script = format!(
            "{}({}, {})",
            EXECUTE,
            Value::from(site_key),
            Value::from(action)
        );
        let token = self
            .host
            .evaluate(&script)
            .await
            .map_err(|e| FlowError::ProofOfHumanity(e.to_string()))?;
        match token.as_str() {
            Some(t) if !t.is_empty() => {
                debug!(action, "proof-of-humanity token obtained");
                Ok(t.to_string())
            }
            _ => Err(FlowError::ProofOfHumanity("empty token".to_string())),
        }
    }
}
