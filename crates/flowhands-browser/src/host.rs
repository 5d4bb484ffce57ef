//! Script execution seam between the page adapters and CDP.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cdp::{CdpError, PageSession};

/// A page that can run JavaScript and navigate.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Evaluate an expression, awaiting promises, and return its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value, CdpError>;

    async fn navigate(&self, url: &str) -> Result<(), CdpError>;
}

#[async_trait]
impl ScriptHost for PageSession {
    async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        PageSession::evaluate(self, expression).await
    }

    async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        PageSession::navigate(self, url).await
    }
}

#[async_trait]
impl<T: ScriptHost + ?Sized> ScriptHost for Arc<T> {
    async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        (**self).evaluate(expression).await
    }

    async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        (**self).navigate(url).await
    }
}
