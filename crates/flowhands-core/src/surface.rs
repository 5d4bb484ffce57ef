//! Capability interface over a foreign page.
//!
//! The core never talks to a browser directly. Everything it does to the
//! tool's UI goes through [`PageSurface`], which a backend implements against
//! whatever automation channel it has (CDP, an embedded engine, a test fake).

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SurfaceError;

/// Opaque reference to an element on the page.
///
/// Handles are only meaningful to the surface that produced them and may go
/// stale when the page re-renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File handed to a file input.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePayload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Operations the automation core needs from a page.
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// All elements currently matching a CSS selector, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, SurfaceError>;

    /// Visible text content of an element.
    async fn text_of(&self, element: &ElementHandle) -> Result<String, SurfaceError>;

    /// Inner markup of an element.
    async fn markup_of(&self, element: &ElementHandle) -> Result<String, SurfaceError>;

    /// Scroll the element into view and click it.
    async fn click(&self, element: &ElementHandle) -> Result<(), SurfaceError>;

    /// Replace the value of a text input and notify the page's listeners.
    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), SurfaceError>;

    /// Current value of a text input.
    async fn read_value(&self, element: &ElementHandle) -> Result<String, SurfaceError>;

    /// Assign files to a file input and dispatch `change` and `input`.
    async fn set_files(
        &self,
        element: &ElementHandle,
        files: &[FilePayload],
    ) -> Result<(), SurfaceError>;

    /// Click on an empty area to close any open popover.
    async fn dismiss(&self) -> Result<(), SurfaceError>;

    /// URL of the current document.
    async fn current_url(&self) -> Result<String, SurfaceError>;

    /// Navigate the page.
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;
}
