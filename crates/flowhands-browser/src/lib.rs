//! Chrome backend for flowhands.
//!
//! Drives the Flow tool tab of a real Chrome over the DevTools Protocol (CDP)
//! and adapts it to the core's capability traits.
//!
//! ```text
//! ┌─────────────────┐    WebSocket     ┌──────────────────┐
//! │ flowhands-core  │ ◄──────────────► │   Chrome/Edge    │
//! │  (this crate)   │       CDP        │  (user's browser)│
//! └─────────────────┘                  └──────────────────┘
//! ```
//!
//! Start Chrome with remote debugging enabled, signed in to the tool, or let
//! [`BrowserManager`] launch it with a persistent profile:
//!
//! ```bash
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! ## Adapters
//!
//! - [`CdpSurface`] - `PageSurface` through injected scripts
//! - [`PageFetchHook`] - `NetworkTap` wrapping the page's `fetch`
//! - [`PageTransport`] - `Transport` using the page's `fetch` and cookies
//! - [`PageRecaptcha`] - `ProofOfHumanity` from the page's reCAPTCHA widget

pub mod cdp;
mod fetch_hook;
pub mod host;
mod manager;
mod recaptcha;
mod surface;
mod tab;
mod transport;

pub use cdp::{CdpClient, CdpError, PageSession};
pub use fetch_hook::PageFetchHook;
pub use host::ScriptHost;
pub use manager::{BrowserError, BrowserManager};
pub use recaptcha::PageRecaptcha;
pub use surface::CdpSurface;
pub use tab::FlowTab;
pub use transport::PageTransport;
