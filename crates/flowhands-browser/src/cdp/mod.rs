//! Chrome DevTools Protocol (CDP) client.
//!
//! Connects to Chrome over its debugging WebSocket and speaks the CDP
//! JSON-RPC protocol. Page sessions are attached in flatten mode and share
//! the browser socket.
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://localhost:9222").await?;
//! let page = client.new_page("https://labs.google/fx/tools/flow/").await?;
//! let title = page.evaluate("document.title").await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;
