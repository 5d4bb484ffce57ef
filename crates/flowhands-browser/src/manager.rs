//! Browser instance manager.
//!
//! Connects to a Chrome already listening on the debug port, or launches one
//! with a persistent profile so the tool's sign-in survives restarts. Then
//! finds the tool tab or opens a new one.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use flowhands_config::BrowserConfig;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cdp::{CdpClient, CdpError, PageInfo, PageSession};

const LAUNCH_POLL: Duration = Duration::from_millis(200);
const LAUNCH_ATTEMPTS: u32 = 30;

/// Browser manager errors.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser not connected")]
    NotConnected,

    #[error("Chrome not found. Please install Google Chrome.")]
    ChromeNotFound,

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error(transparent)]
    Cdp(#[from] CdpError),
}

/// Manages the browser connection and the tool tab.
pub struct BrowserManager {
    config: BrowserConfig,
    client: RwLock<Option<Arc<CdpClient>>>,
    /// Chrome process handle (if we launched it).
    chrome_process: RwLock<Option<Child>>,
}

impl BrowserManager {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            chrome_process: RwLock::new(None),
        }
    }

    /// Profile directory, `~/.flowhands/browser-profile` unless configured.
    pub fn profile_dir(&self) -> PathBuf {
        self.config.profile_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".flowhands")
                .join("browser-profile")
        })
    }

    /// Find Chrome executable path.
    pub fn find_chrome() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        let paths: &[&str] = &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];

        #[cfg(target_os = "linux")]
        let paths: &[&str] = &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ];

        #[cfg(target_os = "windows")]
        let paths: &[&str] = &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let paths: &[&str] = &[];

        paths.iter().map(PathBuf::from).find(|p| p.exists())
    }

    async fn is_chrome_running(&self) -> bool {
        reqwest::get(format!("{}/json/version", self.config.endpoint()))
            .await
            .is_ok()
    }

    async fn launch_chrome(&self) -> Result<Child, BrowserError> {
        let chrome_path = Self::find_chrome().ok_or(BrowserError::ChromeNotFound)?;
        let profile_dir = self.profile_dir();

        if let Err(e) = std::fs::create_dir_all(&profile_dir) {
            warn!("Failed to create profile directory: {}", e);
        }

        info!("Launching Chrome with profile at: {}", profile_dir.display());

        let mut cmd = Command::new(&chrome_path);
        cmd.arg(format!("--remote-debugging-port={}", self.config.debug_port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if self.config.headless {
            cmd.arg("--headless=new");
        }

        let child = cmd
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!("Chrome launched with PID: {:?}", child.id());
        Ok(child)
    }

    /// Connect to the browser, launching it if necessary.
    pub async fn connect(&self) -> Result<Arc<CdpClient>, BrowserError> {
        if let Some(client) = self.client.read().await.clone() {
            return Ok(client);
        }

        if !self.is_chrome_running().await {
            info!("Chrome not running on port {}, launching...", self.config.debug_port);
            let child = self.launch_chrome().await?;
            *self.chrome_process.write().await = Some(child);

            let mut started = false;
            for _ in 0..LAUNCH_ATTEMPTS {
                tokio::time::sleep(LAUNCH_POLL).await;
                if self.is_chrome_running().await {
                    started = true;
                    break;
                }
            }
            if !started {
                return Err(BrowserError::LaunchFailed(
                    "Chrome failed to start within timeout".to_string(),
                ));
            }
        } else {
            info!("Chrome already running on port {}", self.config.debug_port);
        }

        let client = Arc::new(CdpClient::connect(&self.config.endpoint()).await?);
        *self.client.write().await = Some(client.clone());
        info!("Connected to Chrome at {}", self.config.endpoint());
        Ok(client)
    }

    /// Attach to the open tool tab, or open one on the configured home page.
    pub async fn open_flow_page(&self) -> Result<Arc<PageSession>, BrowserError> {
        let client = self.connect().await?;
        let pages = client.list_pages().await?;

        let session = match find_tab(&pages, &self.config.tab_marker) {
            Some(page) => {
                info!(url = %page.url, "attaching to open tool tab");
                let session = client.attach_page(&page.id).await?;
                session.bring_to_front().await?;
                session
            }
            None => {
                info!(url = %self.config.flow_url, "no tool tab open, opening one");
                let session = client.new_page(&self.config.flow_url).await?;
                session.wait_for_load().await?;
                session
            }
        };
        debug!(target = session.target_id(), "tool tab ready");
        Ok(Arc::new(session))
    }

    /// Drop the connection.
    pub async fn close(&self) {
        let _ = self.client.write().await.take();
        info!("Browser connection closed");
    }

    /// Close the connection and stop Chrome if we launched it.
    pub async fn shutdown(&self) {
        self.close().await;
        if let Some(mut child) = self.chrome_process.write().await.take() {
            info!("Shutting down Chrome...");
            let _ = child.kill().await;
        }
    }
}

/// First page whose URL contains `marker`.
fn find_tab<'a>(pages: &'a [PageInfo], marker: &str) -> Option<&'a PageInfo> {
    pages.iter().find(|p| p.is_page() && p.url.contains(marker))
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
