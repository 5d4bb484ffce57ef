//! Wiring between the browser backend and the orchestration core.

use std::sync::Arc;

use tracing::info;

use flowhands_browser::{BrowserError, BrowserManager, FlowTab};
use flowhands_config::Config;
use flowhands_core::{GenerationOrchestrator, NetworkObserver, RequestRouter, UpstreamClient};

/// The attached tool tab and the command router driving it.
pub(crate) struct FlowApp {
    manager: BrowserManager,
    tab: FlowTab,
    router: Arc<RequestRouter>,
}

impl FlowApp {
    /// Connect to Chrome (launching it if needed) and bind to the tool tab.
    pub(crate) async fn attach(config: &Config) -> Result<Self, BrowserError> {
        let manager = BrowserManager::new(config.browser.clone());
        let session = manager.open_flow_page().await?;
        let tab = FlowTab::new(session, &config.observer);
        info!(target_id = tab.session.target_id(), "tool tab attached");

        let observer = Arc::new(NetworkObserver::new(&config.observer));
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            tab.surface.clone(),
            tab.tap.clone(),
            observer,
            config,
        ));
        let router = Arc::new(RequestRouter::new(orchestrator, config.timing.router_timeout()));

        Ok(Self {
            manager,
            tab,
            router,
        })
    }

    pub(crate) fn router(&self) -> Arc<RequestRouter> {
        self.router.clone()
    }

    /// API client that authenticates through the tab's cookies and widget.
    pub(crate) fn upstream(&self, config: &Config) -> UpstreamClient {
        UpstreamClient::new(
            self.tab.transport.clone(),
            self.tab.recaptcha.clone(),
            config.upstream.clone(),
        )
    }

    pub(crate) async fn shutdown(self) {
        self.manager.shutdown().await;
    }
}
