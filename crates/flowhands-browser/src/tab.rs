//! The adapters the core needs, bound to one tool tab.

use std::sync::Arc;

use flowhands_config::ObserverConfig;

use crate::cdp::PageSession;
use crate::fetch_hook::PageFetchHook;
use crate::host::ScriptHost;
use crate::recaptcha::PageRecaptcha;
use crate::surface::CdpSurface;
use crate::transport::PageTransport;

pub struct FlowTab {
    pub session: Arc<PageSession>,
    pub surface: Arc<CdpSurface>,
    pub tap: Arc<PageFetchHook>,
    pub transport: Arc<PageTransport>,
    pub recaptcha: Arc<PageRecaptcha>,
}

impl FlowTab {
    pub fn new(session: Arc<PageSession>, observer: &ObserverConfig) -> Self {
        let host: Arc<dyn ScriptHost> = session.clone();
        Self {
            surface: Arc::new(CdpSurface::new(host.clone())),
            tap: Arc::new(PageFetchHook::new(host.clone(), observer)),
            transport: Arc::new(PageTransport::new(host.clone())),
            recaptcha: Arc::new(PageRecaptcha::new(host)),
            session,
        }
    }
}
