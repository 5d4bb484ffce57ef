//! Network observation and upstream API configuration.

use serde::{Deserialize, Serialize};

/// Network observer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// URL substring identifying asset upload calls.
    pub upload_marker: String,
    /// URL substring identifying generation status calls.
    pub status_marker: String,
    /// Maximum number of response characters kept in the exchange log.
    pub body_prefix_limit: usize,
    /// Number of exchanges retained in the log.
    pub log_capacity: usize,
    /// How often the in-page hook is drained.
    pub pump_interval_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            upload_marker: "uploadUserImage".to_string(),
            status_marker: "batchCheckAsyncVideoGenerationStatus".to_string(),
            body_prefix_limit: 2000,
            log_capacity: 200,
            pump_interval_ms: 250,
        }
    }
}

/// Upstream generation API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Session endpoint returning the bearer token.
    pub session_url: String,
    /// Text-to-video generation endpoint.
    pub generate_url: String,
    /// Operation status endpoint.
    pub status_url: String,
    /// Challenge widget site key.
    pub site_key: String,
    /// Challenge action name.
    pub recaptcha_action: String,
    /// Challenge application type reported in the envelope.
    pub recaptcha_application_type: String,
    /// Tool identifier reported in the envelope.
    pub tool: String,
    /// Paygate tier reported in the envelope.
    pub paygate_tier: String,
    /// Cookie header for out-of-browser transports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            session_url: "https://labs.google/fx/api/auth/session".to_string(),
            generate_url: "https://aisandbox-pa.googleapis.com/v1/video:batchAsyncGenerateVideoText"
                .to_string(),
            status_url:
                "https://aisandbox-pa.googleapis.com/v1/video:batchCheckAsyncVideoGenerationStatus"
                    .to_string(),
            site_key: "6LdsFiUsAAAAAIjVDZcuLhaHiDn5nnHVXVRQGeMV".to_string(),
            recaptcha_action: "FLOW_GENERATION".to_string(),
            recaptcha_application_type: "RECAPTCHA_APPLICATION_TYPE_WEB".to_string(),
            tool: "PINHOLE".to_string(),
            paygate_tier: "PAYGATE_TIER_TWO".to_string(),
            cookie: None,
        }
    }
}
