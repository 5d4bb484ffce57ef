//! Applies generation settings to the tool's UI.
//!
//! Order is fixed: mode dropdown, then the settings panel, then aspect
//! ratio, output count and model inside the panel, then a dismiss click.
//! Every field is best-effort. Only a missing settings panel stops the
//! sequence early.

use std::time::Duration;

use flowhands_config::{SelectorSet, SelectorsConfig, TimingConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SurfaceError;
use crate::locator::{ElementLocator, Pick};
use crate::model::GenerationRequest;
use crate::surface::{ElementHandle, PageSurface};

/// Desired settings, as option texts. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub mode: Option<String>,
    pub aspect_ratio: Option<String>,
    pub output_count: Option<u32>,
    pub model: Option<String>,
}

impl SettingsRequest {
    pub fn from_generation(request: &GenerationRequest) -> Self {
        Self {
            mode: request.effective_mode().map(|m| m.label().to_string()),
            aspect_ratio: request.aspect_ratio.map(|a| a.option_label().to_string()),
            output_count: request.output_count,
            model: request.model.map(|m| m.label().to_string()),
        }
    }

    fn has_panel_fields(&self) -> bool {
        self.aspect_ratio.is_some() || self.output_count.is_some() || self.model.is_some()
    }
}

/// What a `configure` call managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureReport {
    /// Whether the settings panel could be opened. `false` means no panel
    /// field was attempted.
    pub panel_opened: bool,
    /// Fields whose option was clicked.
    pub applied: Vec<String>,
    /// Fields that were requested but could not be applied.
    pub skipped: Vec<String>,
}

pub struct SettingsConfigurator<'a> {
    surface: &'a dyn PageSurface,
    selectors: &'a SelectorsConfig,
    timing: &'a TimingConfig,
}

impl<'a> SettingsConfigurator<'a> {
    pub fn new(
        surface: &'a dyn PageSurface,
        selectors: &'a SelectorsConfig,
        timing: &'a TimingConfig,
    ) -> Self {
        Self {
            surface,
            selectors,
            timing,
        }
    }

    fn locator(&self) -> ElementLocator<'a> {
        ElementLocator::new(self.surface)
    }

    /// Apply `settings`. Backend failures propagate; anything the page
    /// simply does not offer is recorded as skipped.
    pub async fn configure(&self, settings: &SettingsRequest) -> Result<ConfigureReport, SurfaceError> {
        let mut report = ConfigureReport::default();

        if let Some(mode) = &settings.mode {
            if self.select_mode(mode).await? {
                report.applied.push("mode".to_string());
            } else {
                report.skipped.push("mode".to_string());
            }
        }

        if !self.open_panel().await? {
            warn!("settings panel control not found, skipping panel fields");
            if settings.has_panel_fields() {
                for (field, requested) in [
                    ("aspect_ratio", settings.aspect_ratio.is_some()),
                    ("output_count", settings.output_count.is_some()),
                    ("model", settings.model.is_some()),
                ] {
                    if requested {
                        report.skipped.push(field.to_string());
                    }
                }
            }
            return Ok(report);
        }
        report.panel_opened = true;

        let output_count = settings.output_count.map(|n| n.to_string());
        let fields = [
            ("aspect_ratio", &self.selectors.aspect_ratio, settings.aspect_ratio.as_deref()),
            ("output_count", &self.selectors.output_count, output_count.as_deref()),
            ("model", &self.selectors.model, settings.model.as_deref()),
        ];
        for (field, chain, target) in fields {
            let Some(target) = target else { continue };
            if self.apply_field(field, chain, target).await? {
                report.applied.push(field.to_string());
            } else {
                report.skipped.push(field.to_string());
            }
        }

        self.surface.dismiss().await?;
        settle(self.timing.click_settle()).await;

        info!(applied = ?report.applied, skipped = ?report.skipped, "settings configured");
        Ok(report)
    }

    /// Open the mode dropdown and pick `mode`; close it again when the
    /// option is missing.
    async fn select_mode(&self, mode: &str) -> Result<bool, SurfaceError> {
        let Some(control) = self.locator().find(&self.selectors.mode, Pick::First).await? else {
            warn!(mode, "mode control not found");
            return Ok(false);
        };
        if !self.choose(&control, mode, self.timing.mode_settle()).await? {
            warn!(mode, "mode option not found");
            self.surface.dismiss().await?;
            settle(self.timing.click_settle()).await;
            return Ok(false);
        }
        debug!(mode, "mode selected");
        Ok(true)
    }

    /// Open the settings panel via the model-name button, falling back to
    /// the generic settings button.
    async fn open_panel(&self) -> Result<bool, SurfaceError> {
        let locator = self.locator();
        let control = match locator.find(&self.selectors.model_button, Pick::First).await? {
            Some(control) => Some(control),
            None => locator.find(&self.selectors.settings_button, Pick::First).await?,
        };
        let Some(control) = control else {
            return Ok(false);
        };
        if !tolerate_stale(self.surface.click(&control).await)? {
            return Ok(false);
        }
        settle(self.timing.panel_settle()).await;
        debug!("settings panel opened");
        Ok(true)
    }

    async fn apply_field(
        &self,
        field: &str,
        chain: &SelectorSet,
        target: &str,
    ) -> Result<bool, SurfaceError> {
        let Some(control) = self.locator().find(chain, Pick::First).await? else {
            warn!(field, target, "settings field not found");
            return Ok(false);
        };
        let applied = self.choose(&control, target, self.timing.option_settle()).await?;
        if applied {
            debug!(field, target, "settings field applied");
        } else {
            warn!(field, target, "settings option not found");
        }
        Ok(applied)
    }

    /// Click `control`, wait, then click the first rendered option whose
    /// text contains `target`.
    async fn choose(
        &self,
        control: &ElementHandle,
        target: &str,
        open_settle: Duration,
    ) -> Result<bool, SurfaceError> {
        if !tolerate_stale(self.surface.click(control).await)? {
            return Ok(false);
        }
        settle(open_settle).await;

        let Some(option) = self.locator().find_by_text(&self.selectors.option, target).await? else {
            return Ok(false);
        };
        if !tolerate_stale(self.surface.click(&option).await)? {
            return Ok(false);
        }
        settle(self.timing.click_settle()).await;
        Ok(true)
    }
}

/// `Ok(false)` when the element vanished between lookup and use.
fn tolerate_stale(result: Result<(), SurfaceError>) -> Result<bool, SurfaceError> {
    match result {
        Ok(()) => Ok(true),
        Err(SurfaceError::StaleElement(id)) => {
            debug!(element = %id, "element went stale");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[path = "configurator_tests.rs"]
mod tests;
