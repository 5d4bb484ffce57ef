//! Settle delays and poll budgets.
//!
//! Every wait the automation core performs against the foreign UI is read
//! from here. Values are empirical and expected to be tuned per deployment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing configuration, all values in milliseconds unless suffixed otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after every click on a control.
    pub click_settle_ms: u64,
    /// Wait after a dropdown opens before its options are scanned.
    pub option_settle_ms: u64,
    /// Wait after the settings panel opens.
    pub panel_settle_ms: u64,
    /// Wait after the mode selection finishes.
    pub mode_settle_ms: u64,
    /// Wait after the prompt has been written.
    pub prompt_settle_ms: u64,
    /// Wait after the generate control is clicked.
    pub generate_settle_ms: u64,
    /// Wait for the hidden file input after clicking an upload slot.
    pub file_input_wait_ms: u64,
    /// Wait for the crop dialog after the file is assigned.
    pub crop_wait_ms: u64,
    /// Wait after confirming the crop dialog.
    pub crop_settle_ms: u64,
    /// Upload slot discovery poll interval.
    pub slot_poll_interval_ms: u64,
    /// Upload slot discovery attempts.
    pub slot_poll_attempts: u32,
    /// Upload confirmation poll interval.
    pub upload_poll_interval_ms: u64,
    /// Upload confirmation attempts per frame.
    pub upload_poll_attempts: u32,
    /// Generation completion poll interval.
    pub result_poll_interval_ms: u64,
    /// Hard upper bound on waiting for a generation result.
    pub result_max_wait_secs: u64,
    /// Upper bound on a single routed command, reply included.
    pub router_timeout_secs: u64,
    /// New project control discovery attempts.
    pub project_poll_attempts: u32,
    /// New project control discovery interval.
    pub project_poll_interval_ms: u64,
    /// Wait after navigating to the tool home page.
    pub navigation_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            click_settle_ms: 300,
            option_settle_ms: 200,
            panel_settle_ms: 500,
            mode_settle_ms: 300,
            prompt_settle_ms: 500,
            generate_settle_ms: 1000,
            file_input_wait_ms: 1000,
            crop_wait_ms: 1500,
            crop_settle_ms: 3000,
            slot_poll_interval_ms: 500,
            slot_poll_attempts: 10,
            upload_poll_interval_ms: 1000,
            upload_poll_attempts: 20,
            result_poll_interval_ms: 2000,
            result_max_wait_secs: 360,
            router_timeout_secs: 420,
            project_poll_attempts: 10,
            project_poll_interval_ms: 500,
            navigation_settle_ms: 3000,
        }
    }
}

impl TimingConfig {
    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn option_settle(&self) -> Duration {
        Duration::from_millis(self.option_settle_ms)
    }

    pub fn panel_settle(&self) -> Duration {
        Duration::from_millis(self.panel_settle_ms)
    }

    pub fn mode_settle(&self) -> Duration {
        Duration::from_millis(self.mode_settle_ms)
    }

    pub fn prompt_settle(&self) -> Duration {
        Duration::from_millis(self.prompt_settle_ms)
    }

    pub fn generate_settle(&self) -> Duration {
        Duration::from_millis(self.generate_settle_ms)
    }

    pub fn file_input_wait(&self) -> Duration {
        Duration::from_millis(self.file_input_wait_ms)
    }

    pub fn crop_wait(&self) -> Duration {
        Duration::from_millis(self.crop_wait_ms)
    }

    pub fn crop_settle(&self) -> Duration {
        Duration::from_millis(self.crop_settle_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn slot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.slot_poll_interval_ms)
    }

    pub fn upload_poll_interval(&self) -> Duration {
        Duration::from_millis(self.upload_poll_interval_ms)
    }

    pub fn result_poll_interval(&self) -> Duration {
        Duration::from_millis(self.result_poll_interval_ms)
    }

    pub fn result_max_wait(&self) -> Duration {
        Duration::from_secs(self.result_max_wait_secs)
    }

    pub fn router_timeout(&self) -> Duration {
        Duration::from_secs(self.router_timeout_secs)
    }

    pub fn project_poll_interval(&self) -> Duration {
        Duration::from_millis(self.project_poll_interval_ms)
    }

    /// All delays zeroed, poll budgets kept. Used by tests running on
    /// paused time where only the ordering of steps matters.
    pub fn instant() -> Self {
        Self {
            click_settle_ms: 0,
            option_settle_ms: 0,
            panel_settle_ms: 0,
            mode_settle_ms: 0,
            prompt_settle_ms: 0,
            generate_settle_ms: 0,
            file_input_wait_ms: 0,
            crop_wait_ms: 0,
            crop_settle_ms: 0,
            navigation_settle_ms: 0,
            ..Self::default()
        }
    }
}
