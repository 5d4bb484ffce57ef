//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Settle delays below this are accepted but usually too short for the
/// foreign UI to re-render.
const SHORT_SETTLE_MS: u64 = 50;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_timing(config, &mut result);
        Self::validate_selectors(config, &mut result);
        Self::validate_observer(config, &mut result);
        Self::validate_upstream(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }

        if config.browser.debug_port == 0 {
            result.add_error(ValidationError::new(
                "browser.debug_port",
                "Port cannot be 0",
            ));
        }
    }

    fn validate_timing(config: &Config, result: &mut ValidationResult) {
        let t = &config.timing;

        let intervals = [
            ("timing.slot_poll_interval_ms", t.slot_poll_interval_ms),
            ("timing.upload_poll_interval_ms", t.upload_poll_interval_ms),
            ("timing.result_poll_interval_ms", t.result_poll_interval_ms),
            ("timing.project_poll_interval_ms", t.project_poll_interval_ms),
        ];
        for (path, value) in intervals {
            if value == 0 {
                result.add_error(ValidationError::new(path, "Poll interval must be greater than 0"));
            }
        }

        let attempts = [
            ("timing.slot_poll_attempts", t.slot_poll_attempts),
            ("timing.upload_poll_attempts", t.upload_poll_attempts),
            ("timing.project_poll_attempts", t.project_poll_attempts),
        ];
        for (path, value) in attempts {
            if value == 0 {
                result.add_error(ValidationError::new(path, "Poll attempts must be greater than 0"));
            }
        }

        if t.result_max_wait_secs == 0 {
            result.add_error(ValidationError::new(
                "timing.result_max_wait_secs",
                "Maximum wait must be greater than 0",
            ));
        }

        if t.router_timeout_secs <= t.result_max_wait_secs {
            result.add_warning(ValidationWarning::new(
                "timing.router_timeout_secs",
                "Router timeout does not exceed the result wait; routed generations will time out before the orchestrator does",
            ));
        }

        let settles = [
            ("timing.click_settle_ms", t.click_settle_ms),
            ("timing.option_settle_ms", t.option_settle_ms),
            ("timing.panel_settle_ms", t.panel_settle_ms),
        ];
        for (path, value) in settles {
            if value < SHORT_SETTLE_MS {
                result.add_warning(ValidationWarning::new(
                    path,
                    format!("Settle delay below {}ms; the UI may not have re-rendered", SHORT_SETTLE_MS),
                ));
            }
        }
    }

    fn validate_selectors(config: &Config, result: &mut ValidationResult) {
        for (name, chain) in config.selectors.chains() {
            if chain.is_empty() {
                result.add_error(ValidationError::new(
                    format!("selectors.{}", name),
                    "Selector chain cannot be empty",
                ));
            }
        }

        if config.selectors.option.is_empty() {
            result.add_error(ValidationError::new("selectors.option", "Option selector cannot be empty"));
        }

        if config.selectors.upload_slot.is_empty() {
            result.add_error(ValidationError::new(
                "selectors.upload_slot",
                "Upload slot selector cannot be empty",
            ));
        }
    }

    fn validate_observer(config: &Config, result: &mut ValidationResult) {
        if config.observer.upload_marker.is_empty() {
            result.add_error(ValidationError::new("observer.upload_marker", "Marker cannot be empty"));
        }

        if config.observer.status_marker.is_empty() {
            result.add_error(ValidationError::new("observer.status_marker", "Marker cannot be empty"));
        }

        if config.observer.body_prefix_limit > 2000 {
            result.add_warning(ValidationWarning::new(
                "observer.body_prefix_limit",
                "Body prefixes above 2000 characters inflate the exchange log",
            ));
        }

        if config.observer.pump_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "observer.pump_interval_ms",
                "Pump interval must be greater than 0",
            ));
        }
    }

    fn validate_upstream(config: &Config, result: &mut ValidationResult) {
        let urls = [
            ("upstream.session_url", &config.upstream.session_url),
            ("upstream.generate_url", &config.upstream.generate_url),
            ("upstream.status_url", &config.upstream.status_url),
        ];
        for (path, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(path, "URL must start with http:// or https://"));
            }
        }

        if config.upstream.site_key.is_empty() {
            result.add_warning(ValidationWarning::new(
                "upstream.site_key",
                "No site key; direct upstream calls will fail the challenge",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
