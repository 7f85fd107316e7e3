// Config validation
// Strict mode validates config at startup and fails fast with actionable errors

use crate::config::settings::ProctorConfig;
use crate::config::types::{ProctorError, Result};

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Validate config before a session is opened
pub fn validate_config(config: &ProctorConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_lockdown(config, &mut result);
    validate_session(config, &mut result);
    validate_services(config, &mut result);

    if config.strict_mode && !result.is_valid() {
        let error_msg = format!(
            "Config validation failed in strict mode:\n{}",
            result.errors.join("\n")
        );
        return Err(ProctorError::Config(error_msg));
    }

    for warning in &result.warnings {
        log::warn!("Config warning: {}", warning);
    }

    Ok(result)
}

fn validate_lockdown(config: &ProctorConfig, result: &mut ValidationResult) {
    let lockdown = &config.lockdown;

    if lockdown.devtools_poll_ms == 0 {
        result.add_error("lockdown.devtools_poll_ms cannot be zero".to_string());
    } else if lockdown.devtools_poll_ms > 5_000 {
        result.add_warning(format!(
            "lockdown.devtools_poll_ms {} is slow; devtools may stay open unnoticed",
            lockdown.devtools_poll_ms
        ));
    }

    if lockdown.devtools_threshold_px == 0 {
        result.add_error(
            "lockdown.devtools_threshold_px cannot be zero (every window would trip it)"
                .to_string(),
        );
    }

    if lockdown.editor_region.trim().is_empty() {
        result.add_error("lockdown.editor_region cannot be empty".to_string());
    }

    if let Some(bad) = lockdown
        .blocked_shortcut_keys
        .iter()
        .find(|k| !k.is_ascii_alphanumeric())
    {
        result.add_error(format!(
            "lockdown.blocked_shortcut_keys contains non-alphanumeric key {:?}",
            bad
        ));
    }

    if !lockdown.enabled {
        result.add_warning("lockdown.enabled is false; no violations will be detected".to_string());
    }
}

fn validate_session(config: &ProctorConfig, result: &mut ValidationResult) {
    let session = &config.session;

    if session.max_warnings == 0 {
        result.add_error("session.max_warnings cannot be zero".to_string());
    }

    if session.autosave_interval_secs == 0 {
        result.add_error("session.autosave_interval_secs cannot be zero".to_string());
    }

    if session.languages.is_empty() {
        result.add_error("session.languages cannot be empty".to_string());
    } else if !session.languages.contains(&session.default_language) {
        result.add_error(format!(
            "session.default_language {:?} is not in session.languages",
            session.default_language
        ));
    }
}

fn validate_services(config: &ProctorConfig, result: &mut ValidationResult) {
    let services = &config.services;

    for (name, base) in [
        ("services.api_base", &services.api_base),
        ("services.analysis_base", &services.analysis_base),
    ] {
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            result.add_error(format!("{} must be an http(s) URL: {:?}", name, base));
        } else if base.starts_with("http://") && !base.contains("localhost") {
            result.add_warning(format!("{} uses plain http: {}", name, base));
        }
    }

    if services.request_timeout_ms == 0 || services.connect_timeout_ms == 0 {
        result.add_error("services timeouts cannot be zero".to_string());
    }

    if services.frame_interval_secs == 0 {
        result.add_error("services.frame_interval_secs cannot be zero".to_string());
    }
}
