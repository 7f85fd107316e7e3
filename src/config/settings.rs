/// Configuration loading from proctorbox.json
use crate::config::types::{ProctorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_BASE: &str = "PROCTORBOX_API_BASE";
pub const ENV_ANALYSIS_BASE: &str = "PROCTORBOX_ANALYSIS_BASE";
pub const ENV_AUDIT_PATH: &str = "PROCTORBOX_AUDIT_PATH";

/// Browser lockdown settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockdownConfig {
    /// Master switch for every detection rule
    pub enabled: bool,
    /// Outer/inner viewport delta (px) above which devtools are assumed open
    pub devtools_threshold_px: u32,
    pub devtools_poll_ms: u64,
    /// Marker of the code-editing surface where clipboard use is allowed
    pub editor_region: String,
    /// Keys blocked together with Ctrl/Cmd outside the editor
    pub blocked_shortcut_keys: Vec<char>,
    /// Enter fullscreen as soon as the monitor starts
    pub request_fullscreen: bool,
    /// Refuse to record when the camera cannot be opened
    pub camera_required: bool,
}

impl Default for LockdownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            devtools_threshold_px: 160,
            devtools_poll_ms: 1000,
            editor_region: "monaco-editor".to_string(),
            blocked_shortcut_keys: vec!['c', 'v', 'a', 'f', 'x'],
            request_fullscreen: true,
            camera_required: true,
        }
    }
}

/// Session escalation and auto-save settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// High/critical violations that force submission
    pub max_warnings: usize,
    pub autosave_interval_secs: u64,
    pub default_language: String,
    pub languages: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_warnings: 5,
            autosave_interval_secs: 30,
            default_language: "javascript".to_string(),
            languages: vec![
                "javascript".to_string(),
                "python".to_string(),
                "java".to_string(),
                "cpp".to_string(),
            ],
        }
    }
}

impl SessionConfig {
    pub fn supports_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }
}

/// Remote collaborator endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub api_base: String,
    pub analysis_base: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub frame_interval_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:5000".to_string(),
            analysis_base: "http://localhost:8000".to_string(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 10_000,
            frame_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub path: Option<PathBuf>,
}

/// Full proctorbox.json structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    pub lockdown: LockdownConfig,
    pub session: SessionConfig,
    pub services: ServicesConfig,
    pub audit: AuditConfig,
    /// Fail fast on validation errors
    pub strict_mode: bool,
}

impl ProctorConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProctorError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ProctorConfig = serde_json::from_str(&content)
            .map_err(|e| ProctorError::Config(format!("Failed to parse config JSON: {}", e)))?;

        Ok(config)
    }

    /// Load ./proctorbox.json when present, defaults otherwise, then apply env overrides
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| ProctorError::Config(format!("Failed to get current directory: {}", e)))?
            .join("proctorbox.json");

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            log::debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load_default`)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.services.api_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(base) = lookup(ENV_ANALYSIS_BASE).filter(|v| !v.trim().is_empty()) {
            self.services.analysis_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup(ENV_AUDIT_PATH).filter(|v| !v.trim().is_empty()) {
            self.audit.path = Some(PathBuf::from(path));
        }
    }

    pub fn devtools_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lockdown.devtools_poll_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.session.autosave_interval_secs)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(self.services.frame_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_lockdown_rules() {
        let config = ProctorConfig::default();
        assert_eq!(config.lockdown.devtools_threshold_px, 160);
        assert_eq!(config.devtools_poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.autosave_interval(), Duration::from_secs(30));
        assert_eq!(config.session.max_warnings, 5);
        assert!(config.session.supports_language("python"));
        assert!(!config.session.supports_language("cobol"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ProctorConfig =
            serde_json::from_str(r#"{"session": {"max_warnings": 3}}"#).unwrap();
        assert_eq!(config.session.max_warnings, 3);
        assert_eq!(config.session.autosave_interval_secs, 30);
        assert_eq!(config.lockdown.editor_region, "monaco-editor");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_BASE, "https://exam.example.com/"),
            (ENV_AUDIT_PATH, "/var/log/proctor.log"),
            (ENV_ANALYSIS_BASE, "   "),
        ]
        .into_iter()
        .collect();

        let mut config = ProctorConfig::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.services.api_base, "https://exam.example.com");
        assert_eq!(config.services.analysis_base, "http://localhost:8000");
        assert_eq!(
            config.audit.path,
            Some(PathBuf::from("/var/log/proctor.log"))
        );
    }

    #[test]
    fn test_load_from_missing_file_is_config_error() {
        let err = ProctorConfig::load_from_file("/nonexistent/proctorbox.json").unwrap_err();
        assert!(matches!(err, ProctorError::Config(_)));
    }
}
