//! Configuration for the timer and the session guard.

use crate::auth::{GuardSettings, HttpRefreshConfig, RetryPolicy};
use crate::auth::client::DEFAULT_REFRESH_PATH;
use crate::auth::guard::{DEFAULT_LOGIN_PATH, DEFAULT_RENEWAL_INTERVAL_SECS};
use crate::auth::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};
use crate::auth::token::DEFAULT_EXPIRY_LEEWAY_SECS;
use crate::error::FlowdoError;
use crate::pomodoro::runner::{DEFAULT_COMPLETION_DISPLAY_DELAY_MS, DEFAULT_TICK_INTERVAL_MS};
use crate::pomodoro::{PomodoroSettings, RunnerTiming};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowdoConfig {
    /// Pomodoro timer settings.
    pub pomodoro: PomodoroConfig,
    /// Session refresh settings.
    pub auth: AuthConfig,
}

/// Pomodoro timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PomodoroConfig {
    /// Work session length in minutes.
    pub work_duration: u32,
    /// Short break length in minutes.
    pub short_break_duration: u32,
    /// Long break length in minutes.
    pub long_break_duration: u32,
    /// Completed work sessions per long break.
    pub sessions_until_long_break: u32,
    /// How long a completed session stays on screen before the next one is ready.
    pub completion_display_delay_ms: u64,
    /// Countdown tick period.
    pub tick_interval_ms: u64,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        let settings = PomodoroSettings::default();
        Self {
            work_duration: settings.work_duration,
            short_break_duration: settings.short_break_duration,
            long_break_duration: settings.long_break_duration,
            sessions_until_long_break: settings.sessions_until_long_break,
            completion_display_delay_ms: DEFAULT_COMPLETION_DISPLAY_DELAY_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl PomodoroConfig {
    pub fn settings(&self) -> PomodoroSettings {
        PomodoroSettings {
            work_duration: self.work_duration,
            short_break_duration: self.short_break_duration,
            long_break_duration: self.long_break_duration,
            sessions_until_long_break: self.sessions_until_long_break,
        }
    }

    pub fn timing(&self) -> RunnerTiming {
        RunnerTiming {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            completion_display_delay: Duration::from_millis(self.completion_display_delay_ms),
        }
    }
}

/// Session refresh configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Backend origin.
    pub api_base_url: String,
    /// Route of the refresh endpoint.
    pub refresh_path: String,
    /// Where to send the user after a forced logout.
    pub login_path: String,
    /// Scheduled renewal period.
    pub renewal_interval_secs: u64,
    /// Total refresh attempts per renewal, the first included.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub retry_delay_ms: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Access tokens this close to expiry are renewed on re-validation.
    pub expiry_leeway_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_owned(),
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            renewal_interval_secs: DEFAULT_RENEWAL_INTERVAL_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            request_timeout_secs: 10,
            expiry_leeway_secs: DEFAULT_EXPIRY_LEEWAY_SECS,
        }
    }
}

impl AuthConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_delay_ms(self.retry_delay_ms)
    }

    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            renewal_interval: Duration::from_secs(self.renewal_interval_secs),
            login_path: self.login_path.clone(),
            expiry_leeway_secs: self.expiry_leeway_secs,
            retry: self.retry_policy(),
        }
    }

    pub fn refresh_config(&self) -> HttpRefreshConfig {
        HttpRefreshConfig::new(self.api_base_url.clone())
            .with_refresh_path(self.refresh_path.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

impl FlowdoConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| FlowdoError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| FlowdoError::Config(e.to_string()))
    }

    /// Returns the default config file path: `~/.config/flowdo/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("flowdo").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("flowdo")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/flowdo-config/config.toml")
        }
    }

    /// Reject values the timer or guard cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.validate_pomodoro()?;
        self.validate_auth()
    }

    /// Check the `[pomodoro]` section only.
    pub fn validate_pomodoro(&self) -> crate::error::Result<()> {
        self.pomodoro
            .settings()
            .validate()
            .map_err(FlowdoError::Config)?;

        if self.pomodoro.tick_interval_ms == 0 {
            return Err(FlowdoError::Config(
                "tick_interval_ms must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Check the `[auth]` section only.
    pub fn validate_auth(&self) -> crate::error::Result<()> {
        if self.auth.renewal_interval_secs == 0 {
            return Err(FlowdoError::Config(
                "renewal_interval_secs must be at least 1".to_owned(),
            ));
        }
        if self.auth.request_timeout_secs == 0 {
            return Err(FlowdoError::Config(
                "request_timeout_secs must be at least 1".to_owned(),
            ));
        }
        if !(self.auth.api_base_url.starts_with("http://")
            || self.auth.api_base_url.starts_with("https://"))
        {
            return Err(FlowdoError::Config(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.auth.api_base_url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FlowdoConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pomodoro.settings(), PomodoroSettings::default());
        assert_eq!(config.pomodoro.timing(), RunnerTiming::default());
        assert_eq!(config.auth.guard_settings(), GuardSettings::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = FlowdoConfig::default();
        config.pomodoro.work_duration = 50;
        config.auth.api_base_url = "https://api.example.test".into();
        config.auth.max_attempts = 5;

        config.save_to_file(&path).unwrap();
        let loaded = FlowdoConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pomodoro]\nwork_duration = 1\n").unwrap();

        let loaded = FlowdoConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pomodoro.work_duration, 1);
        assert_eq!(loaded.pomodoro.short_break_duration, 5);
        assert_eq!(loaded.auth, AuthConfig::default());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(matches!(
            FlowdoConfig::from_file(&path),
            Err(FlowdoError::Config(_))
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = FlowdoConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, FlowdoConfig::default());
        assert!(matches!(
            FlowdoConfig::from_file(&dir.path().join("absent.toml")),
            Err(FlowdoError::Io(_))
        ));
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut config = FlowdoConfig::default();
        config.pomodoro.sessions_until_long_break = 0;
        assert!(config.validate().is_err());

        let mut config = FlowdoConfig::default();
        config.auth.renewal_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = FlowdoConfig::default();
        config.auth.api_base_url = "localhost:8000".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn sections_validate_independently() {
        let mut config = FlowdoConfig::default();
        config.auth.api_base_url = "not a url".into();
        config.validate_pomodoro().unwrap();
        assert!(config.validate_auth().is_err());

        let mut config = FlowdoConfig::default();
        config.pomodoro.work_duration = 0;
        config.validate_auth().unwrap();
        assert!(config.validate_pomodoro().is_err());
    }

    #[test]
    fn auth_config_builds_refresh_target() {
        let mut auth = AuthConfig::default();
        auth.api_base_url = "http://api.test/".into();
        auth.request_timeout_secs = 3;
        let cfg = auth.refresh_config();
        assert_eq!(cfg.refresh_url(), "http://api.test/api/auth/refresh");
        assert_eq!(cfg.request_timeout, Duration::from_secs(3));
        assert_eq!(auth.retry_policy().max_attempts, 3);
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = FlowdoConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("flowdo"));
    }
}
