//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
///
/// Both binaries (the collector daemon and the dashboard API) read from the same
/// surface; fields irrelevant to one binary are simply ignored by it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub audit_log_path: String,
    pub host: String,
    pub port: u16,
    pub telemetry_source: String,
    pub sample_interval_seconds: Option<u64>,
    pub poll_timeout_seconds: u64,
    pub temp_alert_threshold_c: i32,
    pub history_window_size: usize,
    pub email_alerts_enabled: bool,
    pub gmail_username: String,
    pub gmail_app_password: String,
    pub email_receiver: String,
    pub email_from_name: String,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "gpupulse".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "gpupulse.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            audit_log_path: env::var("AUDIT_LOG_PATH")
                .unwrap_or_else(|_| "gpu_audit.jsonl".into()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .unwrap(),
            telemetry_source: env::var("TELEMETRY_SOURCE").unwrap_or_else(|_| "nvml".into()),
            sample_interval_seconds: env::var("SAMPLE_INTERVAL_SECONDS")
                .ok()
                .map(|v| v.parse().expect("SAMPLE_INTERVAL_SECONDS must be an integer")),
            poll_timeout_seconds: env::var("POLL_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .unwrap(),
            temp_alert_threshold_c: env::var("TEMP_ALERT_THRESHOLD_C")
                .unwrap_or_else(|_| "80".into())
                .parse()
                .unwrap(),
            history_window_size: env::var("HISTORY_WINDOW_SIZE")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .unwrap(),
            email_alerts_enabled: env::var("EMAIL_ALERTS_ENABLED")
                .unwrap_or_else(|_| "false".into())
                == "true",
            gmail_username: env::var("GMAIL_USERNAME").unwrap_or_default(),
            gmail_app_password: env::var("GMAIL_APP_PASSWORD").unwrap_or_default(),
            email_receiver: env::var("EMAIL_RECEIVER").unwrap_or_default(),
            email_from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "GPUPulse".into()),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap();
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_audit_log_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.audit_log_path = value.into());
    }

    pub fn set_host(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.host = value.into());
    }

    pub fn set_port(value: u16) {
        AppConfig::set_field(|cfg| cfg.port = value);
    }

    pub fn set_telemetry_source(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.telemetry_source = value.into());
    }

    pub fn set_sample_interval_seconds(value: Option<u64>) {
        AppConfig::set_field(|cfg| cfg.sample_interval_seconds = value);
    }

    pub fn set_poll_timeout_seconds(value: u64) {
        AppConfig::set_field(|cfg| cfg.poll_timeout_seconds = value);
    }

    pub fn set_temp_alert_threshold_c(value: i32) {
        AppConfig::set_field(|cfg| cfg.temp_alert_threshold_c = value);
    }

    pub fn set_history_window_size(value: usize) {
        AppConfig::set_field(|cfg| cfg.history_window_size = value);
    }

    pub fn set_email_alerts_enabled(value: bool) {
        AppConfig::set_field(|cfg| cfg.email_alerts_enabled = value);
    }

    pub fn set_email_receiver(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.email_receiver = value.into());
    }
}

// --- Module-level accessors used throughout the binaries ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn audit_log_path() -> String {
    AppConfig::global().audit_log_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn telemetry_source() -> String {
    AppConfig::global().telemetry_source.clone()
}

pub fn sample_interval_seconds() -> Option<u64> {
    AppConfig::global().sample_interval_seconds
}

pub fn poll_timeout_seconds() -> u64 {
    AppConfig::global().poll_timeout_seconds
}

pub fn temp_alert_threshold_c() -> i32 {
    AppConfig::global().temp_alert_threshold_c
}

pub fn history_window_size() -> usize {
    AppConfig::global().history_window_size
}

pub fn email_alerts_enabled() -> bool {
    AppConfig::global().email_alerts_enabled
}

pub fn gmail_username() -> String {
    AppConfig::global().gmail_username.clone()
}

pub fn gmail_app_password() -> String {
    AppConfig::global().gmail_app_password.clone()
}

pub fn email_receiver() -> String {
    AppConfig::global().email_receiver.clone()
}

pub fn email_from_name() -> String {
    AppConfig::global().email_from_name.clone()
}
