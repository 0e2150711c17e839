//! Service configuration.
//!
//! Loaded from `xopay-notify.toml` (or an explicit path) with
//! `XOPAY__SECTION__KEY` environment overrides, then validated before
//! anything starts.

use serde::Deserialize;

use xopay_notify_auth::AuthSettings;
use xopay_notify_currency::CurrencySettings;
use xopay_notify_delivery::MailSettings;
use xopay_notify_queue::{AmqpSettings, QueueNames};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub amqp: AmqpSettings,
    #[serde(default)]
    pub queues: QueueNames,
    #[serde(default)]
    pub currency: CurrencySettings,
    #[serde(default)]
    pub mail: MailSettings,
    #[serde(default)]
    pub urls: UrlSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Admin surface listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    7461
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Base URLs of the collaborating services, API version included.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlSettings {
    pub admin_base_url: String,
    pub client_base_url: String,
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            admin_base_url: "http://127.0.0.1:7128/api/admin/dev".to_string(),
            client_base_url: "http://127.0.0.1:7254/api/client/dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// tracing filter directive, e.g. "info" or "xopay_notify=debug".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub file: Option<std::path::PathBuf>,

    /// Rotated log files kept on disk.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_files() -> usize {
    7
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            max_files: default_max_files(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.amqp.host.is_empty() {
            return Err("amqp.host must not be empty".into());
        }
        for (key, name) in [
            ("queues.transaction_status", &self.queues.transaction_status),
            ("queues.email", &self.queues.email),
            ("queues.sms", &self.queues.sms),
            ("queues.request", &self.queues.request),
        ] {
            if name.is_empty() {
                return Err(format!("{key} must not be empty"));
            }
        }
        if self.currency.update_hours.is_empty() {
            return Err("currency.update_hours must not be empty".into());
        }
        if self.currency.update_hours.iter().any(|&h| h > 23) {
            return Err("currency.update_hours values must be within 0..=23".into());
        }
        if self.currency.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(format!("unknown timezone: {}", self.currency.timezone));
        }
        if self.urls.admin_base_url.is_empty() || self.urls.client_base_url.is_empty() {
            return Err("urls.admin_base_url and urls.client_base_url are required".into());
        }
        if self.auth.key.is_empty() {
            return Err("auth.key must not be empty".into());
        }
        if self.auth.token_lifetime_minutes <= 0 {
            return Err("auth.token_lifetime_minutes must be > 0".into());
        }
        if self.mail.server.is_empty() || self.mail.default_sender.is_empty() {
            return Err("mail.server and mail.default_sender are required".into());
        }
        Ok(())
    }

    /// Parsed scheduler timezone. Call after [`validate`](Self::validate).
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.currency
            .timezone
            .parse()
            .expect("timezone checked during validation")
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Load and validate the configuration.
    ///
    /// Reads the given path, or `xopay-notify.toml` when present, then
    /// applies `XOPAY__SECTION__KEY` environment overrides.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(File::from(PathBuf::from(p)));
            }
            None => {
                let default_path = PathBuf::from("xopay-notify.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("XOPAY")
                .try_parsing(true)
                .separator("__"),
        );

        let merged: AppConfig = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;

        merged.validate()?;
        Ok(merged)
    }
}
