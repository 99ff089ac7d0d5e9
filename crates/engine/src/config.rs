use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::engine::EngineSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Cron expression overrides keyed by job name.
    #[serde(default)]
    pub schedules: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// IANA zone used for every calendar expression and the report week.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Upper bound on bulk outbound messages per second.
    #[serde(default = "default_notification_rate")]
    pub notification_rate_per_second: u32,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Outbound messaging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// `log` writes messages to the log, `http` posts them to a gateway.
    #[serde(default = "default_notification_provider")]
    pub provider: String,

    #[serde(default)]
    pub gateway_url: String,

    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            provider: default_notification_provider(),
            gateway_url: String::new(),
            timeout_ms: default_gateway_timeout_ms(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_enabled() -> bool {
    true
}
fn default_timezone() -> String {
    "Asia/Kathmandu".to_string()
}
fn default_event_queue_capacity() -> usize {
    1024
}
fn default_notification_rate() -> u32 {
    1
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_notification_provider() -> String {
    "log".to_string()
}
fn default_gateway_timeout_ms() -> u64 {
    5000
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with OPS__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("OPS").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 10
            min_connections = 2

            [logging]
            level = "info"
            format = "json"

            [engine]
            enabled = true
            timezone = "Asia/Kathmandu"
            event_queue_capacity = 1024
            notification_rate_per_second = 1
            shutdown_timeout_secs = 30

            [notifications]
            provider = "log"

            [schedules]
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values. The database URL is checked
    /// separately by [`Config::require_database`], since dry runs need none.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        self.timezone()?;

        if self.engine.event_queue_capacity == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "engine.event_queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.engine.notification_rate_per_second == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "engine.notification_rate_per_second must be greater than 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        match self.notifications.provider.as_str() {
            "log" => {}
            "http" if self.notifications.gateway_url.trim().is_empty() => {
                return Err(ConfigValidationError::MissingRequired(
                    "OPS__NOTIFICATIONS__GATEWAY_URL must be set for the http provider"
                        .to_string(),
                ));
            }
            "http" => {}
            other => {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "Unknown notification provider: {}",
                    other
                )));
            }
        }

        self.socket_addr()?;
        Ok(())
    }

    pub fn require_database(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "OPS__DATABASE__URL environment variable must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigValidationError> {
        self.engine.timezone.parse::<Tz>().map_err(|_| {
            ConfigValidationError::InvalidValue(format!(
                "Unknown timezone: {}",
                self.engine.timezone
            ))
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigValidationError::InvalidValue(format!(
                    "Invalid listen address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            idle_timeout_secs: self.database.idle_timeout_secs,
        }
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigValidationError> {
        Ok(EngineSettings {
            enabled: self.engine.enabled,
            timezone: self.timezone()?,
            event_queue_capacity: self.engine.event_queue_capacity,
            notification_rate_per_second: self.engine.notification_rate_per_second,
            schedule_overrides: self.schedules.clone(),
            shutdown_timeout: Duration::from_secs(self.engine.shutdown_timeout_secs),
        })
    }
}
