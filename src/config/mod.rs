//! Configuration management
//!
//! Layered with the `config` crate: built-in defaults, then an optional file
//! (`config/default.*`, or the path in `COURT_BOOKING_CONFIG`), then
//! environment variables such as `COURT_BOOKING__DATABASE__URL`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "COURT_BOOKING";
const CONFIG_PATH_VAR: &str = "COURT_BOOKING_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub storage: StorageConfig,
    pub messaging: MessagingConfig,
    pub booking: BookingSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost/court_booking".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingBackend {
    #[default]
    Memory,
    Kafka,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub backend: MessagingBackend,
    pub brokers: String,
    pub consumer_group: String,
    /// Maximum deliveries in flight for the consumer
    pub prefetch: usize,
    pub publish_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub auto_offset_reset: String,
    pub topics: TopicsConfig,
}

impl MessagingConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            backend: MessagingBackend::Memory,
            brokers: "localhost:9092".to_string(),
            consumer_group: "booking-service".to_string(),
            prefetch: 16,
            publish_timeout_ms: 5000,
            reconnect_delay_ms: 5000,
            auto_offset_reset: "earliest".to_string(),
            topics: TopicsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicsConfig {
    pub booking_created: String,
    pub booking_confirmed: String,
    pub booking_cancelled: String,
    pub payment_paid: String,
    pub payment_failed: String,
}

impl TopicsConfig {
    /// Topics the payment consumer subscribes to
    pub fn inbound(&self) -> Vec<String> {
        vec![self.payment_paid.clone(), self.payment_failed.clone()]
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            booking_created: "booking.created".to_string(),
            booking_confirmed: "booking.confirmed".to_string(),
            booking_cancelled: "booking.cancelled".to_string(),
            payment_paid: "payment.paid".to_string(),
            payment_failed: "payment.failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSettings {
    pub operation_timeout_ms: u64,
    pub default_page_size: i64,
    /// Extra attempts for a payment whose booking is not visible yet
    pub not_found_retries: u32,
    pub not_found_backoff_ms: u64,
}

impl BookingSettings {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn not_found_backoff(&self) -> Duration {
        Duration::from_millis(self.not_found_backoff_ms)
    }
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5000,
            default_page_size: 20,
            not_found_retries: 3,
            not_found_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load defaults, the config file and the environment, in that order.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let builder = Self::defaults()?
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::finish(builder)
    }

    /// Defaults overlaid with a TOML document
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::finish(Self::defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.messaging.prefetch == 0 {
            return Err(ConfigError::Invalid("messaging.prefetch must be positive".to_string()));
        }
        if self.booking.default_page_size <= 0 {
            return Err(ConfigError::Invalid(
                "booking.default_page_size must be positive".to_string(),
            ));
        }
        if self.booking.operation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "booking.operation_timeout_ms must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = config::Config::try_from(&AppConfig::default())?;
        Ok(config::Config::builder().add_source(defaults))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
