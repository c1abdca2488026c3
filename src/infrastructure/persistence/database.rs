//! Database connection management

use crate::config::DatabaseSettings;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/court_booking".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl DatabaseConfig {
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        Self {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
            min_connections: settings.min_connections.min(settings.max_connections),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            max_lifetime: Duration::from_secs(settings.max_lifetime_secs),
        }
    }
}

/// Create a new database connection pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        url = %mask_password(&config.url),
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .connect(&config.url)
        .await?;

    info!("Database connection pool created");
    Ok(pool)
}

/// Apply pending migrations from `./migrations`
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Mask password in database URL for logging
pub(crate) fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            // User without password: the only colon is the scheme's
            if !url[..colon_pos].contains("//") {
                return url.to_string();
            }
            let mut masked = url.to_string();
            masked.replace_range(colon_pos + 1..at_pos, "****");
            return masked;
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://booking:s3cret@db:5432/booking"),
            "postgres://booking:****@db:5432/booking"
        );
        assert_eq!(mask_password("postgres://localhost/booking"), "postgres://localhost/booking");
        assert_eq!(mask_password("postgres://booking@db/booking"), "postgres://booking@db/booking");
    }

    #[test]
    fn test_from_settings() {
        let settings = DatabaseSettings {
            url: "postgres://u:p@localhost/b".to_string(),
            max_connections: 4,
            min_connections: 8,
            connect_timeout_secs: 3,
            idle_timeout_secs: 60,
            max_lifetime_secs: 120,
        };
        let config = DatabaseConfig::from_settings(&settings);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 4);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }
}
