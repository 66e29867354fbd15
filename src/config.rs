use serde::Deserialize;
use std::env;

/// Engine-wide tunables, loaded from the environment with code defaults.
///
/// Pool sizes bound per-connection concurrency; once a pool is saturated,
/// additional queries queue for a free connection.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Per-statement timeout applied to query and metadata calls.
    pub query_timeout_secs: u64,
    /// MySQL connection pool size.
    pub mysql_pool_size: usize,
    /// PostgreSQL connection pool size.
    pub postgres_pool_size: usize,
    /// Oracle connection pool size.
    pub oracle_pool_size: usize,
    /// SQL Server connection pool size.
    pub sqlserver_pool_size: usize,
    /// Maximum number of cached connectors before LRU eviction kicks in.
    pub registry_max_entries: usize,
    /// Idle time after which a cached connector is eligible for eviction.
    pub registry_idle_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
            mysql_pool_size: 10,
            postgres_pool_size: 16,
            oracle_pool_size: 8,
            sqlserver_pool_size: 8,
            registry_max_entries: 64,
            registry_idle_secs: 1800,
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = EngineSettings::default();

        let mut builder = config::Config::builder()
            .set_default("query_timeout_secs", defaults.query_timeout_secs)?
            .set_default("mysql_pool_size", defaults.mysql_pool_size as u64)?
            .set_default("postgres_pool_size", defaults.postgres_pool_size as u64)?
            .set_default("oracle_pool_size", defaults.oracle_pool_size as u64)?
            .set_default("sqlserver_pool_size", defaults.sqlserver_pool_size as u64)?
            .set_default("registry_max_entries", defaults.registry_max_entries as u64)?
            .set_default("registry_idle_secs", defaults.registry_idle_secs)?;

        // Load from environment variables
        if let Ok(timeout) = env::var("CROSSQUERY_QUERY_TIMEOUT_SECS") {
            builder = builder.set_override("query_timeout_secs", timeout)?;
        }

        if let Ok(size) = env::var("CROSSQUERY_MYSQL_POOL_SIZE") {
            builder = builder.set_override("mysql_pool_size", size)?;
        }

        if let Ok(size) = env::var("CROSSQUERY_POSTGRES_POOL_SIZE") {
            builder = builder.set_override("postgres_pool_size", size)?;
        }

        if let Ok(size) = env::var("CROSSQUERY_ORACLE_POOL_SIZE") {
            builder = builder.set_override("oracle_pool_size", size)?;
        }

        if let Ok(size) = env::var("CROSSQUERY_SQLSERVER_POOL_SIZE") {
            builder = builder.set_override("sqlserver_pool_size", size)?;
        }

        if let Ok(max) = env::var("CROSSQUERY_REGISTRY_MAX_ENTRIES") {
            builder = builder.set_override("registry_max_entries", max)?;
        }

        if let Ok(idle) = env::var("CROSSQUERY_REGISTRY_IDLE_SECS") {
            builder = builder.set_override("registry_idle_secs", idle)?;
        }

        // Try to load from .env file
        let _ = dotenv::dotenv();

        builder.build()?.try_deserialize()
    }
}

/// Logging configuration for callers that want the engine's default setup.
#[derive(Debug, Clone, Deserialize)]
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

impl LoggingConfig {
    /// Install a tracing subscriber honoring RUST_LOG, falling back to the
    /// configured level. Call once at process start.
    pub fn init(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(self.level.clone())),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        env::remove_var("CROSSQUERY_QUERY_TIMEOUT_SECS");
        env::remove_var("CROSSQUERY_MYSQL_POOL_SIZE");

        let settings = EngineSettings::from_env();
        assert!(settings.is_ok());

        let settings = settings.unwrap();
        assert_eq!(settings.query_timeout_secs, 30);
        assert_eq!(settings.mysql_pool_size, 10);
        assert_eq!(settings.registry_max_entries, 64);
    }

    #[test]
    fn test_logging_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
    }
}
