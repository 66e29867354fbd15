// Database abstraction layer for multi-engine support
pub mod clickhouse;
pub mod elasticsearch;
pub mod mongodb;
pub mod mysql;
pub mod oracle;
pub mod postgresql;
pub mod sqlserver;

pub use self::clickhouse::ClickHouseConnector;
pub use self::elasticsearch::ElasticsearchConnector;
pub use self::mongodb::MongoConnector;
pub use self::mysql::MySqlConnector;
pub use self::oracle::OracleConnector;
pub use self::postgresql::PostgresConnector;
pub use self::sqlserver::SqlServerConnector;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    ColumnInfo, ConnectionConfig, Dataset, QueryParams, QueryPreview, QueryResult, TableInfo,
};

/// Engine type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    MySql,
    PostgreSql,
    ClickHouse,
    Oracle,
    SqlServer,
    MongoDb,
    Elasticsearch,
}

impl EngineType {
    pub fn from_str(s: &str) -> Result<Self, EngineError> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(EngineType::MySql),
            "postgresql" | "postgres" => Ok(EngineType::PostgreSql),
            "clickhouse" => Ok(EngineType::ClickHouse),
            "oracle" => Ok(EngineType::Oracle),
            "sqlserver" | "mssql" => Ok(EngineType::SqlServer),
            "mongodb" | "mongo" => Ok(EngineType::MongoDb),
            "elasticsearch" | "elastic" | "es" => Ok(EngineType::Elasticsearch),
            _ => Err(EngineError::Configuration(format!(
                "Unsupported engine type: {}",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::MySql => "mysql",
            EngineType::PostgreSql => "postgresql",
            EngineType::ClickHouse => "clickhouse",
            EngineType::Oracle => "oracle",
            EngineType::SqlServer => "sqlserver",
            EngineType::MongoDb => "mongodb",
            EngineType::Elasticsearch => "elasticsearch",
        }
    }
}

/// Connector capability trait - one uniform contract across all seven
/// engines. Compilation errors surface before any I/O; driver errors
/// propagate unmodified.
#[async_trait::async_trait]
pub trait DataConnector: Send + Sync {
    /// Engine tag this connector serves.
    fn engine_type(&self) -> EngineType;

    /// Compile and execute the request, returning rows keyed by stable
    /// identifiers plus an exact pagination-independent total.
    async fn query(&self, dataset: &Dataset, params: &QueryParams)
        -> Result<QueryResult, EngineError>;

    /// Compile the request without executing it.
    fn preview_query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryPreview, EngineError>;

    /// Schemas visible to the connection, system schemas filtered out.
    async fn list_schemas(&self) -> Result<Vec<String>, EngineError>;

    /// Tables (collections, indices) in the given or default schema.
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError>;

    /// Columns of one table, normalized to name/type pairs.
    async fn list_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError>;

    /// Release pooled resources. Callers are responsible for invoking this
    /// on shutdown.
    async fn close(&self) -> Result<(), EngineError>;
}

/// Factory function to create the appropriate connector for an engine tag.
pub async fn create_connector(
    config: &ConnectionConfig,
    settings: &EngineSettings,
) -> Result<Arc<dyn DataConnector>, EngineError> {
    match config.engine {
        EngineType::MySql => Ok(Arc::new(MySqlConnector::new(config, settings)?)),
        EngineType::PostgreSql => Ok(Arc::new(PostgresConnector::new(config, settings)?)),
        EngineType::ClickHouse => Ok(Arc::new(ClickHouseConnector::new(config, settings)?)),
        EngineType::Oracle => Ok(Arc::new(OracleConnector::new(config, settings)?)),
        EngineType::SqlServer => Ok(Arc::new(SqlServerConnector::new(config, settings)?)),
        EngineType::MongoDb => Ok(Arc::new(MongoConnector::connect(config, settings).await?)),
        EngineType::Elasticsearch => Ok(Arc::new(ElasticsearchConnector::new(config, settings)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_type_parsing() {
        assert_eq!(EngineType::from_str("postgres").unwrap(), EngineType::PostgreSql);
        assert_eq!(EngineType::from_str("MySQL").unwrap(), EngineType::MySql);
        assert_eq!(EngineType::from_str("mssql").unwrap(), EngineType::SqlServer);
        assert_eq!(EngineType::from_str("es").unwrap(), EngineType::Elasticsearch);
        assert!(EngineType::from_str("dbase").is_err());
    }

    #[test]
    fn test_engine_type_round_trip() {
        for engine in [
            EngineType::MySql,
            EngineType::PostgreSql,
            EngineType::ClickHouse,
            EngineType::Oracle,
            EngineType::SqlServer,
            EngineType::MongoDb,
            EngineType::Elasticsearch,
        ] {
            assert_eq!(EngineType::from_str(engine.as_str()).unwrap(), engine);
        }
    }
}
