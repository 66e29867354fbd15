// PostgreSQL connector using connection pooling for resource management.
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio_postgres::types::Type;
use tokio_postgres::NoTls;

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    ColumnInfo, ConnectionConfig, Dataset, QueryParams, QueryPreview, QueryResult, TableInfo,
};
use crate::services::database::{DataConnector, EngineType};
use crate::services::sql_builder::{SqlDialect, SqlGenerator};

/// PostgreSQL SQL dialect: double-quote quoting, `LIMIT n OFFSET m`.
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn quote_pair(&self) -> (&'static str, &'static str) {
        ("\"", "\"")
    }

    fn pagination_clause(&self, limit: u64, offset: u64) -> String {
        format!("LIMIT {} OFFSET {}", limit, offset)
    }
}

pub struct PostgresConnector {
    pool: Pool,
    timeout: Duration,
}

impl PostgresConnector {
    pub fn new(config: &ConnectionConfig, settings: &EngineSettings) -> Result<Self, EngineError> {
        let mut cfg = PoolConfig::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = config.password.clone();
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            EngineError::Connection(format!("Failed to create PostgreSQL pool: {}", e))
        })?;
        pool.resize(settings.postgres_pool_size);

        tracing::debug!("Created PostgreSQL pool for {}", config.masked());

        Ok(Self {
            pool,
            timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    async fn get_client(&self) -> Result<deadpool_postgres::Object, EngineError> {
        self.pool.get().await.map_err(|e| {
            EngineError::Connection(format!("Failed to get connection from pool: {}", e))
        })
    }

    async fn run(
        &self,
        client: &tokio_postgres::Client,
        sql: &str,
    ) -> Result<Vec<tokio_postgres::Row>, EngineError> {
        tokio::time::timeout(self.timeout, client.query(sql, &[]))
            .await
            .map_err(|_| {
                EngineError::Execution(format!(
                    "Query timeout after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                let detail = if let Some(db_error) = e.as_db_error() {
                    format!("Code: {}, Message: {}", db_error.code().code(), db_error.message())
                } else {
                    format!("{}", e)
                };
                EngineError::Execution(format!("Query execution failed: {}", detail))
            })
    }

    fn rows_to_json(rows: &[tokio_postgres::Row]) -> Vec<Value> {
        let mut json_rows = Vec::new();
        for row in rows {
            let mut row_obj = serde_json::Map::new();
            for (idx, column) in row.columns().iter().enumerate() {
                let value: Value = match *column.type_() {
                    Type::INT2 => row
                        .try_get::<_, Option<i16>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    Type::INT4 => row
                        .try_get::<_, Option<i32>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    Type::INT8 => row
                        .try_get::<_, Option<i64>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    Type::FLOAT4 => row
                        .try_get::<_, Option<f32>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    Type::FLOAT8 => row
                        .try_get::<_, Option<f64>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    Type::BOOL => row
                        .try_get::<_, Option<bool>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    _ => {
                        // TEXT, VARCHAR, NUMERIC, TIMESTAMP, UUID, JSON and
                        // everything else: string representation, with the
                        // type name as a placeholder when that fails too.
                        match row.try_get::<_, Option<String>>(idx) {
                            Ok(Some(v)) => json!(v),
                            Ok(None) => Value::Null,
                            Err(_) => json!(format!("<{}>", column.type_().name())),
                        }
                    }
                };
                row_obj.insert(column.name().to_string(), value);
            }
            json_rows.push(Value::Object(row_obj));
        }
        json_rows
    }

    fn first_count(rows: &[tokio_postgres::Row]) -> u64 {
        rows.first()
            .and_then(|row| row.try_get::<_, i64>(0).ok())
            .map(|v| v.max(0) as u64)
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl DataConnector for PostgresConnector {
    fn engine_type(&self) -> EngineType {
        EngineType::PostgreSql
    }

    async fn query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryResult, EngineError> {
        let generator = SqlGenerator::new(&PostgresDialect);
        let sql = generator.select_sql(dataset, params)?;
        let count_sql = generator.count_sql(dataset, params)?;

        let client = self.get_client().await?;
        let start_time = Instant::now();

        let rows = self.run(&client, &sql).await?;
        let count_rows = self.run(&client, &count_sql).await?;

        let total_count = Self::first_count(&count_rows);
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        Ok(QueryResult::new(
            Self::rows_to_json(&rows),
            total_count,
            execution_time_ms,
            Some(sql),
        ))
    }

    fn preview_query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryPreview, EngineError> {
        let query_text = SqlGenerator::new(&PostgresDialect).select_sql(dataset, params)?;
        Ok(QueryPreview { query_text })
    }

    async fn list_schemas(&self) -> Result<Vec<String>, EngineError> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                "SELECT nspname FROM pg_catalog.pg_namespace
                 WHERE nspname NOT LIKE 'pg_%' AND nspname <> 'information_schema'
                 ORDER BY nspname",
                &[],
            )
            .await
            .map_err(|e| EngineError::Metadata(format!("Failed to get schemas: {}", e)))?;

        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError> {
        let client = self.get_client().await?;
        let rows = match schema {
            Some(schema) => {
                client
                    .query(
                        r#"
                        SELECT table_schema, table_name
                        FROM information_schema.tables
                        WHERE table_type = 'BASE TABLE' AND table_schema = $1
                        ORDER BY table_name
                        "#,
                        &[&schema],
                    )
                    .await
            }
            None => {
                client
                    .query(
                        r#"
                        SELECT table_schema, table_name
                        FROM information_schema.tables
                        WHERE table_type = 'BASE TABLE'
                          AND table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
                        ORDER BY table_schema, table_name
                        "#,
                        &[],
                    )
                    .await
            }
        }
        .map_err(|e| EngineError::Metadata(format!("Failed to get tables: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| TableInfo {
                schema: Some(row.get::<_, String>(0)),
                name: row.get::<_, String>(1),
            })
            .collect())
    }

    async fn list_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError> {
        let client = self.get_client().await?;
        let schema = schema.unwrap_or("public");

        let rows = client
            .query(
                r#"
                SELECT column_name, data_type
                FROM information_schema.columns
                WHERE table_schema = $1 AND table_name = $2
                ORDER BY ordinal_position
                "#,
                &[&schema, &table],
            )
            .await
            .map_err(|e| EngineError::Metadata(format!("Failed to get columns: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get(0),
                data_type: row.get(1),
            })
            .collect())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.pool.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_pagination() {
        assert_eq!(PostgresDialect.pagination_clause(10, 0), "LIMIT 10 OFFSET 0");
        assert_eq!(PostgresDialect.pagination_clause(2, 4), "LIMIT 2 OFFSET 4");
    }

    #[test]
    fn test_dialect_quoting() {
        assert_eq!(PostgresDialect.quote_identifier("region"), "\"region\"");
        assert_eq!(PostgresDialect.quote_identifier("o.region"), "o.region");
    }
}
