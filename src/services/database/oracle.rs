// Oracle connector. The oracle driver is blocking, so every statement runs
// under spawn_blocking with the pooled connection moved into the closure;
// the pool itself is a deadpool custom manager in the same family as the
// PostgreSQL pool.
use deadpool::managed::{Manager, Metrics, Pool, RecycleResult};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    ColumnInfo, ConnectionConfig, Dataset, QueryParams, QueryPreview, QueryResult, TableInfo,
};
use crate::services::database::{DataConnector, EngineType};
use crate::services::sql_builder::{SqlDialect, SqlGenerator};

/// Oracle SQL dialect: double-quote quoting, OFFSET/FETCH pagination, and a
/// count wrap without AS (Oracle rejects AS on derived-table aliases).
pub struct OracleDialect;

impl SqlDialect for OracleDialect {
    fn quote_pair(&self) -> (&'static str, &'static str) {
        ("\"", "\"")
    }

    fn pagination_clause(&self, limit: u64, offset: u64) -> String {
        format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
    }

    fn count_wrapped(&self, inner: &str) -> String {
        format!("SELECT COUNT(*) FROM ({}) sub", inner)
    }
}

pub struct OracleManager {
    username: String,
    password: String,
    connect_string: String,
}

impl Manager for OracleManager {
    type Type = oracle::Connection;
    type Error = EngineError;

    async fn create(&self) -> Result<oracle::Connection, EngineError> {
        let username = self.username.clone();
        let password = self.password.clone();
        let connect_string = self.connect_string.clone();

        tokio::task::spawn_blocking(move || {
            oracle::Connection::connect(&username, &password, &connect_string)
                .map_err(|e| EngineError::Connection(format!("Failed to connect to Oracle: {}", e)))
        })
        .await
        .map_err(|e| EngineError::Internal(format!("Oracle connect task failed: {}", e)))?
    }

    async fn recycle(
        &self,
        _conn: &mut oracle::Connection,
        _metrics: &Metrics,
    ) -> RecycleResult<EngineError> {
        Ok(())
    }
}

pub struct OracleConnector {
    pool: Pool<OracleManager>,
    timeout: Duration,
}

impl OracleConnector {
    pub fn new(config: &ConnectionConfig, settings: &EngineSettings) -> Result<Self, EngineError> {
        let manager = OracleManager {
            username: config.username.clone(),
            password: config.password.clone().unwrap_or_default(),
            // EZConnect: //host:port/service_name
            connect_string: format!("//{}:{}/{}", config.host, config.port, config.database),
        };

        let pool = Pool::builder(manager)
            .max_size(settings.oracle_pool_size)
            .build()
            .map_err(|e| EngineError::Connection(format!("Failed to create Oracle pool: {}", e)))?;

        tracing::debug!("Created Oracle pool for {}", config.masked());

        Ok(Self {
            pool,
            timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    /// Run one statement on a pooled connection inside spawn_blocking,
    /// converting each row to a JSON object keyed by column name.
    async fn run(&self, sql: String) -> Result<Vec<Value>, EngineError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| EngineError::Connection(format!("Failed to get Oracle connection: {}", e)))?;

        let task = tokio::task::spawn_blocking(move || -> Result<Vec<Value>, EngineError> {
            let rows = conn
                .query(&sql, &[])
                .map_err(|e| EngineError::Execution(format!("Query execution failed: {}", e)))?;

            let column_names: Vec<String> = rows
                .column_info()
                .iter()
                .map(|info| info.name().to_string())
                .collect();

            let mut json_rows = Vec::new();
            for row_result in rows {
                let row = row_result
                    .map_err(|e| EngineError::Execution(format!("Row fetch failed: {}", e)))?;
                let mut row_obj = serde_json::Map::new();
                for (idx, name) in column_names.iter().enumerate() {
                    row_obj.insert(name.clone(), oracle_value_to_json(&row, idx));
                }
                json_rows.push(Value::Object(row_obj));
            }
            Ok(json_rows)
        });

        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| {
                EngineError::Execution(format!(
                    "Query timeout after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| EngineError::Internal(format!("Oracle query task failed: {}", e)))?
    }

    fn first_count(rows: &[Value]) -> u64 {
        rows.first()
            .and_then(|row| row.as_object())
            .and_then(|obj| obj.values().next())
            .and_then(|value| match value {
                Value::Number(n) => n.as_f64().map(|f| f as u64),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(0)
    }
}

/// Numbers first, then the string form; Oracle reports everything else
/// (dates, CLOBs) as strings well enough for tabular output.
fn oracle_value_to_json(row: &oracle::Row, idx: usize) -> Value {
    if let Ok(v) = row.get::<usize, Option<f64>>(idx) {
        return v.map(|f| json!(f)).unwrap_or(Value::Null);
    }
    match row.get::<usize, Option<String>>(idx) {
        Ok(Some(s)) => json!(s),
        _ => Value::Null,
    }
}

#[async_trait::async_trait]
impl DataConnector for OracleConnector {
    fn engine_type(&self) -> EngineType {
        EngineType::Oracle
    }

    async fn query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryResult, EngineError> {
        let generator = SqlGenerator::new(&OracleDialect);
        let sql = generator.select_sql(dataset, params)?;
        let count_sql = generator.count_sql(dataset, params)?;

        let start_time = Instant::now();

        let rows = self.run(sql.clone()).await?;
        let count_rows = self.run(count_sql).await?;

        let total_count = Self::first_count(&count_rows);
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        Ok(QueryResult::new(rows, total_count, execution_time_ms, Some(sql)))
    }

    fn preview_query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryPreview, EngineError> {
        let query_text = SqlGenerator::new(&OracleDialect).select_sql(dataset, params)?;
        Ok(QueryPreview { query_text })
    }

    async fn list_schemas(&self) -> Result<Vec<String>, EngineError> {
        let rows = self
            .run(
                "SELECT USERNAME FROM ALL_USERS WHERE ORACLE_MAINTAINED = 'N' ORDER BY USERNAME"
                    .to_string(),
            )
            .await
            .map_err(metadata_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("USERNAME").and_then(Value::as_str))
            .map(String::from)
            .collect())
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError> {
        let sql = match schema {
            Some(schema) => format!(
                "SELECT OWNER, TABLE_NAME FROM ALL_TABLES WHERE OWNER = '{}' ORDER BY TABLE_NAME",
                OracleDialect.escape_string(schema)
            ),
            None => "SELECT OWNER, TABLE_NAME FROM ALL_TABLES
                     WHERE OWNER IN (SELECT USERNAME FROM ALL_USERS WHERE ORACLE_MAINTAINED = 'N')
                     ORDER BY OWNER, TABLE_NAME"
                .to_string(),
        };
        let rows = self.run(sql).await.map_err(metadata_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(TableInfo {
                    schema: row.get("OWNER").and_then(Value::as_str).map(String::from),
                    name: row.get("TABLE_NAME")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn list_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError> {
        let mut sql = format!(
            "SELECT COLUMN_NAME, DATA_TYPE FROM ALL_TAB_COLUMNS WHERE TABLE_NAME = '{}'",
            OracleDialect.escape_string(table)
        );
        if let Some(schema) = schema {
            sql.push_str(&format!(
                " AND OWNER = '{}'",
                OracleDialect.escape_string(schema)
            ));
        }
        sql.push_str(" ORDER BY COLUMN_ID");

        let rows = self.run(sql).await.map_err(metadata_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(ColumnInfo {
                    name: row.get("COLUMN_NAME")?.as_str()?.to_string(),
                    data_type: row.get("DATA_TYPE")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.pool.close();
        Ok(())
    }
}

fn metadata_error(err: EngineError) -> EngineError {
    match err {
        EngineError::Execution(msg) => EngineError::Metadata(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_pagination() {
        assert_eq!(
            OracleDialect.pagination_clause(10, 20),
            "OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }

    #[test]
    fn test_count_wrap_has_no_as_keyword() {
        let wrapped = OracleDialect.count_wrapped("SELECT 1 FROM DUAL");
        assert_eq!(wrapped, "SELECT COUNT(*) FROM (SELECT 1 FROM DUAL) sub");
    }

    #[test]
    fn test_first_count() {
        let rows = vec![serde_json::json!({"COUNT(*)": 12.0})];
        assert_eq!(OracleConnector::first_count(&rows), 12);
        assert_eq!(OracleConnector::first_count(&[]), 0);
    }
}
