// SQL Server connector over TDS (tiberius), pooled through a deadpool
// custom manager like the Oracle connector.
use deadpool::managed::{Manager, Metrics, Pool, RecycleResult};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tiberius::{AuthMethod, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    ColumnInfo, ConnectionConfig, Dataset, QueryParams, QueryPreview, QueryResult, TableInfo,
};
use crate::services::database::{DataConnector, EngineType};
use crate::services::sql_builder::{SqlDialect, SqlGenerator};

type TdsClient = tiberius::Client<Compat<TcpStream>>;

/// T-SQL dialect: bracket quoting, OFFSET/FETCH pagination that requires an
/// ORDER BY, and no ORDER BY inside derived tables.
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn quote_pair(&self) -> (&'static str, &'static str) {
        ("[", "]")
    }

    fn pagination_clause(&self, limit: u64, offset: u64) -> String {
        format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
    }

    fn requires_order_for_pagination(&self) -> bool {
        true
    }

    fn order_allowed_in_subquery(&self) -> bool {
        false
    }
}

pub struct MssqlManager {
    config: Config,
}

impl Manager for MssqlManager {
    type Type = TdsClient;
    type Error = EngineError;

    async fn create(&self) -> Result<TdsClient, EngineError> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(|e| EngineError::Connection(format!("Failed to reach SQL Server: {}", e)))?;
        tcp.set_nodelay(true)
            .map_err(|e| EngineError::Connection(format!("Failed to configure socket: {}", e)))?;

        tiberius::Client::connect(self.config.clone(), tcp.compat_write())
            .await
            .map_err(|e| EngineError::Connection(format!("Failed to connect to SQL Server: {}", e)))
    }

    async fn recycle(
        &self,
        _client: &mut TdsClient,
        _metrics: &Metrics,
    ) -> RecycleResult<EngineError> {
        Ok(())
    }
}

pub struct SqlServerConnector {
    pool: Pool<MssqlManager>,
    timeout: Duration,
}

impl SqlServerConnector {
    pub fn new(config: &ConnectionConfig, settings: &EngineSettings) -> Result<Self, EngineError> {
        let mut tds_config = Config::new();
        tds_config.host(&config.host);
        tds_config.port(config.port);
        tds_config.database(&config.database);
        tds_config.authentication(AuthMethod::sql_server(
            &config.username,
            config.password.as_deref().unwrap_or(""),
        ));
        tds_config.trust_cert();

        let pool = Pool::builder(MssqlManager { config: tds_config })
            .max_size(settings.sqlserver_pool_size)
            .build()
            .map_err(|e| {
                EngineError::Connection(format!("Failed to create SQL Server pool: {}", e))
            })?;

        tracing::debug!("Created SQL Server pool for {}", config.masked());

        Ok(Self {
            pool,
            timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    async fn run(
        &self,
        sql: &str,
        params: &[&dyn tiberius::ToSql],
    ) -> Result<Vec<tiberius::Row>, EngineError> {
        let mut client = self.pool.get().await.map_err(|e| {
            EngineError::Connection(format!("Failed to get SQL Server connection: {}", e))
        })?;

        let work = async {
            client
                .query(sql, params)
                .await
                .map_err(|e| EngineError::Execution(format!("Query execution failed: {}", e)))?
                .into_first_result()
                .await
                .map_err(|e| EngineError::Execution(format!("Row fetch failed: {}", e)))
        };

        tokio::time::timeout(self.timeout, work).await.map_err(|_| {
            EngineError::Execution(format!(
                "Query timeout after {} seconds",
                self.timeout.as_secs()
            ))
        })?
    }

    fn rows_to_json(rows: &[tiberius::Row]) -> Vec<Value> {
        rows.iter()
            .map(|row| {
                let mut row_obj = serde_json::Map::new();
                for (idx, column) in row.columns().iter().enumerate() {
                    row_obj.insert(column.name().to_string(), mssql_value_to_json(row, idx));
                }
                Value::Object(row_obj)
            })
            .collect()
    }

    fn first_count(rows: &[tiberius::Row]) -> u64 {
        let Some(row) = rows.first() else {
            return 0;
        };
        if let Ok(Some(v)) = row.try_get::<i32, _>(0) {
            return v.max(0) as u64;
        }
        if let Ok(Some(v)) = row.try_get::<i64, _>(0) {
            return v.max(0) as u64;
        }
        0
    }
}

/// Decode one cell by trying the common TDS types widest-first, falling
/// back to the string form.
fn mssql_value_to_json(row: &tiberius::Row, idx: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return json!(v.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    Value::Null
}

#[async_trait::async_trait]
impl DataConnector for SqlServerConnector {
    fn engine_type(&self) -> EngineType {
        EngineType::SqlServer
    }

    async fn query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryResult, EngineError> {
        let generator = SqlGenerator::new(&SqlServerDialect);
        let sql = generator.select_sql(dataset, params)?;
        let count_sql = generator.count_sql(dataset, params)?;

        let start_time = Instant::now();

        let rows = self.run(&sql, &[]).await?;
        let count_rows = self.run(&count_sql, &[]).await?;

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
        let query_text = SqlGenerator::new(&SqlServerDialect).select_sql(dataset, params)?;
        Ok(QueryPreview { query_text })
    }

    async fn list_schemas(&self) -> Result<Vec<String>, EngineError> {
        let rows = self
            .run(
                "SELECT name FROM sys.schemas
                 WHERE name NOT IN ('sys', 'guest', 'INFORMATION_SCHEMA')
                   AND name NOT LIKE 'db[_]%'
                 ORDER BY name",
                &[],
            )
            .await
            .map_err(metadata_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<&str, _>(0).ok().flatten())
            .map(String::from)
            .collect())
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError> {
        let rows = match schema {
            Some(schema) => {
                self.run(
                    "SELECT s.name, t.name FROM sys.tables t
                     JOIN sys.schemas s ON t.schema_id = s.schema_id
                     WHERE s.name = @P1
                     ORDER BY t.name",
                    &[&schema],
                )
                .await
            }
            None => {
                self.run(
                    "SELECT s.name, t.name FROM sys.tables t
                     JOIN sys.schemas s ON t.schema_id = s.schema_id
                     WHERE s.name NOT IN ('sys', 'guest', 'INFORMATION_SCHEMA')
                     ORDER BY s.name, t.name",
                    &[],
                )
                .await
            }
        }
        .map_err(metadata_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(TableInfo {
                    schema: row.try_get::<&str, _>(0).ok().flatten().map(String::from),
                    name: row.try_get::<&str, _>(1).ok().flatten()?.to_string(),
                })
            })
            .collect())
    }

    async fn list_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError> {
        let schema = schema.unwrap_or("dbo");
        let rows = self
            .run(
                "SELECT c.name, ty.name FROM sys.columns c
                 JOIN sys.types ty ON c.user_type_id = ty.user_type_id
                 JOIN sys.tables t ON c.object_id = t.object_id
                 JOIN sys.schemas s ON t.schema_id = s.schema_id
                 WHERE t.name = @P1 AND s.name = @P2
                 ORDER BY c.column_id",
                &[&table, &schema],
            )
            .await
            .map_err(metadata_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(ColumnInfo {
                    name: row.try_get::<&str, _>(0).ok().flatten()?.to_string(),
                    data_type: row.try_get::<&str, _>(1).ok().flatten()?.to_string(),
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
            SqlServerDialect.pagination_clause(10, 0),
            "OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }

    #[test]
    fn test_dialect_quoting() {
        assert_eq!(SqlServerDialect.quote_identifier("region"), "[region]");
        assert_eq!(SqlServerDialect.quote_identifier("o.region"), "o.region");
    }

    #[test]
    fn test_dialect_pagination_constraints() {
        assert!(SqlServerDialect.requires_order_for_pagination());
        assert!(!SqlServerDialect.order_allowed_in_subquery());
    }
}
