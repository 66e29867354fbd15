// MySQL connector using connection pooling for resource management.
// Also serves MariaDB, which speaks the same wire protocol.
use mysql_async::{prelude::*, Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row, Value as MySqlValue};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    ColumnInfo, ConnectionConfig, Dataset, QueryParams, QueryPreview, QueryResult, TableInfo,
};
use crate::services::database::{DataConnector, EngineType};
use crate::services::sql_builder::{SqlDialect, SqlGenerator};

/// MySQL SQL dialect: backtick quoting, `LIMIT offset, count` pagination,
/// backslash-aware string escaping.
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn quote_pair(&self) -> (&'static str, &'static str) {
        ("`", "`")
    }

    fn pagination_clause(&self, limit: u64, offset: u64) -> String {
        format!("LIMIT {}, {}", offset, limit)
    }

    fn escape_string(&self, value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "''")
    }
}

pub struct MySqlConnector {
    pool: Pool,
    database: String,
    timeout: Duration,
}

impl MySqlConnector {
    pub fn new(config: &ConnectionConfig, settings: &EngineSettings) -> Result<Self, EngineError> {
        let url = config.driver_url("mysql")?;
        let opts = Opts::from_url(url.as_str())
            .map_err(|e| EngineError::Configuration(format!("Invalid MySQL options: {}", e)))?;

        let constraints = PoolConstraints::new(1, settings.mysql_pool_size).ok_or_else(|| {
            EngineError::Configuration(format!(
                "Invalid MySQL pool size: {}",
                settings.mysql_pool_size
            ))
        })?;
        let opts = OptsBuilder::from_opts(opts)
            .pool_opts(PoolOpts::default().with_constraints(constraints));

        tracing::debug!("Creating MySQL pool for {}", config.masked());

        Ok(Self {
            pool: Pool::new(opts),
            database: config.database.clone(),
            timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<Conn, EngineError> {
        self.pool.get_conn().await.map_err(|e| {
            EngineError::Connection(format!("Failed to get MySQL connection from pool: {}", e))
        })
    }

    async fn run(&self, conn: &mut Conn, sql: &str) -> Result<Vec<Row>, EngineError> {
        tokio::time::timeout(self.timeout, conn.query(sql))
            .await
            .map_err(|_| {
                EngineError::Execution(format!(
                    "Query timeout after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| EngineError::Execution(format!("Query execution failed: {}", e)))
    }

    /// Helper function to convert MySQL Value to JSON Value
    fn mysql_value_to_json(mysql_val: MySqlValue) -> Value {
        match mysql_val {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => json!(s),
                Err(_) => Value::Null,
            },
            MySqlValue::Int(i) => json!(i),
            MySqlValue::UInt(u) => json!(u),
            MySqlValue::Float(f) => json!(f),
            MySqlValue::Double(d) => json!(d),
            MySqlValue::Date(y, m, d, h, min, s, _) => {
                json!(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    y, m, d, h, min, s
                ))
            }
            MySqlValue::Time(is_neg, d, h, m, s, _) => {
                let sign = if is_neg { "-" } else { "" };
                let total_hours = d * 24 + h as u32;
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }

    fn rows_to_json(rows: Vec<Row>) -> Vec<Value> {
        let mut json_rows = Vec::new();
        for row in rows {
            let mut row_obj = serde_json::Map::new();
            let columns = row.columns_ref();

            for (idx, column) in columns.iter().enumerate() {
                let column_name = column.name_str();
                let value: Value = match row.get_opt::<MySqlValue, usize>(idx) {
                    Some(Ok(mysql_val)) => Self::mysql_value_to_json(mysql_val),
                    _ => Value::Null,
                };
                row_obj.insert(column_name.to_string(), value);
            }
            json_rows.push(Value::Object(row_obj));
        }
        json_rows
    }

    fn first_count(rows: &[Row]) -> u64 {
        rows.first()
            .and_then(|row| row.get_opt::<u64, usize>(0))
            .and_then(|v| v.ok())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl DataConnector for MySqlConnector {
    fn engine_type(&self) -> EngineType {
        EngineType::MySql
    }

    async fn query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryResult, EngineError> {
        let generator = SqlGenerator::new(&MySqlDialect);
        let sql = generator.select_sql(dataset, params)?;
        let count_sql = generator.count_sql(dataset, params)?;

        let mut conn = self.get_conn().await?;
        let start_time = Instant::now();

        let rows = self.run(&mut conn, &sql).await?;
        let count_rows = self.run(&mut conn, &count_sql).await?;

        let total_count = Self::first_count(&count_rows);
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        Ok(QueryResult::new(
            Self::rows_to_json(rows),
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
        let query_text = SqlGenerator::new(&MySqlDialect).select_sql(dataset, params)?;
        Ok(QueryPreview { query_text })
    }

    async fn list_schemas(&self) -> Result<Vec<String>, EngineError> {
        let mut conn = self.get_conn().await?;
        conn.query(
            "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA
             WHERE SCHEMA_NAME NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
             ORDER BY SCHEMA_NAME",
        )
        .await
        .map_err(|e| EngineError::Metadata(format!("Failed to get schemas: {}", e)))
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError> {
        let mut conn = self.get_conn().await?;
        let rows: Vec<(String, String)> = match schema {
            Some(schema) => conn
                .exec(
                    r#"
                    SELECT TABLE_SCHEMA, TABLE_NAME
                    FROM information_schema.TABLES
                    WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA = ?
                    ORDER BY TABLE_NAME
                    "#,
                    (schema,),
                )
                .await,
            None => {
                conn.query(
                    r#"
                    SELECT TABLE_SCHEMA, TABLE_NAME
                    FROM information_schema.TABLES
                    WHERE TABLE_TYPE = 'BASE TABLE'
                      AND TABLE_SCHEMA NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
                    ORDER BY TABLE_SCHEMA, TABLE_NAME
                    "#,
                )
                .await
            }
        }
        .map_err(|e| EngineError::Metadata(format!("Failed to get tables: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(schema, name)| TableInfo {
                schema: Some(schema),
                name,
            })
            .collect())
    }

    async fn list_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError> {
        let mut conn = self.get_conn().await?;
        let schema = schema.unwrap_or(&self.database);

        let rows: Vec<(String, String)> = conn
            .exec(
                r#"
                SELECT COLUMN_NAME, DATA_TYPE
                FROM information_schema.COLUMNS
                WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                ORDER BY ORDINAL_POSITION
                "#,
                (schema, table),
            )
            .await
            .map_err(|e| EngineError::Metadata(format!("Failed to get columns: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type)| ColumnInfo { name, data_type })
            .collect())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| EngineError::Connection(format!("Failed to close MySQL pool: {}", e)))
    }
}
