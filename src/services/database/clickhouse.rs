// ClickHouse connector using the HTTP interface.
// Statements are POSTed with FORMAT JSON so responses come back as plain
// JSON objects; the client pool is reqwest's internal one.
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    ColumnInfo, ConnectionConfig, Dataset, QueryParams, QueryPreview, QueryResult, TableInfo,
};
use crate::services::database::{DataConnector, EngineType};
use crate::services::sql_builder::{SqlDialect, SqlGenerator};

/// ClickHouse SQL dialect: backtick quoting, `LIMIT offset, count`,
/// backslash-aware string escaping.
pub struct ClickHouseDialect;

impl SqlDialect for ClickHouseDialect {
    fn quote_pair(&self) -> (&'static str, &'static str) {
        ("`", "`")
    }

    fn pagination_clause(&self, limit: u64, offset: u64) -> String {
        format!("LIMIT {}, {}", offset, limit)
    }

    fn escape_string(&self, value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }
}

#[derive(Debug, Deserialize)]
struct ClickHouseResponse {
    #[serde(default)]
    data: Vec<Value>,
}

pub struct ClickHouseConnector {
    client: Client,
    base_url: String,
    database: String,
    username: String,
    password: Option<String>,
    timeout: Duration,
}

impl ClickHouseConnector {
    pub fn new(config: &ConnectionConfig, settings: &EngineSettings) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.query_timeout_secs))
            .build()
            .map_err(|e| EngineError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("Created ClickHouse HTTP client for {}", config.masked());

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", config.host, config.port),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    /// POST one statement and decode the FORMAT JSON response.
    async fn execute(&self, sql: &str) -> Result<ClickHouseResponse, EngineError> {
        let mut request = self
            .client
            .post(&self.base_url)
            .query(&[
                ("database", self.database.as_str()),
                // Plain numbers instead of quoted 64-bit integers.
                ("output_format_json_quote_64bit_integers", "0"),
            ])
            .body(format!("{} FORMAT JSON", sql));

        if !self.username.is_empty() {
            request = request.header("X-ClickHouse-User", &self.username);
            if let Some(password) = &self.password {
                request = request.header("X-ClickHouse-Key", password);
            }
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                EngineError::Execution(format!(
                    "Query timeout after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| EngineError::Execution(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EngineError::Execution(format!(
                "ClickHouse query failed ({}): {}",
                status,
                error_body.trim()
            )));
        }

        response
            .json::<ClickHouseResponse>()
            .await
            .map_err(|e| EngineError::Execution(format!("Failed to parse ClickHouse response: {}", e)))
    }

    /// First value of the first row, however the count column is named.
    fn first_count(response: &ClickHouseResponse) -> u64 {
        response
            .data
            .first()
            .and_then(|row| row.as_object())
            .and_then(|obj| obj.values().next())
            .map(count_value)
            .unwrap_or(0)
    }

    fn escape(value: &str) -> String {
        ClickHouseDialect.escape_string(value)
    }
}

fn count_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[async_trait::async_trait]
impl DataConnector for ClickHouseConnector {
    fn engine_type(&self) -> EngineType {
        EngineType::ClickHouse
    }

    async fn query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryResult, EngineError> {
        let generator = SqlGenerator::new(&ClickHouseDialect);
        let sql = generator.select_sql(dataset, params)?;
        let count_sql = generator.count_sql(dataset, params)?;

        let start_time = Instant::now();

        let response = self.execute(&sql).await?;
        let count_response = self.execute(&count_sql).await?;

        let total_count = Self::first_count(&count_response);
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        Ok(QueryResult::new(
            response.data,
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
        let query_text = SqlGenerator::new(&ClickHouseDialect).select_sql(dataset, params)?;
        Ok(QueryPreview { query_text })
    }

    async fn list_schemas(&self) -> Result<Vec<String>, EngineError> {
        let response = self
            .execute(
                "SELECT name FROM system.databases
                 WHERE name NOT IN ('system', 'INFORMATION_SCHEMA', 'information_schema')
                 ORDER BY name",
            )
            .await
            .map_err(metadata_error)?;

        Ok(response
            .data
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str))
            .map(String::from)
            .collect())
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError> {
        let database = schema.unwrap_or(&self.database);
        let sql = format!(
            "SELECT database, name FROM system.tables WHERE database = '{}' ORDER BY name",
            Self::escape(database)
        );
        let response = self.execute(&sql).await.map_err(metadata_error)?;

        Ok(response
            .data
            .iter()
            .filter_map(|row| {
                Some(TableInfo {
                    schema: row.get("database").and_then(Value::as_str).map(String::from),
                    name: row.get("name")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn list_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError> {
        let database = schema.unwrap_or(&self.database);
        let sql = format!(
            "SELECT name, type FROM system.columns
             WHERE database = '{}' AND table = '{}' ORDER BY position",
            Self::escape(database),
            Self::escape(table)
        );
        let response = self.execute(&sql).await.map_err(metadata_error)?;

        Ok(response
            .data
            .iter()
            .filter_map(|row| {
                Some(ColumnInfo {
                    name: row.get("name")?.as_str()?.to_string(),
                    data_type: row.get("type")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn close(&self) -> Result<(), EngineError> {
        // reqwest tears its pool down on drop.
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
    use serde_json::json;

    #[test]
    fn test_dialect_pagination() {
        assert_eq!(ClickHouseDialect.pagination_clause(10, 30), "LIMIT 30, 10");
    }

    #[test]
    fn test_count_extraction_handles_quoted_numbers() {
        let response = ClickHouseResponse {
            data: vec![json!({"count()": "5"})],
        };
        assert_eq!(ClickHouseConnector::first_count(&response), 5);

        let response = ClickHouseResponse {
            data: vec![json!({"count()": 7})],
        };
        assert_eq!(ClickHouseConnector::first_count(&response), 7);

        let empty = ClickHouseResponse { data: vec![] };
        assert_eq!(ClickHouseConnector::first_count(&empty), 0);
    }

    #[test]
    fn test_escape_for_catalog_queries() {
        assert_eq!(ClickHouseConnector::escape("it's"), "it\\'s");
    }
}
