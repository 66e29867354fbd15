// Elasticsearch connector over the REST API. Filters become bool queries,
// grouping becomes a composite aggregation whose sources are named by
// dimension identifiers. Composite aggregations have no offset, so
// pagination is emulated: request min(limit+offset, 10000) buckets, sort
// and slice client-side, and stop at the 10,000-bucket ceiling.
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    AggregationType, ColumnInfo, ConnectionConfig, Dataset, Filter, FilterOperator, QueryParams,
    QueryPreview, QueryResult, SortDirection, TableInfo,
};
use crate::services::database::{DataConnector, EngineType};
use crate::services::sql_builder::text_of;

/// Hard ceiling of a composite aggregation request.
const COMPOSITE_MAX_BUCKETS: u64 = 10_000;

pub struct ElasticsearchConnector {
    client: Client,
    base_url: String,
    username: String,
    password: Option<String>,
    timeout: Duration,
}

impl ElasticsearchConnector {
    pub fn new(config: &ConnectionConfig, settings: &EngineSettings) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.query_timeout_secs))
            .build()
            .map_err(|e| EngineError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("Created Elasticsearch client for {}", config.masked());

        Ok(Self {
            client,
            base_url: format!("http://{}:{}", config.host, config.port),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, EngineError> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, self.password.as_deref());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                EngineError::Metadata(format!(
                    "Request timeout after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| EngineError::Metadata(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EngineError::Metadata(format!(
                "Elasticsearch request failed ({}): {}",
                status,
                body.trim()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Metadata(format!("Failed to parse response: {}", e)))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value, EngineError> {
        let mut request = self
            .client
            .post(format!("{}/{}/_search", self.base_url, index))
            .json(body);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, self.password.as_deref());
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
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EngineError::Execution(format!(
                "Elasticsearch query failed ({}): {}",
                status,
                body.trim()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Execution(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait::async_trait]
impl DataConnector for ElasticsearchConnector {
    fn engine_type(&self) -> EngineType {
        EngineType::Elasticsearch
    }

    async fn query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryResult, EngineError> {
        let body = build_search_body(dataset, params)?;
        let query_text = body.to_string();
        let start_time = Instant::now();

        let response = self.search(&dataset.base_table, &body).await?;

        let (rows, total_count) = if !params.dimensions.is_empty() {
            let mut rows = bucket_rows(&response, params);
            sort_rows(&mut rows, params);
            let rows = paginate_rows(rows, params.offset.unwrap_or(0), params.limit);

            if bucket_budget(params).1 {
                tracing::warn!(
                    "Composite request clamped to {} buckets; results past the cap are truncated",
                    COMPOSITE_MAX_BUCKETS
                );
            }

            // Distinct-group total, estimated by a second composite request
            // capped at the bucket ceiling.
            let count_body = build_group_count_body(dataset, params)?;
            let count_response = self.search(&dataset.base_table, &count_body).await?;
            let total = count_response
                .pointer("/aggregations/grouping/buckets")
                .and_then(Value::as_array)
                .map(|buckets| buckets.len() as u64)
                .unwrap_or(0);
            (rows, total)
        } else if !params.metrics.is_empty() {
            let mut row = Map::new();
            for metric in &params.metrics {
                let key = metric.output_key();
                let value = response
                    .pointer(&format!("/aggregations/{}/value", key))
                    .cloned()
                    .unwrap_or(Value::Null);
                row.insert(key, value);
            }
            (vec![Value::Object(row)], 1)
        } else {
            let rows: Vec<Value> = response
                .pointer("/hits/hits")
                .and_then(Value::as_array)
                .map(|hits| {
                    hits.iter()
                        .filter_map(|hit| hit.get("_source").cloned())
                        .collect()
                })
                .unwrap_or_default();
            let total = response
                .pointer("/hits/total/value")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            (rows, total)
        };

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(QueryResult::new(
            rows,
            total_count,
            execution_time_ms,
            Some(query_text),
        ))
    }

    fn preview_query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryPreview, EngineError> {
        Ok(QueryPreview {
            query_text: build_search_body(dataset, params)?.to_string(),
        })
    }

    async fn list_schemas(&self) -> Result<Vec<String>, EngineError> {
        // Indices are flat; there is no schema level to report.
        Ok(vec![])
    }

    async fn list_tables(&self, _schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError> {
        let response = self.get_json("/_cat/indices?format=json").await?;

        let mut tables: Vec<TableInfo> = response
            .as_array()
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|entry| entry.get("index").and_then(Value::as_str))
                    .filter(|name| !name.starts_with('.'))
                    .map(|name| TableInfo {
                        schema: None,
                        name: name.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    async fn list_columns(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError> {
        let response = self.get_json(&format!("/{}/_mapping", table)).await?;

        let properties = response
            .as_object()
            .and_then(|indices| indices.values().next())
            .and_then(|index| index.pointer("/mappings/properties"))
            .and_then(Value::as_object);

        let mut columns = Vec::new();
        if let Some(properties) = properties {
            walk_mapping("", properties, &mut columns);
        }
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(columns)
    }

    async fn close(&self) -> Result<(), EngineError> {
        // reqwest tears its pool down on drop.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure query-DSL construction
// ---------------------------------------------------------------------------

fn obj(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn single_value(operator: FilterOperator, values: &[Value]) -> Result<Value, EngineError> {
    values
        .first()
        .cloned()
        .ok_or_else(|| EngineError::Validation(format!("{:?} requires a value", operator)))
}

fn must_not(clause: Value) -> Value {
    json!({ "bool": { "must_not": [clause] } })
}

fn leaf_to_query(
    path: &str,
    operator: FilterOperator,
    values: &[Value],
) -> Result<Value, EngineError> {
    match operator {
        FilterOperator::Equals => Ok(obj("term", obj(path, single_value(operator, values)?))),
        FilterOperator::NotEquals => Ok(must_not(obj(
            "term",
            obj(path, single_value(operator, values)?),
        ))),
        FilterOperator::Contains => {
            let value = single_value(operator, values)?;
            Ok(obj(
                "wildcard",
                obj(path, json!(format!("*{}*", text_of(&value)))),
            ))
        }
        FilterOperator::NotContains => {
            let value = single_value(operator, values)?;
            Ok(must_not(obj(
                "wildcard",
                obj(path, json!(format!("*{}*", text_of(&value)))),
            )))
        }
        FilterOperator::GreaterThan => Ok(obj(
            "range",
            obj(path, json!({ "gt": single_value(operator, values)? })),
        )),
        FilterOperator::LessThan => Ok(obj(
            "range",
            obj(path, json!({ "lt": single_value(operator, values)? })),
        )),
        FilterOperator::Between => {
            if values.len() != 2 {
                return Err(EngineError::Validation(format!(
                    "between requires exactly two values, got {}",
                    values.len()
                )));
            }
            // Inclusive on both ends, matching the SQL rendering.
            Ok(obj(
                "range",
                obj(path, json!({ "gte": values[0], "lte": values[1] })),
            ))
        }
        FilterOperator::In => Ok(obj("terms", obj(path, Value::Array(values.to_vec())))),
        FilterOperator::NotIn => Ok(must_not(obj(
            "terms",
            obj(path, Value::Array(values.to_vec())),
        ))),
        FilterOperator::IsNull => Ok(must_not(json!({ "exists": { "field": path } }))),
        FilterOperator::IsNotNull => Ok(json!({ "exists": { "field": path } })),
    }
}

fn filter_node_to_query(dataset: &Dataset, filter: &Filter) -> Result<Option<Value>, EngineError> {
    match filter {
        Filter::Group { op, children } => {
            let clauses: Vec<Value> = children
                .iter()
                .map(|child| filter_node_to_query(dataset, child))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect();
            if clauses.is_empty() {
                return Ok(None);
            }
            Ok(Some(match op {
                crate::models::BooleanOp::And => json!({ "bool": { "must": clauses } }),
                crate::models::BooleanOp::Or => {
                    json!({ "bool": { "should": clauses, "minimum_should_match": 1 } })
                }
            }))
        }
        Filter::Leaf {
            field,
            operator,
            values,
        } => {
            let path = dataset.resolve_field(field)?.expression.clone();
            leaf_to_query(&path, *operator, values).map(Some)
        }
    }
}

fn filter_to_query(dataset: &Dataset, filter: Option<&Filter>) -> Result<Value, EngineError> {
    match filter {
        Some(filter) => Ok(filter_node_to_query(dataset, filter)?
            .unwrap_or_else(|| json!({ "match_all": {} }))),
        None => Ok(json!({ "match_all": {} })),
    }
}

fn metric_aggregation(aggregation: AggregationType, field: &str) -> Value {
    let body = obj("field", json!(field));
    match aggregation {
        AggregationType::Sum => obj("sum", body),
        AggregationType::Count => obj("value_count", body),
        AggregationType::CountDistinct => obj("cardinality", body),
        AggregationType::Avg => obj("avg", body),
        AggregationType::Max => obj("max", body),
        AggregationType::Min => obj("min", body),
    }
}

fn metric_aggregations(dataset: &Dataset, params: &QueryParams) -> Result<Value, EngineError> {
    let mut aggs = Map::new();
    for metric in &params.metrics {
        let field = dataset.resolve_field(&metric.field)?;
        aggs.insert(
            metric.output_key(),
            metric_aggregation(metric.aggregation, &field.expression),
        );
    }
    Ok(Value::Object(aggs))
}

/// Requested composite size and whether the ceiling clamped it.
fn bucket_budget(params: &QueryParams) -> (u64, bool) {
    let requested = match params.limit {
        Some(limit) => limit.saturating_add(params.offset.unwrap_or(0)),
        None => COMPOSITE_MAX_BUCKETS,
    };
    (
        requested.min(COMPOSITE_MAX_BUCKETS).max(1),
        requested > COMPOSITE_MAX_BUCKETS,
    )
}

fn composite_sources(dataset: &Dataset, params: &QueryParams) -> Result<Vec<Value>, EngineError> {
    params
        .dimensions
        .iter()
        .map(|dimension| {
            let field = dataset.resolve_field(&dimension.field)?;
            Ok(obj(
                &field.identifier,
                obj("terms", obj("field", json!(field.expression))),
            ))
        })
        .collect()
}

/// The complete search body for one request.
pub(crate) fn build_search_body(dataset: &Dataset, params: &QueryParams) -> Result<Value, EngineError> {
    let query = filter_to_query(dataset, params.filter.as_ref())?;

    if !params.dimensions.is_empty() {
        let (size, _) = bucket_budget(params);
        let mut grouping = Map::new();
        grouping.insert(
            "composite".to_string(),
            json!({
                "size": size,
                "sources": composite_sources(dataset, params)?,
            }),
        );
        if !params.metrics.is_empty() {
            grouping.insert("aggs".to_string(), metric_aggregations(dataset, params)?);
        }
        return Ok(json!({
            "query": query,
            "size": 0,
            "aggs": { "grouping": Value::Object(grouping) },
        }));
    }

    if !params.metrics.is_empty() {
        return Ok(json!({
            "query": query,
            "size": 0,
            "track_total_hits": true,
            "aggs": metric_aggregations(dataset, params)?,
        }));
    }

    let mut body = Map::new();
    body.insert("query".to_string(), query);
    body.insert("track_total_hits".to_string(), json!(true));
    if let Some(offset) = params.offset {
        body.insert("from".to_string(), json!(offset));
    }
    if let Some(limit) = params.limit {
        body.insert("size".to_string(), json!(limit));
    }
    Ok(Value::Object(body))
}

/// Companion request counting distinct groups: the same composite sources,
/// no metric sub-aggregations, capped at the bucket ceiling.
pub(crate) fn build_group_count_body(
    dataset: &Dataset,
    params: &QueryParams,
) -> Result<Value, EngineError> {
    let query = filter_to_query(dataset, params.filter.as_ref())?;
    Ok(json!({
        "query": query,
        "size": 0,
        "aggs": {
            "grouping": {
                "composite": {
                    "size": COMPOSITE_MAX_BUCKETS,
                    "sources": composite_sources(dataset, params)?,
                }
            }
        },
    }))
}

/// Flatten composite buckets into rows keyed by dimension identifiers and
/// metric stable keys.
fn bucket_rows(response: &Value, params: &QueryParams) -> Vec<Value> {
    response
        .pointer("/aggregations/grouping/buckets")
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .map(|bucket| {
                    let mut row = Map::new();
                    if let Some(key) = bucket.get("key").and_then(Value::as_object) {
                        for (name, value) in key {
                            row.insert(name.clone(), value.clone());
                        }
                    }
                    for metric in &params.metrics {
                        let key = metric.output_key();
                        let value = bucket
                            .pointer(&format!("/{}/value", key))
                            .cloned()
                            .unwrap_or(Value::Null);
                        row.insert(key, value);
                    }
                    Value::Object(row)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Client-side ordering over bucket rows; unresolvable keys compare as
/// absent (Null), never dropped.
fn sort_rows(rows: &mut [Value], params: &QueryParams) {
    if params.order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in &params.order_by {
            let left = a.get(&order.field).unwrap_or(&Value::Null);
            let right = b.get(&order.field).unwrap_or(&Value::Null);
            let ordering = match order.direction {
                SortDirection::Asc => compare_json(left, right),
                SortDirection::Desc => compare_json(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Offset/limit emulation over the fetched bucket rows.
fn paginate_rows(rows: Vec<Value>, offset: u64, limit: Option<u64>) -> Vec<Value> {
    let iter = rows.into_iter().skip(offset as usize);
    match limit {
        Some(limit) => iter.take(limit as usize).collect(),
        None => iter.collect(),
    }
}

/// Recursive walk of a mapping's properties tree, flattening nested paths
/// with '.' and upper-casing the type name.
fn walk_mapping(prefix: &str, properties: &Map<String, Value>, columns: &mut Vec<ColumnInfo>) {
    for (name, property) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        if let Some(nested) = property.get("properties").and_then(Value::as_object) {
            walk_mapping(&path, nested, columns);
        } else if let Some(data_type) = property.get("type").and_then(Value::as_str) {
            columns.push(ColumnInfo {
                name: path,
                data_type: data_type.to_uppercase(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BooleanOp, DatasetField, Dimension, Metric, OrderBy};

    fn dataset() -> Dataset {
        Dataset {
            name: "sales".to_string(),
            base_table: "orders".to_string(),
            base_schema: None,
            fields: vec![
                DatasetField {
                    identifier: "region".to_string(),
                    display_name: "Region".to_string(),
                    data_type: None,
                    expression: "region.keyword".to_string(),
                },
                DatasetField {
                    identifier: "amount".to_string(),
                    display_name: "Amount".to_string(),
                    data_type: None,
                    expression: "amount".to_string(),
                },
            ],
            joins: vec![],
        }
    }

    #[test]
    fn test_filter_group_maps_to_bool_must() {
        let ds = dataset();
        let filter = Filter::Group {
            op: BooleanOp::And,
            children: vec![
                Filter::Leaf {
                    field: "region".to_string(),
                    operator: FilterOperator::Equals,
                    values: vec![json!("east")],
                },
                Filter::Leaf {
                    field: "amount".to_string(),
                    operator: FilterOperator::GreaterThan,
                    values: vec![json!(10)],
                },
            ],
        };
        let query = filter_to_query(&ds, Some(&filter)).unwrap();
        assert_eq!(
            query,
            json!({ "bool": { "must": [
                { "term": { "region.keyword": "east" } },
                { "range": { "amount": { "gt": 10 } } },
            ] } })
        );
    }

    #[test]
    fn test_or_group_uses_should_with_minimum_match() {
        let ds = dataset();
        let filter = Filter::Group {
            op: BooleanOp::Or,
            children: vec![Filter::Leaf {
                field: "region".to_string(),
                operator: FilterOperator::IsNull,
                values: vec![],
            }],
        };
        let query = filter_to_query(&ds, Some(&filter)).unwrap();
        assert_eq!(
            query,
            json!({ "bool": {
                "should": [
                    { "bool": { "must_not": [ { "exists": { "field": "region.keyword" } } ] } }
                ],
                "minimum_should_match": 1
            } })
        );
    }

    #[test]
    fn test_between_maps_to_inclusive_range() {
        let query = leaf_to_query(
            "amount",
            FilterOperator::Between,
            &[json!(10), json!(20)],
        )
        .unwrap();
        assert_eq!(query, json!({ "range": { "amount": { "gte": 10, "lte": 20 } } }));

        let err = leaf_to_query("amount", FilterOperator::Between, &[json!(10)]).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_contains_uses_wildcard() {
        let query =
            leaf_to_query("region", FilterOperator::Contains, &[json!("ea")]).unwrap();
        assert_eq!(query, json!({ "wildcard": { "region": "*ea*" } }));
    }

    #[test]
    fn test_metrics_only_body() {
        let ds = dataset();
        let params = QueryParams {
            metrics: vec![Metric {
                field: "amount".to_string(),
                aggregation: AggregationType::CountDistinct,
                alias: None,
            }],
            ..QueryParams::default()
        };
        let body = build_search_body(&ds, &params).unwrap();
        assert_eq!(body["size"], json!(0));
        assert_eq!(
            body["aggs"]["amount_count_distinct"],
            json!({ "cardinality": { "field": "amount" } })
        );
    }

    #[test]
    fn test_composite_body_and_cap_boundary() {
        let ds = dataset();
        let params = QueryParams {
            dimensions: vec![Dimension {
                field: "region".to_string(),
                alias: Some("ignored".to_string()),
            }],
            metrics: vec![Metric {
                field: "amount".to_string(),
                aggregation: AggregationType::Sum,
                alias: None,
            }],
            limit: Some(5),
            offset: Some(9999),
            ..QueryParams::default()
        };
        let body = build_search_body(&ds, &params).unwrap();

        // limit + offset overflows the ceiling: clamp to 10,000 buckets.
        let composite = &body["aggs"]["grouping"]["composite"];
        assert_eq!(composite["size"], json!(10_000));
        assert_eq!(
            composite["sources"],
            json!([ { "region": { "terms": { "field": "region.keyword" } } } ])
        );
        assert_eq!(
            body["aggs"]["grouping"]["aggs"]["amount_sum"],
            json!({ "sum": { "field": "amount" } })
        );
        assert!(bucket_budget(&params).1);
    }

    #[test]
    fn test_pagination_at_cap_returns_at_most_remainder() {
        let rows: Vec<Value> = (0..10_000).map(|i| json!({ "region": i })).collect();
        let page = paginate_rows(rows, 9999, Some(5));
        assert_eq!(page.len(), 1);

        let empty = paginate_rows(vec![], 9999, Some(5));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_bucket_rows_and_sorting() {
        let params = QueryParams {
            dimensions: vec![Dimension {
                field: "region".to_string(),
                alias: None,
            }],
            metrics: vec![Metric {
                field: "amount".to_string(),
                aggregation: AggregationType::Sum,
                alias: None,
            }],
            order_by: vec![OrderBy {
                field: "amount_sum".to_string(),
                direction: SortDirection::Desc,
            }],
            ..QueryParams::default()
        };
        let response = json!({
            "aggregations": { "grouping": { "buckets": [
                { "key": { "region": "east" }, "amount_sum": { "value": 10.0 } },
                { "key": { "region": "west" }, "amount_sum": { "value": 30.0 } },
            ] } }
        });

        let mut rows = bucket_rows(&response, &params);
        sort_rows(&mut rows, &params);

        assert_eq!(rows[0], json!({ "region": "west", "amount_sum": 30.0 }));
        assert_eq!(rows[1], json!({ "region": "east", "amount_sum": 10.0 }));
    }

    #[test]
    fn test_group_count_body_has_no_pagination_dependence() {
        let ds = dataset();
        let mut params = QueryParams {
            dimensions: vec![Dimension {
                field: "region".to_string(),
                alias: None,
            }],
            limit: Some(2),
            offset: Some(3),
            ..QueryParams::default()
        };
        let body_a = build_group_count_body(&ds, &params).unwrap();
        params.limit = None;
        params.offset = None;
        let body_b = build_group_count_body(&ds, &params).unwrap();
        assert_eq!(body_a, body_b);
        assert_eq!(
            body_a["aggs"]["grouping"]["composite"]["size"],
            json!(COMPOSITE_MAX_BUCKETS)
        );
    }

    #[test]
    fn test_mapping_walk_flattens_and_uppercases() {
        let properties = json!({
            "amount": { "type": "double" },
            "customer": { "properties": { "name": { "type": "keyword" } } },
        });
        let mut columns = Vec::new();
        walk_mapping("", properties.as_object().unwrap(), &mut columns);
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            columns,
            vec![
                ColumnInfo {
                    name: "amount".to_string(),
                    data_type: "DOUBLE".to_string()
                },
                ColumnInfo {
                    name: "customer.name".to_string(),
                    data_type: "KEYWORD".to_string()
                },
            ]
        );
    }
}
