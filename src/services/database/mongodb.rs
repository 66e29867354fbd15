// MongoDB connector. The shared query model is translated into native
// aggregation pipelines, not SQL: filters become $match documents, grouping
// becomes $group keyed by an object of dimension expressions, and
// count_distinct is emulated with $addToSet + $size since $group has no
// distinct-count accumulator. Pipeline construction is pure so previews and
// tests never need a server.
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::models::{
    AggregationType, ColumnInfo, ConnectionConfig, Dataset, Filter, FilterOperator, QueryParams,
    QueryPreview, QueryResult, SortDirection, TableInfo,
};
use crate::services::database::{DataConnector, EngineType};
use crate::services::sql_builder::text_of;

/// Documents sampled per collection for schema inference.
const SCHEMA_SAMPLE_SIZE: i64 = 50;

pub struct MongoConnector {
    client: Client,
    database: String,
    timeout: Duration,
}

impl MongoConnector {
    pub async fn connect(
        config: &ConnectionConfig,
        settings: &EngineSettings,
    ) -> Result<Self, EngineError> {
        let url = config.driver_url("mongodb")?;
        let client = Client::with_uri_str(url.as_str())
            .await
            .map_err(|e| EngineError::Connection(format!("Failed to connect to MongoDB: {}", e)))?;

        tracing::debug!("Created MongoDB client for {}", config.masked());

        Ok(Self {
            client,
            database: config.database.clone(),
            timeout: Duration::from_secs(settings.query_timeout_secs),
        })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.client.database(&self.database).collection(name)
    }

    async fn bounded<F, T>(&self, work: F) -> Result<T, EngineError>
    where
        F: std::future::Future<Output = Result<T, EngineError>>,
    {
        tokio::time::timeout(self.timeout, work).await.map_err(|_| {
            EngineError::Execution(format!(
                "Query timeout after {} seconds",
                self.timeout.as_secs()
            ))
        })?
    }

    /// Plain find with skip/limit; total via a separate countDocuments.
    async fn run_find(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<(Vec<Value>, u64), EngineError> {
        let filter = match_document(dataset, params.filter.as_ref())?;
        let collection = self.collection(&dataset.base_table);

        let mut find = collection.find(filter.clone());
        if let Some(sort) = find_sort_document(dataset, params) {
            find = find.sort(sort);
        }
        if let Some(offset) = params.offset {
            find = find.skip(offset);
        }
        if let Some(limit) = params.limit {
            find = find.limit(limit as i64);
        }

        let docs: Vec<Document> = self
            .bounded(async {
                find.await
                    .map_err(|e| EngineError::Execution(format!("Find failed: {}", e)))?
                    .try_collect()
                    .await
                    .map_err(|e| EngineError::Execution(format!("Cursor drain failed: {}", e)))
            })
            .await?;

        let total = self
            .bounded(async {
                collection
                    .count_documents(filter)
                    .await
                    .map_err(|e| EngineError::Execution(format!("Count failed: {}", e)))
            })
            .await?;

        Ok((docs.into_iter().map(document_to_value).collect(), total))
    }

    async fn run_pipeline(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, EngineError> {
        let collection = self.collection(collection);
        self.bounded(async {
            collection
                .aggregate(pipeline)
                .await
                .map_err(|e| EngineError::Execution(format!("Aggregation failed: {}", e)))?
                .try_collect()
                .await
                .map_err(|e| EngineError::Execution(format!("Cursor drain failed: {}", e)))
        })
        .await
    }
}

#[async_trait::async_trait]
impl DataConnector for MongoConnector {
    fn engine_type(&self) -> EngineType {
        EngineType::MongoDb
    }

    async fn query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryResult, EngineError> {
        let preview = self.preview_query(dataset, params)?;
        let start_time = Instant::now();

        if params.dimensions.is_empty() && params.metrics.is_empty() {
            let (rows, total_count) = self.run_find(dataset, params).await?;
            let execution_time_ms = start_time.elapsed().as_millis() as u64;
            return Ok(QueryResult::new(
                rows,
                total_count,
                execution_time_ms,
                Some(preview.query_text),
            ));
        }

        let pipeline = build_pipeline(dataset, params)?;
        let docs = self.run_pipeline(&dataset.base_table, pipeline).await?;
        let rows: Vec<Value> = docs.into_iter().map(document_to_value).collect();

        let total_count = if params.dimensions.is_empty() {
            // A single $group row; zero rows when the collection is empty.
            rows.len() as u64
        } else {
            let count_pipeline = build_count_pipeline(dataset, params)?;
            let count_docs = self.run_pipeline(&dataset.base_table, count_pipeline).await?;
            count_docs
                .first()
                .and_then(|d| d.get("total"))
                .and_then(bson_count)
                .unwrap_or(0)
        };

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(QueryResult::new(
            rows,
            total_count,
            execution_time_ms,
            Some(preview.query_text),
        ))
    }

    fn preview_query(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
    ) -> Result<QueryPreview, EngineError> {
        Ok(QueryPreview {
            query_text: preview_text(dataset, params)?,
        })
    }

    async fn list_schemas(&self) -> Result<Vec<String>, EngineError> {
        Ok(vec![self.database.clone()])
    }

    async fn list_tables(&self, _schema: Option<&str>) -> Result<Vec<TableInfo>, EngineError> {
        let names = self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| EngineError::Metadata(format!("Failed to list collections: {}", e)))?;

        let mut tables: Vec<TableInfo> = names
            .into_iter()
            .map(|name| TableInfo {
                schema: Some(self.database.clone()),
                name,
            })
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    /// Best-effort schema inference: sample documents and walk their
    /// nested fields. Heuristic, not authoritative - the store is
    /// schemaless.
    async fn list_columns(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, EngineError> {
        let docs: Vec<Document> = self
            .bounded(async {
                self.collection(table)
                    .find(doc! {})
                    .limit(SCHEMA_SAMPLE_SIZE)
                    .await
                    .map_err(|e| EngineError::Metadata(format!("Failed to sample documents: {}", e)))?
                    .try_collect()
                    .await
                    .map_err(|e| EngineError::Metadata(format!("Cursor drain failed: {}", e)))
            })
            .await?;

        let mut fields = BTreeMap::new();
        for doc in &docs {
            infer_fields("", doc, &mut fields);
        }

        Ok(fields
            .into_iter()
            .map(|(name, data_type)| ColumnInfo { name, data_type })
            .collect())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure pipeline construction
// ---------------------------------------------------------------------------

fn value_to_bson(value: &Value) -> Result<Bson, EngineError> {
    Bson::try_from(value.clone())
        .map_err(|e| EngineError::Validation(format!("Unsupported filter value: {}", e)))
}

fn values_to_bson(values: &[Value]) -> Result<Vec<Bson>, EngineError> {
    values.iter().map(value_to_bson).collect()
}

fn regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if ".^$*+?()[]{}|\\".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn single_bson(operator: FilterOperator, values: &[Value]) -> Result<Bson, EngineError> {
    let value = values
        .first()
        .ok_or_else(|| EngineError::Validation(format!("{:?} requires a value", operator)))?;
    value_to_bson(value)
}

fn leaf_condition(
    path: &str,
    operator: FilterOperator,
    values: &[Value],
) -> Result<Document, EngineError> {
    let mut rendered = Document::new();
    let condition = match operator {
        // Bare value: equality matches scalars and array members alike.
        FilterOperator::Equals => {
            rendered.insert(path, single_bson(operator, values)?);
            return Ok(rendered);
        }
        FilterOperator::NotEquals => doc! { "$ne": single_bson(operator, values)? },
        FilterOperator::Contains => {
            let value = values.first().ok_or_else(|| {
                EngineError::Validation("contains requires a value".to_string())
            })?;
            doc! { "$regex": regex_escape(&text_of(value)), "$options": "i" }
        }
        FilterOperator::NotContains => {
            let value = values.first().ok_or_else(|| {
                EngineError::Validation("not_contains requires a value".to_string())
            })?;
            doc! { "$not": { "$regex": regex_escape(&text_of(value)), "$options": "i" } }
        }
        FilterOperator::GreaterThan => doc! { "$gt": single_bson(operator, values)? },
        FilterOperator::LessThan => doc! { "$lt": single_bson(operator, values)? },
        FilterOperator::Between => {
            if values.len() != 2 {
                return Err(EngineError::Validation(format!(
                    "between requires exactly two values, got {}",
                    values.len()
                )));
            }
            // Inclusive on both ends, matching the SQL rendering.
            doc! { "$gte": value_to_bson(&values[0])?, "$lte": value_to_bson(&values[1])? }
        }
        FilterOperator::In => doc! { "$in": values_to_bson(values)? },
        FilterOperator::NotIn => doc! { "$nin": values_to_bson(values)? },
        FilterOperator::IsNull => doc! { "$exists": false },
        FilterOperator::IsNotNull => doc! { "$ne": Bson::Null, "$exists": true },
    };
    rendered.insert(path, condition);
    Ok(rendered)
}

fn filter_to_document(dataset: &Dataset, filter: &Filter) -> Result<Document, EngineError> {
    match filter {
        Filter::Group { op, children } => {
            let parts: Vec<Document> = children
                .iter()
                .map(|child| filter_to_document(dataset, child))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|d| !d.is_empty())
                .collect();
            if parts.is_empty() {
                return Ok(Document::new());
            }
            let key = match op {
                crate::models::BooleanOp::And => "$and",
                crate::models::BooleanOp::Or => "$or",
            };
            let mut rendered = Document::new();
            rendered.insert(key, parts);
            Ok(rendered)
        }
        Filter::Leaf {
            field,
            operator,
            values,
        } => {
            let path = dataset.resolve_field(field)?.expression.clone();
            leaf_condition(&path, *operator, values)
        }
    }
}

fn match_document(dataset: &Dataset, filter: Option<&Filter>) -> Result<Document, EngineError> {
    match filter {
        Some(filter) => filter_to_document(dataset, filter),
        None => Ok(Document::new()),
    }
}

fn accumulator(aggregation: AggregationType, path: &str) -> Document {
    let field_ref = format!("${}", path);
    match aggregation {
        AggregationType::Sum => doc! { "$sum": field_ref },
        AggregationType::Count => doc! { "$sum": 1 },
        AggregationType::CountDistinct => doc! { "$addToSet": field_ref },
        AggregationType::Avg => doc! { "$avg": field_ref },
        AggregationType::Max => doc! { "$max": field_ref },
        AggregationType::Min => doc! { "$min": field_ref },
    }
}

fn group_and_project(
    dataset: &Dataset,
    params: &QueryParams,
) -> Result<(Document, Document), EngineError> {
    let group_id: Bson = if params.dimensions.is_empty() {
        Bson::Null
    } else {
        let mut id = Document::new();
        for dimension in &params.dimensions {
            let field = dataset.resolve_field(&dimension.field)?;
            id.insert(field.identifier.clone(), format!("${}", field.expression));
        }
        Bson::Document(id)
    };

    let mut group = doc! { "_id": group_id };
    let mut project = doc! { "_id": 0 };

    for dimension in &params.dimensions {
        let field = dataset.resolve_field(&dimension.field)?;
        project.insert(
            field.identifier.clone(),
            format!("$_id.{}", field.identifier),
        );
    }

    for metric in &params.metrics {
        let field = dataset.resolve_field(&metric.field)?;
        let key = metric.output_key();
        group.insert(key.clone(), accumulator(metric.aggregation, &field.expression));
        if metric.aggregation == AggregationType::CountDistinct {
            // $addToSet accumulated the distinct values; surface their count.
            project.insert(key.clone(), doc! { "$size": format!("${}", key) });
        } else {
            project.insert(key.clone(), format!("${}", key));
        }
    }

    Ok((group, project))
}

fn sort_document(params: &QueryParams) -> Option<Document> {
    if params.order_by.is_empty() {
        return None;
    }
    let mut sort = Document::new();
    for order in &params.order_by {
        let direction = match order.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        };
        // Post-projection keys: dimension identifiers and metric stable
        // keys. Unresolvable keys pass through verbatim, never dropped.
        sort.insert(order.field.clone(), direction);
    }
    Some(sort)
}

fn find_sort_document(dataset: &Dataset, params: &QueryParams) -> Option<Document> {
    if params.order_by.is_empty() {
        return None;
    }
    let mut sort = Document::new();
    for order in &params.order_by {
        let path = dataset
            .field(&order.field)
            .map(|f| f.expression.clone())
            .unwrap_or_else(|| order.field.clone());
        let direction = match order.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        };
        sort.insert(path, direction);
    }
    Some(sort)
}

/// Aggregation pipeline for requests with dimensions and/or metrics.
pub(crate) fn build_pipeline(
    dataset: &Dataset,
    params: &QueryParams,
) -> Result<Vec<Document>, EngineError> {
    let mut pipeline = Vec::new();

    let filter = match_document(dataset, params.filter.as_ref())?;
    if !filter.is_empty() {
        pipeline.push(doc! { "$match": filter });
    }

    let (group, project) = group_and_project(dataset, params)?;
    pipeline.push(doc! { "$group": group });
    pipeline.push(doc! { "$project": project });

    if let Some(sort) = sort_document(params) {
        pipeline.push(doc! { "$sort": sort });
    }
    if let Some(offset) = params.offset {
        if offset > 0 {
            pipeline.push(doc! { "$skip": offset as i64 });
        }
    }
    if let Some(limit) = params.limit {
        pipeline.push(doc! { "$limit": limit as i64 });
    }

    Ok(pipeline)
}

/// Companion pipeline producing the exact distinct-group count,
/// independent of skip/limit.
pub(crate) fn build_count_pipeline(
    dataset: &Dataset,
    params: &QueryParams,
) -> Result<Vec<Document>, EngineError> {
    let mut pipeline = Vec::new();

    let filter = match_document(dataset, params.filter.as_ref())?;
    if !filter.is_empty() {
        pipeline.push(doc! { "$match": filter });
    }

    let (group, _) = group_and_project(dataset, params)?;
    pipeline.push(doc! { "$group": doc! { "_id": group.get("_id").cloned().unwrap_or(Bson::Null) } });
    pipeline.push(doc! { "$count": "total" });

    Ok(pipeline)
}

fn preview_text(dataset: &Dataset, params: &QueryParams) -> Result<String, EngineError> {
    let preview = if params.dimensions.is_empty() && params.metrics.is_empty() {
        let filter = match_document(dataset, params.filter.as_ref())?;
        serde_json::json!({
            "collection": dataset.base_table,
            "find": document_to_value(filter),
            "skip": params.offset,
            "limit": params.limit,
        })
    } else {
        let pipeline = build_pipeline(dataset, params)?;
        serde_json::json!({
            "collection": dataset.base_table,
            "pipeline": pipeline.into_iter().map(document_to_value).collect::<Vec<_>>(),
        })
    };
    Ok(preview.to_string())
}

fn document_to_value(doc: Document) -> Value {
    Bson::Document(doc).into()
}

fn bson_count(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(v) => Some((*v).max(0) as u64),
        Bson::Int64(v) => Some((*v).max(0) as u64),
        Bson::Double(v) => Some(v.max(0.0) as u64),
        _ => None,
    }
}

/// Walk one sampled document, flattening nested paths with '.'; the first
/// type observed for a path wins.
fn infer_fields(prefix: &str, doc: &Document, fields: &mut BTreeMap<String, String>) {
    for (key, value) in doc {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Bson::Document(nested) => infer_fields(&path, nested, fields),
            Bson::Array(items) => {
                fields.entry(path.clone()).or_insert_with(|| "ARRAY".to_string());
                if let Some(Bson::Document(first)) = items.first() {
                    infer_fields(&path, first, fields);
                }
            }
            other => {
                fields
                    .entry(path)
                    .or_insert_with(|| bson_type_name(other).to_string());
            }
        }
    }
}

fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "DOUBLE",
        Bson::String(_) => "STRING",
        Bson::Boolean(_) => "BOOL",
        Bson::Int32(_) => "INT32",
        Bson::Int64(_) => "INT64",
        Bson::DateTime(_) => "DATE",
        Bson::ObjectId(_) => "OBJECTID",
        Bson::Decimal128(_) => "DECIMAL",
        Bson::Timestamp(_) => "TIMESTAMP",
        Bson::Binary(_) => "BINARY",
        Bson::Null => "NULL",
        _ => "STRING",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BooleanOp, DatasetField, Dimension, Metric, OrderBy};
    use serde_json::json;

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
                    expression: "region".to_string(),
                },
                DatasetField {
                    identifier: "amount".to_string(),
                    display_name: "Amount".to_string(),
                    data_type: None,
                    expression: "amount".to_string(),
                },
                DatasetField {
                    identifier: "customer".to_string(),
                    display_name: "Customer".to_string(),
                    data_type: None,
                    expression: "customer.name".to_string(),
                },
            ],
            joins: vec![],
        }
    }

    #[test]
    fn test_leaf_operator_mappings() {
        let ds = dataset();

        let eq = filter_to_document(
            &ds,
            &Filter::Leaf {
                field: "region".to_string(),
                operator: FilterOperator::Equals,
                values: vec![json!("east")],
            },
        )
        .unwrap();
        assert_eq!(eq, doc! { "region": "east" });

        let between = filter_to_document(
            &ds,
            &Filter::Leaf {
                field: "amount".to_string(),
                operator: FilterOperator::Between,
                values: vec![json!("2024-01-01"), json!("2024-12-31")],
            },
        )
        .unwrap();
        assert_eq!(
            between,
            doc! { "amount": { "$gte": "2024-01-01", "$lte": "2024-12-31" } }
        );

        let is_null = filter_to_document(
            &ds,
            &Filter::Leaf {
                field: "region".to_string(),
                operator: FilterOperator::IsNull,
                values: vec![],
            },
        )
        .unwrap();
        assert_eq!(is_null, doc! { "region": { "$exists": false } });

        let is_not_null = filter_to_document(
            &ds,
            &Filter::Leaf {
                field: "region".to_string(),
                operator: FilterOperator::IsNotNull,
                values: vec![],
            },
        )
        .unwrap();
        assert_eq!(
            is_not_null,
            doc! { "region": { "$ne": Bson::Null, "$exists": true } }
        );
    }

    #[test]
    fn test_contains_builds_escaped_case_insensitive_regex() {
        let ds = dataset();
        let contains = filter_to_document(
            &ds,
            &Filter::Leaf {
                field: "customer".to_string(),
                operator: FilterOperator::Contains,
                values: vec![json!("a.b")],
            },
        )
        .unwrap();
        assert_eq!(
            contains,
            doc! { "customer.name": { "$regex": "a\\.b", "$options": "i" } }
        );
    }

    #[test]
    fn test_group_filter_nesting() {
        let ds = dataset();
        let filter = Filter::Group {
            op: BooleanOp::And,
            children: vec![
                Filter::Leaf {
                    field: "region".to_string(),
                    operator: FilterOperator::Equals,
                    values: vec![json!("east")],
                },
                Filter::Group {
                    op: BooleanOp::Or,
                    children: vec![Filter::Leaf {
                        field: "amount".to_string(),
                        operator: FilterOperator::GreaterThan,
                        values: vec![json!("10")],
                    }],
                },
            ],
        };
        let rendered = filter_to_document(&ds, &filter).unwrap();
        assert_eq!(
            rendered,
            doc! { "$and": [
                { "region": "east" },
                { "$or": [ { "amount": { "$gt": "10" } } ] },
            ] }
        );
    }

    #[test]
    fn test_between_arity_enforced() {
        let ds = dataset();
        let err = filter_to_document(
            &ds,
            &Filter::Leaf {
                field: "amount".to_string(),
                operator: FilterOperator::Between,
                values: vec![json!(10)],
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_count_distinct_uses_add_to_set_and_size() {
        let ds = dataset();
        let params = QueryParams {
            metrics: vec![Metric {
                field: "amount".to_string(),
                aggregation: AggregationType::CountDistinct,
                alias: None,
            }],
            ..QueryParams::default()
        };
        let pipeline = build_pipeline(&ds, &params).unwrap();

        assert_eq!(pipeline.len(), 2);
        let group = pipeline[0].get_document("$group").unwrap();
        assert_eq!(group.get("_id"), Some(&Bson::Null));
        assert_eq!(
            group.get_document("amount_count_distinct").unwrap(),
            &doc! { "$addToSet": "$amount" }
        );

        let project = pipeline[1].get_document("$project").unwrap();
        assert_eq!(
            project.get_document("amount_count_distinct").unwrap(),
            &doc! { "$size": "$amount_count_distinct" }
        );
    }

    #[test]
    fn test_dimension_pipeline_flattens_group_key() {
        let ds = dataset();
        let params = QueryParams {
            dimensions: vec![Dimension {
                field: "region".to_string(),
                alias: Some("Region label".to_string()),
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
            limit: Some(2),
            offset: Some(4),
            ..QueryParams::default()
        };
        let pipeline = build_pipeline(&ds, &params).unwrap();

        let group = pipeline[0].get_document("$group").unwrap();
        assert_eq!(
            group.get_document("_id").unwrap(),
            &doc! { "region": "$region" }
        );
        assert_eq!(
            group.get_document("amount_sum").unwrap(),
            &doc! { "$sum": "$amount" }
        );

        let project = pipeline[1].get_document("$project").unwrap();
        assert_eq!(project.get_str("region").unwrap(), "$_id.region");
        // Alias never leaks into output keys.
        assert!(!project.contains_key("Region label"));

        assert_eq!(pipeline[2], doc! { "$sort": { "amount_sum": -1 } });
        assert_eq!(pipeline[3], doc! { "$skip": 4_i64 });
        assert_eq!(pipeline[4], doc! { "$limit": 2_i64 });
    }

    #[test]
    fn test_count_pipeline_is_pagination_free() {
        let ds = dataset();
        let params = QueryParams {
            dimensions: vec![Dimension {
                field: "region".to_string(),
                alias: None,
            }],
            limit: Some(2),
            offset: Some(4),
            ..QueryParams::default()
        };
        let pipeline = build_count_pipeline(&ds, &params).unwrap();

        assert_eq!(pipeline.len(), 2);
        assert_eq!(
            pipeline[0].get_document("$group").unwrap(),
            &doc! { "_id": { "region": "$region" } }
        );
        assert_eq!(pipeline[1], doc! { "$count": "total" });
    }

    #[test]
    fn test_preview_is_deterministic() {
        let ds = dataset();
        let params = QueryParams {
            dimensions: vec![Dimension {
                field: "region".to_string(),
                alias: None,
            }],
            metrics: vec![Metric {
                field: "amount".to_string(),
                aggregation: AggregationType::Avg,
                alias: None,
            }],
            ..QueryParams::default()
        };
        let a = preview_text(&ds, &params).unwrap();
        let b = preview_text(&ds, &params).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("$group"));
    }

    #[test]
    fn test_schema_inference_flattens_nested_paths() {
        let mut fields = BTreeMap::new();
        let sampled = doc! {
            "amount": 12.5,
            "customer": { "name": "Ada", "tags": ["vip"] },
        };
        infer_fields("", &sampled, &mut fields);

        assert_eq!(fields.get("amount").map(String::as_str), Some("DOUBLE"));
        assert_eq!(fields.get("customer.name").map(String::as_str), Some("STRING"));
        assert_eq!(fields.get("customer.tags").map(String::as_str), Some("ARRAY"));
    }
}
