// Execution parameters and results: the backend-agnostic description of an
// analytical query (dimensions, metrics, filter tree, ordering, pagination)
// and the uniform tabular answer every connector returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregation applied to a metric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    Sum,
    Count,
    CountDistinct,
    Avg,
    Max,
    Min,
}

impl AggregationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Count => "count",
            AggregationType::CountDistinct => "count_distinct",
            AggregationType::Avg => "avg",
            AggregationType::Max => "max",
            AggregationType::Min => "min",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOp {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl BooleanOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BooleanOp::And => "AND",
            BooleanOp::Or => "OR",
        }
    }
}

/// A filter tree node: either a single predicate or a boolean combination
/// of nested nodes. The `kind` tag makes the leaf/group distinction
/// explicit in the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    Leaf {
        field: String,
        operator: FilterOperator,
        #[serde(default)]
        values: Vec<Value>,
    },
    Group {
        op: BooleanOp,
        children: Vec<Filter>,
    },
}

/// A grouping key drawn from a dataset field. The caller-supplied alias is
/// accepted on input but never used as an output key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub field: String,
    #[serde(default)]
    pub alias: Option<String>,
}

/// An aggregated value drawn from a dataset field. Output key is
/// `{identifier}_{aggregation}`, independent of any alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub field: String,
    pub aggregation: AggregationType,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Metric {
    /// The stable output column key for this metric.
    pub fn output_key(&self) -> String {
        format!("{}_{}", self.field, self.aggregation.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Execution parameters for one query call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

/// Uniform query answer. `rows` are plain JSON objects keyed exclusively by
/// stable identifiers; `total_count` is exact and independent of
/// limit/offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub total_count: u64,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl QueryResult {
    pub fn new(
        rows: Vec<Value>,
        total_count: u64,
        execution_time_ms: u64,
        query_text: Option<String>,
    ) -> Self {
        Self {
            rows,
            total_count,
            execution_time_ms,
            query_text,
            executed_at: Utc::now(),
        }
    }
}

/// Result of compiling a request without executing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPreview {
    pub query_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_output_key() {
        let metric = Metric {
            field: "amount".to_string(),
            aggregation: AggregationType::CountDistinct,
            alias: Some("Distinct amounts".to_string()),
        };
        assert_eq!(metric.output_key(), "amount_count_distinct");
    }

    #[test]
    fn test_filter_tagged_union_round_trip() {
        let filter = Filter::Group {
            op: BooleanOp::And,
            children: vec![
                Filter::Leaf {
                    field: "status".to_string(),
                    operator: FilterOperator::Equals,
                    values: vec![json!("open")],
                },
                Filter::Group {
                    op: BooleanOp::Or,
                    children: vec![Filter::Leaf {
                        field: "amount".to_string(),
                        operator: FilterOperator::GreaterThan,
                        values: vec![json!(10)],
                    }],
                },
            ],
        };

        let text = serde_json::to_string(&filter).unwrap();
        assert!(text.contains("\"kind\":\"group\""));
        assert!(text.contains("\"kind\":\"leaf\""));
        assert!(text.contains("\"op\":\"AND\""));

        let back: Filter = serde_json::from_str(&text).unwrap();
        match back {
            Filter::Group { op, children } => {
                assert_eq!(op, BooleanOp::And);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn test_unknown_aggregation_rejected() {
        let result: Result<Metric, _> =
            serde_json::from_value(json!({"field": "amount", "aggregation": "median"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result: Result<Filter, _> = serde_json::from_value(json!({
            "kind": "leaf",
            "field": "amount",
            "operator": "almost_equals",
            "values": [1]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_query_params_defaults() {
        let params: QueryParams = serde_json::from_str("{}").unwrap();
        assert!(params.dimensions.is_empty());
        assert!(params.metrics.is_empty());
        assert!(params.filter.is_none());
        assert_eq!(params.limit, None);
    }
}
