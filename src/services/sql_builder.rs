// Dialect-agnostic SQL assembly.
//
// One SqlGenerator serves all five relational connectors; everything that
// differs between engines (identifier quoting, pagination syntax, count
// wrapping, string escaping) goes through the SqlDialect hooks. Building is
// pure and synchronous: the same dataset and parameters always produce the
// same statement text, and every validation failure is raised here, before
// any connection is touched.

use serde_json::Value;

use crate::error::EngineError;
use crate::models::{AggregationType, Dataset, Filter, FilterOperator, QueryParams};

/// Per-dialect SQL hooks.
pub trait SqlDialect: Send + Sync {
    /// Opening/closing identifier quote characters.
    fn quote_pair(&self) -> (&'static str, &'static str);

    /// Pagination clause appended after ORDER BY.
    fn pagination_clause(&self, limit: u64, offset: u64) -> String;

    /// Quote a plain identifier. Fragments that are already qualified,
    /// already quoted, or function-like pass through untouched.
    fn quote_identifier(&self, ident: &str) -> String {
        let (open, close) = self.quote_pair();
        if ident.contains('.')
            || ident.contains('(')
            || ident.contains(' ')
            || ident.starts_with(open)
        {
            return ident.to_string();
        }
        format!("{}{}{}", open, ident, close)
    }

    /// Wrap a pagination-free statement in an exact-count query.
    fn count_wrapped(&self, inner: &str) -> String {
        format!("SELECT COUNT(*) FROM ({}) AS sub", inner)
    }

    /// Escape a string literal's content.
    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    /// True when the dialect refuses OFFSET/FETCH without an ORDER BY.
    fn requires_order_for_pagination(&self) -> bool {
        false
    }

    /// True when the dialect allows ORDER BY inside a derived table.
    fn order_allowed_in_subquery(&self) -> bool {
        true
    }
}

/// The documented SQL wrapper for each aggregation type.
pub fn aggregate_expression(aggregation: AggregationType, expr: &str) -> String {
    match aggregation {
        AggregationType::Sum => format!("SUM({})", expr),
        AggregationType::Count => format!("COUNT({})", expr),
        AggregationType::CountDistinct => format!("COUNT(DISTINCT {})", expr),
        AggregationType::Avg => format!("AVG({})", expr),
        AggregationType::Max => format!("MAX({})", expr),
        AggregationType::Min => format!("MIN({})", expr),
    }
}

pub struct SqlGenerator<'a> {
    dialect: &'a dyn SqlDialect,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self { dialect }
    }

    /// The statement executed by `query()`, pagination included.
    pub fn select_sql(&self, dataset: &Dataset, params: &QueryParams) -> Result<String, EngineError> {
        let mut sql = self.core_sql(dataset, params, true)?;

        if let Some(limit) = params.limit {
            let offset = params.offset.unwrap_or(0);
            if params.order_by.is_empty() && self.dialect.requires_order_for_pagination() {
                // T-SQL family: OFFSET/FETCH is a syntax error without ORDER BY.
                sql.push_str(" ORDER BY 1");
            }
            sql.push(' ');
            sql.push_str(&self.dialect.pagination_clause(limit, offset));
        }

        Ok(sql)
    }

    /// The paired exact-count statement: the same query with its pagination
    /// clause stripped, wrapped in SELECT COUNT(*).
    pub fn count_sql(&self, dataset: &Dataset, params: &QueryParams) -> Result<String, EngineError> {
        let inner = self.core_sql(dataset, params, self.dialect.order_allowed_in_subquery())?;
        Ok(self.dialect.count_wrapped(&inner))
    }

    fn core_sql(
        &self,
        dataset: &Dataset,
        params: &QueryParams,
        include_order: bool,
    ) -> Result<String, EngineError> {
        if params.dimensions.is_empty() && params.metrics.is_empty() {
            return Err(EngineError::Validation(
                "query requires at least one dimension or metric".to_string(),
            ));
        }

        // SELECT list: dimensions aliased to their identifiers, metrics to
        // their stable keys. Caller aliases never reach the output.
        let mut select_items = Vec::new();
        for dimension in &params.dimensions {
            let field = dataset.resolve_field(&dimension.field)?;
            select_items.push(format!(
                "{} AS {}",
                field.expression,
                self.dialect.quote_identifier(&field.identifier)
            ));
        }
        for metric in &params.metrics {
            let field = dataset.resolve_field(&metric.field)?;
            select_items.push(format!(
                "{} AS {}",
                aggregate_expression(metric.aggregation, &field.expression),
                self.dialect.quote_identifier(&metric.output_key())
            ));
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_items.join(", "),
            self.table_reference(&dataset.base_table, dataset.base_schema.as_deref(), None)
        );

        for join in &dataset.joins {
            sql.push_str(&format!(
                " {} JOIN {} ON {}",
                join.join_type.as_sql(),
                self.table_reference(&join.table, join.schema.as_deref(), join.alias.as_deref()),
                join.on_conditions.join(" AND ")
            ));
        }

        if let Some(filter) = &params.filter {
            let clause = self.render_filter(dataset, filter)?;
            if !clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }

        if !params.dimensions.is_empty() {
            let group_exprs: Vec<&str> = params
                .dimensions
                .iter()
                .map(|d| dataset.resolve_field(&d.field).map(|f| f.expression.as_str()))
                .collect::<Result<_, _>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&group_exprs.join(", "));
        }

        if include_order && !params.order_by.is_empty() {
            let order_items: Vec<String> = params
                .order_by
                .iter()
                .map(|o| {
                    format!(
                        "{} {}",
                        self.resolve_order_target(dataset, params, &o.field),
                        o.direction.as_sql()
                    )
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_items.join(", "));
        }

        Ok(sql)
    }

    fn table_reference(&self, table: &str, schema: Option<&str>, alias: Option<&str>) -> String {
        let mut reference = match schema {
            Some(schema) => format!(
                "{}.{}",
                self.dialect.quote_identifier(schema),
                self.dialect.quote_identifier(table)
            ),
            None => self.dialect.quote_identifier(table),
        };
        if let Some(alias) = alias {
            reference.push(' ');
            reference.push_str(&self.dialect.quote_identifier(alias));
        }
        reference
    }

    /// An order-by key resolves to a dimension expression, a metric's
    /// aggregate expression, or a raw dataset field expression. Keys that
    /// resolve to none of those are escaped as a literal identifier, never
    /// dropped.
    fn resolve_order_target(&self, dataset: &Dataset, params: &QueryParams, key: &str) -> String {
        if let Some(dimension) = params.dimensions.iter().find(|d| d.field == key) {
            if let Some(field) = dataset.field(&dimension.field) {
                return field.expression.clone();
            }
        }
        if let Some(metric) = params.metrics.iter().find(|m| m.output_key() == key) {
            if let Some(field) = dataset.field(&metric.field) {
                return aggregate_expression(metric.aggregation, &field.expression);
            }
        }
        if let Some(field) = dataset.field(key) {
            return field.expression.clone();
        }
        self.dialect.quote_identifier(key)
    }

    /// Recursive filter-tree rendering. Groups parenthesize themselves so
    /// nesting preserves precedence; empty groups render to nothing.
    fn render_filter(&self, dataset: &Dataset, filter: &Filter) -> Result<String, EngineError> {
        match filter {
            Filter::Group { op, children } => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|child| self.render_filter(dataset, child))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .collect();
                if parts.is_empty() {
                    return Ok(String::new());
                }
                Ok(format!("({})", parts.join(&format!(" {} ", op.as_sql()))))
            }
            Filter::Leaf {
                field,
                operator,
                values,
            } => {
                let expr = dataset.resolve_field(field)?.expression.clone();
                self.render_leaf(&expr, *operator, values)
            }
        }
    }

    fn render_leaf(
        &self,
        expr: &str,
        operator: FilterOperator,
        values: &[Value],
    ) -> Result<String, EngineError> {
        match operator {
            FilterOperator::Equals => {
                Ok(format!("{} = {}", expr, self.single_value(operator, values)?))
            }
            FilterOperator::NotEquals => {
                Ok(format!("{} != {}", expr, self.single_value(operator, values)?))
            }
            FilterOperator::Contains => Ok(format!(
                "{} LIKE '%{}%'",
                expr,
                self.like_fragment(operator, values)?
            )),
            FilterOperator::NotContains => Ok(format!(
                "{} NOT LIKE '%{}%'",
                expr,
                self.like_fragment(operator, values)?
            )),
            FilterOperator::GreaterThan => {
                Ok(format!("{} > {}", expr, self.single_value(operator, values)?))
            }
            FilterOperator::LessThan => {
                Ok(format!("{} < {}", expr, self.single_value(operator, values)?))
            }
            FilterOperator::Between => {
                if values.len() != 2 {
                    return Err(EngineError::Validation(format!(
                        "between requires exactly two values, got {}",
                        values.len()
                    )));
                }
                // Inclusive on both ends, uniformly across dialects.
                Ok(format!(
                    "({} >= {} AND {} <= {})",
                    expr,
                    self.render_value(&values[0])?,
                    expr,
                    self.render_value(&values[1])?
                ))
            }
            FilterOperator::In | FilterOperator::NotIn => {
                if values.is_empty() {
                    return Err(EngineError::Validation(format!(
                        "{:?} requires at least one value",
                        operator
                    )));
                }
                let rendered: Vec<String> = values
                    .iter()
                    .map(|v| self.render_value(v))
                    .collect::<Result<_, _>>()?;
                let keyword = if operator == FilterOperator::In {
                    "IN"
                } else {
                    "NOT IN"
                };
                Ok(format!("{} {} ({})", expr, keyword, rendered.join(", ")))
            }
            FilterOperator::IsNull => Ok(format!("{} IS NULL", expr)),
            FilterOperator::IsNotNull => Ok(format!("{} IS NOT NULL", expr)),
        }
    }

    fn single_value(
        &self,
        operator: FilterOperator,
        values: &[Value],
    ) -> Result<String, EngineError> {
        let value = values
            .first()
            .ok_or_else(|| EngineError::Validation(format!("{:?} requires a value", operator)))?;
        self.render_value(value)
    }

    fn like_fragment(
        &self,
        operator: FilterOperator,
        values: &[Value],
    ) -> Result<String, EngineError> {
        let value = values
            .first()
            .ok_or_else(|| EngineError::Validation(format!("{:?} requires a value", operator)))?;
        Ok(self.dialect.escape_string(&text_of(value)))
    }

    fn render_value(&self, value: &Value) -> Result<String, EngineError> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            // 1/0 instead of TRUE/FALSE: SQL Server and Oracle have no
            // boolean literal.
            Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(format!("'{}'", self.dialect.escape_string(s))),
            Value::Array(_) | Value::Object(_) => Err(EngineError::Validation(
                "filter values must be scalars".to_string(),
            )),
        }
    }
}

/// Plain-text form of a scalar, used for LIKE/wildcard fragments.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
