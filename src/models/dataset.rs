// Dataset descriptor: the abstract schema the query engine compiles against.
//
// A dataset names a base table/collection/index, declares the fields that
// may appear in queries, and optionally a list of joins. Descriptors are
// transient value objects built by the calling service; the engine only
// reads them.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A named field expression exposed by a dataset.
///
/// `expression` is the engine-native fragment used wherever the field
/// participates in a query: a SQL expression for the relational engines, a
/// document path for MongoDB/Elasticsearch. `identifier` is the only value
/// ever used as an output column key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetField {
    pub identifier: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub data_type: Option<String>,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        }
    }
}

/// One join declaration; joins are rendered into the FROM clause in
/// declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetJoin {
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    pub join_type: JoinType,
    pub on_conditions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    /// Base table for SQL engines, collection for MongoDB, index for
    /// Elasticsearch.
    pub base_table: String,
    #[serde(default)]
    pub base_schema: Option<String>,
    #[serde(default)]
    pub fields: Vec<DatasetField>,
    #[serde(default)]
    pub joins: Vec<DatasetJoin>,
}

impl Dataset {
    pub fn field(&self, identifier: &str) -> Option<&DatasetField> {
        self.fields.iter().find(|f| f.identifier == identifier)
    }

    /// Look up a field by identifier, failing the compilation when the
    /// identifier is not declared by this dataset.
    pub fn resolve_field(&self, identifier: &str) -> Result<&DatasetField, EngineError> {
        self.field(identifier).ok_or_else(|| {
            EngineError::FieldResolution(format!(
                "field '{}' is not declared by dataset '{}'",
                identifier, self.name
            ))
        })
    }
}
