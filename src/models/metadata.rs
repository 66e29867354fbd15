// Normalized metadata rows shared by all connectors. Each engine's catalog
// (information_schema, system.*, ALL_*, sys.*, collection sampling, index
// mappings) is reduced to these shapes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_info_schema_optional() {
        let info: TableInfo = serde_json::from_str("{\"name\": \"orders\"}").unwrap();
        assert_eq!(info.schema, None);
        assert_eq!(info.name, "orders");
    }
}
