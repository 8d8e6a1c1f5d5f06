//! Source connectors: the boundary where datasets enter the graph.

mod catalog;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DataSpecError, Result};
use crate::node::Node;

pub use catalog::{Catalog, TableDef};

/// A table qualified by its database schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableName {
    pub schema: String,
    pub table: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl FromStr for TableName {
    type Err = DataSpecError;

    /// Parse `schema.table`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((schema, table))
                if !schema.is_empty() && !table.is_empty() && !table.contains('.') =>
            {
                Ok(TableName::new(schema, table))
            }
            _ => Err(DataSpecError::Source(format!(
                "'{}' is not a schema-qualified table name",
                s
            ))),
        }
    }
}

/// Materializes source nodes from an external data source.
///
/// Implementations own connections, dialects and credentials. The node they
/// return must embed its type and statistics so its schema can be derived
/// from its definition alone.
pub trait SourceConnector: Send + Sync {
    fn load(&self, uri: &str, tables: &[TableName]) -> Result<Node>;
}
