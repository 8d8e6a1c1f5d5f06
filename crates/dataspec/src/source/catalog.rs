//! A JSON catalog of tables acting as a source connector.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::PUBLIC;
use crate::error::{DataSpecError, Result};
use crate::node::{Node, SourceSpec};
use crate::schema::{Field, FieldStatistics, Statistics, Type};

use super::{SourceConnector, TableName};

/// Declaration of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDef {
    pub rows: u64,
    /// Whether the table may be read without protection.
    #[serde(default)]
    pub public: bool,
    pub columns: Vec<Field>,
}

impl TableDef {
    pub fn new(rows: u64) -> Self {
        Self {
            rows,
            public: false,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, type_: Type) -> Self {
        self.columns.push(Field::new(name, type_));
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }
}

/// Database schemas, their tables, columns and row counts, in declaration
/// order.
///
/// # Example
///
/// ```
/// use dataspec::schema::Type;
/// use dataspec::source::{Catalog, SourceConnector, TableDef, TableName};
///
/// let catalog = Catalog::new().with_table(
///     "extract",
///     "census",
///     TableDef::new(200).with_column("age", Type::integer_interval(0, 120)),
/// );
/// let node = catalog
///     .load("sqlite:///census.db", &[TableName::new("extract", "census")])
///     .unwrap();
/// assert!(node.is_source());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    /// When set, only this URI is served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub schemas: IndexMap<String, IndexMap<String, TableDef>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_table(
        mut self,
        schema: impl Into<String>,
        table: impl Into<String>,
        def: TableDef,
    ) -> Self {
        self.schemas
            .entry(schema.into())
            .or_default()
            .insert(table.into(), def);
        self
    }

    /// Read a catalog from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DataSpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: Catalog = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            DataSpecError::Source(format!(
                "Failed to parse catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), schemas = catalog.schemas.len(), "loaded catalog");
        Ok(catalog)
    }

    pub fn table(&self, name: &TableName) -> Option<&TableDef> {
        self.schemas.get(&name.schema)?.get(&name.table)
    }

    /// Every table in declaration order.
    pub fn tables(&self) -> Vec<TableName> {
        self.schemas
            .iter()
            .flat_map(|(schema, tables)| {
                tables.keys().map(move |table| TableName::new(schema.clone(), table.clone()))
            })
            .collect()
    }
}

impl SourceConnector for Catalog {
    fn load(&self, uri: &str, tables: &[TableName]) -> Result<Node> {
        if let Some(served) = &self.uri {
            if served != uri {
                return Err(DataSpecError::Source(format!(
                    "catalog serves '{}', not '{}'",
                    served, uri
                )));
            }
        }
        if tables.is_empty() {
            return Err(DataSpecError::Source("no tables requested".to_string()));
        }

        // Group requested tables by schema, keeping request order.
        let mut grouped: IndexMap<&str, Vec<(&str, &TableDef)>> = IndexMap::new();
        for name in tables {
            let def = self
                .table(name)
                .ok_or_else(|| DataSpecError::Source(format!("unknown table '{}'", name)))?;
            let group = grouped.entry(name.schema.as_str()).or_default();
            if group.iter().any(|(table, _)| *table == name.table) {
                return Err(DataSpecError::Source(format!("table '{}' requested twice", name)));
            }
            group.push((name.table.as_str(), def));
        }

        let mut schema_fields = Vec::new();
        let mut schema_stats = Vec::new();
        for (schema, defs) in &grouped {
            let mut table_fields = Vec::new();
            let mut table_stats = Vec::new();
            for (table, def) in defs {
                let mut field = Field::new(
                    *table,
                    Type::Struct {
                        fields: def.columns.clone(),
                    },
                );
                if def.public {
                    field = field.with_property(PUBLIC, "true");
                }
                table_fields.push(field);
                table_stats.push(FieldStatistics::new(
                    *table,
                    Statistics::table(def.rows, def.columns.iter().map(|c| c.name.clone())),
                ));
            }
            schema_fields.push(Field::new(*schema, Type::Union { fields: table_fields }));
            schema_stats.push(FieldStatistics::new(*schema, Statistics::union(table_stats)));
        }

        let node = Node::source(SourceSpec {
            uri: uri.to_string(),
            tables: tables.to_vec(),
            type_: Type::Union {
                fields: schema_fields,
            },
            statistics: Statistics::union(schema_stats),
        })?;
        info!(node = %node.uuid(), uri, tables = tables.len(), "loaded source");
        Ok(node)
    }
}
