//! Size statistics mirroring the shape of a dataset type.

use serde::{Deserialize, Serialize};

/// Statistics of a named struct or union member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldStatistics {
    pub name: String,
    pub statistics: Statistics,
}

impl FieldStatistics {
    pub fn new(name: impl Into<String>, statistics: Statistics) -> Self {
        Self {
            name: name.into(),
            statistics,
        }
    }
}

/// Row counts of a dataset, following its union/struct layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Statistics {
    /// A union of tables; `size` is the sum of member sizes.
    Union {
        fields: Vec<FieldStatistics>,
        size: u64,
    },
    /// A table with `size` rows.
    Struct {
        fields: Vec<FieldStatistics>,
        size: u64,
        multiplicity: f64,
    },
    /// A single column.
    Column { size: u64, multiplicity: f64 },
}

impl Statistics {
    /// Statistics for a table of `rows` rows with the given column names.
    pub fn table<I, S>(rows: u64, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Statistics::Struct {
            fields: columns
                .into_iter()
                .map(|name| {
                    FieldStatistics::new(
                        name,
                        Statistics::Column {
                            size: rows,
                            multiplicity: 1.0,
                        },
                    )
                })
                .collect(),
            size: rows,
            multiplicity: 1.0,
        }
    }

    /// A union whose size is the sum of its members, saturating at
    /// `u64::MAX`.
    pub fn union(fields: Vec<FieldStatistics>) -> Self {
        let size = fields
            .iter()
            .map(|f| f.statistics.size())
            .fold(0u64, u64::saturating_add);
        Statistics::Union { fields, size }
    }

    /// Check that every multiplicity is finite and non-negative.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Statistics::Union { fields, .. } => validate_fields(fields),
            Statistics::Struct {
                fields,
                multiplicity,
                ..
            } => {
                validate_multiplicity(*multiplicity)?;
                validate_fields(fields)
            }
            Statistics::Column { multiplicity, .. } => validate_multiplicity(*multiplicity),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Statistics::Union { size, .. }
            | Statistics::Struct { size, .. }
            | Statistics::Column { size, .. } => *size,
        }
    }

    /// Row count of the table at `path`, if the path leads to a table.
    pub fn table_size(&self, path: &[String]) -> Option<u64> {
        let mut current = self;
        for segment in path {
            let fields = match current {
                Statistics::Union { fields, .. } => fields,
                _ => return None,
            };
            current = &fields.iter().find(|f| &f.name == segment)?.statistics;
        }
        match current {
            Statistics::Struct { size, .. } => Some(*size),
            _ => None,
        }
    }
}

fn validate_fields(fields: &[FieldStatistics]) -> Result<(), String> {
    for field in fields {
        field
            .statistics
            .validate()
            .map_err(|e| format!("{}: {}", field.name, e))?;
    }
    Ok(())
}

fn validate_multiplicity(multiplicity: f64) -> Result<(), String> {
    if multiplicity.is_finite() && multiplicity >= 0.0 {
        Ok(())
    } else {
        Err(format!("multiplicity must be finite and >= 0, got {}", multiplicity))
    }
}
