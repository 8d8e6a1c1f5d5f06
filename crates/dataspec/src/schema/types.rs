//! Core type definitions for dataset schemas.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::constants::PUBLIC;

/// A named member of a struct or union type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: Type,
    /// Free-form annotations (e.g. the `public` table marker).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Field {
    pub fn new(name: impl Into<String>, type_: Type) -> Self {
        Self {
            name: name.into(),
            type_,
            properties: BTreeMap::new(),
        }
    }

    /// Attach a property to the field.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether the field is marked as a public table.
    pub fn is_public(&self) -> bool {
        self.properties.get(PUBLIC).is_some_and(|v| v == "true")
    }
}

/// A name/value pair of an enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

/// Physical representation of an identifier column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdBase {
    Int64,
    String,
}

/// The type of a dataset, a table or a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Type {
    Null,
    Unit,
    Boolean,
    Integer {
        min: i64,
        max: i64,
        #[serde(default)]
        possible_values: Vec<i64>,
    },
    Enum {
        name_values: Vec<EnumValue>,
    },
    Float {
        min: f64,
        max: f64,
        #[serde(default)]
        possible_values: Vec<f64>,
    },
    Text {
        encoding: String,
        #[serde(default)]
        possible_values: Vec<String>,
    },
    Bytes,
    Struct {
        fields: Vec<Field>,
    },
    Union {
        fields: Vec<Field>,
    },
    Optional {
        #[serde(rename = "type")]
        type_: Box<Type>,
    },
    List {
        #[serde(rename = "type")]
        type_: Box<Type>,
        max_size: u64,
    },
    Date {
        format: String,
        #[serde(default)]
        min: String,
        #[serde(default)]
        max: String,
        #[serde(default)]
        possible_values: Vec<String>,
    },
    Time {
        format: String,
        #[serde(default)]
        min: String,
        #[serde(default)]
        max: String,
        #[serde(default)]
        possible_values: Vec<String>,
    },
    Datetime {
        format: String,
        #[serde(default)]
        min: String,
        #[serde(default)]
        max: String,
        #[serde(default)]
        possible_values: Vec<String>,
    },
    Duration {
        unit: String,
        min: i64,
        max: i64,
        #[serde(default)]
        possible_values: Vec<i64>,
    },
    Id {
        base: IdBase,
        unique: bool,
    },
}

/// A table found inside a dataset type: a struct reachable through unions.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef<'a> {
    /// Union member names leading to the struct.
    pub path: Vec<String>,
    pub columns: &'a [Field],
    /// Whether the union member holding the table is marked public.
    pub public: bool,
}

impl Type {
    /// Unbounded 64-bit integer.
    pub fn integer() -> Self {
        Type::Integer {
            min: i64::MIN,
            max: i64::MAX,
            possible_values: Vec::new(),
        }
    }

    /// Bounded 64-bit integer.
    pub fn integer_interval(min: i64, max: i64) -> Self {
        Type::Integer {
            min,
            max,
            possible_values: Vec::new(),
        }
    }

    /// Bounded 64-bit float.
    pub fn float_interval(min: f64, max: f64) -> Self {
        Type::Float {
            min,
            max,
            possible_values: Vec::new(),
        }
    }

    /// UTF-8 text with no known categories.
    pub fn text() -> Self {
        Type::Text {
            encoding: "UTF-8".to_string(),
            possible_values: Vec::new(),
        }
    }

    /// UTF-8 text restricted to the given categories.
    pub fn text_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Type::Text {
            encoding: "UTF-8".to_string(),
            possible_values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn optional(inner: Type) -> Self {
        Type::Optional {
            type_: Box::new(inner),
        }
    }

    pub fn id(base: IdBase, unique: bool) -> Self {
        Type::Id { base, unique }
    }

    /// Short lowercase name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Type::Null => "null",
            Type::Unit => "unit",
            Type::Boolean => "boolean",
            Type::Integer { .. } => "integer",
            Type::Enum { .. } => "enum",
            Type::Float { .. } => "float",
            Type::Text { .. } => "text",
            Type::Bytes => "bytes",
            Type::Struct { .. } => "struct",
            Type::Union { .. } => "union",
            Type::Optional { .. } => "optional",
            Type::List { .. } => "list",
            Type::Date { .. } => "date",
            Type::Time { .. } => "time",
            Type::Datetime { .. } => "datetime",
            Type::Duration { .. } => "duration",
            Type::Id { .. } => "id",
        }
    }

    /// Fields of a struct or union type.
    pub fn fields(&self) -> Option<&[Field]> {
        match self {
            Type::Struct { fields } | Type::Union { fields } => Some(fields),
            _ => None,
        }
    }

    /// Find a direct member of a struct or union by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// Walk down union/struct members following `path`.
    pub fn descend(&self, path: &[String]) -> Option<&Type> {
        path.iter()
            .try_fold(self, |ty, segment| ty.field(segment).map(|f| &f.type_))
    }

    /// All tables (structs reachable through unions), in declaration order.
    pub fn tables(&self) -> Vec<TableRef<'_>> {
        let mut out = Vec::new();
        collect_tables(self, Vec::new(), None, &mut out);
        out
    }

    /// Column paths (table path followed by column name) of every table.
    pub fn columns(&self) -> Vec<Vec<String>> {
        self.tables()
            .into_iter()
            .flat_map(|TableRef { path, columns, .. }| {
                columns.iter().map(move |c| {
                    let mut column = path.clone();
                    column.push(c.name.clone());
                    column
                })
            })
            .collect()
    }

    /// Check that bounds are ordered, floats are finite and temporal
    /// bounds parse with their declared format.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Type::Null | Type::Unit | Type::Boolean | Type::Bytes | Type::Id { .. } => Ok(()),
            Type::Integer { min, max, .. } | Type::Duration { min, max, .. } => {
                if min > max {
                    Err(format!("{} bounds out of order: {} > {}", self.name(), min, max))
                } else {
                    Ok(())
                }
            }
            Type::Float {
                min,
                max,
                possible_values,
            } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err("float bounds must be finite".to_string());
                }
                if min > max {
                    return Err(format!("float bounds out of order: {} > {}", min, max));
                }
                if possible_values.iter().any(|v| !v.is_finite()) {
                    return Err("float values must be finite".to_string());
                }
                Ok(())
            }
            Type::Enum { name_values } => {
                if name_values.is_empty() {
                    Err("enum must declare at least one value".to_string())
                } else {
                    Ok(())
                }
            }
            Type::Text { .. } => Ok(()),
            Type::Struct { fields } | Type::Union { fields } => {
                let mut seen = std::collections::BTreeSet::new();
                for field in fields {
                    if !seen.insert(field.name.as_str()) {
                        return Err(format!("duplicate field '{}'", field.name));
                    }
                    field
                        .type_
                        .validate()
                        .map_err(|e| format!("{}: {}", field.name, e))?;
                }
                Ok(())
            }
            Type::Optional { type_ } | Type::List { type_, .. } => type_.validate(),
            Type::Date {
                format,
                min,
                max,
                possible_values,
            } => check_temporal(format, min, max, possible_values, |v, f| {
                NaiveDate::parse_from_str(v, f).map(|_| ())
            }),
            Type::Time {
                format,
                min,
                max,
                possible_values,
            } => check_temporal(format, min, max, possible_values, |v, f| {
                NaiveTime::parse_from_str(v, f).map(|_| ())
            }),
            Type::Datetime {
                format,
                min,
                max,
                possible_values,
            } => check_temporal(format, min, max, possible_values, |v, f| {
                NaiveDateTime::parse_from_str(v, f).map(|_| ())
            }),
        }
    }
}

fn collect_tables<'a>(
    ty: &'a Type,
    path: Vec<String>,
    properties: Option<&'a BTreeMap<String, String>>,
    out: &mut Vec<TableRef<'a>>,
) {
    match ty {
        Type::Struct { fields } => {
            let public = properties
                .and_then(|p| p.get(PUBLIC))
                .is_some_and(|v| v == "true");
            out.push(TableRef {
                path,
                columns: fields,
                public,
            });
        }
        Type::Union { fields } => {
            for field in fields {
                let mut child = path.clone();
                child.push(field.name.clone());
                collect_tables(&field.type_, child, Some(&field.properties), out);
            }
        }
        _ => {}
    }
}

fn check_temporal(
    format: &str,
    min: &str,
    max: &str,
    possible_values: &[String],
    parse: impl Fn(&str, &str) -> Result<(), chrono::ParseError>,
) -> Result<(), String> {
    for value in [min, max]
        .into_iter()
        .filter(|v| !v.is_empty())
        .chain(possible_values.iter().map(String::as_str))
    {
        parse(value, format).map_err(|e| format!("cannot parse '{}' as '{}': {}", value, format, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tables() -> Type {
        Type::Union {
            fields: vec![Field::new(
                "extract",
                Type::Union {
                    fields: vec![
                        Field::new(
                            "beacon",
                            Type::Struct {
                                fields: vec![
                                    Field::new("id", Type::id(IdBase::Int64, true)),
                                    Field::new("signal", Type::float_interval(0.0, 1.0)),
                                ],
                            },
                        )
                        .with_property(PUBLIC, "true"),
                        Field::new(
                            "census",
                            Type::Struct {
                                fields: vec![Field::new("age", Type::integer_interval(0, 120))],
                            },
                        ),
                    ],
                },
            )],
        }
    }

    #[test]
    fn test_tables_follow_unions() {
        let ty = two_tables();
        let tables = ty.tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].path, vec!["extract", "beacon"]);
        assert!(tables[0].public);
        assert_eq!(tables[1].path, vec!["extract", "census"]);
        assert!(!tables[1].public);
    }

    #[test]
    fn test_columns() {
        let columns = two_tables().columns();
        assert_eq!(
            columns,
            vec![
                vec!["extract", "beacon", "id"],
                vec!["extract", "beacon", "signal"],
                vec!["extract", "census", "age"],
            ]
        );
    }

    #[test]
    fn test_descend() {
        let ty = two_tables();
        let path = vec!["extract".to_string(), "census".to_string()];
        assert_eq!(ty.descend(&path).map(Type::name), Some("struct"));
        assert!(ty.descend(&["missing".to_string()]).is_none());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        assert!(Type::integer_interval(5, 1).validate().is_err());
        assert!(Type::float_interval(0.0, f64::INFINITY).validate().is_err());
        assert!(two_tables().validate().is_ok());
    }

    #[test]
    fn test_validate_temporal_formats() {
        let ok = Type::Datetime {
            format: "%Y-%m-%d %H:%M:%S".to_string(),
            min: "2023-01-01 00:00:00".to_string(),
            max: "2023-12-31 00:00:00".to_string(),
            possible_values: Vec::new(),
        };
        assert!(ok.validate().is_ok());

        let bad = Type::Date {
            format: "%Y-%m-%d".to_string(),
            min: "01/02/2023".to_string(),
            max: String::new(),
            possible_values: Vec::new(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let ty = Type::Struct {
            fields: vec![
                Field::new("a", Type::Boolean),
                Field::new("a", Type::Boolean),
            ],
        };
        assert!(ty.validate().unwrap_err().contains("duplicate"));
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Type::integer_interval(0, 90)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"integer": {"min": 0, "max": 90, "possible_values": []}})
        );
        let back: Type = serde_json::from_value(json).unwrap();
        assert_eq!(back, Type::integer_interval(0, 90));
        assert_eq!(serde_json::to_value(Type::Boolean).unwrap(), "boolean");
    }
}
