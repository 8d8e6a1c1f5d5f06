//! User-facing type inference and application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{DATA, USER_TYPE};
use crate::error::{DataSpecError, Result};
use crate::node::Dataset;
use crate::schema::{Field, Type};

const MAX_CATEGORIES: &str = "max_categories";

/// Policy of `automatic_user_settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettingsPolicy {
    /// Text columns with more categories than this become free text.
    pub max_categories: u64,
}

impl Default for UserSettingsPolicy {
    fn default() -> Self {
        Self { max_categories: 64 }
    }
}

impl UserSettingsPolicy {
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(MAX_CATEGORIES.to_string(), self.max_categories.to_string())])
    }

    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self> {
        let raw = properties.get(MAX_CATEGORIES).ok_or_else(|| {
            DataSpecError::parameter("automatic_user_settings", MAX_CATEGORIES, "missing property")
        })?;
        let max_categories = raw.parse::<u64>().map_err(|e| {
            DataSpecError::parameter(
                "automatic_user_settings",
                MAX_CATEGORIES,
                format!("'{}': {}", raw, e),
            )
        })?;
        Ok(Self { max_categories })
    }
}

/// The data type of a protected dataset, with text columns having more
/// than `max_categories` possible values relaxed to free text.
pub fn automatic_user_settings(dataset: &Dataset, policy: &UserSettingsPolicy) -> Type {
    relax(dataset.data_type(), policy.max_categories)
}

fn relax(ty: &Type, max_categories: u64) -> Type {
    match ty {
        Type::Text {
            encoding,
            possible_values,
        } if possible_values.len() as u64 > max_categories => Type::Text {
            encoding: encoding.clone(),
            possible_values: Vec::new(),
        },
        Type::Struct { fields } => Type::Struct {
            fields: relax_fields(fields, max_categories),
        },
        Type::Union { fields } => Type::Union {
            fields: relax_fields(fields, max_categories),
        },
        Type::Optional { type_ } => Type::optional(relax(type_, max_categories)),
        Type::List { type_, max_size } => Type::List {
            type_: Box::new(relax(type_, max_categories)),
            max_size: *max_size,
        },
        other => other.clone(),
    }
}

fn relax_fields(fields: &[Field], max_categories: u64) -> Vec<Field> {
    fields
        .iter()
        .map(|field| Field {
            name: field.name.clone(),
            type_: relax(&field.type_, max_categories),
            properties: field.properties.clone(),
        })
        .collect()
}

/// Replace the data type of a protected dataset with `user_type`.
///
/// The user type must declare the same tables with the same columns in the
/// same order; column types are free to change. Properties of the original
/// members (such as the public marker) are kept.
pub fn user_settings(dataset: &Dataset, user_type: &Type) -> Result<Dataset> {
    let invalid = |message: String| DataSpecError::parameter("user_settings", USER_TYPE, message);

    user_type.validate().map_err(invalid)?;
    let layout = |ty: &Type| -> Vec<(Vec<String>, Vec<String>)> {
        ty.tables()
            .into_iter()
            .map(|table| {
                let columns = table.columns.iter().map(|c| c.name.clone()).collect();
                (table.path, columns)
            })
            .collect()
    };
    let expected = layout(dataset.data_type());
    let actual = layout(user_type);
    if expected != actual {
        return Err(invalid(format!(
            "tables and columns differ from the dataset: expected {:?}, got {:?}",
            expected, actual
        )));
    }

    let data = keep_properties(dataset.data_type(), user_type);
    let type_ = match &dataset.type_ {
        Type::Struct { fields } => Type::Struct {
            fields: fields
                .iter()
                .map(|field| {
                    if field.name == DATA {
                        Field {
                            name: field.name.clone(),
                            type_: data.clone(),
                            properties: field.properties.clone(),
                        }
                    } else {
                        field.clone()
                    }
                })
                .collect(),
        },
        _ => {
            return Err(DataSpecError::contract(
                "user_settings",
                "input is not a protected dataset",
            ));
        }
    };

    Ok(Dataset {
        type_,
        protected: dataset.protected.clone(),
        statistics: dataset.statistics.clone(),
        budget: dataset.budget.clone(),
    })
}

/// `user` with member properties of `original` merged in (original wins).
fn keep_properties(original: &Type, user: &Type) -> Type {
    match (original, user) {
        (Type::Union { fields: before }, Type::Union { fields: after }) => Type::Union {
            fields: merge_fields(before, after),
        },
        (Type::Struct { fields: before }, Type::Struct { fields: after }) => Type::Struct {
            fields: merge_fields(before, after),
        },
        _ => user.clone(),
    }
}

fn merge_fields(before: &[Field], after: &[Field]) -> Vec<Field> {
    after
        .iter()
        .map(|field| match before.iter().find(|f| f.name == field.name) {
            Some(original) => {
                let mut properties = field.properties.clone();
                properties.extend(original.properties.clone());
                Field {
                    name: field.name.clone(),
                    type_: keep_properties(&original.type_, &field.type_),
                    properties,
                }
            }
            None => field.clone(),
        })
        .collect()
}
