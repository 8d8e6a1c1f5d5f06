//! Computed payloads of nodes.

use serde::{Deserialize, Serialize};

use crate::budget::{AttributeAllocation, Budget};
use crate::constants::DATA;
use crate::schema::{Path, Statistics, Type};

/// A literal or inferred scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Scalar {
    ProtectedPaths(Path),
    PublicPaths(Path),
    /// A user-facing data type for the data part of a protected dataset.
    UserSettings(Type),
    Budget(Budget),
    AttributesBudget(AttributeAllocation),
}

impl Scalar {
    /// The node kind holding this scalar.
    pub fn kind(&self) -> super::NodeKind {
        use super::NodeKind;
        match self {
            Scalar::ProtectedPaths(_) => NodeKind::ProtectedPaths,
            Scalar::PublicPaths(_) => NodeKind::PublicPaths,
            Scalar::UserSettings(_) => NodeKind::UserSettings,
            Scalar::Budget(_) => NodeKind::Budget,
            Scalar::AttributesBudget(_) => NodeKind::AttributesBudget,
        }
    }
}

/// The computed content of a dataset node: its type and size, plus the
/// privacy annotations accumulated along its lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub type_: Type,
    /// Protected tables, set once the dataset has been protected.
    pub protected: Option<Path>,
    pub statistics: Statistics,
    /// Attribute allocation bound by `assign_budget`.
    pub budget: Option<AttributeAllocation>,
}

impl Dataset {
    /// The type of the original data: the `data` member of a protected
    /// dataset, or the whole type otherwise.
    pub fn data_type(&self) -> &Type {
        if self.protected.is_some() {
            if let Some(field) = self.type_.field(DATA) {
                return &field.type_;
            }
        }
        &self.type_
    }

    pub fn is_protected(&self) -> bool {
        self.protected.is_some()
    }
}

/// What evaluating a node yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Dataset(Dataset),
    Scalar(Scalar),
}

impl Value {
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Value::Dataset(dataset) => Some(dataset),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(scalar) => Some(scalar),
            Value::Dataset(_) => None,
        }
    }
}
