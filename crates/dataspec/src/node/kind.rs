//! Node kind tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a node holds.
///
/// Dataset kinds carry a schema and a size. Scalar kinds are values
/// inferred from or bound to datasets. Facet kinds tag the derived
/// schema and size artifacts of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Dataset materialized by a source connector.
    Source,
    /// Dataset with privacy units declared.
    Protected,
    /// Protected dataset with user-adjusted types.
    UserAdjusted,
    /// Protected dataset bound to an attribute budget.
    Budgeted,
    /// Derived schema facet.
    Schema,
    /// Derived size facet.
    Size,
    /// Tables holding the privacy units.
    ProtectedPaths,
    /// Tables readable without protection.
    PublicPaths,
    /// User-facing data type.
    UserSettings,
    /// Total privacy budget.
    Budget,
    /// Budget split across protected attributes.
    AttributesBudget,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Protected => "protected",
            NodeKind::UserAdjusted => "user_adjusted",
            NodeKind::Budgeted => "budgeted",
            NodeKind::Schema => "schema",
            NodeKind::Size => "size",
            NodeKind::ProtectedPaths => "protected_paths",
            NodeKind::PublicPaths => "public_paths",
            NodeKind::UserSettings => "user_settings",
            NodeKind::Budget => "budget",
            NodeKind::AttributesBudget => "attributes_budget",
        }
    }

    /// Whether nodes of this kind are datasets.
    pub fn is_dataset(&self) -> bool {
        matches!(
            self,
            NodeKind::Source | NodeKind::Protected | NodeKind::UserAdjusted | NodeKind::Budgeted
        )
    }

    /// Whether nodes of this kind are scalar values.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            NodeKind::ProtectedPaths
                | NodeKind::PublicPaths
                | NodeKind::UserSettings
                | NodeKind::Budget
                | NodeKind::AttributesBudget
        )
    }

    /// Whether datasets of this kind declare privacy units.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            NodeKind::Protected | NodeKind::UserAdjusted | NodeKind::Budgeted
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
