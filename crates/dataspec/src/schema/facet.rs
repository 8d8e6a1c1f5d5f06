//! Schema and size facets derived from dataset nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::budget::AttributeAllocation;
use crate::constants::DATA;
use crate::error::{DataSpecError, Result};
use crate::node::{Dataset, NodeId, NodeKind};

use super::{Path, Statistics, Type};

/// The schema of a dataset node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    uuid: NodeId,
    dataset: NodeId,
    #[serde(rename = "type")]
    type_: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protected: Option<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    budget: Option<AttributeAllocation>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl Schema {
    /// The schema of `dataset`, the value of node `id`.
    pub fn of(id: &NodeId, dataset: &Dataset) -> Self {
        Self {
            uuid: NodeId::derived(NodeKind::Schema, id),
            dataset: id.clone(),
            type_: dataset.type_.clone(),
            protected: dataset.protected.clone(),
            budget: dataset.budget.clone(),
            extra: BTreeMap::new(),
        }
    }

    pub fn uuid(&self) -> &NodeId {
        &self.uuid
    }

    pub fn dataset(&self) -> &NodeId {
        &self.dataset
    }

    pub fn type_(&self) -> &Type {
        &self.type_
    }

    pub fn protected(&self) -> Option<&Path> {
        self.protected.as_ref()
    }

    pub fn budget(&self) -> Option<&AttributeAllocation> {
        self.budget.as_ref()
    }

    /// The type of the original data.
    pub fn data_type(&self) -> &Type {
        match (&self.protected, self.type_.field(DATA)) {
            (Some(_), Some(field)) => &field.type_,
            _ => &self.type_,
        }
    }

    /// Column paths of the original data.
    pub fn columns(&self) -> Vec<Vec<String>> {
        self.data_type().columns()
    }

    pub fn extra(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extra
    }

    /// Check the identity is the one derived from the dataset.
    pub fn verify(&self) -> Result<()> {
        verify_derived(NodeKind::Schema, &self.uuid, &self.dataset)
    }
}

/// The size of a dataset node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    uuid: NodeId,
    dataset: NodeId,
    statistics: Statistics,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl Size {
    pub fn of(id: &NodeId, dataset: &Dataset) -> Self {
        Self {
            uuid: NodeId::derived(NodeKind::Size, id),
            dataset: id.clone(),
            statistics: dataset.statistics.clone(),
            extra: BTreeMap::new(),
        }
    }

    pub fn uuid(&self) -> &NodeId {
        &self.uuid
    }

    pub fn dataset(&self) -> &NodeId {
        &self.dataset
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn extra(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extra
    }

    pub fn verify(&self) -> Result<()> {
        verify_derived(NodeKind::Size, &self.uuid, &self.dataset)
    }
}

fn verify_derived(kind: NodeKind, uuid: &NodeId, dataset: &NodeId) -> Result<()> {
    let expected = NodeId::derived(kind, dataset);
    if &expected != uuid {
        return Err(DataSpecError::decode(format!(
            "{} identity {} is not derived from dataset {}",
            kind, uuid, dataset
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldStatistics};

    fn dataset() -> Dataset {
        Dataset {
            type_: Type::Union {
                fields: vec![Field::new(
                    "census",
                    Type::Struct {
                        fields: vec![Field::new("age", Type::integer())],
                    },
                )],
            },
            protected: None,
            statistics: Statistics::union(vec![FieldStatistics::new(
                "census",
                Statistics::table(7, ["age"]),
            )]),
            budget: None,
        }
    }

    #[test]
    fn test_facets_are_derived_from_dataset() {
        let id = NodeId::from_digest(b"census");
        let schema = Schema::of(&id, &dataset());
        let size = Size::of(&id, &dataset());
        assert_eq!(schema.dataset(), &id);
        assert_ne!(schema.uuid(), size.uuid());
        assert!(schema.verify().is_ok());
        assert!(size.verify().is_ok());
        assert_eq!(schema.columns(), vec![vec!["census", "age"]]);
        assert_eq!(size.statistics().size(), 7);
    }

    #[test]
    fn test_verify_rejects_foreign_identity() {
        let schema = Schema::of(&NodeId::from_digest(b"a"), &dataset());
        let mut value = serde_json::to_value(&schema).unwrap();
        value["dataset"] = serde_json::json!(NodeId::from_digest(b"b").to_string());
        let moved: Schema = serde_json::from_value(value).unwrap();
        assert!(moved.verify().is_err());
    }
}
