//! Dataspec: content-addressed dataset lineage with shared readiness status.
//!
//! Datasets are immutable nodes of a lineage graph. Each node is produced
//! by a named, versioned transform applied to parent nodes, and its
//! identity is the hash of that definition, so equal requests resolve to
//! the same node in every process.
//!
//! # Core Principles
//!
//! - **Deterministic**: Transforms are pure, and inference transforms look
//!   only at their input
//! - **Shared status**: Readiness lives in a store every manager reads
//! - **Bounded budgets**: Attribute allocations never spend more than the
//!   total they were split from
//!
//! # Example
//!
//! ```no_run
//! use dataspec::source::{Catalog, TableName};
//! use dataspec::{Manager, ManagerConfig, Pipeline, SqliteStore};
//!
//! let catalog = Catalog::load("catalog.json").unwrap();
//! let store = SqliteStore::open("status.db").unwrap();
//! let manager = Manager::new(store, ManagerConfig::default()).unwrap();
//!
//! let tables = ["extract.census".parse::<TableName>().unwrap()];
//! let source = manager.source(&catalog, "sqlite:///census.db", &tables).unwrap();
//! manager.set_big_data(source.uuid(), false).unwrap();
//!
//! let output = Pipeline::new(&manager).run(&source).unwrap();
//! manager.export(output.result()).unwrap().write_to("out").unwrap();
//! ```

pub mod budget;
pub mod constants;
pub mod error;
pub mod node;
pub mod schema;
pub mod source;
pub mod status;
pub mod store;
pub mod transform;
pub mod wire;

mod config;
mod manager;
mod pipeline;

pub use budget::{AttributeAllocation, Budget, BudgetPolicy, PrivacyBudget};
pub use config::ManagerConfig;
pub use error::{DataSpecError, Result};
pub use manager::Manager;
pub use node::{Node, NodeId, NodeKind, Scalar, Value};
pub use pipeline::{Pipeline, PipelineOutput};
pub use status::{State, Status, WritePolicy};
pub use store::{MemoryStore, NodeStore, SqliteStore, StatusStore};
pub use transform::{Parameters, Transform, TransformKind};
pub use wire::{AnyArtifact, Artifact, Artifacts};
