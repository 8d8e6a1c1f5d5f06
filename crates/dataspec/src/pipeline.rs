//! The canonical chain from a source to a budgeted dataset.

use tracing::info;

use crate::error::Result;
use crate::manager::Manager;
use crate::node::Node;

/// Every node produced by a [`Pipeline`] run, in chain order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub source: Node,
    pub protected_paths: Node,
    pub public_paths: Node,
    pub protected: Node,
    pub user_type: Node,
    pub user_adjusted: Node,
    pub budget: Node,
    pub attributes_budget: Node,
    pub budgeted: Node,
}

impl PipelineOutput {
    /// The terminal dataset.
    pub fn result(&self) -> &Node {
        &self.budgeted
    }

    /// All nodes, source first.
    pub fn nodes(&self) -> [&Node; 9] {
        [
            &self.source,
            &self.protected_paths,
            &self.public_paths,
            &self.protected,
            &self.user_type,
            &self.user_adjusted,
            &self.budget,
            &self.attributes_budget,
            &self.budgeted,
        ]
    }
}

/// Protects a source, applies inferred user settings and binds an
/// automatically sized budget.
///
/// # Example
///
/// ```
/// use dataspec::schema::Type;
/// use dataspec::source::{Catalog, TableDef, TableName};
/// use dataspec::{Manager, Pipeline};
///
/// let catalog = Catalog::new().with_table(
///     "extract",
///     "census",
///     TableDef::new(100).with_column("age", Type::integer_interval(0, 120)),
/// );
/// let manager = Manager::in_memory()?;
/// let source = manager.source(&catalog, "sqlite:///census.db", &[TableName::new("extract", "census")])?;
/// manager.set_big_data(source.uuid(), false)?;
///
/// let output = Pipeline::new(&manager).run(&source)?;
/// let artifacts = manager.export(output.result())?;
/// assert!(!artifacts.schema.is_empty());
/// # Ok::<(), dataspec::DataSpecError>(())
/// ```
pub struct Pipeline<'a> {
    manager: &'a Manager,
}

impl<'a> Pipeline<'a> {
    pub fn new(manager: &'a Manager) -> Self {
        Self { manager }
    }

    pub fn run(&self, source: &Node) -> Result<PipelineOutput> {
        let manager = self.manager;
        info!(source = %source.uuid(), "pipeline started");

        let protected_paths = manager.automatic_protected_paths(source)?;
        let public_paths = manager.automatic_public_paths(source)?;
        let protected = manager.protect(source, Some(&protected_paths), Some(&public_paths))?;
        info!(node = %protected.uuid(), "protected");

        let user_type = manager.automatic_user_settings(&protected)?;
        let user_adjusted = manager.user_settings(&protected, Some(&user_type))?;
        info!(node = %user_adjusted.uuid(), "applied user settings");

        let budget = manager.automatic_budget(&user_adjusted)?;
        let attributes_budget = manager.attributes_budget(&budget)?;
        let budgeted = manager.assign_budget(&user_adjusted, &attributes_budget)?;
        info!(node = %budgeted.uuid(), "pipeline finished");

        Ok(PipelineOutput {
            source: source.clone(),
            protected_paths,
            public_paths,
            protected,
            user_type,
            user_adjusted,
            budget,
            attributes_budget,
            budgeted,
        })
    }
}
