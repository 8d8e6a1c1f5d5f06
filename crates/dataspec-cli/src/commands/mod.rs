//! CLI command implementations.

pub mod inspect;
pub mod run;
pub mod set_status;
pub mod status;
pub mod transforms;

use std::path::Path;

use dataspec::{Manager, ManagerConfig, SqliteStore};

/// A manager over the SQLite store at `path`.
pub fn open_manager(
    path: &Path,
    config: ManagerConfig,
) -> Result<Manager, Box<dyn std::error::Error>> {
    let store = SqliteStore::open(path)?;
    Ok(Manager::new(store, config)?)
}
