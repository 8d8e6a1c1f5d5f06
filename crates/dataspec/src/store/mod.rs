//! Shared storage for node definitions and statuses.
//!
//! Every manager sharing a store observes the same statuses: reads always
//! go to the store, and each write is a single atomic upsert per
//! `(node, task)` key that bumps the key's version.

mod memory;
mod sqlite;

use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{DataSpecError, Result};
use crate::node::{Node, NodeId};
use crate::status::{State, Status, StatusUpdate, WritePolicy};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Versioned, shared map from `(node, task)` to [`Status`].
pub trait StatusStore: Send + Sync {
    /// The current status, if one was ever written.
    fn get(&self, node: &NodeId, task: &str) -> Result<Option<Status>>;

    /// Upsert a status under `policy`, returning the stored record.
    fn set(&self, update: StatusUpdate, policy: WritePolicy) -> Result<Status>;

    /// Every status of `node`, by task name.
    fn list(&self, node: &NodeId) -> Result<Vec<Status>>;

    /// Poll until `(node, task)` is ready.
    ///
    /// Returns the ready status, `UpstreamFailed` if the task reported an
    /// error, or `NotReady` once `timeout` has elapsed. A zero timeout
    /// checks once.
    fn await_ready(
        &self,
        node: &NodeId,
        task: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Status> {
        // Too far out to represent: wait without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            match self.get(node, task)? {
                Some(status) if status.state == State::Ready => return Ok(status),
                Some(status) if status.state == State::Error => {
                    return Err(DataSpecError::UpstreamFailed {
                        node: node.clone(),
                        task: task.to_string(),
                        reason: status.reason().to_string(),
                    });
                }
                _ => {}
            }
            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(DataSpecError::NotReady {
                        node: node.clone(),
                        task: task.to_string(),
                    });
                }
                Some(deadline) => poll_interval.min(deadline - now),
                None => poll_interval,
            };
            trace!(%node, task, "waiting for status");
            thread::sleep(wait);
        }
    }
}

/// Content-addressed storage of node definitions.
pub trait NodeStore: Send + Sync {
    /// Store `node` unless its identity is already present.
    fn put_node(&self, node: &Node) -> Result<()>;

    /// Decode and verify the node stored under `id`.
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>>;

    fn contains_node(&self, id: &NodeId) -> Result<bool> {
        Ok(self.get_node(id)?.is_some())
    }
}
