//! In-process store shared by cloning the handle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{DataSpecError, Result};
use crate::node::{Node, NodeId};
use crate::status::{Status, StatusUpdate, WritePolicy};
use crate::wire::Artifact;

use super::{NodeStore, StatusStore};

#[derive(Debug, Default)]
struct Inner {
    statuses: BTreeMap<(NodeId, String), Status>,
    nodes: BTreeMap<NodeId, Vec<u8>>,
}

/// Statuses and node encodings held in memory.
///
/// Clones share the same state, so several managers in one process can be
/// given clones of one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| DataSpecError::StoreUnavailable("memory store lock poisoned".to_string()))
    }
}

impl StatusStore for MemoryStore {
    fn get(&self, node: &NodeId, task: &str) -> Result<Option<Status>> {
        let inner = self.lock()?;
        Ok(inner.statuses.get(&(node.clone(), task.to_string())).cloned())
    }

    fn set(&self, update: StatusUpdate, policy: WritePolicy) -> Result<Status> {
        let mut inner = self.lock()?;
        let key = (update.node.clone(), update.task.clone());
        let current = inner.statuses.get(&key).map(|s| (s.state, s.version));
        let status = update.apply(current, policy, Utc::now())?;
        inner.statuses.insert(key, status.clone());
        Ok(status)
    }

    fn list(&self, node: &NodeId) -> Result<Vec<Status>> {
        let inner = self.lock()?;
        Ok(inner
            .statuses
            .iter()
            .filter(|((id, _), _)| id == node)
            .map(|(_, status)| status.clone())
            .collect())
    }
}

impl NodeStore for MemoryStore {
    fn put_node(&self, node: &Node) -> Result<()> {
        let bytes = node.encode()?;
        let mut inner = self.lock()?;
        inner.nodes.entry(node.uuid().clone()).or_insert(bytes);
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        let bytes = {
            let inner = self.lock()?;
            inner.nodes.get(id).cloned()
        };
        bytes.map(|bytes| Node::decode(&bytes)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::conformance;

    #[test]
    fn test_upsert_and_versions() {
        conformance::upsert_and_versions(&MemoryStore::new());
    }

    #[test]
    fn test_rejects_terminal_change() {
        conformance::rejects_terminal_change(&MemoryStore::new());
    }

    #[test]
    fn test_lists_by_task() {
        conformance::lists_by_task(&MemoryStore::new());
    }

    #[test]
    fn test_await_ready_outcomes() {
        conformance::await_ready_outcomes(&MemoryStore::new());
    }

    #[test]
    fn test_concurrent_writers() {
        conformance::concurrent_writers_lose_nothing(Arc::new(MemoryStore::new()));
    }

    #[test]
    fn test_nodes_round_trip() {
        conformance::nodes_round_trip(&MemoryStore::new());
    }

    #[test]
    fn test_clones_share_state() {
        let a = MemoryStore::new();
        let b = a.clone();
        let node = NodeId::from_digest(b"shared");
        a.set(
            StatusUpdate::new(&node, "compute", crate::status::State::Ready),
            WritePolicy::Transition,
        )
        .unwrap();
        assert!(b.get(&node, "compute").unwrap().is_some());
    }
}
