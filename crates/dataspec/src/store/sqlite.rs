//! SQLite-backed store shared by processes opening the same file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use crate::error::{DataSpecError, Result};
use crate::node::{Node, NodeId};
use crate::status::{State, Status, StatusUpdate, WritePolicy};
use crate::wire::Artifact;

use super::{NodeStore, StatusStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;

    CREATE TABLE IF NOT EXISTS nodes (
      id TEXT PRIMARY KEY,
      definition BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS statuses (
      node_id TEXT NOT NULL,
      task TEXT NOT NULL,
      state TEXT NOT NULL,
      properties TEXT NOT NULL,
      version INTEGER NOT NULL,
      manager TEXT NOT NULL,
      updated_at TEXT NOT NULL,
      PRIMARY KEY (node_id, task)
    );
"#;

/// Statuses and node encodings in a SQLite database.
///
/// Each write runs in an immediate transaction, so concurrent writers on
/// the same file (threads or processes) are serialized per database and
/// no update is lost.
#[derive(Debug)]
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DataSpecError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn, Some(path.to_path_buf()))?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    /// A private database, gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DataSpecError::StoreUnavailable("sqlite connection lock poisoned".to_string()))
    }
}

/// Columns of a `statuses` row, in `SELECT_STATUS` order.
type StatusRow = (String, String, String, String, i64, String, String);

fn read_status(row: &Row<'_>) -> rusqlite::Result<StatusRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn to_status(row: StatusRow) -> Result<Status> {
    let (node, task, state, properties, version, manager, updated_at) = row;
    let properties: BTreeMap<String, String> = serde_json::from_str(&properties)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| {
            DataSpecError::StoreUnavailable(format!("corrupt timestamp '{}': {}", updated_at, e))
        })?
        .with_timezone(&Utc);
    Ok(Status {
        node: node.parse()?,
        task,
        state: state.parse()?,
        properties,
        version: version as u64,
        manager,
        updated_at,
    })
}

const SELECT_STATUS: &str =
    "SELECT node_id, task, state, properties, version, manager, updated_at FROM statuses";

impl StatusStore for SqliteStore {
    fn get(&self, node: &NodeId, task: &str) -> Result<Option<Status>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("{} WHERE node_id = ?1 AND task = ?2", SELECT_STATUS),
                params![node.as_str(), task],
                read_status,
            )
            .optional()?;
        row.map(to_status).transpose()
    }

    fn set(&self, update: StatusUpdate, policy: WritePolicy) -> Result<Status> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, i64)> = tx
            .query_row(
                "SELECT state, version FROM statuses WHERE node_id = ?1 AND task = ?2",
                params![update.node.as_str(), update.task],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let current = match current {
            Some((state, version)) => Some((state.parse::<State>()?, version as u64)),
            None => None,
        };

        // A rejected write rolls back when `tx` drops.
        let status = update.apply(current, policy, Utc::now())?;
        tx.execute(
            "INSERT INTO statuses (node_id, task, state, properties, version, manager, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (node_id, task) DO UPDATE SET
               state = excluded.state,
               properties = excluded.properties,
               version = excluded.version,
               manager = excluded.manager,
               updated_at = excluded.updated_at",
            params![
                status.node.as_str(),
                status.task,
                status.state.as_str(),
                serde_json::to_string(&status.properties)?,
                status.version as i64,
                status.manager,
                status.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(status)
    }

    fn list(&self, node: &NodeId) -> Result<Vec<Status>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE node_id = ?1 ORDER BY task", SELECT_STATUS))?;
        let rows = stmt.query_map(params![node.as_str()], read_status)?;
        let mut statuses = Vec::new();
        for row in rows {
            statuses.push(to_status(row?)?);
        }
        Ok(statuses)
    }
}

impl NodeStore for SqliteStore {
    fn put_node(&self, node: &Node) -> Result<()> {
        let bytes = node.encode()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO nodes (id, definition) VALUES (?1, ?2)",
            params![node.uuid().as_str(), bytes],
        )?;
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        let bytes: Option<Vec<u8>> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT definition FROM nodes WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?
        };
        bytes.map(|bytes| Node::decode(&bytes)).transpose()
    }
}
