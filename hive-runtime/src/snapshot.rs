//! Durable node snapshots
//!
//! A snapshot carries what should survive a restart: the credit ledger, the
//! agent's lifetime counters and the persona's learned affinities. Signals
//! themselves are ephemeral, but every newly stored signal is appended to a JSONL
//! log for offline inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use hive_core::{CreditSnapshot, Pheromone};

/// Snapshot persistence errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted node state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub agent_id: String,
    pub saved_at: DateTime<Utc>,
    pub tick: u64,
    pub credits: CreditSnapshot,
    pub signals_emitted: u64,
    pub thoughts: u64,
    pub transitions: u64,
    pub persona_id: String,
    #[serde(default)]
    pub affinity: BTreeMap<String, f64>,
    /// Store size at save time, informational only
    pub signals_held: usize,
    pub density: f64,
}

/// Where snapshots and the signal log live
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &NodeSnapshot) -> Result<(), SnapshotError>;

    /// Latest snapshot for `agent_id`, if any
    fn load(&self, agent_id: &str) -> Result<Option<NodeSnapshot>, SnapshotError>;

    fn append_signal(&self, agent_id: &str, signal: &Pheromone) -> Result<(), SnapshotError>;
}

/// JSON files under one directory.
///
/// `<dir>/<agent>.json` is replaced atomically through a temp file and a
/// rename; `<dir>/<agent>.signals.jsonl` grows by one line per signal.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
}

impl JsonFileSnapshotStore {
    /// Open the store, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, SnapshotError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(agent_id)))
    }

    pub fn signal_log_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{}.signals.jsonl", file_stem(agent_id)))
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn save(&self, snapshot: &NodeSnapshot) -> Result<(), SnapshotError> {
        let path = self.snapshot_path(&snapshot.agent_id);
        let tmp = path.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, agent_id: &str) -> Result<Option<NodeSnapshot>, SnapshotError> {
        let path = self.snapshot_path(agent_id);
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    fn append_signal(&self, agent_id: &str, signal: &Pheromone) -> Result<(), SnapshotError> {
        let mut line = serde_json::to_vec(signal)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.signal_log_path(agent_id))?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Agent ids are free-form; keep file names to a safe alphabet
fn file_stem(agent_id: &str) -> String {
    agent_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
