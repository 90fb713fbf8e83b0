//! `PersistedState` (spec.md §3, §4.5 "crash recovery at startup"): the
//! single on-disk fact that lets a freshly started controller tell a
//! recording was in flight when it last ran.
//!
//! Grounded in [`crate::atomic_file`] for the write path; the teacher has
//! no equivalent (its `db.rs`/`db_worker.rs` persist completed segment
//! metadata to sqlite, not in-flight session state), so this is built
//! directly against the spec using the same atomic-write idiom the Config
//! Store and Exclusion Lock payload use.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::atomic_file;
use crate::constants;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub schema_version: u32,
    pub kind: String,
    pub match_id: String,
    pub started_at_unix: f64,
    pub output_dir: String,
    pub cameras_expected: Vec<u8>,
    pub last_heartbeat_unix: f64,
}

impl PersistedState {
    pub fn new(match_id: String, output_dir: String, cameras_expected: Vec<u8>) -> Self {
        let now = crate::alert::unix_now();
        Self {
            schema_version: SCHEMA_VERSION,
            kind: "recording".to_string(),
            match_id,
            started_at_unix: now,
            output_dir,
            cameras_expected,
            last_heartbeat_unix: now,
        }
    }

    pub fn age_seconds(&self) -> f64 {
        (crate::alert::unix_now() - self.last_heartbeat_unix).max(0.0)
    }

    pub fn is_stale(&self) -> bool {
        self.age_seconds() > constants::PERSISTED_STATE_STALE_AFTER_SECONDS
    }
}

pub struct PersistedStateStore {
    path: PathBuf,
}

impl PersistedStateStore {
    pub fn new() -> Self {
        Self::at(PathBuf::from(constants::PERSISTED_STATE_PATH))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Written by the Recording Service on transition into `Active`, and
    /// again on each heartbeat (spec.md §4.5 step 5).
    pub fn write(&self, state: &PersistedState) -> Result<()> {
        atomic_file::write_json_atomic(&self.path, state)
    }

    /// Deleted on a clean stop (spec.md §4.5 step 6) or after the
    /// recovery check at startup consumes it (§4.5 "crash recovery").
    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {}", self.path.display())),
        }
    }

    /// Reads whatever `PersistedState` is on disk at startup, if any.
    /// The core never resumes a recording from this: by definition no
    /// live pipeline handles exist the moment the process starts, so any
    /// file found here describes an incomplete prior run (spec.md §4.5).
    pub fn read(&self) -> Result<Option<PersistedState>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let state = serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", self.path.display()))?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}

impl Default for PersistedStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the crash-recovery check described in spec.md §4.5: if a
/// `PersistedState` file exists, it necessarily describes an incomplete
/// prior run (the segments it names are left untouched on disk), so this
/// emits a `recovered_incomplete` alert naming the match and deletes the
/// file. Never attempts to resume recording.
pub fn recover_at_startup(store: &PersistedStateStore, alerts: &crate::alert::AlertRing) -> Result<()> {
    if let Some(state) = store.read()? {
        crate::alert::alert("recovered_incomplete", crate::alert::Severity::Warn)
            .session(state.match_id.clone())
            .field("output_dir", &state.output_dir)
            .field("age_seconds", state.age_seconds())
            .emit(alerts);
        store.delete()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = PersistedStateStore::at(dir.path().join("state.json"));
        let state = PersistedState::new("match_1".into(), "/rec/match_1".into(), vec![0, 1]);
        store.write(&state).unwrap();
        let read_back = store.read().unwrap().unwrap();
        assert_eq!(read_back.match_id, "match_1");
        assert_eq!(read_back.cameras_expected, vec![0, 1]);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = PersistedStateStore::at(dir.path().join("state.json"));
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = PersistedStateStore::at(dir.path().join("state.json"));
        store.delete().unwrap();
        store.delete().unwrap();
    }

    #[test]
    fn recovery_deletes_state_and_never_resumes() {
        let dir = TempDir::new().unwrap();
        let store = PersistedStateStore::at(dir.path().join("state.json"));
        let alerts = crate::alert::AlertRing::with_capacity(dir.path().join("alerts.ndjson"), 10);
        let state = PersistedState::new("match_1".into(), "/rec/match_1".into(), vec![0, 1]);
        store.write(&state).unwrap();

        recover_at_startup(&store, &alerts).unwrap();

        assert!(store.read().unwrap().is_none());
        let recorded = alerts.alerts(10);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].kind, "recovered_incomplete");
    }
}
