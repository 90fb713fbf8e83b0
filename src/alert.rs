//! Alert ring + append-only structured log sink (part of C7, spec.md §3,
//! §4.7). Every subsystem that needs to tell the operator something —
//! Config Store on a rejected reload, Recording Service on a non-graceful
//! stop, the integrity probe on a stalled segment — goes through here.
//!
//! Grounded in the teacher's `tracing` usage throughout `cam_service.rs`
//! (structured `tracing::error!`/`warn!` call sites); this module adds the
//! bounded in-memory ring and ndjson sink the spec calls for on top of
//! that, emitting a `tracing` event at the matching level for every alert
//! so the two observability surfaces never drift apart.

use std::collections::VecDeque;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: String,
    pub severity: Severity,
    pub camera_id: Option<u8>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub fields: HashMap<String, String>,
    pub timestamp_unix: f64,
}

pub struct AlertRing {
    log_path: PathBuf,
    capacity: usize,
    ring: Mutex<VecDeque<Alert>>,
}

impl AlertRing {
    pub fn new() -> Self {
        Self::with_capacity(PathBuf::from(constants::ALERT_LOG_PATH), constants::DEFAULT_ALERT_RING_CAPACITY)
    }

    pub fn with_capacity(log_path: PathBuf, capacity: usize) -> Self {
        Self { log_path, capacity, ring: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    /// Records `alert`: pushes it onto the bounded ring (dropping the
    /// oldest entry on overflow), appends it to the ndjson log, and
    /// mirrors it into `tracing` at the matching level.
    pub fn emit(&self, alert: Alert) {
        match alert.severity {
            Severity::Info => tracing::info!(kind = %alert.kind, camera_id = ?alert.camera_id, "{}", alert.kind),
            Severity::Warn => tracing::warn!(kind = %alert.kind, camera_id = ?alert.camera_id, "{}", alert.kind),
            Severity::Error => tracing::error!(kind = %alert.kind, camera_id = ?alert.camera_id, "{}", alert.kind),
        }

        if let Err(err) = self.append_to_log(&alert) {
            tracing::warn!(error = %err, "failed to append alert to log sink");
        }

        let mut ring = self.ring.lock().unwrap();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(alert);
    }

    fn append_to_log(&self, alert: &Alert) -> std::io::Result<()> {
        if let Some(dir) = self.log_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut line = serde_json::to_vec(alert).expect("Alert always serializes");
        line.push(b'\n');
        OpenOptions::new().create(true).append(true).open(&self.log_path)?.write_all(&line)
    }

    /// Returns up to `max` most recent alerts, newest last.
    pub fn alerts(&self, max: usize) -> Vec<Alert> {
        let ring = self.ring.lock().unwrap();
        let skip = ring.len().saturating_sub(max);
        ring.iter().skip(skip).cloned().collect()
    }
}

impl Default for AlertRing {
    fn default() -> Self {
        Self::new()
    }
}

pub fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Convenience builder: `alert("recording_started", Severity::Info).camera(0).emit(&ring)`
/// reads better at call sites than constructing the struct literal each time.
pub struct AlertBuilder {
    kind: String,
    severity: Severity,
    camera_id: Option<u8>,
    session_id: Option<String>,
    fields: HashMap<String, String>,
}

pub fn alert(kind: impl Into<String>, severity: Severity) -> AlertBuilder {
    AlertBuilder {
        kind: kind.into(),
        severity,
        camera_id: None,
        session_id: None,
        fields: HashMap::new(),
    }
}

impl AlertBuilder {
    pub fn camera(mut self, camera_id: u8) -> Self {
        self.camera_id = Some(camera_id);
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }

    pub fn emit(self, ring: &AlertRing) {
        ring.emit(Alert {
            kind: self.kind,
            severity: self.severity,
            camera_id: self.camera_id,
            session_id: self.session_id,
            fields: self.fields,
            timestamp_unix: unix_now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ring_drops_oldest_on_overflow() {
        let dir = TempDir::new().unwrap();
        let ring = AlertRing::with_capacity(dir.path().join("alerts.ndjson"), 2);
        alert("a", Severity::Info).emit(&ring);
        alert("b", Severity::Info).emit(&ring);
        alert("c", Severity::Info).emit(&ring);

        let kinds: Vec<_> = ring.alerts(10).into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec!["b", "c"]);
    }

    #[test]
    fn log_sink_appends_one_line_per_alert() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.ndjson");
        let ring = AlertRing::with_capacity(path.clone(), 10);
        alert("recording_started", Severity::Info).camera(0).emit(&ring);
        alert("recording_stopped", Severity::Info).camera(0).emit(&ring);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn alerts_max_returns_most_recent() {
        let dir = TempDir::new().unwrap();
        let ring = AlertRing::with_capacity(dir.path().join("alerts.ndjson"), 10);
        for i in 0..5 {
            alert(format!("k{i}"), Severity::Info).emit(&ring);
        }
        let kinds: Vec<_> = ring.alerts(2).into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec!["k3", "k4"]);
    }
}
