//! Health & Alert Channel (C7, spec.md §4.7): counters plus the two read
//! queries the Control Surface exposes over it, `recording_health` and
//! `correlate`.
//!
//! Grounded in the teacher's habit of threading `tracing` spans/counters
//! through `cam_service.rs`; this module turns the informal "what have we
//! seen" tracking the teacher does ad hoc into one typed counter struct
//! shared by the Recording and Preview Services, and reuses
//! [`crate::alert::AlertRing`] as the event feed rather than inventing a
//! second channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::alert::{Alert, AlertRing};
use crate::pipeline::{HandleState, PipelineHandle};

#[derive(Debug, Default)]
pub struct Counters {
    pub start_attempts: AtomicU64,
    pub start_failures: AtomicU64,
    pub protected_stop_hits: AtomicU64,
    pub forced_teardowns: AtomicU64,
    pub retry_count: AtomicU64,
    pub eos_timeouts: AtomicU64,
    pub overload_triggers: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            start_attempts: self.start_attempts.load(Ordering::Relaxed),
            start_failures: self.start_failures.load(Ordering::Relaxed),
            protected_stop_hits: self.protected_stop_hits.load(Ordering::Relaxed),
            forced_teardowns: self.forced_teardowns.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
            eos_timeouts: self.eos_timeouts.load(Ordering::Relaxed),
            overload_triggers: self.overload_triggers.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CountersSnapshot {
    pub start_attempts: u64,
    pub start_failures: u64,
    pub protected_stop_hits: u64,
    pub forced_teardowns: u64,
    pub retry_count: u64,
    pub eos_timeouts: u64,
    pub overload_triggers: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerCameraHealth {
    pub state: String,
    pub uptime_seconds: Option<f64>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordingHealth {
    pub per_camera: HashMap<u8, PerCameraHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelatedEvent {
    pub camera_id: Option<u8>,
    pub kinds: Vec<String>,
    pub window_start_unix: f64,
    pub window_end_unix: f64,
}

/// Most recent integrity-probe verdict per camera, fed by the Recording
/// Service's probe loop (spec.md §4.5.4) and read back by
/// `recording_health`.
#[derive(Debug, Clone, Default)]
pub struct IntegrityVerdict {
    pub ok: bool,
    pub consecutive_failures: u32,
    pub note: Option<String>,
}

pub struct HealthChannel {
    pub alerts: AlertRing,
    pub counters: Counters,
    integrity: Mutex<HashMap<u8, IntegrityVerdict>>,
}

impl HealthChannel {
    pub fn new(alerts: AlertRing) -> Self {
        Self { alerts, counters: Counters::default(), integrity: Mutex::new(HashMap::new()) }
    }

    pub fn record_integrity(&self, camera_id: u8, verdict: IntegrityVerdict) {
        self.integrity.lock().unwrap().insert(camera_id, verdict);
    }

    pub fn clear_integrity(&self, camera_id: u8) {
        self.integrity.lock().unwrap().remove(&camera_id);
    }

    /// Consecutive-failure streak recorded by the previous probe tick, used
    /// to escalate alert severity once a camera fails twice in a row
    /// (spec.md §4.5.4). Zero if the camera has no recorded verdict yet.
    pub fn integrity_streak(&self, camera_id: u8) -> u32 {
        self.integrity.lock().unwrap().get(&camera_id).map(|v| v.consecutive_failures).unwrap_or(0)
    }

    /// `alerts(max) -> list<Alert>` (spec.md §4.7).
    pub fn alerts(&self, max: usize) -> Vec<Alert> {
        self.alerts.alerts(max)
    }

    /// `recording_health() -> {per_camera: {state, uptime, issues}}`.
    /// `handles` may be empty (no active session): every camera then
    /// reports state `"idle"` with no issues.
    pub fn recording_health(&self, handles: &[(u8, Option<&PipelineHandle>)]) -> RecordingHealth {
        let integrity = self.integrity.lock().unwrap();
        let mut per_camera = HashMap::new();

        for (camera_id, handle) in handles {
            let mut issues = Vec::new();
            let (state, uptime_seconds) = match handle {
                Some(h) => {
                    if let Some((code, _)) = h.last_error() {
                        issues.push(format!("runtime error: {code}"));
                    }
                    (format!("{:?}", h.state()).to_lowercase(), h.uptime().map(|d| d.as_secs_f64()))
                }
                None => ("idle".to_string(), None),
            };

            if let Some(v) = integrity.get(camera_id) {
                if !v.ok {
                    issues.push(v.note.clone().unwrap_or_else(|| "integrity check failed".to_string()));
                }
            }

            per_camera.insert(*camera_id, PerCameraHealth { state, uptime_seconds, issues });
        }

        RecordingHealth { per_camera }
    }

    /// `correlate(window_s) -> [CorrelatedEvent]` (spec.md §4.7): groups
    /// recent alerts that share a camera and fall within `window_s`
    /// seconds of each other, surfacing e.g. a runtime error alongside
    /// the stop-timeout or integrity-fail alert it likely caused.
    pub fn correlate(&self, window_s: f64) -> Vec<CorrelatedEvent> {
        let mut recent = self.alerts(4096);
        recent.sort_by(|a, b| a.timestamp_unix.partial_cmp(&b.timestamp_unix).unwrap());

        let mut groups: Vec<CorrelatedEvent> = Vec::new();
        for alert in recent {
            if let Some(last) = groups.last_mut() {
                if last.camera_id == alert.camera_id && alert.timestamp_unix - last.window_end_unix <= window_s {
                    last.kinds.push(alert.kind.clone());
                    last.window_end_unix = alert.timestamp_unix;
                    continue;
                }
            }
            groups.push(CorrelatedEvent {
                camera_id: alert.camera_id,
                kinds: vec![alert.kind.clone()],
                window_start_unix: alert.timestamp_unix,
                window_end_unix: alert.timestamp_unix,
            });
        }

        groups.into_iter().filter(|g| g.kinds.len() > 1).collect()
    }
}

impl std::fmt::Debug for HealthChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChannel").field("counters", &self.counters.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn channel() -> (TempDir, HealthChannel) {
        let dir = TempDir::new().unwrap();
        let ring = AlertRing::with_capacity(dir.path().join("alerts.ndjson"), 64);
        (dir, HealthChannel::new(ring))
    }

    #[test]
    fn recording_health_reports_idle_with_no_handles() {
        let (_dir, health) = channel();
        let report = health.recording_health(&[(0, None), (1, None)]);
        assert_eq!(report.per_camera[&0].state, "idle");
        assert!(report.per_camera[&0].issues.is_empty());
    }

    #[test]
    fn integrity_failure_surfaces_as_an_issue() {
        let (_dir, health) = channel();
        health.record_integrity(0, IntegrityVerdict { ok: false, consecutive_failures: 2, note: Some("stalled".into()) });
        let report = health.recording_health(&[(0, None)]);
        assert_eq!(report.per_camera[&0].issues, vec!["stalled".to_string()]);
    }

    #[test]
    fn correlate_groups_alerts_within_window() {
        let (_dir, health) = channel();
        crate::alert::alert("runtime_error", crate::alert::Severity::Error)
            .camera(0)
            .emit(&health.alerts);
        crate::alert::alert("recording_integrity_failed", crate::alert::Severity::Error)
            .camera(0)
            .emit(&health.alerts);

        let correlated = health.correlate(60.0);
        assert_eq!(correlated.len(), 1);
        assert_eq!(correlated[0].kinds.len(), 2);
    }
}
