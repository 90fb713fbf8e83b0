//! Recording Service (C5, spec.md §4.5) — the hard core: start, protect,
//! stop-with-drain, partial-failure rollback, state persistence, the
//! integrity probe, and the overload guard.
//!
//! Grounded in the teacher's `cam_service.rs` (the struct that owns both
//! cameras' pipelines and serializes start/stop against them) and
//! `recording_pipeline.rs` (the per-pipeline retry-on-build-failure
//! pattern), generalized from "one camera" to the full dual-camera state
//! machine spec.md §4.5 describes, with session transitions serialized by
//! one exclusive mutex per spec.md §5's ordering guarantees.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::alert::{alert, Severity};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::ControllerError;
use crate::health::{HealthChannel, IntegrityVerdict};
use crate::lock::{AcquireOutcome, ExclusionLock, Role};
use crate::persisted_state::{PersistedState, PersistedStateStore};
use crate::pipeline::builder;
use crate::pipeline::{DrainOutcome, HandleEvent, MediaRuntimeAdapter, PipelineHandle, PipelineRole};

/// Lets the Recording Service command Preview out of the way when it
/// force-acquires the Exclusion Lock (spec.md §4.5 step 3, "preview
/// yields"). Implemented by [`crate::preview::PreviewService`]; injected
/// after construction via [`RecordingService::set_preview_yield`] to
/// break the otherwise-circular `RecordingService` <-> `PreviewService`
/// dependency.
pub trait PreviewYield: Send + Sync {
    fn force_stop_all(&self);
}

/// Queried by [`crate::preview::PreviewService`] before it starts (spec.md
/// §4.6 step 1: preview refuses outright while a recording is in flight).
pub trait RecordingGuard: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Pluggable overload-trigger policy (spec.md §9 Open Question 2): given
/// consecutive samples of system load, decide whether the guard should
/// fire. The default implementation reads `/proc/loadavg`, the only
/// signal available without pulling in a system-metrics crate no example
/// in this pack depends on.
pub trait OverloadPolicy: Send + Sync {
    fn sample(&self) -> Option<f64>;
    fn threshold_percent(&self) -> f64;
}

pub struct LoadAvgOverloadPolicy {
    pub threshold_percent: f64,
}

impl OverloadPolicy for LoadAvgOverloadPolicy {
    fn sample(&self) -> Option<f64> {
        let text = std::fs::read_to_string("/proc/loadavg").ok()?;
        let one_minute: f64 = text.split_whitespace().next()?.parse().ok()?;
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as f64;
        Some((one_minute / cores) * 100.0)
    }

    fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraStartResult {
    pub id: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraStartFailure {
    pub id: u8,
    pub cause: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub success: bool,
    pub match_id: String,
    pub cameras_started: Vec<u8>,
    pub cameras_failed: Vec<CameraStartFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraStopResult {
    pub id: u8,
    pub graceful: bool,
    pub segment_count: u64,
    pub bytes: u64,
    pub integrity_ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    pub match_id: String,
    pub duration_s: f64,
    pub cameras: Vec<CameraStopResult>,
    /// Reflects only "did the session reach `Idle`" (spec.md §9 Open
    /// Question 3) — never folded with per-camera integrity.
    pub all_ok: bool,
}

/// Session snapshot for `get_status` (spec.md §6.1): `{recording, match_id?,
/// duration_s, cameras, protected}`.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSnapshot {
    pub recording: bool,
    pub match_id: Option<String>,
    pub duration_s: f64,
    pub protected: bool,
}

struct ActiveSession {
    match_id: String,
    started_at_mono: Instant,
    started_at_unix: f64,
    output_dir: String,
    protection_seconds: f64,
    eos_timeout_seconds: f64,
    require_all_cameras: bool,
    handles: HashMap<u8, PipelineHandle>,
    failed_cameras: Arc<Mutex<HashSet<u8>>>,
}

enum Session {
    Idle,
    Active(ActiveSession),
}

struct Inner {
    config: Arc<ConfigStore>,
    adapter: Arc<MediaRuntimeAdapter>,
    lock: Arc<ExclusionLock>,
    health: Arc<HealthChannel>,
    persisted: PersistedStateStore,
    overload_policy: Box<dyn OverloadPolicy>,
    preview_yield: OnceLock<Arc<dyn PreviewYield>>,
    session: Mutex<Session>,
}

#[derive(Clone)]
pub struct RecordingService {
    inner: Arc<Inner>,
}

#[derive(Debug, Default, Clone)]
pub struct StartRequest {
    pub match_id: Option<String>,
    pub force: bool,
    pub require_all_cameras: Option<bool>,
    pub recovery_max_attempts: Option<u32>,
}

impl RecordingService {
    pub fn new(
        config: Arc<ConfigStore>,
        adapter: Arc<MediaRuntimeAdapter>,
        lock: Arc<ExclusionLock>,
        health: Arc<HealthChannel>,
        persisted: PersistedStateStore,
    ) -> Self {
        let threshold = config.snapshot().recording_overload_cpu_percent_threshold;
        Self {
            inner: Arc::new(Inner {
                config,
                adapter,
                lock,
                health,
                persisted,
                overload_policy: Box::new(LoadAvgOverloadPolicy { threshold_percent: threshold }),
                preview_yield: OnceLock::new(),
                session: Mutex::new(Session::Idle),
            }),
        }
    }

    pub fn set_preview_yield(&self, preview: Arc<dyn PreviewYield>) {
        let _ = self.inner.preview_yield.set(preview);
    }

    pub fn current_match_id(&self) -> Option<String> {
        match &*self.inner.session.lock().unwrap() {
            Session::Active(a) => Some(a.match_id.clone()),
            Session::Idle => None,
        }
    }

    /// `get_status`'s `recording` field (spec.md §6.1).
    pub fn snapshot(&self) -> RecordingSnapshot {
        match &*self.inner.session.lock().unwrap() {
            Session::Idle => RecordingSnapshot {
                recording: false,
                match_id: None,
                duration_s: 0.0,
                protected: false,
            },
            Session::Active(a) => {
                let elapsed = a.started_at_mono.elapsed().as_secs_f64();
                RecordingSnapshot {
                    recording: true,
                    match_id: Some(a.match_id.clone()),
                    duration_s: elapsed,
                    protected: elapsed < a.protection_seconds,
                }
            }
        }
    }

    /// Camera ids currently holding a live handle in the active session, if
    /// any (used by the Control Surface to answer idempotent `start`
    /// requests without re-running the start sequence).
    pub fn active_camera_ids(&self) -> Vec<u8> {
        match &*self.inner.session.lock().unwrap() {
            Session::Active(a) => {
                let mut ids: Vec<u8> = a.handles.keys().copied().collect();
                ids.sort_unstable();
                ids
            }
            Session::Idle => Vec::new(),
        }
    }

    /// Feeds [`crate::health::HealthChannel::recording_health`]: calls
    /// `f` with `(camera_id, handle)` pairs for both cameras while holding
    /// the session lock, `None` for either camera not currently recording.
    pub fn with_active_handles<R>(&self, f: impl FnOnce(&[(u8, Option<&PipelineHandle>)]) -> R) -> R {
        let guard = self.inner.session.lock().unwrap();
        let pairs: Vec<(u8, Option<&PipelineHandle>)> = match &*guard {
            Session::Active(a) => [0u8, 1u8].map(|id| (id, a.handles.get(&id))).to_vec(),
            Session::Idle => vec![(0, None), (1, None)],
        };
        f(&pairs)
    }

    pub fn start(&self, req: StartRequest) -> Result<StartReport, ControllerError> {
        let already_active = matches!(&*self.inner.session.lock().unwrap(), Session::Active(_));
        if already_active {
            if !req.force {
                let match_id = self.current_match_id().unwrap_or_default();
                return Err(ControllerError::AlreadyRecording { match_id });
            }
            let _ = self.stop(true);
        }

        self.start_fresh(req)
    }

    fn start_fresh(&self, req: StartRequest) -> Result<StartReport, ControllerError> {
        self.inner.config.reload(&self.inner.health.alerts).ok();
        let cfg = self.inner.config.snapshot();
        let require_all_cameras = req.require_all_cameras.unwrap_or(cfg.recording_require_all_cameras);
        let max_attempts = req.recovery_max_attempts.unwrap_or(cfg.recording_recovery_max_attempts).max(1);
        let match_id = req
            .match_id
            .unwrap_or_else(|| format!("match_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")));

        match self.inner.lock.acquire(Role::Record, true) {
            Ok(AcquireOutcome::Busy(holder)) => return Err(ControllerError::LockBusy { held_by: holder }),
            Ok(AcquireOutcome::Stale(_)) | Ok(AcquireOutcome::Acquired) => {}
            Err(e) => return Err(ControllerError::ConfigIoError(e.to_string())),
        }
        if let Some(yielder) = self.inner.preview_yield.get() {
            yielder.force_stop_all();
        }

        let output_dir = format!("{}/{}", cfg.recording_root, match_id);
        let mut handles = HashMap::new();
        let mut started_ids = Vec::new();
        let mut failure: Option<CameraStartFailure> = None;
        let mut event_rxs: HashMap<u8, mpsc::Receiver<HandleEvent>> = HashMap::new();

        for camera_id in [0u8, 1u8] {
            let cam = match self.inner.config.get_camera(camera_id) {
                Ok(c) => c,
                Err(e) => {
                    failure = Some(CameraStartFailure { id: camera_id, cause: e.to_string() });
                    break;
                }
            };

            self.inner.health.counters.start_attempts.fetch_add(1, Ordering::Relaxed);
            let mut last_err = String::new();
            let mut started = None;

            for attempt in 1..=max_attempts {
                let description =
                    match builder::build(PipelineRole::Record, camera_id, &cam, &output_dir, &cfg.hls_root) {
                        Ok(d) => d,
                        Err(e) => {
                            last_err = e.to_string();
                            break;
                        }
                    };

                let handle = match self.inner.adapter.create(description) {
                    Ok(h) => h,
                    Err(e) => {
                        last_err = e.to_string();
                        self.retry_backoff(attempt, max_attempts);
                        continue;
                    }
                };

                let (tx, rx) = mpsc::channel();
                self.inner.adapter.subscribe_events(&handle, tx);

                match self
                    .inner
                    .adapter
                    .start(&handle, Duration::from_secs_f64(constants::DEFAULT_START_TIMEOUT_SECONDS))
                {
                    Ok(()) => {
                        started = Some((handle, rx));
                        break;
                    }
                    Err(e) => {
                        last_err = e.to_string();
                        self.inner.adapter.stop(&handle);
                        self.retry_backoff(attempt, max_attempts);
                    }
                }
            }

            match started {
                Some((handle, rx)) => {
                    handles.insert(camera_id, handle);
                    event_rxs.insert(camera_id, rx);
                    started_ids.push(camera_id);
                }
                None => {
                    failure = Some(CameraStartFailure { id: camera_id, cause: last_err });
                    break;
                }
            }
        }

        if let Some(failure) = failure {
            self.inner.health.counters.start_failures.fetch_add(1, Ordering::Relaxed);
            for handle in handles.values() {
                self.inner.adapter.stop(handle);
            }
            self.inner.lock.release().ok();
            // Rolled back: the caller must observe the recording as not
            // started (spec.md §4.5 step 4), so this is a normal StartReport
            // with success=false, never an exception.
            return Ok(StartReport {
                success: false,
                match_id,
                cameras_started: Vec::new(),
                cameras_failed: vec![failure],
            });
        }

        let started_at_unix = crate::alert::unix_now();
        let persisted = PersistedState::new(match_id.clone(), output_dir.clone(), started_ids.clone());
        self.inner
            .persisted
            .write(&persisted)
            .map_err(|e| ControllerError::ConfigIoError(e.to_string()))?;

        let failed_cameras = Arc::new(Mutex::new(HashSet::new()));
        let active = ActiveSession {
            match_id: match_id.clone(),
            started_at_mono: Instant::now(),
            started_at_unix,
            output_dir: output_dir.clone(),
            protection_seconds: cfg.protection_seconds,
            eos_timeout_seconds: cfg.recording_stop_eos_timeout_seconds,
            require_all_cameras,
            handles,
            failed_cameras: failed_cameras.clone(),
        };
        *self.inner.session.lock().unwrap() = Session::Active(active);

        alert("recording_started", Severity::Info)
            .session(match_id.clone())
            .field("output_dir", &output_dir)
            .emit(&self.inner.health.alerts);

        self.spawn_monitor(match_id.clone(), event_rxs, failed_cameras);

        Ok(StartReport {
            success: true,
            match_id,
            cameras_started: started_ids,
            cameras_failed: Vec::new(),
        })
    }

    fn retry_backoff(&self, attempt: u32, max_attempts: u32) {
        if attempt >= max_attempts {
            return;
        }
        self.inner.health.counters.retry_count.fetch_add(1, Ordering::Relaxed);
        let cfg = self.inner.config.snapshot();
        let backoff = (attempt as f64).min(cfg.recording_recovery_backoff_seconds);
        std::thread::sleep(Duration::from_secs_f64(backoff));
    }

    pub fn stop(&self, force: bool) -> Result<StopReport, ControllerError> {
        let mut guard = self.inner.session.lock().unwrap();
        match &*guard {
            Session::Idle => return Err(ControllerError::NotRecording),
            Session::Active(active) => {
                if !force {
                    let elapsed = active.started_at_mono.elapsed().as_secs_f64();
                    if elapsed < active.protection_seconds {
                        return Err(ControllerError::ProtectedStop {
                            remaining_seconds: active.protection_seconds - elapsed,
                        });
                    }
                }
            }
        }

        let active = match std::mem::replace(&mut *guard, Session::Idle) {
            Session::Active(a) => a,
            Session::Idle => unreachable!(),
        };
        drop(guard);

        let match_id = active.match_id.clone();
        let duration_s = active.started_at_mono.elapsed().as_secs_f64();
        let failed_cameras = active.failed_cameras.lock().unwrap().clone();
        let camera_handles: Vec<(u8, PipelineHandle)> = active.handles.into_iter().collect();
        let output_dir = &active.output_dir;
        let eos_timeout = Duration::from_secs_f64(active.eos_timeout_seconds);
        let started_at_unix = active.started_at_unix;

        // Per camera in parallel (spec.md §4.5 step 2): a stalled drain on
        // one camera must not double the other's stop latency, so both
        // run on their own thread and are joined before the report is built.
        let mut cameras_report: Vec<CameraStopResult> = std::thread::scope(|scope| {
            let threads: Vec<_> = camera_handles
                .iter()
                .map(|(camera_id, handle)| {
                    let camera_id = *camera_id;
                    let match_id = &match_id;
                    let failed_cameras = &failed_cameras;
                    scope.spawn(move || {
                        if failed_cameras.contains(&camera_id) {
                            return CameraStopResult {
                                id: camera_id,
                                graceful: false,
                                segment_count: 0,
                                bytes: 0,
                                integrity_ok: false,
                                error: Some("camera failed during recording".to_string()),
                            };
                        }

                        self.inner.adapter.send_end_of_stream(handle);
                        let outcome = self.inner.adapter.await_drain(handle, eos_timeout);
                        let graceful = matches!(outcome, DrainOutcome::Drained);
                        if !graceful {
                            self.inner.health.counters.forced_teardowns.fetch_add(1, Ordering::Relaxed);
                            alert("recording_stop_non_graceful", Severity::Warn)
                                .camera(camera_id)
                                .session(match_id.clone())
                                .emit(&self.inner.health.alerts);
                        }
                        self.inner.adapter.stop(handle);

                        let (segment_count, bytes, integrity_ok) = scan_segments(output_dir, camera_id, started_at_unix);
                        if !integrity_ok {
                            alert("recording_integrity_failed", Severity::Error)
                                .camera(camera_id)
                                .session(match_id.clone())
                                .emit(&self.inner.health.alerts);
                        }
                        self.inner.health.clear_integrity(camera_id);

                        CameraStopResult {
                            id: camera_id,
                            graceful,
                            segment_count,
                            bytes,
                            integrity_ok,
                            error: None,
                        }
                    })
                })
                .collect();

            threads.into_iter().map(|t| t.join().unwrap()).collect()
        });
        cameras_report.sort_by_key(|c| c.id);

        self.inner.persisted.delete().ok();
        self.inner.lock.release().ok();
        alert("recording_stopped", Severity::Info).session(match_id.clone()).emit(&self.inner.health.alerts);

        Ok(StopReport { match_id, duration_s, cameras: cameras_report, all_ok: true })
    }

    /// Spawns the per-session background loop: forwards `HandleEvent`s
    /// into partial-failure handling, refreshes the heartbeat, and runs
    /// the integrity probe and overload guard (spec.md §4.5, §4.5.4).
    /// Exits once the session transitions back to `Idle`.
    fn spawn_monitor(
        &self,
        match_id: String,
        event_rxs: HashMap<u8, mpsc::Receiver<HandleEvent>>,
        failed_cameras: Arc<Mutex<HashSet<u8>>>,
    ) {
        let svc = self.clone();
        std::thread::spawn(move || {
            let tick = Duration::from_millis(250);
            let mut last_heartbeat = Instant::now();
            let mut last_probe = Instant::now();
            let mut last_overload_check = Instant::now();
            let mut overload_streak = 0u32;

            loop {
                let is_active = matches!(&*svc.inner.session.lock().unwrap(), Session::Active(_));
                if !is_active {
                    break;
                }

                for (camera_id, rx) in &event_rxs {
                    while let Ok(event) = rx.try_recv() {
                        if let HandleEvent::Error { code, message } = event {
                            svc.handle_camera_error(*camera_id, &match_id, &code, &message, &failed_cameras);
                        }
                    }
                }

                let cfg = svc.inner.config.snapshot();

                if last_heartbeat.elapsed().as_secs_f64() >= cfg.heartbeat_seconds {
                    svc.refresh_heartbeat(&match_id);
                    last_heartbeat = Instant::now();
                }

                if last_probe.elapsed().as_secs_f64() >= constants::DEFAULT_INTEGRITY_PROBE_INTERVAL_SECONDS {
                    svc.run_integrity_probe(&match_id);
                    last_probe = Instant::now();
                }

                if cfg.recording_overload_guard_enabled
                    && last_overload_check.elapsed().as_secs_f64() >= cfg.recording_overload_poll_interval_seconds
                {
                    last_overload_check = Instant::now();
                    if let Some(sample) = svc.inner.overload_policy.sample() {
                        if sample >= svc.inner.overload_policy.threshold_percent() {
                            overload_streak += 1;
                        } else {
                            overload_streak = 0;
                        }
                        if overload_streak >= cfg.recording_overload_unhealthy_streak_threshold {
                            svc.trigger_overload_guard(&match_id);
                            break;
                        }
                    }
                }

                std::thread::sleep(tick);
            }
        });
    }

    fn handle_camera_error(
        &self,
        camera_id: u8,
        match_id: &str,
        code: &str,
        message: &str,
        failed_cameras: &Arc<Mutex<HashSet<u8>>>,
    ) {
        alert("recording_camera_error", Severity::Error)
            .camera(camera_id)
            .session(match_id.to_string())
            .field("code", code)
            .field("message", message)
            .emit(&self.inner.health.alerts);

        failed_cameras.lock().unwrap().insert(camera_id);

        let require_all = match &*self.inner.session.lock().unwrap() {
            Session::Active(a) => a.require_all_cameras,
            Session::Idle => return,
        };

        if require_all {
            let _ = self.stop(true);
        }
    }

    fn refresh_heartbeat(&self, match_id: &str) {
        self.inner.lock.heartbeat().ok();
        let output_dir = match &*self.inner.session.lock().unwrap() {
            Session::Active(a) => a.output_dir.clone(),
            Session::Idle => return,
        };
        let cameras_expected: Vec<u8> = {
            let guard = self.inner.session.lock().unwrap();
            match &*guard {
                Session::Active(a) => a.handles.keys().copied().collect(),
                Session::Idle => return,
            }
        };
        let mut state = PersistedState::new(match_id.to_string(), output_dir, cameras_expected);
        state.last_heartbeat_unix = crate::alert::unix_now();
        self.inner.persisted.write(&state).ok();
    }

    fn run_integrity_probe(&self, match_id: &str) {
        let (output_dir, started_at_unix, camera_ids): (String, f64, Vec<u8>) = {
            match &*self.inner.session.lock().unwrap() {
                Session::Active(a) => (a.output_dir.clone(), a.started_at_unix, a.handles.keys().copied().collect()),
                Session::Idle => return,
            }
        };

        for camera_id in camera_ids {
            let (count, _bytes, ok) = scan_segments(&output_dir, camera_id, started_at_unix);
            let consecutive_failures = if ok { 0 } else { self.inner.health.integrity_streak(camera_id) + 1 };
            let verdict = IntegrityVerdict {
                ok,
                consecutive_failures,
                note: if ok { None } else { Some(format!("segment count {count} inconsistent with elapsed time")) },
            };
            if !ok {
                // Two consecutive failures escalate warn to error (spec.md §4.5.4).
                let severity = if consecutive_failures >= 2 { Severity::Error } else { Severity::Warn };
                alert("recording_integrity_warn", severity)
                    .camera(camera_id)
                    .session(match_id.to_string())
                    .emit(&self.inner.health.alerts);
            }
            self.inner.health.record_integrity(camera_id, verdict);
        }
    }

    fn trigger_overload_guard(&self, match_id: &str) {
        self.inner.health.counters.overload_triggers.fetch_add(1, Ordering::Relaxed);
        alert("recording_overload_guard_triggered", Severity::Error)
            .session(match_id.to_string())
            .emit(&self.inner.health.alerts);
        let _ = self.stop(true);
    }
}

impl RecordingGuard for RecordingService {
    fn is_active(&self) -> bool {
        matches!(&*self.inner.session.lock().unwrap(), Session::Active(_))
    }
}

/// Scans `{output_dir}/segments` for `cam{id}_*.mp4` files produced since
/// `started_at_unix` (spec.md §4.5.4). Returns `(segment_count,
/// total_bytes, integrity_ok)`; `integrity_ok` checks that at least one
/// non-empty segment exists and the count is within one of the expected
/// roll count for the elapsed time.
fn scan_segments(output_dir: &str, camera_id: u8, started_at_unix: f64) -> (u64, u64, bool) {
    let dir = std::path::Path::new(output_dir).join("segments");
    let prefix = format!("cam{camera_id}_");

    let mut count = 0u64;
    let mut bytes = 0u64;
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(_) => return (0, 0, false),
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".mp4") {
            count += 1;
            if let Ok(meta) = entry.metadata() {
                bytes += meta.len();
            }
        }
    }

    if count == 0 {
        return (0, 0, false);
    }

    let elapsed = (crate::alert::unix_now() - started_at_unix).max(0.0);
    let expected = (elapsed / constants::DEFAULT_RECORD_SEGMENT_DURATION_SECONDS as f64).floor() as i64;
    let within_tolerance = (count as i64 - expected).abs() <= 1;

    (count, bytes, bytes > 0 && within_tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_segments_reports_not_ok_when_directory_missing() {
        let (count, bytes, ok) = scan_segments("/nonexistent/path", 0, crate::alert::unix_now());
        assert_eq!(count, 0);
        assert_eq!(bytes, 0);
        assert!(!ok);
    }

    #[test]
    fn scan_segments_counts_only_matching_camera_prefix() {
        let dir = tempfile::TempDir::new().unwrap();
        let segments = dir.path().join("segments");
        std::fs::create_dir_all(&segments).unwrap();
        std::fs::write(segments.join("cam0_20260101T000000Z_00.mp4"), b"data").unwrap();
        std::fs::write(segments.join("cam1_20260101T000000Z_00.mp4"), b"data").unwrap();

        let (count, bytes, _) = scan_segments(dir.path().to_str().unwrap(), 0, crate::alert::unix_now());
        assert_eq!(count, 1);
        assert_eq!(bytes, 4);
    }
}
