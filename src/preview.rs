//! Preview Service (C6, spec.md §4.6): per-camera HLS preview, always
//! yielding to recording.
//!
//! Grounded in the same `cam_service.rs` lifecycle pattern as the
//! Recording Service, simplified to match the spec: no protection window,
//! no persisted state, no drain (HLS segments are self-contained and can
//! be abandoned on stop).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::alert::{alert, Severity};
use crate::config::ConfigStore;
use crate::constants;
use crate::error::ControllerError;
use crate::health::HealthChannel;
use crate::lock::{AcquireOutcome, ExclusionLock, Role};
use crate::pipeline::builder;
use crate::pipeline::{MediaRuntimeAdapter, PipelineHandle, PipelineRole};
use crate::recording::{PreviewYield, RecordingGuard};

#[derive(Debug, Clone, Serialize)]
pub struct CameraPreviewFailure {
    pub id: u8,
    pub cause: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewStartReport {
    pub cameras_started: Vec<u8>,
    pub cameras_failed: Vec<CameraPreviewFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewStopReport {
    pub cameras_stopped: Vec<u8>,
    pub cameras_failed: Vec<CameraPreviewFailure>,
}

/// Preview's half of `get_status` (spec.md §6.1): "analogous [to the
/// recording snapshot] without `match_id`/`protected`".
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSnapshot {
    pub preview_active: bool,
    pub cameras: Vec<u8>,
}

struct Inner {
    config: Arc<ConfigStore>,
    adapter: Arc<MediaRuntimeAdapter>,
    lock: Arc<ExclusionLock>,
    health: Arc<HealthChannel>,
    recording: Arc<dyn RecordingGuard>,
    handles: Mutex<HashMap<u8, PipelineHandle>>,
}

#[derive(Clone)]
pub struct PreviewService {
    inner: Arc<Inner>,
}

impl PreviewService {
    pub fn new(
        config: Arc<ConfigStore>,
        adapter: Arc<MediaRuntimeAdapter>,
        lock: Arc<ExclusionLock>,
        health: Arc<HealthChannel>,
        recording: Arc<dyn RecordingGuard>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                adapter,
                lock,
                health,
                recording,
                handles: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn active_cameras(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.inner.handles.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        let cameras = self.active_cameras();
        PreviewSnapshot { preview_active: !cameras.is_empty(), cameras }
    }

    /// `camera_id = None` targets both cameras (spec.md §4.6).
    pub fn start(&self, camera_id: Option<u8>) -> Result<PreviewStartReport, ControllerError> {
        if self.inner.recording.is_active() {
            return Err(ControllerError::RecordingActive);
        }

        match self.inner.lock.acquire(Role::Preview, false) {
            Ok(AcquireOutcome::Busy(holder)) => return Err(ControllerError::LockBusy { held_by: holder }),
            Ok(_) => {}
            Err(e) => return Err(ControllerError::ConfigIoError(e.to_string())),
        }

        self.inner.config.reload(&self.inner.health.alerts).ok();
        let cfg = self.inner.config.snapshot();
        let targets: Vec<u8> = match camera_id {
            Some(id) => vec![id],
            None => vec![0, 1],
        };

        let mut started = Vec::new();
        let mut failed = Vec::new();

        for id in targets {
            if self.inner.handles.lock().unwrap().contains_key(&id) {
                started.push(id);
                continue;
            }

            let result = (|| -> Result<PipelineHandle, ControllerError> {
                let cam = self.inner.config.get_camera(id)?;
                let description = builder::build(PipelineRole::Preview, id, &cam, &cfg.recording_root, &cfg.hls_root)?;
                let handle = self.inner.adapter.create(description)?;
                self.inner
                    .adapter
                    .start(&handle, Duration::from_secs_f64(constants::DEFAULT_START_TIMEOUT_SECONDS))?;
                Ok(handle)
            })();

            match result {
                Ok(handle) => {
                    self.inner.handles.lock().unwrap().insert(id, handle);
                    started.push(id);
                }
                Err(e) => failed.push(CameraPreviewFailure { id, cause: e.to_string() }),
            }
        }

        if self.inner.handles.lock().unwrap().is_empty() {
            self.inner.lock.release().ok();
        }

        alert("preview_started", Severity::Info)
            .field("cameras", format!("{started:?}"))
            .emit(&self.inner.health.alerts);

        Ok(PreviewStartReport { cameras_started: started, cameras_failed: failed })
    }

    /// `camera_id = None` targets whichever cameras are currently active.
    /// Releases the Exclusion Lock once the last camera stops (spec.md
    /// §4.6: "Stopping the last active camera releases the lock").
    pub fn stop(&self, camera_id: Option<u8>) -> PreviewStopReport {
        let targets: Vec<u8> = match camera_id {
            Some(id) => vec![id],
            None => self.active_cameras(),
        };

        let mut stopped = Vec::new();
        for id in targets {
            let handle = self.inner.handles.lock().unwrap().remove(&id);
            if let Some(handle) = handle {
                // HLS segments are self-contained; abandon rather than drain.
                self.inner.adapter.stop(&handle);
                stopped.push(id);
            }
        }

        if self.inner.handles.lock().unwrap().is_empty() {
            self.inner.lock.release().ok();
        }

        alert("preview_stopped", Severity::Info)
            .field("cameras", format!("{stopped:?}"))
            .emit(&self.inner.health.alerts);

        PreviewStopReport { cameras_stopped: stopped, cameras_failed: Vec::new() }
    }

    /// Restart = Stop + Start (spec.md §4.6), as a single call.
    pub fn restart(&self, camera_id: Option<u8>) -> Result<PreviewStartReport, ControllerError> {
        self.stop(camera_id);
        self.start(camera_id)
    }
}

impl PreviewYield for PreviewService {
    /// Forcibly tears down every active preview camera without going
    /// through the normal `recording.is_active()` guard — called only by
    /// the Recording Service when it force-acquires the lock (spec.md
    /// §4.5 step 3).
    fn force_stop_all(&self) {
        let ids = self.active_cameras();
        for id in ids {
            if let Some(handle) = self.inner.handles.lock().unwrap().remove(&id) {
                self.inner.adapter.stop(&handle);
            }
        }
        alert("preview_evicted_by_recording", Severity::Info).emit(&self.inner.health.alerts);
    }
}
