//! Config Store (C1, spec.md §4.1) and the `CameraConfig`/`AppConfig` data
//! model (spec.md §3). The on-disk document is a single JSON file; writes
//! go through [`crate::atomic_file`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::atomic_file;
use crate::constants;
use crate::error::ControllerError;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Libcamera,
    V4l2,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct CropBox {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// "Dynamic duck-typed config with whatever fields" in the source becomes
/// a tagged variant per correction kind, each with its own parameter set
/// (spec.md §9 redesign flag).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionKind {
    None,
    Barrel { strength: f32 },
    Cylindrical { focal_length_mm: f32 },
    Equirectangular { fov_degrees: f32 },
    Perspective { horizon_shift: f32, vertical_shift: f32 },
}

impl Default for CorrectionKind {
    fn default() -> Self {
        CorrectionKind::None
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CameraConfig {
    pub camera_id: u8,
    pub device: String,
    pub source_kind: SourceKind,
    pub sensor_width: u32,
    pub sensor_height: u32,
    pub rotation_degrees: f64,
    pub crop: CropBox,
    #[serde(default)]
    pub correction: CorrectionKind,
    #[serde(default)]
    pub exposure_compensation: f32,
}

impl CameraConfig {
    /// Validates the §3 invariant: after edge removal, both remaining
    /// dimensions are at least `MIN_CROP_DIMENSION` and 2-pixel aligned.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.camera_id > 1 {
            return Err(ControllerError::ConfigInvalid {
                field: "camera_id".into(),
                reason: format!("{} is not in {{0,1}}", self.camera_id),
            });
        }

        let remaining_width = self
            .sensor_width
            .checked_sub(self.crop.left)
            .and_then(|w| w.checked_sub(self.crop.right));
        let remaining_height = self
            .sensor_height
            .checked_sub(self.crop.top)
            .and_then(|h| h.checked_sub(self.crop.bottom));

        let remaining_width = remaining_width.ok_or_else(|| ControllerError::ConfigInvalid {
            field: "crop.left/right".into(),
            reason: "left + right crop exceeds sensor_width".into(),
        })?;
        let remaining_height = remaining_height.ok_or_else(|| ControllerError::ConfigInvalid {
            field: "crop.top/bottom".into(),
            reason: "top + bottom crop exceeds sensor_height".into(),
        })?;

        if remaining_width < constants::MIN_CROP_DIMENSION {
            return Err(ControllerError::ConfigInvalid {
                field: "crop".into(),
                reason: format!(
                    "remaining width {} is below minimum {}",
                    remaining_width,
                    constants::MIN_CROP_DIMENSION
                ),
            });
        }
        if remaining_height < constants::MIN_CROP_DIMENSION {
            return Err(ControllerError::ConfigInvalid {
                field: "crop".into(),
                reason: format!(
                    "remaining height {} is below minimum {}",
                    remaining_height,
                    constants::MIN_CROP_DIMENSION
                ),
            });
        }
        if remaining_width % constants::CROP_ALIGNMENT != 0 {
            return Err(ControllerError::ConfigInvalid {
                field: "crop".into(),
                reason: format!("remaining width {} is not 2-pixel aligned", remaining_width),
            });
        }
        if remaining_height % constants::CROP_ALIGNMENT != 0 {
            return Err(ControllerError::ConfigInvalid {
                field: "crop".into(),
                reason: format!("remaining height {} is not 2-pixel aligned", remaining_height),
            });
        }

        if !(-8.0..=8.0).contains(&self.exposure_compensation) {
            return Err(ControllerError::ConfigInvalid {
                field: "exposure_compensation".into(),
                reason: format!("{} is out of bounds [-8, 8]", self.exposure_compensation),
            });
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_recovery_max_attempts() -> u32 {
    constants::DEFAULT_RECOVERY_MAX_ATTEMPTS
}
fn default_recovery_backoff_seconds() -> f64 {
    constants::DEFAULT_RECOVERY_BACKOFF_SECONDS
}
fn default_eos_timeout_seconds() -> f64 {
    constants::DEFAULT_EOS_TIMEOUT_SECONDS
}
fn default_protection_seconds() -> f64 {
    constants::DEFAULT_PROTECTION_SECONDS
}
fn default_min_effective_fps() -> f64 {
    15.0
}
fn default_overload_cpu_percent() -> f64 {
    90.0
}
fn default_overload_poll_interval() -> f64 {
    5.0
}
fn default_overload_streak() -> u32 {
    3
}
fn default_recording_root() -> String {
    constants::RECORDING_ROOT.to_string()
}
fn default_hls_root() -> String {
    constants::HLS_ROOT.to_string()
}
fn default_heartbeat_seconds() -> f64 {
    constants::DEFAULT_HEARTBEAT_SECONDS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub cameras: Vec<CameraConfig>,

    #[serde(default = "default_recording_root")]
    pub recording_root: String,
    #[serde(default = "default_hls_root")]
    pub hls_root: String,

    #[serde(default = "default_true")]
    pub recording_require_all_cameras: bool,
    #[serde(default = "default_recovery_max_attempts")]
    pub recording_recovery_max_attempts: u32,
    #[serde(default = "default_recovery_backoff_seconds")]
    pub recording_recovery_backoff_seconds: f64,
    #[serde(default = "default_eos_timeout_seconds")]
    pub recording_stop_eos_timeout_seconds: f64,
    #[serde(default = "default_protection_seconds")]
    pub protection_seconds: f64,
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: f64,
    #[serde(default = "default_min_effective_fps")]
    pub recording_slo_min_effective_fps: f64,

    #[serde(default)]
    pub recording_overload_guard_enabled: bool,
    #[serde(default = "default_overload_cpu_percent")]
    pub recording_overload_cpu_percent_threshold: f64,
    #[serde(default = "default_overload_poll_interval")]
    pub recording_overload_poll_interval_seconds: f64,
    #[serde(default = "default_overload_streak")]
    pub recording_overload_unhealthy_streak_threshold: u32,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.cameras.is_empty() {
            return Err(ControllerError::ConfigInvalid {
                field: "cameras".into(),
                reason: "no cameras configured".into(),
            });
        }

        let mut seen_ids = Vec::new();
        for cam in &self.cameras {
            cam.validate()?;
            if seen_ids.contains(&cam.camera_id) {
                return Err(ControllerError::ConfigInvalid {
                    field: "cameras".into(),
                    reason: format!("duplicate camera_id {}", cam.camera_id),
                });
            }
            seen_ids.push(cam.camera_id);
        }

        if self.protection_seconds < 0.0 {
            return Err(ControllerError::ConfigInvalid {
                field: "protection_seconds".into(),
                reason: "must be >= 0".into(),
            });
        }

        Ok(())
    }

    pub fn camera(&self, camera_id: u8) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.camera_id == camera_id)
    }
}

/// Loads and atomically persists the per-camera configuration document
/// (C1, spec.md §4.1). Writes publish a new snapshot for the next pipeline
/// build to pick up; a pipeline already in flight keeps the config values
/// it was built with.
pub struct ConfigStore {
    path: PathBuf,
    snapshot: RwLock<Arc<AppConfig>>,
    generation: AtomicU64,
}

impl ConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ControllerError> {
        let path = path.into();
        let cfg = Self::read_and_validate(&path)?;
        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(cfg)),
            generation: AtomicU64::new(0),
        })
    }

    fn read_and_validate(path: &Path) -> Result<AppConfig, ControllerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ControllerError::ConfigIoError(format!("{}: {}", path.display(), e)))?;
        let cfg: AppConfig = serde_json::from_str(&text).map_err(|e| ControllerError::ConfigInvalid {
            field: "<document>".into(),
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Re-reads the document from disk. On parse/schema failure the
    /// previous in-memory snapshot is retained and an `error` Alert is
    /// emitted through `alerts` (spec.md §4.1).
    pub fn reload(&self, alerts: &crate::alert::AlertRing) -> Result<(), ControllerError> {
        match Self::read_and_validate(&self.path) {
            Ok(cfg) => {
                *self.snapshot.write().unwrap() = Arc::new(cfg);
                self.generation.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                crate::alert::alert("config_reload_failed", crate::alert::Severity::Error)
                    .field("error", e.to_string())
                    .emit(alerts);
                Err(e)
            }
        }
    }

    /// Validates and atomically writes a new document, then publishes it
    /// as the current snapshot.
    pub fn write(&self, cfg: AppConfig) -> Result<(), ControllerError> {
        cfg.validate()?;
        atomic_file::write_json_atomic(&self.path, &cfg)
            .map_err(|e| ControllerError::ConfigIoError(e.to_string()))?;
        *self.snapshot.write().unwrap() = Arc::new(cfg);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<AppConfig> {
        self.snapshot.read().unwrap().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn get_camera(&self, camera_id: u8) -> Result<CameraConfig, ControllerError> {
        self.snapshot()
            .camera(camera_id)
            .cloned()
            .ok_or_else(|| ControllerError::ConfigInvalid {
                field: "camera_id".into(),
                reason: format!("no camera configured with id {}", camera_id),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_camera(camera_id: u8) -> CameraConfig {
        CameraConfig {
            camera_id,
            device: format!("/dev/video{}", camera_id),
            source_kind: SourceKind::V4l2,
            sensor_width: 1920,
            sensor_height: 1080,
            rotation_degrees: 0.0,
            crop: CropBox { left: 0, right: 0, top: 0, bottom: 0 },
            correction: CorrectionKind::None,
            exposure_compensation: 0.0,
        }
    }

    fn sample_config() -> AppConfig {
        AppConfig {
            cameras: vec![sample_camera(0), sample_camera(1)],
            recording_root: "./recordings".into(),
            hls_root: "./hls".into(),
            recording_require_all_cameras: true,
            recording_recovery_max_attempts: 2,
            recording_recovery_backoff_seconds: 5.0,
            recording_stop_eos_timeout_seconds: 8.0,
            protection_seconds: 10.0,
            heartbeat_seconds: 5.0,
            recording_slo_min_effective_fps: 15.0,
            recording_overload_guard_enabled: false,
            recording_overload_cpu_percent_threshold: 90.0,
            recording_overload_poll_interval_seconds: 5.0,
            recording_overload_unhealthy_streak_threshold: 3,
        }
    }

    #[test]
    fn rejects_crop_below_minimum_dimension() {
        let mut cam = sample_camera(0);
        cam.crop = CropBox { left: 1900, right: 0, top: 0, bottom: 0 };
        assert!(cam.validate().is_err());
    }

    #[test]
    fn rejects_unaligned_crop() {
        let mut cam = sample_camera(0);
        cam.crop = CropBox { left: 1, right: 0, top: 0, bottom: 0 };
        assert!(cam.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_camera_ids() {
        let mut cfg = sample_config();
        cfg.cameras[1].camera_id = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn store_write_then_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_string(&sample_config()).unwrap()).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        assert_eq!(store.generation(), 0);

        let mut cfg = (*store.snapshot()).clone();
        cfg.protection_seconds = 3.0;
        store.write(cfg).unwrap();

        assert_eq!(store.generation(), 1);
        assert_eq!(store.snapshot().protection_seconds, 3.0);

        let reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.snapshot().protection_seconds, 3.0);
    }

    #[test]
    fn reload_keeps_last_good_snapshot_on_parse_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_string(&sample_config()).unwrap()).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let alerts = crate::alert::AlertRing::with_capacity(dir.path().join("alerts.ndjson"), 10);
        assert!(store.reload(&alerts).is_err());
        assert_eq!(store.snapshot().protection_seconds, 10.0);
        assert_eq!(alerts.alerts(10).len(), 1);
    }

    #[test]
    fn get_camera_returns_not_found_for_unknown_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, serde_json::to_string(&sample_config()).unwrap()).unwrap();
        let store = ConfigStore::load(&path).unwrap();

        assert!(store.get_camera(5).is_err());
        assert!(store.get_camera(0).is_ok());
    }
}
