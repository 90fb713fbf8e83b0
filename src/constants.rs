//! Defaults for the timing knobs and well-known paths the configuration
//! surface leaves adjustable. Everything here is overridable through
//! `AppConfig`; these are only the values used when a config document
//! omits the field.

pub const CONFIG_PATH: &str = "/var/lib/matchrec/config.json";
pub const LOCK_DIR: &str = "/var/lib/matchrec/lock";
pub const PERSISTED_STATE_PATH: &str = "/var/lib/matchrec/recording_state.json";
pub const ALERT_LOG_PATH: &str = "/var/lib/matchrec/alerts.ndjson";

#[cfg(debug_assertions)]
pub const RECORDING_ROOT: &str = "./recordings";
#[cfg(not(debug_assertions))]
pub const RECORDING_ROOT: &str = "/var/lib/matchrec/recordings";

#[cfg(debug_assertions)]
pub const HLS_ROOT: &str = "./hls";
#[cfg(not(debug_assertions))]
pub const HLS_ROOT: &str = "/run/matchrec/hls";

/// Minimum crop width/height after edge removal (§3 invariant).
pub const MIN_CROP_DIMENSION: u32 = 16;
/// Chroma alignment requirement for crop dimensions (§3 invariant).
pub const CROP_ALIGNMENT: u32 = 2;
/// Maximum upscale factor the hardware scaler tolerates (§4.2 precondition).
pub const MAX_SCALER_FACTOR: f64 = 16.0;

pub const DEFAULT_PROTECTION_SECONDS: f64 = 10.0;
pub const DEFAULT_HEARTBEAT_SECONDS: f64 = 5.0;
pub const DEFAULT_START_TIMEOUT_SECONDS: f64 = 10.0;
pub const DEFAULT_FORCED_TEARDOWN_TIMEOUT_SECONDS: f64 = 8.0;
pub const DEFAULT_EOS_TIMEOUT_SECONDS: f64 = 8.0;
pub const DEFAULT_RECOVERY_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_RECOVERY_BACKOFF_SECONDS: f64 = 5.0;
pub const DEFAULT_INTEGRITY_PROBE_INTERVAL_SECONDS: f64 = 2.0;
pub const DEFAULT_RECORD_SEGMENT_DURATION_SECONDS: u64 = 600;
pub const DEFAULT_PREVIEW_SEGMENT_DURATION_SECONDS: u64 = 2;
pub const DEFAULT_PREVIEW_PLAYLIST_LENGTH: u32 = 8;
pub const DEFAULT_PREVIEW_MAX_FILES: u32 = 8;
pub const DEFAULT_ALERT_RING_CAPACITY: usize = 1024;

/// Port the Control Surface HTTP shim listens on (spec.md §1: the HTTP
/// surface itself is out of scope; this only needs a fixed default so the
/// binary is runnable standalone).
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Lock payload considered abandoned once the declared owner's heartbeat
/// is older than this, even if the process still exists (§4.4).
pub const LOCK_STALE_AFTER_SECONDS: f64 = 300.0;
/// Age past which a `PersistedState` found at startup is treated as
/// belonging to a crashed run rather than the just-started process (§4.5).
pub const PERSISTED_STATE_STALE_AFTER_SECONDS: f64 = 300.0;

#[cfg(debug_assertions)]
pub const VIDEO_WIDTH: u32 = 640;
#[cfg(debug_assertions)]
pub const VIDEO_HEIGHT: u32 = 480;
#[cfg(not(debug_assertions))]
pub const VIDEO_WIDTH: u32 = 1920;
#[cfg(not(debug_assertions))]
pub const VIDEO_HEIGHT: u32 = 1080;
pub const VIDEO_FRAMERATE: i32 = 30;

pub const RECORD_BITRATE_KBPS: u32 = 8000;
pub const PREVIEW_BITRATE_KBPS: u32 = 1500;
pub const RECORD_GOP: i32 = 60;
pub const PREVIEW_GOP: i32 = 30;
