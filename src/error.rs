//! Error kinds surfaced across the Control Surface boundary (spec.md §7).
//!
//! Internal plumbing (gstreamer element construction, config parsing
//! internals) keeps propagating `anyhow::Result` the way the teacher's
//! pipeline code does; a `ControllerError` is only constructed at the
//! point where a failure needs to reach a caller of `ControlSurface`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("config invalid: {field}: {reason}")]
    ConfigInvalid { field: String, reason: String },

    #[error("config io error: {0}")]
    ConfigIoError(String),

    #[error(
        "bad crop for camera {camera_id}: left_abs={left_abs} right_abs={right_abs} top_abs={top_abs} bottom_abs={bottom_abs}: {reason}"
    )]
    BadCrop {
        camera_id: u8,
        left_abs: i64,
        right_abs: i64,
        top_abs: i64,
        bottom_abs: i64,
        reason: String,
    },

    #[error("failed to build pipeline for {role:?} camera {camera_id}: {reason}")]
    RuntimeBuildError {
        role: crate::pipeline::PipelineRole,
        camera_id: u8,
        reason: String,
    },

    #[error("camera {camera_id} did not reach Playing within {timeout_s:.1}s")]
    RuntimeStartTimeout { camera_id: u8, timeout_s: f64 },

    #[error("camera {camera_id} pipeline stuck; forced teardown performed")]
    RuntimeStuck { camera_id: u8 },

    #[error("camera {camera_id} did not drain within {timeout_s:.1}s")]
    EosTimeout { camera_id: u8, timeout_s: f64 },

    #[error("integrity check failed for camera {camera_id}: {reason}")]
    IntegrityFailed { camera_id: u8, reason: String },

    #[error("exclusion lock held by role {held_by:?}")]
    LockBusy { held_by: crate::lock::Role },

    #[error("exclusion lock payload named a dead or expired owner; reclaimed")]
    LockStolen,

    #[error("already recording match {match_id}")]
    AlreadyRecording { match_id: String },

    #[error("not recording")]
    NotRecording,

    #[error("stop refused, protection window active: {remaining_seconds:.1}s remaining")]
    ProtectedStop { remaining_seconds: f64 },

    #[error("preview refused: recording is active")]
    RecordingActive,

    #[error("recording start failed: {cause}")]
    StartFailed {
        partial: Vec<u8>,
        cause: String,
    },

    #[error("overload guard triggered: {reason}")]
    OverloadGuard { reason: String },
}
