//! Pipeline Builder (C2, spec.md §4.2): a pure function from
//! `(role, camera_id, CameraConfig)` to a [`PipelineDescription`].
//!
//! Grounded in the teacher's `recording_pipeline_factory.rs`
//! (`build_recording_config`), generalized from "one config → one dashcam
//! pipeline" to "role × camera → description", with the record/preview
//! split spec.md §4.2 calls for (identical imaging chain, different
//! encoder bitrate/sink only).

use crate::config::CameraConfig;
use crate::constants;
use crate::error::ControllerError;

use super::description::{
    AbsoluteCrop, EncoderParams, EncoderPreset, PipelineDescription, PipelineRole, SensorMode,
    SinkDescriptor,
};

/// Derives the absolute sensor-coordinate crop box from the edge-removal
/// `CropBox` (spec.md §4.2): `left_abs = left`, `right_abs = sensor_w -
/// right`, `top_abs = top`, `bottom_abs = sensor_h - bottom`.
fn derive_absolute_crop(cam: &CameraConfig) -> AbsoluteCrop {
    AbsoluteCrop {
        left: cam.crop.left as i64,
        right: cam.sensor_width as i64 - cam.crop.right as i64,
        top: cam.crop.top as i64,
        bottom: cam.sensor_height as i64 - cam.crop.bottom as i64,
    }
}

fn validate_crop(camera_id: u8, cam: &CameraConfig, crop: &AbsoluteCrop) -> Result<(), ControllerError> {
    let bad = |reason: String| ControllerError::BadCrop {
        camera_id,
        left_abs: crop.left,
        right_abs: crop.right,
        top_abs: crop.top,
        bottom_abs: crop.bottom,
        reason,
    };

    if !(crop.right > crop.left && crop.left >= 0) {
        return Err(bad("right_abs must be > left_abs >= 0".into()));
    }
    if !(crop.bottom > crop.top && crop.top >= 0) {
        return Err(bad("bottom_abs must be > top_abs >= 0".into()));
    }

    let width = crop.width() as f64;
    let height = crop.height() as f64;
    if width <= 0.0 || (cam.sensor_width as f64 / width) > constants::MAX_SCALER_FACTOR {
        return Err(bad(format!(
            "crop width {} exceeds {}x hardware scaler limit",
            width,
            constants::MAX_SCALER_FACTOR
        )));
    }
    if height <= 0.0 || (cam.sensor_height as f64 / height) > constants::MAX_SCALER_FACTOR {
        return Err(bad(format!(
            "crop height {} exceeds {}x hardware scaler limit",
            height,
            constants::MAX_SCALER_FACTOR
        )));
    }

    Ok(())
}

fn encoder_params(role: PipelineRole) -> EncoderParams {
    match role {
        PipelineRole::Record => EncoderParams {
            bitrate_kbps: constants::RECORD_BITRATE_KBPS,
            gop: constants::RECORD_GOP,
            preset: EncoderPreset::Fast,
        },
        PipelineRole::Preview => EncoderParams {
            bitrate_kbps: constants::PREVIEW_BITRATE_KBPS,
            gop: constants::PREVIEW_GOP,
            preset: EncoderPreset::UltraFast,
        },
    }
}

fn sink_descriptor(role: PipelineRole, camera_id: u8, recording_root: &str, hls_root: &str) -> SinkDescriptor {
    match role {
        PipelineRole::Record => SinkDescriptor::RecordMp4 {
            output_dir: format!("{}/segments", recording_root),
            segment_duration_seconds: constants::DEFAULT_RECORD_SEGMENT_DURATION_SECONDS,
        },
        PipelineRole::Preview => SinkDescriptor::PreviewHls {
            hls_root: format!("{}/cam{}", hls_root, camera_id),
            segment_duration_seconds: constants::DEFAULT_PREVIEW_SEGMENT_DURATION_SECONDS,
            playlist_length: constants::DEFAULT_PREVIEW_PLAYLIST_LENGTH,
            max_files: constants::DEFAULT_PREVIEW_MAX_FILES,
        },
    }
}

/// Builds the canonical, comparable pipeline description for one
/// `(role, camera_id)` pair. Deterministic: identical inputs always yield
/// an equal `PipelineDescription` (spec.md §8).
///
/// `recording_root` should already include the session's `output_dir`
/// (i.e. `<output_dir>` from spec.md §6.2, not the global recordings
/// root) when building a `Record` description for an active session.
pub fn build(
    role: PipelineRole,
    camera_id: u8,
    cam: &CameraConfig,
    recording_root: &str,
    hls_root: &str,
) -> Result<PipelineDescription, ControllerError> {
    let crop = derive_absolute_crop(cam);
    validate_crop(camera_id, cam, &crop)?;

    Ok(PipelineDescription {
        role,
        camera_id,
        device: cam.device.clone(),
        source_kind: cam.source_kind,
        sensor_mode: SensorMode {
            width: cam.sensor_width,
            height: cam.sensor_height,
            framerate: constants::VIDEO_FRAMERATE,
        },
        crop,
        rotation_degrees_x1000: (cam.rotation_degrees * 1000.0).round() as i64,
        encoder: encoder_params(role),
        sink: sink_descriptor(role, camera_id, recording_root, hls_root),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorrectionKind, CropBox, SourceKind};

    fn cam() -> CameraConfig {
        CameraConfig {
            camera_id: 0,
            device: "/dev/video0".into(),
            source_kind: SourceKind::V4l2,
            sensor_width: 1920,
            sensor_height: 1080,
            rotation_degrees: 0.0,
            crop: CropBox { left: 10, right: 10, top: 20, bottom: 20 },
            correction: CorrectionKind::None,
            exposure_compensation: 0.0,
        }
    }

    #[test]
    fn crop_round_trips_the_spec_formula() {
        let c = cam();
        let desc = build(PipelineRole::Record, 0, &c, "./rec", "./hls").unwrap();
        assert_eq!(desc.crop.left, 10);
        assert_eq!(desc.crop.right, 1920 - 10);
        assert_eq!(desc.crop.top, 20);
        assert_eq!(desc.crop.bottom, 1080 - 20);
    }

    #[test]
    fn build_is_idempotent() {
        let c = cam();
        let a = build(PipelineRole::Record, 0, &c, "./rec", "./hls").unwrap();
        let b = build(PipelineRole::Record, 0, &c, "./rec", "./hls").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn record_and_preview_share_the_imaging_chain() {
        let c = cam();
        let record = build(PipelineRole::Record, 0, &c, "./rec", "./hls").unwrap();
        let preview = build(PipelineRole::Preview, 0, &c, "./rec", "./hls").unwrap();
        assert_eq!(record.crop, preview.crop);
        assert_eq!(record.sensor_mode, preview.sensor_mode);
        assert_eq!(record.device, preview.device);
        assert_ne!(record.encoder.bitrate_kbps, preview.encoder.bitrate_kbps);
    }

    #[test]
    fn rejects_crop_that_inverts() {
        let mut c = cam();
        c.crop = CropBox { left: 1000, right: 1000, top: 0, bottom: 0 };
        assert!(build(PipelineRole::Record, 0, &c, "./rec", "./hls").is_err());
    }

    #[test]
    fn rejects_crop_beyond_scaler_limit() {
        let mut c = cam();
        c.sensor_width = 100_000;
        c.crop = CropBox { left: 0, right: 99_950, top: 0, bottom: 0 };
        assert!(build(PipelineRole::Record, 0, &c, "./rec", "./hls").is_err());
    }
}
