//! `PipelineDescription` and its constituent value types (spec.md §3).
//! Everything here is a plain, `Eq`-comparable value so cache/change
//! detection (§3, §8 "idempotent build()") is a field-by-field comparison.

use serde::{Deserialize, Serialize};

use crate::config::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum PipelineRole {
    Record,
    Preview,
}

/// Absolute sensor-coordinate crop box, derived from the edge-removal
/// `CropBox` by [`crate::pipeline::builder::build`] (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AbsoluteCrop {
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
}

impl AbsoluteCrop {
    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EncoderParams {
    pub bitrate_kbps: u32,
    pub gop: i32,
    /// x264enc `speed-preset` value (e.g. "ultrafast", "veryfast").
    pub preset: EncoderPreset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EncoderPreset {
    UltraFast,
    VeryFast,
    Fast,
}

impl EncoderPreset {
    pub fn as_gst_str(&self) -> &'static str {
        match self {
            EncoderPreset::UltraFast => "ultrafast",
            EncoderPreset::VeryFast => "veryfast",
            EncoderPreset::Fast => "fast",
        }
    }
}

/// Output sink descriptor. Record writes MP4 segments to disk with a
/// templated filename; preview writes an HLS playlist + `.ts` segments to
/// the in-memory `hls_root` (spec.md §6.2).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum SinkDescriptor {
    RecordMp4 {
        /// Directory segments are written under; filenames are
        /// `cam{cam}_{timestamp}_{index:02}.mp4`.
        output_dir: String,
        segment_duration_seconds: u64,
    },
    PreviewHls {
        hls_root: String,
        segment_duration_seconds: u64,
        playlist_length: u32,
        max_files: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineDescription {
    pub role: PipelineRole,
    pub camera_id: u8,
    pub device: String,
    pub source_kind: SourceKind,
    pub sensor_mode: SensorMode,
    pub crop: AbsoluteCrop,
    pub rotation_degrees_x1000: i64,
    pub encoder: EncoderParams,
    pub sink: SinkDescriptor,
}

/// Sensor width/height as configured; carried alongside the crop so the
/// adapter can size the capsfilter without reaching back into
/// `CameraConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SensorMode {
    pub width: u32,
    pub height: u32,
    pub framerate: i32,
}

impl PipelineDescription {
    pub fn handle_name(&self) -> String {
        format!(
            "{}_{}",
            match self.role {
                PipelineRole::Record => "record",
                PipelineRole::Preview => "preview",
            },
            self.camera_id
        )
    }
}
