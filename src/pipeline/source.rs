//! `PipelineSource`: the camera capture + crop + rotate + encode chain
//! shared byte-for-byte between record and preview (spec.md §4.2).
//!
//! Grounded in the teacher's `pipeline_sources/{pipeline_source,
//! v4l2_pipeline_source,libcamera_pipeline_source}.rs`: a `tee` is the
//! fan-out point sinks attach to, matching `RecordingPipeline::build_pipeline`'s
//! "link source tee to each sink" loop.

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;

use crate::config::SourceKind;

use super::description::PipelineDescription;

pub trait PipelineSource: Send {
    fn setup_source(&mut self, pipeline: &gst::Pipeline) -> Result<()>;
    fn get_tee(&self) -> Result<gst::Element>;
}

/// Distortion correction (barrel/cylindrical/equirectangular/perspective)
/// is explicitly out of scope for the core (spec.md §1): it is performed
/// by a separate GL shader stage downstream of this pipeline. The source
/// only applies crop and rotation, which are real scaler/flip operations
/// the camera pipeline itself must perform before handing frames to the
/// encoder.
pub struct CameraSource {
    description: PipelineDescription,
    source: Option<gst::Element>,
    capsfilter: Option<gst::Element>,
    videocrop: Option<gst::Element>,
    videoflip: Option<gst::Element>,
    videoconvert: Option<gst::Element>,
    encoder: Option<gst::Element>,
    parser: Option<gst::Element>,
    tee: Option<gst::Element>,
}

impl CameraSource {
    pub fn new(description: PipelineDescription) -> Self {
        Self {
            description,
            source: None,
            capsfilter: None,
            videocrop: None,
            videoflip: None,
            videoconvert: None,
            encoder: None,
            parser: None,
            tee: None,
        }
    }

    fn source_element_name(&self, kind: SourceKind) -> &'static str {
        match kind {
            SourceKind::V4l2 => "v4l2src",
            SourceKind::Libcamera => "libcamerasrc",
        }
    }

    /// Maps a rotation in degrees to the nearest `videoflip` `method`
    /// enum value gstreamer understands (0/90/180/270 only — arbitrary
    /// angles are a job for the out-of-scope correction shader).
    fn videoflip_method(&self) -> &'static str {
        let degrees = (self.description.rotation_degrees_x1000 as f64 / 1000.0).rem_euclid(360.0);
        if degrees < 45.0 {
            "identity"
        } else if degrees < 135.0 {
            "clockwise"
        } else if degrees < 225.0 {
            "rotate-180"
        } else if degrees < 315.0 {
            "counterclockwise"
        } else {
            "identity"
        }
    }
}

impl PipelineSource for CameraSource {
    fn get_tee(&self) -> Result<gst::Element> {
        self.tee.clone().context("tee element not initialized")
    }

    fn setup_source(&mut self, pipeline: &gst::Pipeline) -> Result<()> {
        let kind_name = self.source_element_name(self.description.source_kind);

        self.source = Some(
            gst::ElementFactory::make(kind_name)
                .name(format!("source_{}", self.description.camera_id))
                .build()
                .with_context(|| format!("failed to create {}", kind_name))?,
        );
        self.capsfilter = Some(
            gst::ElementFactory::make("capsfilter")
                .name(format!("capsfilter_{}", self.description.camera_id))
                .build()
                .context("failed to create capsfilter")?,
        );
        self.videocrop = Some(
            gst::ElementFactory::make("videocrop")
                .name(format!("videocrop_{}", self.description.camera_id))
                .build()
                .context("failed to create videocrop")?,
        );
        self.videoflip = Some(
            gst::ElementFactory::make("videoflip")
                .name(format!("videoflip_{}", self.description.camera_id))
                .build()
                .context("failed to create videoflip")?,
        );
        self.videoconvert = Some(
            gst::ElementFactory::make("videoconvert")
                .name(format!("videoconvert_{}", self.description.camera_id))
                .build()
                .context("failed to create videoconvert")?,
        );
        self.encoder = Some(
            gst::ElementFactory::make("x264enc")
                .name(format!("encoder_{}", self.description.camera_id))
                .build()
                .context("failed to create x264enc")?,
        );
        self.parser = Some(
            gst::ElementFactory::make("h264parse")
                .name(format!("h264parse_{}", self.description.camera_id))
                .build()
                .context("failed to create h264parse")?,
        );
        self.tee = Some(
            gst::ElementFactory::make("tee")
                .name(format!("tee_{}", self.description.camera_id))
                .build()
                .context("failed to create tee")?,
        );

        let source = self.source.as_ref().unwrap();
        source.set_property_from_str("device", &self.description.device);

        let capsfilter = self.capsfilter.as_ref().unwrap();
        let caps = gst::Caps::builder("video/x-raw")
            .field("width", self.description.sensor_mode.width as i32)
            .field("height", self.description.sensor_mode.height as i32)
            .field(
                "framerate",
                gst::Fraction::new(self.description.sensor_mode.framerate, 1),
            )
            .build();
        capsfilter.set_property("caps", &caps);

        let videocrop = self.videocrop.as_ref().unwrap();
        videocrop.set_property("left", self.description.crop.left as i32);
        videocrop.set_property("top", self.description.crop.top as i32);
        videocrop.set_property(
            "right",
            self.description.sensor_mode.width as i32 - self.description.crop.right as i32,
        );
        videocrop.set_property(
            "bottom",
            self.description.sensor_mode.height as i32 - self.description.crop.bottom as i32,
        );

        let videoflip = self.videoflip.as_ref().unwrap();
        videoflip.set_property_from_str("method", self.videoflip_method());

        let encoder = self.encoder.as_ref().unwrap();
        encoder.set_property("bitrate", self.description.encoder.bitrate_kbps);
        encoder.set_property("key-int-max", self.description.encoder.gop as u32);
        encoder.set_property_from_str("speed-preset", self.description.encoder.preset.as_gst_str());

        let parser = self.parser.as_ref().unwrap();
        parser.set_property("config-interval", -1i32);

        pipeline
            .add_many([
                self.source.as_ref().unwrap(),
                self.capsfilter.as_ref().unwrap(),
                self.videocrop.as_ref().unwrap(),
                self.videoflip.as_ref().unwrap(),
                self.videoconvert.as_ref().unwrap(),
                self.encoder.as_ref().unwrap(),
                self.parser.as_ref().unwrap(),
                self.tee.as_ref().unwrap(),
            ])
            .context("failed to add source elements to pipeline")?;

        gst::Element::link_many([
            self.source.as_ref().unwrap(),
            self.capsfilter.as_ref().unwrap(),
            self.videocrop.as_ref().unwrap(),
            self.videoflip.as_ref().unwrap(),
            self.videoconvert.as_ref().unwrap(),
            self.encoder.as_ref().unwrap(),
            self.parser.as_ref().unwrap(),
            self.tee.as_ref().unwrap(),
        ])
        .context("failed to link source chain")?;

        Ok(())
    }
}
