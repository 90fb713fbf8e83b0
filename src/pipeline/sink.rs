//! `PipelineSink`: record (rolling MP4 via `splitmuxsink`) and preview
//! (HLS via `hlssink`) sinks (spec.md §4.2, §6.2).
//!
//! Grounded in the teacher's `pipeline_sinks/ts_file_pipeline_sink.rs`
//! (`splitmuxsink` + `format-location` callback) and `hls_pipeline_sink.rs`
//! (`hlssink` property wiring), generalized from a fixed 2s `.ts` ring to
//! the spec's 600s MP4 record segments / 2s HLS preview segments.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use gstreamer as gst;
use gstreamer::prelude::*;

use super::description::SinkDescriptor;

pub trait PipelineSink: Send {
    fn setup_sink(&mut self, pipeline: &gst::Pipeline, tee: &gst::Element) -> Result<()>;
}

/// Writes rolling MP4 segments: `cam{ID}_{UTC_TIMESTAMP}_{INDEX:02}.mp4`
/// under `output_dir` (spec.md §6.2). `splitmuxsink`'s own async-finalize
/// behavior is why the stop path must wait for drain (§4.3 `await_drain`)
/// rather than trusting the file the moment the muxer stops writing to it.
pub struct RecordSink {
    camera_id: u8,
    output_dir: PathBuf,
    segment_duration_seconds: u64,
    segment_index: Arc<AtomicI64>,
    queue: Option<gst::Element>,
    sink: Option<gst::Element>,
}

impl RecordSink {
    pub fn new(camera_id: u8, descriptor: &SinkDescriptor) -> Result<Self> {
        let SinkDescriptor::RecordMp4 { output_dir, segment_duration_seconds } = descriptor else {
            anyhow::bail!("RecordSink requires a RecordMp4 descriptor");
        };

        Ok(Self {
            camera_id,
            output_dir: PathBuf::from(output_dir),
            segment_duration_seconds: *segment_duration_seconds,
            segment_index: Arc::new(AtomicI64::new(0)),
            queue: None,
            sink: None,
        })
    }

    /// The segment this sink is currently/most-recently writing. Read
    /// once at stop time for the integrity probe (§4.5.4) and `StopReport`.
    pub fn segments_written(&self) -> i64 {
        self.segment_index.load(Ordering::SeqCst)
    }
}

impl PipelineSink for RecordSink {
    fn setup_sink(&mut self, pipeline: &gst::Pipeline, tee: &gst::Element) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating {}", self.output_dir.display()))?;

        let queue = gst::ElementFactory::make("queue")
            .name(format!("record_queue_{}", self.camera_id))
            .build()
            .context("failed to create queue")?;
        let muxer = gst::ElementFactory::make("qtmux")
            .name(format!("record_mux_{}", self.camera_id))
            .property("faststart", true)
            .build()
            .context("failed to create qtmux")?;
        let sink = gst::ElementFactory::make("splitmuxsink")
            .name(format!("record_sink_{}", self.camera_id))
            .build()
            .context("failed to create splitmuxsink")?;

        sink.set_property("muxer", &muxer);
        sink.set_property(
            "max-size-time",
            self.segment_duration_seconds * 1_000_000_000u64,
        );

        let camera_id = self.camera_id;
        let output_dir = self.output_dir.clone();
        let segment_index = self.segment_index.clone();

        sink.connect("format-location", false, move |_args| {
            let index = segment_index.fetch_add(1, Ordering::SeqCst);
            let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
            let filename = format!("cam{}_{}_{:02}.mp4", camera_id, timestamp, index);
            let path = output_dir.join(&filename);
            Some(path.to_string_lossy().into_owned().to_value())
        });

        pipeline
            .add_many([&queue, &sink])
            .context("failed to add record sink elements to pipeline")?;
        queue.link(&sink).context("failed to link queue to splitmuxsink")?;

        let tee_pad = tee
            .request_pad_simple("src_%u")
            .context("failed to request tee pad for record sink")?;
        let queue_pad = queue.static_pad("sink").context("record queue has no sink pad")?;
        tee_pad.link(&queue_pad).context("failed to link tee to record queue")?;

        self.queue = Some(queue);
        self.sink = Some(sink);
        Ok(())
    }
}

/// Writes an HLS playlist + `.ts` segments to the in-memory `hls_root`
/// (spec.md §6.2), target duration 2s, playlist length/max files 8 — a
/// bounded ring, so preview segments are abandoned rather than drained on
/// stop (§4.6).
pub struct PreviewSink {
    camera_id: u8,
    hls_root: PathBuf,
    segment_duration_seconds: u64,
    playlist_length: u32,
    max_files: u32,
    queue: Option<gst::Element>,
    sink: Option<gst::Element>,
}

impl PreviewSink {
    pub fn new(camera_id: u8, descriptor: &SinkDescriptor) -> Result<Self> {
        let SinkDescriptor::PreviewHls {
            hls_root,
            segment_duration_seconds,
            playlist_length,
            max_files,
        } = descriptor
        else {
            anyhow::bail!("PreviewSink requires a PreviewHls descriptor");
        };

        Ok(Self {
            camera_id,
            hls_root: PathBuf::from(hls_root),
            segment_duration_seconds: *segment_duration_seconds,
            playlist_length: *playlist_length,
            max_files: *max_files,
            queue: None,
            sink: None,
        })
    }
}

impl PipelineSink for PreviewSink {
    fn setup_sink(&mut self, pipeline: &gst::Pipeline, tee: &gst::Element) -> Result<()> {
        std::fs::create_dir_all(&self.hls_root)
            .with_context(|| format!("creating {}", self.hls_root.display()))?;

        let queue = gst::ElementFactory::make("queue")
            .name(format!("preview_queue_{}", self.camera_id))
            .build()
            .context("failed to create queue")?;
        let mux = gst::ElementFactory::make("mpegtsmux")
            .name(format!("preview_mux_{}", self.camera_id))
            .build()
            .context("failed to create mpegtsmux")?;
        let sink = gst::ElementFactory::make("hlssink")
            .name(format!("preview_sink_{}", self.camera_id))
            .build()
            .context("failed to create hlssink")?;

        let playlist_location = self.hls_root.join(format!("cam{}.m3u8", self.camera_id));
        let segment_location = self.hls_root.join(format!("cam{}_%05d.ts", self.camera_id));

        sink.set_property("muxer", &mux);
        sink.set_property("playlist-location", playlist_location.to_string_lossy().as_ref());
        sink.set_property("location", segment_location.to_string_lossy().as_ref());
        sink.set_property("target-duration", self.segment_duration_seconds as u32);
        sink.set_property("playlist-length", self.playlist_length);
        sink.set_property("max-files", self.max_files);

        pipeline
            .add_many([&queue, &sink])
            .context("failed to add preview sink elements to pipeline")?;
        queue.link(&sink).context("failed to link queue to hlssink")?;

        let tee_pad = tee
            .request_pad_simple("src_%u")
            .context("failed to request tee pad for preview sink")?;
        let queue_pad = queue.static_pad("sink").context("preview queue has no sink pad")?;
        tee_pad.link(&queue_pad).context("failed to link tee to preview queue")?;

        self.queue = Some(queue);
        self.sink = Some(sink);
        Ok(())
    }
}
