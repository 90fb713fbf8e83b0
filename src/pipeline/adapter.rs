//! Media Runtime Adapter (C3, spec.md §4.3, §5): the only code in this
//! crate that touches a `gst::Pipeline` directly once it has been created.
//! Owns one dedicated worker thread pumping a `glib::MainLoop`; every bus
//! watch for every handle this adapter creates is attached to that single
//! `glib::MainContext`, so callbacks never run on a caller's thread.
//!
//! Grounded in the teacher's `recording_pipeline.rs` (`pipeline_runner`
//! thread + `handle_bus_message` match over `MessageView`), generalized
//! from "one polling thread per pipeline" to "one shared worker thread per
//! adapter" per spec.md §5's resource model.

use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use gstreamer as gst;
use gstreamer::prelude::*;

use crate::error::ControllerError;

use super::description::PipelineDescription;
use super::handle::{HandleEvent, HandleShared, HandleState, PipelineHandle};
use super::sink::{PipelineSink, PreviewSink, RecordSink};
use super::source::{CameraSource, PipelineSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained,
    Timeout,
}

/// Polling granularity for the blocking `start`/`await_drain` calls below.
/// Bus messages are delivered asynchronously by the worker thread; these
/// calls just wait for the shared state the bus watch updates to flip.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct MediaRuntimeAdapter {
    context: glib::MainContext,
    main_loop: glib::MainLoop,
    _worker: JoinHandle<()>,
}

impl MediaRuntimeAdapter {
    pub fn new() -> anyhow::Result<Self> {
        gst::init().context("gstreamer init failed")?;

        let context = glib::MainContext::new();
        let main_loop = glib::MainLoop::new(Some(&context), false);

        let worker_context = context.clone();
        let worker_loop = main_loop.clone();
        let worker = std::thread::Builder::new()
            .name("media-runtime-adapter".into())
            .spawn(move || {
                worker_context.push_thread_default();
                worker_loop.run();
                worker_context.pop_thread_default();
            })
            .context("failed to spawn media runtime adapter worker thread")?;

        Ok(Self { context, main_loop, _worker: worker })
    }

    /// Builds the native pipeline for `description` and wires its bus
    /// watch onto this adapter's worker context. The returned handle is
    /// `Building`; call [`Self::start`] to bring it to `Playing`.
    pub fn create(&self, description: PipelineDescription) -> Result<PipelineHandle, ControllerError> {
        let role = description.role;
        let camera_id = description.camera_id;
        let pipeline = gst::Pipeline::builder().name(description.handle_name()).build();

        let build = |pipeline: &gst::Pipeline| -> anyhow::Result<()> {
            let mut source = CameraSource::new(description.clone());
            source.setup_source(pipeline)?;
            let tee = source.get_tee()?;

            match role {
                super::description::PipelineRole::Record => {
                    let mut sink = RecordSink::new(camera_id, &description.sink)?;
                    sink.setup_sink(pipeline, &tee)?;
                }
                super::description::PipelineRole::Preview => {
                    let mut sink = PreviewSink::new(camera_id, &description.sink)?;
                    sink.setup_sink(pipeline, &tee)?;
                }
            }
            Ok(())
        };

        if let Err(err) = build(&pipeline) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(ControllerError::RuntimeBuildError {
                role,
                camera_id,
                reason: format!("{err:#}"),
            });
        }

        let handle = PipelineHandle::new(description, pipeline);
        self.attach_bus_watch(&handle);
        Ok(handle)
    }

    fn attach_bus_watch(&self, handle: &PipelineHandle) {
        let bus = handle
            .gst_pipeline()
            .bus()
            .expect("a freshly built pipeline always has a bus");
        let shared = handle.shared.clone();
        let pipeline_name = handle.name().to_string();

        let watch = bus.create_watch(move |_bus, msg| {
            let mut shared = shared.lock().unwrap();
            if shared.disposed {
                return glib::ControlFlow::Break;
            }

            use gst::MessageView;
            match msg.view() {
                MessageView::StateChanged(sc) => {
                    let is_pipeline = msg
                        .src()
                        .map(|s| s.name() == pipeline_name.as_str())
                        .unwrap_or(false);
                    if is_pipeline && sc.current() == gst::State::Playing {
                        if shared.state != HandleState::Playing {
                            shared.started_at.get_or_insert_with(Instant::now);
                        }
                        shared.state = HandleState::Playing;
                        forward(&mut *shared, HandleEvent::StateChanged { new_state: HandleState::Playing });
                    }
                }
                MessageView::Eos(_) => {
                    shared.eos_seen = true;
                    forward(&mut *shared, HandleEvent::Eos);
                }
                MessageView::Error(e) => {
                    let code = e.error().to_string();
                    let message = e.debug().unwrap_or_default().to_string();
                    shared.last_error = Some((code.clone(), message.clone()));
                    forward(&mut *shared, HandleEvent::Error { code, message });
                }
                MessageView::Warning(w) => {
                    let message = w.error().to_string();
                    forward(&mut *shared, HandleEvent::Warning { message });
                }
                _ => {}
            }

            glib::ControlFlow::Continue
        });

        let _ = watch.attach(Some(&self.context));
    }

    /// Registers an external sink that receives every [`HandleEvent`] for
    /// `handle` from here on (spec.md §4.7, the Health & Alert Channel's
    /// feed). Delivery always happens on the adapter's worker thread.
    pub fn subscribe_events(&self, handle: &PipelineHandle, sink: Sender<HandleEvent>) {
        handle.shared.lock().unwrap().event_sink = Some(sink);
    }

    /// Requests `Playing` and blocks the caller until the bus confirms it,
    /// an error arrives, or `timeout` elapses (spec.md §4.3,
    /// default [`crate::constants::DEFAULT_START_TIMEOUT_SECONDS`]).
    pub fn start(&self, handle: &PipelineHandle, timeout: Duration) -> Result<(), ControllerError> {
        handle.shared.lock().unwrap().state = HandleState::Building;

        if let Err(err) = handle.gst_pipeline().set_state(gst::State::Playing) {
            return Err(ControllerError::RuntimeBuildError {
                role: handle.description().role,
                camera_id: handle.description().camera_id,
                reason: format!("set_state(Playing) rejected: {err}"),
            });
        }

        let deadline = Instant::now() + timeout;
        loop {
            {
                let shared = handle.shared.lock().unwrap();
                if shared.state == HandleState::Playing {
                    return Ok(());
                }
                if let Some((code, message)) = shared.last_error.clone() {
                    return Err(ControllerError::RuntimeBuildError {
                        role: handle.description().role,
                        camera_id: handle.description().camera_id,
                        reason: format!("{code}: {message}"),
                    });
                }
            }
            if Instant::now() >= deadline {
                return Err(ControllerError::RuntimeStartTimeout {
                    camera_id: handle.description().camera_id,
                    timeout_s: timeout.as_secs_f64(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Pushes an end-of-stream event into the pipeline. Non-blocking;
    /// pair with [`Self::await_drain`] to observe completion.
    pub fn send_end_of_stream(&self, handle: &PipelineHandle) {
        handle.shared.lock().unwrap().state = HandleState::Draining;
        handle.gst_pipeline().send_event(gst::event::Eos::new());
    }

    /// Waits up to `timeout` for the EOS message to reach the bus, i.e.
    /// for `splitmuxsink`/`hlssink` to finish finalizing the current
    /// segment (spec.md §4.3, §4.5 step 3). Never tears the pipeline down
    /// itself — callers that time out decide whether to escalate to
    /// [`Self::stop`] (the `ForcedTeardown` path, spec.md §4.3).
    pub fn await_drain(&self, handle: &PipelineHandle, timeout: Duration) -> DrainOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if handle.shared.lock().unwrap().eos_seen {
                return DrainOutcome::Drained;
            }
            if Instant::now() >= deadline {
                return DrainOutcome::Timeout;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Idempotent. Sets the pipeline to `Null`, marks the handle disposed,
    /// and guarantees no further [`HandleEvent`] is delivered for it after
    /// this call returns (checked synchronously against `shared.disposed`,
    /// not dependent on when glib actually removes the bus watch source).
    ///
    /// Polls for the `Null` transition up to
    /// [`crate::constants::DEFAULT_FORCED_TEARDOWN_TIMEOUT_SECONDS`]; if the
    /// pipeline never gets there the handle is still disposed (resources are
    /// reclaimed either way) but its `last_error` is set to `RuntimeStuck`
    /// (spec.md §4.3 `ForcedTeardown`).
    pub fn stop(&self, handle: &PipelineHandle) {
        {
            let shared = handle.shared.lock().unwrap();
            if shared.disposed {
                return;
            }
        }

        let _ = handle.gst_pipeline().set_state(gst::State::Null);

        let deadline =
            Instant::now() + Duration::from_secs_f64(crate::constants::DEFAULT_FORCED_TEARDOWN_TIMEOUT_SECONDS);
        let reached_null = loop {
            let (_, current, _) = handle.gst_pipeline().state(gst::ClockTime::ZERO);
            if current == gst::State::Null {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let mut shared = handle.shared.lock().unwrap();
        shared.disposed = true;
        shared.state = HandleState::Disposed;
        if !reached_null {
            let err = ControllerError::RuntimeStuck { camera_id: handle.description().camera_id };
            shared.last_error = Some(("RuntimeStuck".to_string(), err.to_string()));
        }
    }
}

impl Drop for MediaRuntimeAdapter {
    fn drop(&mut self) {
        self.main_loop.quit();
    }
}

fn forward(shared: &mut HandleShared, event: HandleEvent) {
    if let Some(sink) = &shared.event_sink {
        let _ = sink.send(event);
    }
}
