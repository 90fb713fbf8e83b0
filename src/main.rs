use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;

use matchrec::alert::AlertRing;
use matchrec::config::ConfigStore;
use matchrec::constants;
use matchrec::control::ControlSurface;
use matchrec::health::HealthChannel;
use matchrec::http::{self, AppState};
use matchrec::lock::ExclusionLock;
use matchrec::persisted_state::{self, PersistedStateStore};
use matchrec::pipeline::MediaRuntimeAdapter;
use matchrec::preview::PreviewService;
use matchrec::recording::{RecordingGuard, RecordingService};

#[tokio::main]
async fn main() -> Result<()> {
    matchrec::log::setup_trace_logging();

    let config =
        Arc::new(ConfigStore::load(constants::CONFIG_PATH).with_context(|| format!("loading {}", constants::CONFIG_PATH))?);
    let health = Arc::new(HealthChannel::new(AlertRing::new()));
    let lock = Arc::new(ExclusionLock::new());
    let adapter = Arc::new(MediaRuntimeAdapter::new().context("initializing media runtime adapter")?);
    let persisted = PersistedStateStore::new();

    persisted_state::recover_at_startup(&persisted, &health.alerts).context("crash recovery check")?;

    let recording =
        Arc::new(RecordingService::new(config.clone(), adapter.clone(), lock.clone(), health.clone(), persisted));
    let recording_guard: Arc<dyn RecordingGuard> = recording.clone();
    let preview = Arc::new(PreviewService::new(config, adapter, lock, health.clone(), recording_guard));
    recording.set_preview_yield(preview.clone());

    let control = ControlSurface::new(recording, preview, health);
    let state = Arc::new(AppState { control });

    // Signal handling mirrors the teacher's main.rs: a dedicated thread
    // just flips a flag and exits, keeping signal delivery off any async
    // task's executor thread.
    let running = Arc::new(AtomicBool::new(true));
    let signal_running = running.clone();
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGQUIT, SIGHUP])?;
    std::thread::spawn(move || {
        for sig in signals.forever() {
            tracing::info!(signal = sig, "received signal, exiting");
            signal_running.store(false, Ordering::SeqCst);
            std::process::exit(0);
        }
    });

    http::serve(state, constants::DEFAULT_HTTP_PORT).await;
    Ok(())
}
