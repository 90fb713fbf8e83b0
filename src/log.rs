use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. Level is controlled by
/// `RUST_LOG` (defaulting to `info`) rather than a fixed `Level`, since the
/// controller runs unattended on the appliance and operators need to be
/// able to crank up verbosity without a rebuild.
pub fn setup_trace_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).unwrap();
}
