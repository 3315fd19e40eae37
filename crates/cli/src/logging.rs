use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `RUST_LOG` is only honoured with `debug` set, so a stray
/// variable in the environment cannot flood normal runs.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
