use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Builds the level filter. With `debug` off the level is forced to `info`
/// regardless of `RUST_LOG`, so a stray environment variable cannot make a
/// user's session verbose.
pub fn build_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    }
}

/// Initialise logging, optionally into `log_file`. Only the first call in a
/// process installs a subscriber; later calls are no-ops.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = build_filter(debug);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let Some(path) = log_file else {
        let _ = builder.try_init();
        return;
    };
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        let _ = builder.try_init();
        tracing::warn!(path = %path.display(), "invalid log file path; logging to stderr");
        return;
    };
    let dir = if dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        dir.to_path_buf()
    };
    let appender = tracing_appender::rolling::never(dir, name);
    let _ = builder
        .with_ansi(false)
        .with_writer(appender)
        .try_init();
}
