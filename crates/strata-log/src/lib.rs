//! Structured logging for the streaming pipeline.
//!
//! Library crates emit `tracing` events; this crate installs the subscriber that
//! formats them. Console output carries uptime timestamps, targets and thread names
//! (worker threads are named `strata-gen-<n>`), and debug builds additionally write
//! JSON lines to a file for post-mortem analysis.

use std::path::Path;

use strata_config::StrataConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name of the JSON log written in debug builds.
pub const LOG_FILE_NAME: &str = "strata.log";

// Per-region commits and dispatches log at debug, so `info` stays quiet while streaming.
const DEFAULT_FILTER: &str = "info";

/// Filter directives to use when `RUST_LOG` is not set.
pub fn filter_directives(config: Option<&StrataConfig>) -> String {
    match config {
        // A blank level in the file means "not set", not "log nothing".
        Some(config) if !config.debug.log_level.trim().is_empty() => {
            config.debug.log_level.clone()
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables the file layer
/// * `config` - supplies `debug.log_level` when `RUST_LOG` is unset
///
/// ```no_run
/// use strata_log::init_logging;
///
/// init_logging(Some(std::path::Path::new("./logs")), cfg!(debug_assertions), None);
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&StrataConfig>) {
    let filter_str = filter_directives(config);
    // RUST_LOG wins over the config file
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    // Console layer: human-readable, one line per event
    let console_layer = fmt::layer()
        .with_target(true) // crate path tells extraction from scheduling
        .with_thread_ids(false)
        .with_thread_names(true) // strata-gen-<n> identifies the worker
        .with_level(true)
        .with_timer(fmt::time::uptime()); // time since the streamer started

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    // Debug builds also keep a JSON trail of every region's lifecycle.
    // A log directory that cannot be created only loses the file layer.
    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false) // no color codes in the file
            .with_target(true)
            .with_thread_names(true)
            .with_timer(fmt::time::uptime())
            .json(); // one object per line, fields kept structured

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The filter used when neither `RUST_LOG` nor a config level is available.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
