use std::{env, error::Error};

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::ConfigPaths;

const LOG_FORMAT_VAR: &str = "MADESK_LOG_FORMAT";
const DIAGNOSTICS_VAR: &str = "SENDSPIN_DEBUG";
const DEFAULT_FILTER: &str = "info";
const LOG_FILES_KEPT: usize = 7;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console rendering selected by `MADESK_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match env::var(LOG_FORMAT_VAR).as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn console_layer(format: LogFormat, detailed: bool) -> BoxedLayer {
    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    match (format, detailed) {
        (LogFormat::Json, _) => layer.json().boxed(),
        (LogFormat::Pretty, true) => layer
            .pretty()
            .with_thread_names(true)
            .with_thread_ids(true)
            .boxed(),
        (LogFormat::Pretty, false) => layer.compact().boxed(),
    }
}

/// Initialize tracing for short-lived commands
///
/// Logs go to stderr so command output on stdout stays clean. The filter
/// comes from `RUST_LOG` (default `info`); `MADESK_LOG_FORMAT=json` switches
/// to JSON lines.
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(console_layer(LogFormat::from_env(), false))
        .with(env_filter())
        .try_init()?;
    Ok(())
}

/// Initialize tracing for the long-running receiver
///
/// Like [`init`] with thread names on the console, plus a daily-rotated
/// plain-text file in the log directory keeping a week of history.
///
/// # Errors
/// Returns error if the log directory cannot be created or a global
/// subscriber is already installed
pub fn init_with_file() -> Result<(), Box<dyn Error>> {
    let appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(LOG_FILES_KEPT)
        .filename_prefix("madesk")
        .filename_suffix("log")
        .build(ConfigPaths::log_dir()?)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let format = LogFormat::from_env();
    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer);
    let file_layer = match format {
        LogFormat::Json => file_layer.json().boxed(),
        LogFormat::Pretty => file_layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(vec![console_layer(format, true), file_layer])
        .with(env_filter())
        .try_init()?;

    keep_flushing(guard);
    Ok(())
}

// The writer thread stops when its guard drops; the subscriber is global.
fn keep_flushing(guard: WorkerGuard) {
    std::mem::forget(guard);
}

/// Whether verbose output diagnostics were requested.
///
/// When `SENDSPIN_DEBUG` is set to a non-empty value, pipeline and routing
/// details that normally log at `debug` are promoted to `info`.
pub fn verbose_diagnostics() -> bool {
    env::var_os(DIAGNOSTICS_VAR).is_some_and(|value| !value.is_empty())
}
