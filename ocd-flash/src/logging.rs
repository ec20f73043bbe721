//! Log output for the command line tool.
//!
//! Human readable events go to stderr, next to the output of objcopy and OpenOCD.
//! With `general.log_file` set, every event and the timing of each flashing stage
//! is also written to that file as JSON lines.
use serde::{Deserialize, Serialize};
use std::{fs::File, path::PathBuf};
use tracing::level_filters::LevelFilter as TracingLevel;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Verbosity as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LevelFilter> for TracingLevel {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        }
    }
}

/// Flushes the log file when dropped. Hold it until the run is over.
pub struct LogFile {
    path: PathBuf,
    _worker: WorkerGuard,
}

impl Drop for LogFile {
    fn drop(&mut self) {
        tracing::debug!("Log written to {}", self.path.display());
    }
}

/// A configured level wins over `RUST_LOG`. Without either, only warnings are shown.
fn stderr_filter(configured: Option<LevelFilter>) -> EnvFilter {
    let builder = EnvFilter::builder();
    match configured {
        Some(level) => builder
            .with_default_directive(TracingLevel::from(level).into())
            .parse_lossy(""),
        None => builder
            .with_default_directive(TracingLevel::WARN.into())
            .from_env_lossy(),
    }
}

/// Installs the global subscriber.
///
/// The file layer is unfiltered and records the close of every stage span, so the
/// time spent converting and programming shows up in the log.
pub fn setup_logging(
    log_file: Option<&std::path::Path>,
    level: Option<LevelFilter>,
) -> anyhow::Result<Option<LogFile>> {
    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter(level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, worker) = NonBlockingBuilder::default()
                .lossy(false)
                .finish(File::create(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer);
            let guard = LogFile {
                path: path.to_path_buf(),
                _worker: worker,
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(file_layer)
        .init();

    if let Some(guard) = &guard {
        tracing::debug!("Logging to {}", guard.path.display());
    }

    Ok(guard)
}
