use crate::build_info;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenLogFile {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Output format for the stdout log stream. The mirror file is always text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl LogFormat {
    /// `LOG_FORMAT=json` switches stdout to JSON; anything else keeps text.
    fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(raw) if raw.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

/// Runtime logging metadata used as common context fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingContext {
    pub service: String,
    pub mode: String,
    pub environment: String,
    pub run_id: String,
    pub build_version: String,
    pub build_commit: String,
    pub build_profile: String,
    pub format: LogFormat,
}

/// Shared handle to the append-only mirror file.
///
/// Every fmt writer created by the file layer points at the same slot. Once the owning
/// `LogFileGuard` is dropped the slot is emptied and further writes are discarded.
#[derive(Clone)]
struct FileMirror {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for FileMirror {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file mutex poisoned"))?;
        match slot.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file mutex poisoned"))?;
        match slot.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Owns the persistent log file for the lifetime of a job run.
///
/// Dropping the guard flushes and closes the file, whichever way the run exits.
pub struct LogFileGuard {
    mirror: FileMirror,
    path: PathBuf,
}

impl LogFileGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogFileGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.mirror.file.lock() {
            if let Some(mut file) = slot.take() {
                let _ = file.flush();
            }
        }
    }
}

/// Opens (create + append) the mirror log file.
pub fn open_log_file(path: &Path) -> Result<LogFileGuard, LoggingError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenLogFile {
            path: path.display().to_string(),
            source,
        })?;

    Ok(LogFileGuard {
        mirror: FileMirror {
            file: Arc::new(Mutex::new(Some(file))),
        },
        path: path.to_path_buf(),
    })
}

/// Initializes process-wide logging to stdout and the mirror file, then emits one bootstrap
/// event.
///
/// - `log` records from dependencies are bridged into `tracing`.
/// - `RUST_LOG` remains the canonical per-target filter knob.
/// - The returned guard must be held until the run finishes.
pub fn init_logging(
    service: &str,
    mode: &str,
    default_level: &str,
    log_file: &Path,
) -> Result<(LoggingContext, LogFileGuard), LoggingError> {
    let guard = open_log_file(log_file)?;
    let context = LoggingContext {
        service: service.to_string(),
        mode: mode.to_string(),
        environment: std::env::var("APP_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "dev".to_string()),
        run_id: build_run_id(service),
        build_version: build_info::VERSION.to_string(),
        build_commit: build_info::short_commit_hash().to_string(),
        build_profile: build_info::BUILD_PROFILE.to_string(),
        format: LogFormat::from_env(),
    };

    install_subscriber(context.format, default_level, guard.mirror.clone());

    tracing::info!(
        event = "logging_initialized",
        service = %context.service,
        environment = %context.environment,
        mode = %context.mode,
        run_id = %context.run_id,
        build_version = %context.build_version,
        build_commit = %context.build_commit,
        build_profile = %context.build_profile,
        log_format = context.format.as_str(),
        log_file = %guard.path().display(),
        "initialized logging"
    );

    Ok((context, guard))
}

fn install_subscriber(format: LogFormat, default_level: &str, mirror: FileMirror) {
    let _ = LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let json_stdout = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .flatten_event(true)
    });
    let text_stdout = (format == LogFormat::Text).then(tracing_subscriber::fmt::layer);
    let file_mirror = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(move || mirror.clone());

    // Fails when a subscriber is already installed, e.g. by an earlier test.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_stdout)
        .with(text_stdout)
        .with(file_mirror)
        .try_init();
}

fn build_run_id(service: &str) -> String {
    let epoch_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or_default();
    format!("{service}-{}-{epoch_millis}", process::id())
}

/// Renders a fatal error for stderr and the `error_report` log field: the message, each
/// nested cause on its own line, then a backtrace.
pub fn format_error_report(err: &(dyn StdError + 'static)) -> String {
    let mut report = format!("error: {err}");
    let causes = std::iter::successors(err.source(), |&cause| cause.source());
    for (depth, cause) in causes.enumerate() {
        let _ = write!(report, "\ncaused by ({}): {cause}", depth + 1);
    }
    let _ = write!(report, "\nbacktrace:\n{}", Backtrace::force_capture());
    report
}
