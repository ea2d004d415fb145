use std::path::PathBuf;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "pulpit-backend.log";
const DEFAULT_LOG_DIR: &str = "./logs";

/// Keeps the non-blocking file writer flushing until dropped
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Directory for the daily rolling log, present only when file logging is on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogTarget {
    pub dir: PathBuf,
}

impl FileLogTarget {
    /// Reads `ENABLE_FILE_LOGS` and `LOG_DIR`.
    pub fn from_env() -> Option<Self> {
        Self::resolve(
            std::env::var("ENABLE_FILE_LOGS").ok().as_deref(),
            std::env::var("LOG_DIR").ok(),
        )
    }

    fn resolve(enabled: Option<&str>, dir: Option<String>) -> Option<Self> {
        if !matches!(enabled.map(str::trim), Some("true" | "1")) {
            return None;
        }
        let dir = dir
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
        Some(Self { dir: dir.into() })
    }

    fn open(&self) -> std::io::Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, &self.dir, LOG_FILE_PREFIX);
        Ok(tracing_appender::non_blocking(appender))
    }
}

/// Minimal stdout subscriber for the offline tools
pub fn init_cli_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Server subscriber: stdout filtered by `log_level`, plus the rolling file
/// when [`FileLogTarget::from_env`] yields one. A directory that cannot be
/// created leaves stdout only.
pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let opened = FileLogTarget::from_env().and_then(|target| match target.open() {
        Ok(writer) => Some(writer),
        Err(err) => {
            eprintln!("failed to create log directory {}: {err}", target.dir.display());
            None
        }
    });
    let (file_layer, guard) = match opened {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(FileLogGuard { _guard: guard }),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}
