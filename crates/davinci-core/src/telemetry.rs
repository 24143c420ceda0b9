//! Centralised tracing initialisation for the `davinci` binary.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! (the global subscriber can only be set once per process).

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Where and how log lines are written.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions<'a> {
    /// Newline-delimited JSON instead of human-readable lines.
    pub json: bool,
    /// Default verbosity when `RUST_LOG` is not set.
    pub level: Level,
    /// Mirror log lines to stderr.
    pub stderr: bool,
    /// Append log lines to this file (parent directories are created).
    pub file: Option<&'a Path>,
}

/// Initialise the global tracing subscriber.
///
/// Respects `RUST_LOG` for fine-grained filtering and falls back to
/// `options.level` otherwise. Fails only if the log file cannot be opened.
pub fn init_tracing(options: LogOptions<'_>) -> std::io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.level.as_str()));

    let file = match options.file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            Some(OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => None,
    };
    if options.json {
        let stderr_layer = options
            .stderr
            .then(|| fmt::layer().with_target(false).json().with_writer(std::io::stderr));
        let file_layer = file.map(|f| {
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .json()
                .with_writer(Mutex::new(f))
        });
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .ok();
    } else {
        let stderr_layer = options
            .stderr
            .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
        let file_layer = file.map(|f| {
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(f))
        });
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .ok();
    }
    Ok(())
}
