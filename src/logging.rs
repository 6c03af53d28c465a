//! Logging setup
//!
//! Console output goes to stderr, filtered by `RUST_LOG` or the verbosity
//! flag. Everything at the same level is also written to a daily-rotated
//! file under the data directory.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "modprofiles.log";

/// Keeps the file writer alive. Dropping it flushes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// `<data_dir>/modprofiles/logs`
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("modprofiles").join("logs"))
}

fn env_filter(verbose: bool) -> Result<EnvFilter> {
    let directive = if verbose {
        "modprofiles=debug"
    } else {
        "modprofiles=info"
    };
    Ok(EnvFilter::from_default_env().add_directive(directive.parse()?))
}

/// Installs the global subscriber.
///
/// Without a usable log directory only the console layer is installed.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<LoggingGuard> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let file_dir = log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok());

    let (file_layer, file_guard) = match file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose)?)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
