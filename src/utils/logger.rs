// Logger initialization
//
// The terminal UI owns stdout, so in TUI mode events go to a daily log file.
// Command mode logs to stderr.

use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "datadesk.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Rolling file under the configured log directory.
    File,
    Stderr,
}

/// `RUST_LOG` wins over the configured filter.
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("datadesk=info"))
}

/// Install the global subscriber. The returned guard flushes the file
/// writer on drop and must be held until exit.
pub fn init_logger(config: &LogConfig, target: LogTarget) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = env_filter(&config.filter);

    match target {
        LogTarget::File => {
            let directory = config.directory();
            std::fs::create_dir_all(&directory)?;
            let (writer, guard) = file_writer(&directory);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()?;

            info!(directory = %directory.display(), "Logging initialized");
            Ok(Some(guard))
        }
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .try_init()?;
            Ok(None)
        }
    }
}

fn file_writer(directory: &Path) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
    tracing_appender::non_blocking(appender)
}
