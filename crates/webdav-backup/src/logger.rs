//! Global logger setup.
//!

use std::{fs::create_dir_all, io};

use thiserror::Error;
use tracing::subscriber::set_global_default;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, registry};

/// Create and set the global loggers: a daily-rolling file under `./logs`
/// and an ANSI stdout stream. Level is overridable through `RUST_LOG`.
pub fn init_logger() -> Result<Vec<WorkerGuard>, LoggerError> {
    create_dir_all("./logs").map_err(LoggerError::CreateDirectory)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // File layer
    let (file_guard, file_layer) = {
        let appender = RollingFileAppender::builder()
            .filename_suffix("log")
            .rotation(Rotation::DAILY)
            .max_log_files(30)
            .build("./logs")?;

        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);

        (guard, layer)
    };

    // Std layer
    let (std_guard, std_layer) = {
        let (writer, guard) = tracing_appender::non_blocking(io::stdout());

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(true)
            .with_target(false);

        (guard, layer)
    };

    let registry = registry().with(file_layer).with(std_layer).with(filter);

    set_global_default(registry).map_err(|_| LoggerError::AlreadySet)?;

    Ok(vec![file_guard, std_guard])
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Failed to create rolling appender:\n{0}")]
    CreateRollingAppender(#[from] tracing_appender::rolling::InitError),

    #[error("Failed to create log directory:\n{0}")]
    CreateDirectory(#[source] io::Error),

    #[error("A global logger is already set.")]
    AlreadySet,
}
