//! Console and optional rolling-file logging. `log` records from the
//! Proxmox client are forwarded into `tracing`.

use crate::cli::Args;
use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub level: String,
    pub file: Option<FileLog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLog {
    pub dir: String,
    pub filename: String,
    pub rotate: String,
}

impl From<&Args> for LogOptions {
    fn from(args: &Args) -> Self {
        Self {
            level: args.log_level.clone(),
            file: args.log_file_enable.then(|| FileLog {
                dir: args.log_dir.clone(),
                filename: args.log_filename.clone(),
                rotate: args.log_rotate.clone(),
            }),
        }
    }
}

pub fn rotation(name: &str) -> Result<Rotation> {
    match name.to_ascii_lowercase().as_str() {
        "daily" => Ok(Rotation::DAILY),
        "hourly" => Ok(Rotation::HOURLY),
        "minutely" => Ok(Rotation::MINUTELY),
        "never" => Ok(Rotation::NEVER),
        other => Err(anyhow!("Unknown log rotation '{}'", other)),
    }
}

/// `RUST_LOG` wins over the configured level when set.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &options.file {
        Some(file) => {
            let appender = RollingFileAppender::builder()
                .rotation(rotation(&file.rotate)?)
                .filename_prefix(file.filename.clone())
                .build(&file.dir)
                .with_context(|| format!("Failed to open log directory {}", file.dir))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter(&options.level))
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;
    Ok(guard)
}
