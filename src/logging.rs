use tracing_subscriber::{fmt::time::UtcTime, layer::Identity, prelude::*};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize logging from config. Level precedence: config level, then
/// `RUST_LOG`, then `info`. File output is buffered and rotation-aware.
pub fn init(cfg: &LoggingConfig) {
    let filter = match &cfg.level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    match cfg.format {
        LogFormat::Json => {
            let registry = tracing_subscriber::registry().with(filter).with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(std::io::stdout),
            );
            if let Some(file_layer) = file_writer(cfg).map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            }) {
                let _ = registry.with(file_layer).try_init();
            } else {
                let _ = registry.with(Identity::new()).try_init();
            }
        }
        LogFormat::Text => {
            let registry = tracing_subscriber::registry().with(filter).with(
                tracing_subscriber::fmt::layer()
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(std::io::stdout),
            );
            if let Some(file_layer) = file_writer(cfg).map(|writer| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            }) {
                let _ = registry.with(file_layer).try_init();
            } else {
                let _ = registry.with(Identity::new()).try_init();
            }
        }
    }
}

fn file_writer(cfg: &LoggingConfig) -> Option<tracing_appender::non_blocking::NonBlocking> {
    if !cfg.enable_file_logging {
        return None;
    }
    if let Err(err) = std::fs::create_dir_all(&cfg.dir) {
        eprintln!("Cannot create log directory '{}': {err}; stdout only", cfg.dir);
        return None;
    }
    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };
    let appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    // The guard must outlive the subscriber.
    let _leaked: &'static _ = Box::leak(Box::new(guard));
    Some(non_blocking)
}
