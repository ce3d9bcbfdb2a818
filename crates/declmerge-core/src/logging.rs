use crate::config::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging to stderr and, when a directory is configured, to
/// `declmerge.log` inside it. stdout is left alone since it may carry
/// merged source.
///
/// The returned guard must be held for the lifetime of the application so
/// buffered file output is flushed.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &settings.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = rolling::never(dir, "declmerge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter(settings))
        .with(file_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(guard)
}

/// `RUST_LOG` wins over the configured filter.
fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter))
}
