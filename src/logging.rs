use std::env;
use std::io::IsTerminal;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const LOG_FILTER_ENV: &str = "DBCLONE_LOG";

/// Sets up console logging on stderr and, when `log_file` is given, a
/// plain-text file log. Stdout carries nothing but the run report.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// until the program exits.
pub fn init_logger(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Read the filter from `DBCLONE_LOG`, defaulting to `info`.
    let filter = env::var(LOG_FILTER_ENV).unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let console = console_layer(std::io::stderr, std::io::stderr().is_terminal());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "dbclone.log".into());
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(console)
        .with(file_layer)
        .init();

    guard
}

fn console_layer<S, W>(make_writer: W, ansi: bool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(make_writer)
        .with_target(false)
        .with_ansi(ansi)
}
