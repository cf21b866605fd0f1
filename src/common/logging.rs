//! Logging and tracing configuration
//!
//! Everything goes to stderr so stdout stays clean for command output.
//! Suite and scenario runs additionally append to a session log file.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("uidriver=debug,warn")
        } else {
            EnvFilter::new("uidriver=info,warn")
        }
    })
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
}

/// Initialize tracing for one-shot commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli(verbose: bool) {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(stderr_layer())
        .init();
}

/// Initialize tracing for suite runs (session log file + stderr)
///
/// The returned guard flushes the file writer when dropped and must be
/// kept alive for the whole run. Falls back to stderr only if the log
/// directory cannot be created.
pub fn init_session(verbose: bool) -> (Option<PathBuf>, Option<WorkerGuard>) {
    let log_dir = match paths::ensure_log_dir() {
        Ok(Some(dir)) => dir,
        Ok(None) => {
            init_cli(verbose);
            return (None, None);
        }
        Err(e) => {
            eprintln!("Warning: Could not create log directory: {}", e);
            init_cli(verbose);
            return (None, None);
        }
    };

    let appender = tracing_appender::rolling::never(&log_dir, paths::SESSION_LOG);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(file_layer)
        .with(stderr_layer())
        .init();

    (Some(log_dir.join(paths::SESSION_LOG)), Some(guard))
}

/// Truncate the session log file
pub fn truncate_session_log() -> std::io::Result<()> {
    if let Some(path) = paths::session_log_path() {
        if path.exists() {
            std::fs::write(&path, "")?;
        }
    }
    Ok(())
}
