//! Usage: Tracing setup (stderr by default, optional daily log file).

use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,seo_brain_auth=debug";
const LOG_FILE_PREFIX: &str = "seo-brain-auth.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install a stderr subscriber. Safe to call more than once; later calls are
/// no-ops (the host may have installed its own subscriber already).
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Install a subscriber that also writes to a daily-rotated file in `dir`.
/// The returned guard must stay alive for the duration of the process, or
/// buffered log lines are lost.
pub fn init_with_file(dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn init_with_file_creates_log_directory_contents() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_with_file(dir.path());
        tracing::info!("log file smoke test");
        drop(guard);
    }
}
