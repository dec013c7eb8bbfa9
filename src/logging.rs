use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. The level is `debug` when `debug` is set and `info`
/// otherwise. `RUST_LOG` can override the level, but only while debug
/// logging is enabled.
///
/// When `log_file` is given, output is also appended to that file through a
/// non-blocking writer kept alive for the rest of the process.
///
/// Only the first call installs a subscriber; later calls do nothing.
pub fn init(debug: bool, log_file: Option<&Path>) {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let file_writer = log_file.and_then(|path| {
        let file_name = path.file_name()?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        Some((writer, guard))
    });

    match file_writer {
        Some((writer, guard)) => {
            let installed = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(writer))
                .try_init()
                .is_ok();
            if installed {
                let _ = FILE_GUARD.set(guard);
            }
        }
        None => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        }
    }
}
