//! Trace logging: console plus an append-only `trace.txt`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const TRACE_FILE: &str = "trace.txt";

fn open_trace(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global subscriber. The filter defaults to `info` and follows
/// `RUST_LOG` when set. If the trace file cannot be opened the process keeps
/// logging to the console only. Returns the trace file in use.
pub fn init(trace_file: Option<&Path>) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut open_error = None;
    let file = trace_file.and_then(|path| match open_trace(path) {
        Ok(file) => Some((path.to_path_buf(), file)),
        Err(err) => {
            open_error = Some((path.to_path_buf(), err));
            None
        }
    });
    let (active_path, file_layer) = match file {
        Some((path, file)) => (
            Some(path),
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .ok();

    if let Some((path, err)) = open_error {
        warn!(%err, path = %path.display(), "failed to open trace file; logging to console only");
    }
    active_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unwritable_trace_file_is_not_fatal() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no/such/dir").join(TRACE_FILE);
        assert!(open_trace(&missing).is_err());
        assert_eq!(init(Some(missing.as_path())), None);
    }

    #[test]
    fn trace_file_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(TRACE_FILE);
        std::fs::write(&path, "earlier run\n").unwrap();
        let mut file = open_trace(&path).unwrap();
        io::Write::write_all(&mut file, b"next run\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier run\nnext run\n"
        );
    }
}
