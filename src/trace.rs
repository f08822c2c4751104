//! Diagnostics for people debugging a check
//!
//! Stdout belongs to the monitoring protocol, so diagnostics go to stderr,
//! filtered by the number of `-v` flags, and with `-T` also to an
//! append-only trace file. Nothing in the checks ever reads them back.

use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{dispatcher, warn, Dispatch};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// The trace file written by `-T`
pub fn default_trace_file() -> PathBuf {
    env::temp_dir().join("db2-plugins.log")
}

/// The stderr level for a number of `-v` flags
///
/// One shows progress, two the executed commands, three their raw output.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Run `f` with diagnostics going to stderr and, if given, the trace file
///
/// The subscriber only applies to the current thread for the duration of
/// `f`, so every run gets the verbosity it asked for.
pub fn scoped<T>(verbosity: u8, trace_file: Option<&Path>, f: impl FnOnce() -> T) -> T {
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(level_for(verbosity));

    let mut open_error = None;
    let file = trace_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_timer(ChronoLocal::new(TIMESTAMP.to_owned()))
                    .with_filter(LevelFilter::TRACE),
            ),
            Err(e) => {
                open_error = Some((path.to_owned(), e));
                None
            }
        }
    });

    let dispatch = Dispatch::new(tracing_subscriber::registry().with(stderr).with(file));
    dispatcher::with_default(&dispatch, || {
        if let Some((path, e)) = open_error {
            warn!(path = %path.display(), error = %e, "cannot open the trace file");
        }
        f()
    })
}

#[cfg(test)]
mod unit {
    use std::fs;

    use tracing::{debug, info, trace};
    use tracing_subscriber::filter::LevelFilter;

    use super::{default_trace_file, level_for, scoped};

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::ERROR);
        assert_eq!(level_for(1), LevelFilter::INFO);
        assert_eq!(level_for(2), LevelFilter::DEBUG);
        assert_eq!(level_for(3), LevelFilter::TRACE);
        assert_eq!(level_for(9), LevelFilter::TRACE);
    }

    #[test]
    fn trace_file_has_a_fixed_name() {
        assert!(default_trace_file().ends_with("db2-plugins.log"));
    }

    #[test]
    fn trace_file_gets_every_level_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("trace.log");
        let answer = scoped(0, Some(&file), || {
            info!(check = "check-test", "starting");
            trace!("raw output");
            42
        });
        assert_eq!(answer, 42);

        let written = fs::read_to_string(&file).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("starting"));
        assert!(lines[0].contains("check-test"));
        assert!(lines[1].contains("raw output"));
        // 2026-10-18 12:00:00.000
        assert_eq!(lines[0].as_bytes()[4], b'-');
        assert_eq!(lines[0].as_bytes()[10], b' ');
    }

    #[test]
    fn trace_file_is_appended_to() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("trace.log");
        fs::write(&file, "earlier run\n").unwrap();
        scoped(0, Some(&file), || debug!("later run"));

        let written = fs::read_to_string(&file).unwrap();
        assert!(written.starts_with("earlier run\n"));
        assert!(written.contains("later run"));
    }

    #[test]
    fn unopenable_trace_file_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing").join("trace.log");
        assert_eq!(scoped(0, Some(&file), || "done"), "done");
        assert!(!file.exists());
    }
}
