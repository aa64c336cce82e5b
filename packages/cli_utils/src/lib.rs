#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the enrichment toolchain.
//!
//! Provides an `indicatif`-backed progress bar behind the pipeline's
//! [`ProgressCallback`] trait, plus [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while progress bars redraw, and optionally copies every log line into
//! a file.

use std::fs::File;
use std::io::{LineWriter, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use enrich_pipeline::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use log::{LevelFilter, Log, Metadata, Record};

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates a progress bar for record-level progress. It starts as a
    /// spinner while the input loads and becomes a full bar with
    /// percentage and ETA once [`ProgressCallback::set_total()`] is called.
    #[must_use]
    pub fn records_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Forwards records to an inner logger and appends each enabled record
/// to a log file as `<local time> - <LEVEL> - <message>`.
pub struct TeeLogger<L> {
    inner: L,
    file: Mutex<LineWriter<File>>,
}

impl<L: Log> TeeLogger<L> {
    /// Wraps `inner`, appending to the file at `path` (created if absent).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn new(inner: L, path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            inner,
            file: Mutex::new(LineWriter::new(file)),
        })
    }
}

impl<L: Log> Log for TeeLogger<L> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.inner.log(record);
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(
                file,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        self.inner.flush();
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// The level comes from `RUST_LOG` and defaults to `info`. When `log_file`
/// is given, every enabled line is also appended to it.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
///
/// # Errors
///
/// Returns an I/O error if `log_file` cannot be opened.
pub fn init_logger(log_file: Option<&Path>) -> std::io::Result<MultiProgress> {
    let multi = MultiProgress::new();

    // Build the pretty-env-logger logger manually so we can wrap it.
    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Ignore errors if a logger was already set (e.g., in tests).
    if let Some(path) = log_file {
        let tee = TeeLogger::new(logger, path)?;
        indicatif_log_bridge::LogWrapper::new(multi.clone(), tee)
            .try_init()
            .ok();
    } else {
        indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
            .try_init()
            .ok();
    }

    log::set_max_level(level);

    Ok(multi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Capture {
        level: LevelFilter,
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl Capture {
        fn info() -> Self {
            Self {
                level: LevelFilter::Info,
                lines: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl Log for Capture {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= self.level
        }

        fn log(&self, record: &Record<'_>) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    fn record(level: log::Level, message: &str, f: impl FnOnce(&Record<'_>)) {
        f(&Record::builder()
            .level(level)
            .target("enrich")
            .args(format_args!("{message}"))
            .build());
    }

    #[test]
    fn tees_enabled_records_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let capture = Capture::info();
        let tee = TeeLogger::new(capture.clone(), &path).unwrap();

        record(log::Level::Info, "Loaded 25 rows", |r| tee.log(r));
        record(log::Level::Debug, "hidden", |r| tee.log(r));
        record(log::Level::Warn, "Attempt 1/3 failed", |r| tee.log(r));
        tee.flush();

        assert_eq!(capture.lines(), vec!["Loaded 25 rows", "Attempt 1/3 failed"]);
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - Loaded 25 rows"));
        assert!(lines[1].ends_with(" - WARN - Attempt 1/3 failed"));
    }

    #[test]
    fn appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "earlier run\n").unwrap();
        let capture = Capture::info();
        let tee = TeeLogger::new(capture.clone(), &path).unwrap();
        record(log::Level::Info, "resumed", |r| tee.log(r));
        tee.flush();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("earlier run\n"));
        assert!(text.trim_end().ends_with(" - INFO - resumed"));
    }
}
