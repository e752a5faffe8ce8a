//! Pluggable reporters for lifecycle notifications and results.
//!
//! All reporters implement the `Reporter` trait and are designed to be:
//! - Non-panicking: errors are logged but never propagate into the run
//! - Atomic: console output is written in complete blocks to avoid interleaving
//! - Deterministic: identical inputs produce identical outputs

use crate::config::TestConfig;
use crate::context::{CycleContext, StepContext};
use crate::result::{timestamp, Stats};
use crate::suite::Suite;
use crate::test::Test;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Receiver of lifecycle notifications.
///
/// Hooks are called synchronously, in registration order, from the task
/// driving the run. Every hook has a no-op default.
pub trait Reporter: Send + Sync {
    /// Called when a suite starts.
    fn suite_start(&self, _suite: &Suite) {}

    /// Called when a test starts, with its effective configuration.
    fn test_start(&self, _test: &str, _config: &TestConfig) {}

    /// Called at the beginning of every iteration.
    fn cycle(&self, _test: &str, _cycle: &CycleContext) {}

    /// Called before each step of every iteration, ahead of its setup.
    fn step(&self, _test: &str, _step: &StepContext<'_>) {}

    /// Called once a test's statistics are available.
    fn test_complete(&self, _test: &Test) {}

    /// Called when every test of a suite has completed.
    fn suite_complete(&self, _suite: &Suite) {}
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn suite_start(&self, suite: &Suite) {
        (**self).suite_start(suite)
    }

    fn test_start(&self, test: &str, config: &TestConfig) {
        (**self).test_start(test, config)
    }

    fn cycle(&self, test: &str, cycle: &CycleContext) {
        (**self).cycle(test, cycle)
    }

    fn step(&self, test: &str, step: &StepContext<'_>) {
        (**self).step(test, step)
    }

    fn test_complete(&self, test: &Test) {
        (**self).test_complete(test)
    }

    fn suite_complete(&self, suite: &Suite) {
        (**self).suite_complete(suite)
    }
}

const RULE: &str = "======================================================================";

/// Format a nanosecond value with consistent units: ns, us, ms, or s.
/// Always uses 2 decimal places; NaN prints as `NaN`.
pub fn format_nanos(nanos: f64) -> String {
    if nanos.is_nan() {
        return "NaN".to_string();
    }
    let secs = nanos / 1_000_000_000.0;
    if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else if secs >= 0.001 {
        format!("{:.2}ms", secs * 1_000.0)
    } else if secs >= 0.000_001 {
        format!("{:.2}us", secs * 1_000_000.0)
    } else {
        format!("{:.2}ns", nanos)
    }
}

/// Render one step's statistics as a results block.
pub fn format_stats(name: &str, stats: &Stats) -> String {
    format!(
        "{} - Results:\n\
         Duration:\t{}\n\
         Min:\t\t{}\n\
         Max:\t\t{}\n\
         Mean:\t\t{}\n\
         {}",
        name,
        format_nanos(stats.duration),
        format_nanos(stats.min),
        format_nanos(stats.max),
        format_nanos(stats.mean),
        RULE
    )
}

/// Console reporter that prints progress and statistics to stdout.
pub struct ConsoleReporter {
    show_data_points: bool,
    /// Mutex ensures atomic writes across threads.
    output_lock: Mutex<()>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            show_data_points: false,
            output_lock: Mutex::new(()),
        }
    }

    /// Also print each step's individual sample durations.
    pub fn show_data_points(mut self, show: bool) -> Self {
        self.show_data_points = show;
        self
    }

    /// Atomically write a complete message to stdout.
    /// Never panics; logs a warning on error.
    fn write_stdout(&self, message: &str) {
        // Acquire lock to ensure atomicity; ignore poison (another thread panicked)
        let _guard = self.output_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", message) {
            tracing::warn!(error = %e, "failed to write to stdout");
        }
    }

    fn format_test(&self, test: &Test) -> String {
        let mut blocks = Vec::new();
        for step in test.steps() {
            let Some(stats) = test.stats().get(step.name()) else {
                continue;
            };
            let mut block = format_stats(step.name(), stats);
            if self.show_data_points {
                let points: Vec<_> = test
                    .step_data_points(step)
                    .iter()
                    .map(|d| format_nanos(d.as_nanos() as f64))
                    .collect();
                block.push_str(&format!("\n      runs: [{}]", points.join(", ")));
            }
            blocks.push(block);
        }
        blocks.join("\n")
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn suite_start(&self, suite: &Suite) {
        let header = format!(
            "{RULE}\n\
             Benchmark Suite: {}\n\
             Tests: {}\n\
             {RULE}",
            suite.name(),
            suite.len()
        );
        self.write_stdout(&header);
    }

    fn test_start(&self, test: &str, config: &TestConfig) {
        self.write_stdout(&format!(
            "Running \"{}\" - {} iterations\n{}",
            test, config.iterations, RULE
        ));
    }

    fn test_complete(&self, test: &Test) {
        let body = self.format_test(test);
        if !body.is_empty() {
            self.write_stdout(&body);
        }
    }

    fn suite_complete(&self, suite: &Suite) {
        self.write_stdout(&format!(
            "Completed {} tests in suite {}\n{RULE}",
            suite.len(),
            suite.name()
        ));
    }
}

/// Replace path separators so a test name can be used as a directory.
fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Write `contents` as `<dir>/<test>/<timestamp>.<ext>` and `latest.<ext>`.
fn write_result_files(dir: &Path, test: &str, ext: &str, contents: &str) -> std::io::Result<PathBuf> {
    let test_dir = dir.join(sanitize(test));
    std::fs::create_dir_all(&test_dir)?;

    let timestamped = test_dir.join(format!("{}.{}", timestamp(), ext));
    std::fs::write(&timestamped, contents)?;
    std::fs::write(test_dir.join(format!("latest.{}", ext)), contents)?;
    Ok(timestamped)
}

/// JSON reporter that writes each completed test's [`TestResult`](crate::TestResult).
///
/// Files are organized by test:
/// - `{test}/{timestamp}.json` - this run
/// - `{test}/latest.json` - most recent run
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn write_results(&self, test: &Test) -> crate::Result<PathBuf> {
        let json = serde_json::to_string_pretty(&test.result())?;
        Ok(write_result_files(&self.output_dir, test.name(), "json", &json)?)
    }
}

impl Reporter for JsonReporter {
    fn test_complete(&self, test: &Test) {
        match self.write_results(test) {
            Ok(path) => tracing::info!(test = %test.name(), path = %path.display(), "results written"),
            Err(e) => tracing::warn!(test = %test.name(), error = %e, "failed to write results"),
        }
    }
}

/// CSV reporter that writes each completed test's data table.
///
/// Files are organized by test:
/// - `{test}/{timestamp}.csv` - this run
/// - `{test}/latest.csv` - most recent run
pub struct CsvReporter {
    output_dir: PathBuf,
}

impl CsvReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn write_data_points(&self, test: &Test) -> crate::Result<PathBuf> {
        let csv = test.data_points()?.to_csv();
        Ok(write_result_files(&self.output_dir, test.name(), "csv", &csv)?)
    }
}

impl Reporter for CsvReporter {
    fn test_complete(&self, test: &Test) {
        match self.write_data_points(test) {
            Ok(path) => tracing::info!(test = %test.name(), path = %path.display(), "data points written"),
            Err(e) => tracing::warn!(test = %test.name(), error = %e, "failed to write data points"),
        }
    }
}
