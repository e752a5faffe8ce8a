//! stepbench: run the demonstration suite.
//!
//! Compares `f64::sqrt` against the classic fast inverse square root, either
//! as direct steps, as event-driven steps fed through an [`EventEmitter`], or
//! both. Useful as a smoke test of the harness on a new machine.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::hint::black_box;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stepbench::{
    ConsoleReporter, CsvReporter, EventEmitter, JsonReporter, Reporter, Step, Suite, Test,
    TestConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Time the functions directly
    Direct,
    /// Time event handlers fed from an emitter
    Event,
    /// Run both tests
    Both,
}

#[derive(Debug, Parser)]
#[command(
    name = "stepbench",
    about = "Run the stepbench demonstration suite",
    long_about = "
Runs a suite comparing f64::sqrt with the fast inverse square root.

Example:
    stepbench                              # both tests, 1000 iterations
    stepbench --mode event --iterations 50 # event-driven steps only
    stepbench --csv                        # print raw data points as CSV
    stepbench --output-dir target/bench    # write JSON and CSV results
"
)]
struct Cli {
    /// Iterations per test
    #[arg(long, default_value_t = 1000)]
    iterations: usize,

    /// Which tests to run
    #[arg(long, value_enum, default_value_t = Mode::Both)]
    mode: Mode,

    /// Print each test's raw data points as CSV
    #[arg(long)]
    csv: bool,

    /// Write JSON and CSV results under this directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Fail an event step that takes longer than this many milliseconds
    #[arg(long)]
    event_timeout_ms: Option<u64>,

    /// Print every sample under the statistics
    #[arg(long)]
    show_runs: bool,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Prints the data table after each test.
struct CsvPrinter;

impl Reporter for CsvPrinter {
    fn test_complete(&self, test: &Test) {
        match test.data_points() {
            Ok(table) => println!("Raw CSV:\n\n{}", table.to_csv()),
            Err(e) => tracing::warn!(test = %test.name(), error = %e, "no data points to print"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = TestConfig::new().iterations(cli.iterations);
    if let Some(ms) = cli.event_timeout_ms {
        config = config.event_timeout(Duration::from_millis(ms));
    }

    let mut suite = Suite::new("Math");
    let mut reporters: Vec<Box<dyn Reporter>> =
        vec![Box::new(ConsoleReporter::new().show_data_points(cli.show_runs))];
    if cli.csv {
        reporters.push(Box::new(CsvPrinter));
    }
    if let Some(dir) = &cli.output_dir {
        reporters.push(Box::new(JsonReporter::new(dir)));
        reporters.push(Box::new(CsvReporter::new(dir)));
    }
    suite.reporters(reporters);

    if matches!(cli.mode, Mode::Direct | Mode::Both) {
        suite.add(direct_test(config.clone()));
    }
    if matches!(cli.mode, Mode::Event | Mode::Both) {
        suite.add(event_test(config));
    }

    suite.start().await.context("benchmark suite failed")?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Input shared between a step's setup and its timed section, stored as f64 bits.
#[derive(Clone, Default)]
struct Input(Arc<AtomicU64>);

impl Input {
    fn roll(&self) -> f64 {
        let value = (rand::random::<f64>() * 1000.0).round();
        self.0.store(value.to_bits(), Ordering::Relaxed);
        value
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

fn direct_test(config: TestConfig) -> Test {
    let mut test = Test::with_config("sqrt", config);

    let input = Input::default();
    let (setup, run) = (input.clone(), input.clone());
    test.add(
        Step::new("f64::sqrt")
            .setup(move || {
                setup.roll();
                async { Ok(()) }
            })
            .run_sync(move || {
                black_box(black_box(run.get()).sqrt());
            }),
    );

    let input = Input::default();
    let (setup, run) = (input.clone(), input);
    test.add(
        Step::new("q_rsqrt")
            .setup(move || {
                setup.roll();
                async { Ok(()) }
            })
            .run_sync(move || {
                black_box(q_rsqrt(black_box(run.get()) as f32));
            }),
    );

    test
}

fn event_test(config: TestConfig) -> Test {
    let emitter = Arc::new(EventEmitter::new());
    let mut test = Test::with_config("sqrt-events", config);

    for (name, f) in [
        ("f64::sqrt", (|n: f64| n.sqrt()) as fn(f64) -> f64),
        ("q_rsqrt", |n: f64| f64::from(q_rsqrt(n as f32))),
    ] {
        let input = Input::default();
        let trigger = Arc::clone(&emitter);
        test.add(
            Step::new(name)
                .setup(move || {
                    let value = input.roll();
                    let trigger = Arc::clone(&trigger);
                    async move {
                        // Deliver on the next scheduler turn, as an external producer would.
                        tokio::spawn(async move {
                            trigger.emit(name, value);
                        });
                        Ok(())
                    }
                })
                .event(emitter.clone(), name, move |payload, done| {
                    let n = payload.as_f64().unwrap_or_default();
                    black_box(f(black_box(n)));
                    done.complete();
                }),
        );
    }

    test
}

/// Fast inverse square root, as popularised by Quake III.
fn q_rsqrt(number: f32) -> f32 {
    const THREE_HALFS: f32 = 1.5;
    let x2 = number * 0.5;
    let i = 0x5f37_59df - (number.to_bits() >> 1);
    let y = f32::from_bits(i);
    y * (THREE_HALFS - x2 * y * y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q_rsqrt_approximates_inverse_sqrt() {
        for n in [1.0f32, 4.0, 100.0, 987.0] {
            let expected = 1.0 / n.sqrt();
            assert!((q_rsqrt(n) - expected).abs() / expected < 0.01);
        }
    }

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["stepbench"]);
        assert_eq!(cli.iterations, 1000);
        assert_eq!(cli.mode, Mode::Both);
        assert!(!cli.csv);
    }

    #[tokio::test]
    async fn demo_suite_runs_both_modes() {
        let mut suite = Suite::new("demo");
        suite.reporters(vec![]);
        suite.add(direct_test(TestConfig::new().iterations(5)));
        suite.add(event_test(TestConfig::new().iterations(5)));
        suite.start().await.unwrap();

        for (_, test) in suite.tests() {
            assert_eq!(test.data_points().unwrap().len(), 5);
        }
    }
}
