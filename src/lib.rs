//! # stepbench
//!
//! A micro-benchmark harness built from named steps.
//!
//! A [`Step`] is one unit of work, timed either around a direct async callable
//! or from the moment an external event fires until its handler signals
//! completion. A [`Test`] runs an ordered list of steps for a number of
//! iterations and aggregates per-step statistics; a [`Suite`] runs tests one
//! after another. Optional setup and teardown hooks run around every timed
//! section and are never counted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stepbench::{Step, Suite, Test, TestConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> stepbench::Result<()> {
//! let mut test = Test::with_config("sqrt", TestConfig::new().iterations(1000));
//!
//! test.add(Step::new("f64::sqrt").run_sync(|| {
//!     std::hint::black_box(std::hint::black_box(42.0f64).sqrt());
//! }));
//!
//! let mut suite = Suite::new("Math");
//! suite.add(test);
//! suite.start().await?;
//!
//! let table = suite.test("sqrt").unwrap().data_points()?;
//! println!("{}", table.to_csv());
//! # Ok(())
//! # }
//! ```
//!
//! ## Event-driven steps
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stepbench::{EventEmitter, Step, Test, TestConfig};
//!
//! # async fn example() -> stepbench::Result<()> {
//! let emitter = Arc::new(EventEmitter::new());
//! let trigger = Arc::clone(&emitter);
//!
//! let step = Step::new("on-message")
//!     .setup(move || {
//!         let trigger = Arc::clone(&trigger);
//!         async move {
//!             trigger.emit("message", 42);
//!             Ok(())
//!         }
//!     })
//!     .event(emitter, "message", |payload, done| {
//!         std::hint::black_box(payload);
//!         done.complete();
//!     });
//!
//! let mut test = Test::with_config("events", TestConfig::new().iterations(100));
//! test.add(step);
//! test.start().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod error;
mod event;
mod report;
mod result;
mod sampler;
mod step;
mod suite;

pub use config::{TestConfig, DEFAULT_ITERATIONS};
pub use context::{CycleContext, Done, StepContext};
pub use error::{BenchError, Phase, Result, ValidationError};
pub use event::{EventBinding, EventEmitter, EventHandler, EventListener, EventSource, ListenerId, Payload};
pub use report::{format_nanos, format_stats, ConsoleReporter, CsvReporter, JsonReporter, Reporter};
pub use result::{DataRow, DataTable, Stats, TestResult};
pub use sampler::{Sample, SampleId, Sampler};
pub use step::{hook, Action, Hook, HookFuture, Step, StepConfig};
pub use suite::Suite;
pub use test::{Test, TestState};
