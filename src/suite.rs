//! Suites: ordered collections of tests run one after another.

use crate::error::Result;
use crate::report::{ConsoleReporter, Reporter};
use crate::test::Test;
use tracing::info;

/// A named collection of [`Test`]s, run sequentially in insertion order.
///
/// Suite reporters see every notification of every test, before the test's
/// own reporters do.
///
/// # Example
///
/// ```rust,no_run
/// use stepbench::{Step, Suite, Test, TestConfig};
///
/// # async fn example() -> stepbench::Result<()> {
/// let mut test = Test::with_config("sqrt", TestConfig::new().iterations(100));
/// test.add(Step::new("f64::sqrt").run_sync(|| {
///     std::hint::black_box(2.0f64.sqrt());
/// }));
///
/// let mut suite = Suite::new("Math");
/// suite.add(test);
/// suite.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct Suite {
    name: String,
    tests: Vec<(String, Test)>,
    reporters: Vec<Box<dyn Reporter>>,
}

impl Suite {
    /// Create a suite that reports progress to the console.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            reporters: vec![Box::new(ConsoleReporter::new())],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a test under its own name.
    pub fn add(&mut self, test: Test) -> &mut Self {
        let name = test.name().to_string();
        self.add_named(name, test)
    }

    /// Register a test under `name`; an empty name gets a random one.
    ///
    /// Re-using a name replaces the earlier test but keeps its position.
    pub fn add_named(&mut self, name: impl Into<String>, test: Test) -> &mut Self {
        let mut name = name.into();
        if name.is_empty() {
            name = hex::encode(rand::random::<[u8; 16]>());
        }
        tracing::debug!(suite = %self.name, test = %name, "adding test");
        match self.tests.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = test,
            None => self.tests.push((name, test)),
        }
        self
    }

    /// Look up a test by the name it was registered under.
    pub fn test(&self, name: &str) -> Option<&Test> {
        self.tests.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn test_mut(&mut self, name: &str) -> Option<&mut Test> {
        self.tests.iter_mut().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Registered tests in execution order.
    pub fn tests(&self) -> impl Iterator<Item = (&str, &Test)> {
        self.tests.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Replace reporters with a custom set.
    pub fn reporters(&mut self, reporters: Vec<Box<dyn Reporter>>) -> &mut Self {
        self.reporters = reporters;
        self
    }

    /// Add an additional reporter.
    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) -> &mut Self {
        self.reporters.push(reporter);
        self
    }

    /// Run every test in insertion order, each to completion before the next.
    ///
    /// The first failing test aborts the suite.
    pub async fn start(&mut self) -> Result<()> {
        for r in &self.reporters {
            r.suite_start(self);
        }

        for (name, test) in self.tests.iter_mut() {
            info!(
                suite = %self.name,
                test = %name,
                iterations = test.config().iterations,
                "running test"
            );
            test.start_with(&self.reporters).await?;
        }

        for r in &self.reporters {
            r.suite_complete(self);
        }
        Ok(())
    }

    /// Clear the results of every test. Tests and reporters stay registered.
    pub fn reset(&mut self) {
        for (_, test) in self.tests.iter_mut() {
            test.reset();
        }
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("tests", &self.tests.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("reporters", &self.reporters.len())
            .finish()
    }
}
