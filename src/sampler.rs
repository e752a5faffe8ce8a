//! Timer sampler: named start/stop samples collected during a run.
//!
//! A [`Sampler`] is a cheap handle to shared storage. The run engine creates a
//! fresh one for every run of a [`Test`](crate::Test) and hands clones to event
//! listeners, so samples recorded from an emitter's context land in the same
//! set the iteration loop aggregates.

use crate::result::Stats;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One timed start/stop pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub start: Instant,
    pub stop: Option<Instant>,
}

impl Sample {
    /// Elapsed time, or `None` while the sample is still open.
    pub fn elapsed(&self) -> Option<Duration> {
        self.stop.map(|stop| stop.saturating_duration_since(self.start))
    }

    pub fn is_closed(&self) -> bool {
        self.stop.is_some()
    }
}

/// Identifies an open sample so it can be closed later, possibly from another task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleId {
    name: String,
    index: usize,
}

impl SampleId {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the sample in its name's sequence (0-based).
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Collector of samples keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    samples: Arc<Mutex<HashMap<String, Vec<Sample>>>>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Sample>>> {
        // Ignore poison: a panicking hook must not hide the samples already taken.
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a new sample for `name`, starting the clock now.
    pub fn start(&self, name: &str) -> SampleId {
        let mut samples = self.lock();
        let entry = samples.entry(name.to_string()).or_default();
        let index = entry.len();
        entry.push(Sample {
            start: Instant::now(),
            stop: None,
        });
        SampleId {
            name: name.to_string(),
            index,
        }
    }

    /// Close a sample. Returns its elapsed time, or `None` if the id is unknown
    /// or the sample was already closed.
    pub fn stop(&self, id: &SampleId) -> Option<Duration> {
        let now = Instant::now();
        let mut samples = self.lock();
        let sample = samples.get_mut(&id.name)?.get_mut(id.index)?;
        if sample.is_closed() {
            return None;
        }
        sample.stop = Some(now);
        sample.elapsed()
    }

    /// All samples recorded for `name`, open ones included, in start order.
    pub fn samples(&self, name: &str) -> Vec<Sample> {
        self.lock().get(name).cloned().unwrap_or_default()
    }

    /// Elapsed times of the closed samples for `name`, in start order.
    pub fn durations(&self, name: &str) -> Vec<Duration> {
        self.lock()
            .get(name)
            .map(|samples| samples.iter().filter_map(Sample::elapsed).collect())
            .unwrap_or_default()
    }

    /// Number of closed samples for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.lock()
            .get(name)
            .map(|samples| samples.iter().filter(|s| s.is_closed()).count())
            .unwrap_or(0)
    }

    /// Summary statistics over every closed sample for `name`.
    pub fn stats(&self, name: &str) -> Stats {
        Stats::from_durations(&self.durations(name))
    }

    /// Sum of the closed sample durations for `name`.
    pub fn duration(&self, name: &str) -> Duration {
        self.durations(name).iter().sum()
    }

    pub fn min(&self, name: &str) -> Option<Duration> {
        self.durations(name).into_iter().min()
    }

    pub fn max(&self, name: &str) -> Option<Duration> {
        self.durations(name).into_iter().max()
    }

    pub fn mean(&self, name: &str) -> Option<Duration> {
        mean_of(&self.durations(name))
    }

    /// Names that have at least one sample, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Mean computed in u128 nanoseconds, so neither the sum nor the count is narrowed.
fn mean_of(durations: &[Duration]) -> Option<Duration> {
    if durations.is_empty() {
        return None;
    }
    let total: u128 = durations.iter().map(Duration::as_nanos).sum();
    let mean = total / durations.len() as u128;
    Some(Duration::new(
        (mean / 1_000_000_000) as u64,
        (mean % 1_000_000_000) as u32,
    ))
}
