//! Contexts handed to reporters and event handlers during a run.

use crate::sampler::{SampleId, Sampler};
use crate::step::Step;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Payload of the `cycle` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleContext {
    /// 1-based iteration index.
    pub index: usize,
    pub iterations: usize,
}

/// Payload of the `step` notification.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// 1-based iteration index.
    pub index: usize,
    pub iterations: usize,
    pub step: &'a Step,
}

/// Per-step occurrence tracking for an event-driven step.
///
/// The listener side calls [`Occurrences::fire`] for every event; the
/// iteration loop awaits [`Occurrences::wait_for`]. The completed count only
/// moves forward, so an occurrence that finishes before the loop starts
/// waiting is still observed.
pub(crate) struct Occurrences {
    step: String,
    sampler: Sampler,
    fired: AtomicUsize,
    completed: watch::Sender<usize>,
}

impl Occurrences {
    pub(crate) fn new(step: &str, sampler: Sampler) -> Arc<Self> {
        let (completed, _) = watch::channel(0);
        Arc::new(Self {
            step: step.to_string(),
            sampler,
            fired: AtomicUsize::new(0),
            completed,
        })
    }

    /// Record a new occurrence and open its sample.
    pub(crate) fn fire(self: &Arc<Self>) -> Done {
        let occurrence = self.fired.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(step = %self.step, occurrence, "event occurrence starting");
        let sample = self.sampler.start(&self.step);
        Done {
            occurrences: Arc::clone(self),
            sample,
            occurrence,
            finished: false,
        }
    }

    pub(crate) fn step_name(&self) -> &str {
        &self.step
    }

    pub(crate) fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> usize {
        *self.completed.borrow()
    }

    /// Resolve once at least `count` occurrences have completed.
    pub(crate) async fn wait_for(&self, count: usize) {
        let mut rx = self.completed.subscribe();
        // The sender is owned by `self`, so the channel stays open while borrowed here.
        let _ = rx.wait_for(|completed| *completed >= count).await;
    }

    fn complete(&self, sample: &SampleId) {
        self.sampler.stop(sample);
        self.completed.send_modify(|n| *n += 1);
    }
}

/// Completion handle passed to an event handler.
///
/// The occurrence's sample stays open until [`Done::complete`] or
/// [`Done::fail`] is called. The run waits for it, so a handle that is
/// dropped unfinished stalls the iteration (or trips the event timeout).
pub struct Done {
    occurrences: Arc<Occurrences>,
    sample: SampleId,
    occurrence: usize,
    finished: bool,
}

impl Done {
    /// 1-based number of this occurrence within the run.
    pub fn occurrence(&self) -> usize {
        self.occurrence
    }

    pub fn step(&self) -> &str {
        &self.occurrences.step
    }

    /// Stop the clock for this occurrence.
    pub fn complete(mut self) {
        tracing::trace!(step = %self.occurrences.step, occurrence = self.occurrence, "event occurrence complete");
        self.finish();
    }

    /// Stop the clock, recording that the handler reported an error.
    ///
    /// The sample still counts; the error is only logged.
    pub fn fail(mut self, err: impl fmt::Display) {
        tracing::warn!(
            step = %self.occurrences.step,
            occurrence = self.occurrence,
            error = %err,
            "event handler reported an error"
        );
        self.finish();
    }

    fn finish(&mut self) {
        self.finished = true;
        self.occurrences.complete(&self.sample);
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                step = %self.occurrences.step,
                occurrence = self.occurrence,
                "completion handle dropped without completing; the run will wait for it"
            );
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("step", &self.occurrences.step)
            .field("occurrence", &self.occurrence)
            .field("finished", &self.finished)
            .finish()
    }
}
