//! Steps: named units of timed work.

use crate::context::Done;
use crate::error::{BenchError, Result, ValidationError};
use crate::event::{EventBinding, EventSource, Payload};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a [`Hook`].
pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A zero-argument async callable: setup, teardown, or a direct-mode body.
pub type Hook = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Wrap an async closure as a [`Hook`].
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as HookFuture)
}

/// How a step's timed section is executed.
#[derive(Clone)]
pub enum Action {
    /// Await a callable; the sample spans the call.
    Direct(Hook),
    /// Wait for an external event; the sample spans the event's handler
    /// until it signals completion.
    Event(EventBinding),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Direct(_) => f.write_str("Direct"),
            Action::Event(binding) => f.debug_tuple("Event").field(binding).finish(),
        }
    }
}

/// Configuration record for [`Step::from_config`].
#[derive(Default)]
pub struct StepConfig {
    pub name: Option<String>,
    pub setup: Option<Hook>,
    pub teardown: Option<Hook>,
    pub run: Option<Hook>,
    pub event: Option<EventBinding>,
}

/// A named unit of work timed once per iteration.
///
/// Setup and teardown run around the timed section and are never counted.
///
/// # Example
///
/// ```rust,no_run
/// use stepbench::Step;
///
/// let step = Step::new("parse")
///     .setup(|| async { Ok(()) })
///     .run(|| async {
///         std::hint::black_box("1 + 2".len());
///         Ok(())
///     });
/// ```
#[derive(Clone)]
pub struct Step {
    name: String,
    setup: Option<Hook>,
    teardown: Option<Hook>,
    action: Option<Action>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            teardown: None,
            action: None,
        }
    }

    /// Build a step from a configuration record.
    ///
    /// Fails if the record has no name, or sets both `run` and `event`.
    pub fn from_config(config: StepConfig) -> Result<Self> {
        let name = match config.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(BenchError::Config(
                    "step must define a name or configuration object".to_string(),
                ))
            }
        };

        let action = match (config.run, config.event) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::ConflictingAction { step: name }.into())
            }
            (Some(run), None) => Some(Action::Direct(run)),
            (None, Some(binding)) => Some(Action::Event(binding)),
            (None, None) => None,
        };

        Ok(Self {
            name,
            setup: config.setup,
            teardown: config.teardown,
            action,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub fn is_event(&self) -> bool {
        matches!(self.action, Some(Action::Event(_)))
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.action, Some(Action::Direct(_)))
    }

    pub fn has_setup(&self) -> bool {
        self.setup.is_some()
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    /// Run `f` before the timed section of every iteration.
    pub fn setup<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.setup = Some(hook(f));
        self
    }

    /// Run `f` after the timed section of every iteration.
    pub fn teardown<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.teardown = Some(hook(f));
        self
    }

    /// Time `f` directly. Replaces any event binding.
    pub fn run<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.action = Some(Action::Direct(hook(f)));
        self
    }

    /// Time a synchronous closure directly. Replaces any event binding.
    pub fn run_sync<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.run(move || {
            let f = Arc::clone(&f);
            async move {
                f();
                Ok(())
            }
        })
    }

    /// Time one occurrence of `event` on `source` per iteration.
    ///
    /// `handler` receives the payload and a [`Done`] handle it must complete.
    /// A listener is attached for the whole run; if the event never fires the
    /// iteration waits until the test's event timeout, or forever without one.
    /// Replaces any direct callable.
    pub fn event<H>(mut self, source: Arc<dyn EventSource>, event: impl Into<String>, handler: H) -> Self
    where
        H: Fn(Payload, Done) + Send + Sync + 'static,
    {
        self.action = Some(Action::Event(EventBinding::new(source, event, handler)));
        self
    }

    pub(crate) fn setup_hook(&self) -> Option<&Hook> {
        self.setup.as_ref()
    }

    pub(crate) fn teardown_hook(&self) -> Option<&Hook> {
        self.teardown.as_ref()
    }

    /// Check that the step can run. `index` is the 1-based position in `test`.
    pub(crate) fn validate(&self, test: &str, index: usize) -> std::result::Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingName {
                test: test.to_string(),
                index,
            });
        }
        if self.action.is_none() {
            return Err(ValidationError::MissingAction {
                step: self.name.clone(),
            });
        }
        if self.setup.is_none() {
            tracing::debug!(step = %self.name, "setup not set");
        }
        if self.teardown.is_none() {
            tracing::debug!(step = %self.name, "teardown not set");
        }
        Ok(())
    }
}

impl AsRef<str> for Step {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .field("action", &self.action)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventEmitter;

    fn emitter() -> Arc<dyn EventSource> {
        Arc::new(EventEmitter::new())
    }

    #[test]
    fn should_build_direct_step_with_hooks() {
        let step = Step::new("a")
            .setup(|| async { Ok(()) })
            .teardown(|| async { Ok(()) })
            .run_sync(|| {});

        assert_eq!(step.name(), "a");
        assert!(step.is_direct());
        assert!(step.has_setup() && step.has_teardown());
        assert!(step.validate("t", 1).is_ok());
    }

    #[test]
    fn should_replace_direct_mode_when_event_set() {
        let step = Step::new("a")
            .run_sync(|| {})
            .event(emitter(), "tick", |_, done| done.complete());
        assert!(step.is_event());
        assert!(!step.is_direct());

        let step = step.run_sync(|| {});
        assert!(step.is_direct());
    }

    #[test]
    fn should_fail_validation_when_name_missing() {
        let err = Step::new("").run_sync(|| {}).validate("suite-test", 2).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingName {
                test: "suite-test".to_string(),
                index: 2
            }
        );
    }

    #[test]
    fn should_fail_validation_when_neither_mode_set() {
        let err = Step::new("idle").setup(|| async { Ok(()) }).validate("t", 1).unwrap_err();
        assert!(matches!(err, ValidationError::MissingAction { .. }));
    }

    #[test]
    fn should_build_from_config_record() {
        let step = Step::from_config(StepConfig {
            name: Some("cfg".to_string()),
            run: Some(hook(|| async { Ok(()) })),
            ..Default::default()
        })
        .unwrap();
        assert!(step.is_direct());
        assert!(!step.has_setup());

        let step = Step::from_config(StepConfig {
            name: Some("ev".to_string()),
            event: Some(EventBinding::new(emitter(), "tick", |_, done| done.complete())),
            ..Default::default()
        })
        .unwrap();
        assert!(step.is_event());
    }

    #[test]
    fn should_fail_from_config_when_name_missing() {
        let err = Step::from_config(StepConfig::default()).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));

        let err = Step::from_config(StepConfig {
            name: Some(String::new()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn should_fail_from_config_when_both_modes_set() {
        let err = Step::from_config(StepConfig {
            name: Some("both".to_string()),
            run: Some(hook(|| async { Ok(()) })),
            event: Some(EventBinding::new(emitter(), "tick", |_, done| done.complete())),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::ConflictingAction { .. })
        ));
    }

    #[tokio::test]
    async fn should_invoke_wrapped_hook() {
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let h = hook(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        });
        h().await.unwrap();
        h().await.unwrap();
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
