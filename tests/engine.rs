use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepbench::{
    BenchError, CycleContext, DataTable, EventEmitter, EventSource, Payload, Reporter, Step,
    StepConfig, Suite, Test, TestConfig, ValidationError,
};

#[derive(Default)]
struct Log(Mutex<Vec<String>>);

impl Log {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Reporter for Log {
    fn test_start(&self, test: &str, _config: &TestConfig) {
        self.push(format!("start {test}"));
    }

    fn cycle(&self, test: &str, cycle: &CycleContext) {
        self.push(format!("cycle {test} {}", cycle.index));
    }

    fn test_complete(&self, test: &Test) {
        self.push(format!("complete {}", test.name()));
    }
}

fn quiet_suite(name: &str) -> Suite {
    let mut suite = Suite::new(name);
    suite.reporters(vec![]);
    suite
}

fn noop_test(name: &str, iterations: usize) -> Test {
    let mut test = Test::with_config(name, TestConfig::new().iterations(iterations));
    test.add(Step::new("noop").run_sync(|| {}));
    test
}

#[tokio::test]
async fn suite_completes_first_test_before_starting_second() {
    let log = Arc::new(Log::default());
    let mut suite = quiet_suite("ordering");
    suite.add_reporter(Box::new(Arc::clone(&log)));
    suite.add(noop_test("A", 2)).add(noop_test("B", 2));

    suite.start().await.unwrap();

    assert_eq!(
        log.entries(),
        [
            "start A", "cycle A 1", "cycle A 2", "complete A", //
            "start B", "cycle B 1", "cycle B 2", "complete B",
        ]
    );
}

#[tokio::test]
async fn mock_emitter_driven_n_times_records_n_samples() {
    let emitter = Arc::new(EventEmitter::new());
    let fired = Arc::new(AtomicUsize::new(0));
    let occurrences = Arc::new(Mutex::new(Vec::new()));

    let trigger = Arc::clone(&emitter);
    let count = Arc::clone(&fired);
    let seen = Arc::clone(&occurrences);
    let mut test = Test::with_config("mock", TestConfig::new().iterations(40));
    test.add(
        Step::new("event")
            .setup(move || {
                let trigger = Arc::clone(&trigger);
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    trigger.emit("tick", Payload::Null);
                    Ok(())
                }
            })
            .event(emitter.clone(), "tick", move |_, done| {
                seen.lock().unwrap().push(done.occurrence());
                done.complete();
            }),
    );

    test.start().await.unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 40);
    assert_eq!(test.step_data_points("event").len(), 40);
    assert_eq!(*occurrences.lock().unwrap(), (1..=40).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_completed_on_other_threads_are_synchronised() {
    let emitter = Arc::new(EventEmitter::new());
    let trigger = Arc::clone(&emitter);

    let mut test = Test::with_config(
        "threads",
        TestConfig::new()
            .iterations(10)
            .event_timeout(Duration::from_secs(5)),
    );
    test.add(
        Step::new("remote")
            .setup(move || {
                let trigger = Arc::clone(&trigger);
                async move {
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(1));
                        trigger.emit("remote", 1);
                    });
                    Ok(())
                }
            })
            .event(emitter.clone(), "remote", |_, done| {
                std::thread::spawn(move || done.complete());
            }),
    );
    test.add(Step::new("local").run_sync(|| {}));

    test.start().await.unwrap();
    let table = test.data_points().unwrap();
    assert_eq!(table.len(), 10);
    assert_eq!(table.columns(), ["remote", "local"]);
}

#[tokio::test]
async fn data_points_round_trip_through_csv() {
    let mut test = Test::with_config("csv", TestConfig::new().iterations(8));
    test.add_all(vec![
        Step::new("first").run_sync(|| {}),
        Step::new("second, quoted").run(|| async {
            tokio::task::yield_now().await;
            Ok(())
        }),
    ]);
    test.start().await.unwrap();

    let table = test.data_points().unwrap();
    assert_eq!(table.len(), 8);
    for row in table.rows() {
        let keys: Vec<_> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["first", "second, quoted"]);
    }

    let parsed = DataTable::from_csv(&table.to_csv()).unwrap();
    assert_eq!(parsed, table);
    let first: Vec<u64> = test
        .step_data_points("first")
        .iter()
        .map(|d| d.as_nanos() as u64)
        .collect();
    assert_eq!(parsed.column("first"), Some(first));
}

#[tokio::test]
async fn invalid_step_aborts_suite_before_timing() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);

    let mut test = Test::with_config("invalid", TestConfig::new().iterations(3));
    test.add(Step::new("valid").run_sync(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    test.add(Step::new("missing-mode"));

    let mut suite = quiet_suite("invalid");
    suite.add(test);
    let err = suite.start().await.unwrap_err();

    assert_eq!(
        err.as_validation(),
        Some(&ValidationError::MissingAction {
            step: "missing-mode".to_string()
        })
    );
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn config_record_with_both_modes_is_rejected() {
    let emitter: Arc<dyn EventSource> = Arc::new(EventEmitter::new());
    let err = Step::from_config(StepConfig {
        name: Some("both".into()),
        run: Some(stepbench::hook(|| async { Ok(()) })),
        event: Some(stepbench::EventBinding::new(emitter, "e", |_, done| {
            done.complete()
        })),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        BenchError::Validation(ValidationError::ConflictingAction { .. })
    ));
}

#[tokio::test]
async fn stats_stay_consistent_with_samples() {
    let mut test = Test::with_config("stats", TestConfig::new().iterations(20));
    test.add(Step::new("sleepy").run(|| async {
        tokio::time::sleep(Duration::from_micros(200)).await;
        Ok(())
    }));
    test.start().await.unwrap();

    let stats = test.stats()["sleepy"];
    let samples = test.step_data_points("sleepy");
    assert_eq!(samples.len(), 20);
    assert!(stats.min <= stats.mean && stats.mean <= stats.max);
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    assert_eq!(stats.duration, total as f64);
    assert_eq!(test.stats(), test.stats());
}
