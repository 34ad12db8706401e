//! In-process coverage runner

use super::{SessionScope, TestCase, TestSource};
use crate::config::CoverageConfig;
use crate::result::{CubrirError, CubrirResult};
use crate::store::SharedStore;
use crate::tracer::{Session, SessionHandle, StrayCapture, ThreadTracer, Tracer};
use crate::unit::UnitRegistry;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::time::{Duration, Instant};

/// Outcome of one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether the test passed
    pub passed: bool,
    /// Failure message
    pub error: Option<String>,
    /// Wall time of the body
    pub duration: Duration,
}

impl TestResult {
    /// Create a passing test result
    #[must_use]
    pub fn pass(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            duration,
        }
    }

    /// Create a failing test result
    #[must_use]
    pub fn fail(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            duration,
        }
    }
}

/// Aggregated results of a run
#[derive(Debug, Clone, Default)]
pub struct TestResults {
    /// Results in discovery order
    pub results: Vec<TestResult>,
    /// Total duration
    pub duration: Duration,
    /// Sessions recorded into the store
    pub sessions: usize,
}

impl TestResults {
    /// Number of passed tests
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Number of failed tests
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Number of executed tests
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Whether every executed test passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    /// `Err(TestExecution)` naming the first failure, if any
    pub fn into_result(self) -> CubrirResult<Self> {
        match self.results.iter().find(|r| !r.passed) {
            Some(first) => Err(CubrirError::test_execution(
                first.name.clone(),
                format!(
                    "{} ({} of {} tests failed)",
                    first.error.as_deref().unwrap_or("failed"),
                    self.failed(),
                    self.total()
                ),
            )),
            None => Ok(self),
        }
    }
}

/// Runs tests on worker threads with tracer sessions around them
#[derive(Debug)]
pub struct CoverageRunner<'r, T: Tracer = ThreadTracer> {
    registry: &'r UnitRegistry,
    tracer: T,
    jobs: usize,
    scope: SessionScope,
    fail_fast: bool,
    filter: Option<String>,
}

impl<'r> CoverageRunner<'r> {
    /// Create a single-threaded runner using the thread tracer
    #[must_use]
    pub fn new(registry: &'r UnitRegistry) -> Self {
        Self {
            registry,
            tracer: ThreadTracer,
            jobs: 1,
            scope: SessionScope::PerWorker,
            fail_fast: false,
            filter: None,
        }
    }

    /// Create a runner with `jobs` and `session_scope` from `config`
    #[must_use]
    pub fn from_config(registry: &'r UnitRegistry, config: &CoverageConfig) -> Self {
        Self::new(registry)
            .with_jobs(config.effective_jobs())
            .with_session_scope(config.session_scope)
    }
}

impl<'r, T: Tracer> CoverageRunner<'r, T> {
    /// Use a different tracer
    #[must_use]
    pub fn with_tracer<U: Tracer>(self, tracer: U) -> CoverageRunner<'r, U> {
        CoverageRunner {
            registry: self.registry,
            tracer,
            jobs: self.jobs,
            scope: self.scope,
            fail_fast: self.fail_fast,
            filter: self.filter,
        }
    }

    /// Set the worker thread count (minimum 1)
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Set session granularity
    #[must_use]
    pub fn with_session_scope(mut self, scope: SessionScope) -> Self {
        self.scope = scope;
        self
    }

    /// Stop handing out tests after the first failure
    #[must_use]
    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Only run tests whose name contains `pattern`
    #[must_use]
    pub fn with_filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    /// Run every discovered test and record their sessions into `store`
    ///
    /// Hits from threads a test spawns without a session of their own are
    /// collected for the whole run and recorded once the workers finish.
    /// Test failures are reported in the results, not as an error; use
    /// [`TestResults::into_result`] to turn them into one.
    pub fn run(&self, source: &dyn TestSource, store: &SharedStore) -> CubrirResult<TestResults> {
        let start = Instant::now();
        let mut tests = source.discover()?;
        if let Some(filter) = &self.filter {
            tests.retain(|t| t.name.contains(filter.as_str()));
        }
        tracing::info!(tests = tests.len(), jobs = self.jobs, scope = ?self.scope, "running tests");

        let workers = self.jobs.min(tests.len()).max(1);
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let (session_tx, session_rx) = mpsc::channel::<Session>();
        let (result_tx, result_rx) = mpsc::channel::<(usize, TestResult)>();
        let mut sessions = 0usize;
        let stray = StrayCapture::open();

        std::thread::scope(|scope| {
            for worker in 0..workers {
                let session_tx = session_tx.clone();
                let result_tx = result_tx.clone();
                let (tests, next, stop) = (&tests, &next, &stop);
                let _ = scope.spawn(move || {
                    self.worker_loop(worker, tests, next, stop, &session_tx, &result_tx);
                });
            }
            drop(session_tx);
            drop(result_tx);

            for session in session_rx {
                store.record(&session, self.registry);
                sessions += 1;
            }
        });

        let stray = stray.finish();
        if !stray.is_empty() {
            tracing::debug!(hits = stray.hit_count(), "recording hits from unsessioned threads");
            store.record(&stray, self.registry);
        }

        let mut indexed: Vec<(usize, TestResult)> = result_rx.into_iter().collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        let results = TestResults {
            results: indexed.into_iter().map(|(_, r)| r).collect(),
            duration: start.elapsed(),
            sessions,
        };
        tracing::info!(
            passed = results.passed(),
            failed = results.failed(),
            sessions,
            "tests finished"
        );
        Ok(results)
    }

    fn worker_loop(
        &self,
        worker: usize,
        tests: &[TestCase],
        next: &AtomicUsize,
        stop: &AtomicBool,
        session_tx: &Sender<Session>,
        result_tx: &Sender<(usize, TestResult)>,
    ) {
        let worker_handle = match self.scope {
            SessionScope::PerWorker => Some(self.tracer.activate(&format!("worker-{worker}"))),
            SessionScope::PerTest => None,
        };

        loop {
            if self.fail_fast && stop.load(Ordering::Acquire) {
                break;
            }
            let idx = next.fetch_add(1, Ordering::Relaxed);
            let Some(test) = tests.get(idx) else {
                break;
            };

            let test_handle = match self.scope {
                SessionScope::PerTest => Some(self.tracer.activate(&test.name)),
                SessionScope::PerWorker => None,
            };
            let result = run_one(test);
            if let Some(handle) = test_handle {
                self.flush(handle, session_tx);
            }
            if !result.passed {
                tracing::debug!(test = %result.name, "test failed");
                stop.store(true, Ordering::Release);
            }
            let _ = result_tx.send((idx, result));
        }

        if let Some(handle) = worker_handle {
            self.flush(handle, session_tx);
        }
    }

    fn flush(&self, handle: SessionHandle, session_tx: &Sender<Session>) {
        match self.tracer.deactivate(handle) {
            Ok(session) => {
                let _ = session_tx.send(session);
            }
            Err(e) => tracing::warn!(%handle, error = %e, "session could not be flushed"),
        }
    }
}

fn run_one(test: &TestCase) -> TestResult {
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| test.call()));
    let duration = start.elapsed();
    match outcome {
        Ok(Ok(())) => TestResult::pass(&test.name, duration),
        Ok(Err(message)) => TestResult::fail(&test.name, message, duration),
        Err(payload) => TestResult::fail(&test.name, panic_message(payload.as_ref()), duration),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "test panicked".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::tracer::record_hit;
    use crate::unit::{LineAnalysis, LineSet, Unit, UnitId};
    use std::path::PathBuf;
    use std::sync::Arc;

    const UNIT: &str = "src/calc.rs";

    fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new("/w");
        registry.insert(Unit::new(
            UnitId::new(UNIT),
            PathBuf::from(UNIT),
            LineAnalysis {
                executable: (1..=10).collect(),
                excluded: LineSet::new(),
                instrumented: true,
            },
            Arc::from(""),
        ));
        registry
    }

    fn hitting(name: &str, lines: &'static [u32]) -> TestCase {
        TestCase::from_fn(name, move || {
            for &line in lines {
                record_hit(UNIT, line);
            }
        })
    }

    fn hits(store: &SharedStore) -> LineSet {
        store
            .snapshot()
            .hits(&UnitId::new(UNIT))
            .cloned()
            .unwrap_or_default()
    }

    mod results_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let results = TestResults {
                results: vec![
                    TestResult::pass("a", Duration::ZERO),
                    TestResult::fail("b", "boom", Duration::ZERO),
                ],
                ..TestResults::default()
            };
            assert_eq!(results.passed(), 1);
            assert_eq!(results.failed(), 1);
            assert!(!results.all_passed());
            assert_eq!(results.failures()[0].name, "b");
        }

        #[test]
        fn test_into_result_names_first_failure() {
            let results = TestResults {
                results: vec![TestResult::fail("parse", "bad token", Duration::ZERO)],
                ..TestResults::default()
            };
            let err = results.into_result().unwrap_err();
            assert!(matches!(err, CubrirError::TestExecution { ref test, .. } if test == "parse"));
        }
    }

    mod run_tests {
        use super::*;

        #[test]
        fn test_single_worker_accumulates_one_session() {
            let registry = registry();
            let store = SharedStore::default();
            let tests = vec![hitting("a", &[1, 2]), hitting("b", &[3, 4])];
            let results = CoverageRunner::new(&registry).run(&tests, &store).unwrap();
            assert!(results.all_passed());
            assert_eq!(results.sessions, 1);
            assert_eq!(hits(&store), LineSet::from([1, 2, 3, 4]));
        }

        #[test]
        fn test_per_test_sessions() {
            let registry = registry();
            let store = SharedStore::default();
            let tests = vec![hitting("a", &[1]), hitting("b", &[2]), hitting("c", &[3])];
            let results = CoverageRunner::new(&registry)
                .with_session_scope(SessionScope::PerTest)
                .run(&tests, &store)
                .unwrap();
            assert_eq!(results.sessions, 3);
            assert_eq!(hits(&store), LineSet::from([1, 2, 3]));
        }

        #[test]
        fn test_parallel_workers_union() {
            let registry = registry();
            let store = SharedStore::default();
            let tests: Vec<_> = (1..=8u32)
                .map(|line| {
                    TestCase::from_fn(format!("t{line}"), move || record_hit(UNIT, line))
                })
                .collect();
            let results = CoverageRunner::new(&registry)
                .with_jobs(4)
                .run(&tests, &store)
                .unwrap();
            assert_eq!(results.total(), 8);
            assert!(results.sessions <= 4);
            assert_eq!(hits(&store), (1..=8).collect());
            let names: Vec<_> = results.results.iter().map(|r| r.name.clone()).collect();
            assert_eq!(names, (1..=8).map(|i| format!("t{i}")).collect::<Vec<_>>());
        }

        #[test]
        fn test_panicking_test_keeps_partial_session() {
            let registry = registry();
            let store = SharedStore::default();
            let tests = vec![TestCase::from_fn("boom", || {
                record_hit(UNIT, 5);
                panic!("assertion failed");
            })];
            let results = CoverageRunner::new(&registry)
                .with_session_scope(SessionScope::PerTest)
                .run(&tests, &store)
                .unwrap();
            assert_eq!(results.failed(), 1);
            assert_eq!(results.results[0].error.as_deref(), Some("assertion failed"));
            assert_eq!(hits(&store), LineSet::from([5]));
        }

        #[test]
        fn test_failing_body_is_observed_not_raised() {
            let registry = registry();
            let store = SharedStore::default();
            let tests = vec![
                TestCase::new("err", || Err("expected 2, got 3".to_string())),
                hitting("ok", &[7]),
            ];
            let results = CoverageRunner::new(&registry).run(&tests, &store).unwrap();
            assert_eq!(results.failed(), 1);
            assert_eq!(results.passed(), 1);
            assert_eq!(hits(&store), LineSet::from([7]));
        }

        #[test]
        fn test_fail_fast_stops_dispatch() {
            let registry = registry();
            let store = SharedStore::default();
            let tests = vec![
                TestCase::new("first", || Err("no".to_string())),
                hitting("second", &[9]),
            ];
            let results = CoverageRunner::new(&registry)
                .with_fail_fast(true)
                .run(&tests, &store)
                .unwrap();
            assert_eq!(results.total(), 1);
            assert!(hits(&store).is_empty());
        }

        #[test]
        fn test_filter() {
            let registry = registry();
            let store = SharedStore::default();
            let tests = vec![hitting("parser::a", &[1]), hitting("lexer::b", &[2])];
            let results = CoverageRunner::new(&registry)
                .with_filter("parser")
                .run(&tests, &store)
                .unwrap();
            assert_eq!(results.total(), 1);
            assert_eq!(hits(&store), LineSet::from([1]));
        }

        #[test]
        fn test_empty_source() {
            let registry = registry();
            let store = SharedStore::default();
            let results = CoverageRunner::new(&registry)
                .run(&Vec::<TestCase>::new(), &store)
                .unwrap();
            assert_eq!(results.total(), 0);
            assert_eq!(results.sessions, 1);
        }

        #[test]
        fn test_spawned_thread_hits_are_recorded() {
            const SPAWNED: &str = "src/spawned.rs";
            let mut registry = registry();
            registry.insert(Unit::new(
                UnitId::new(SPAWNED),
                PathBuf::from(SPAWNED),
                LineAnalysis {
                    executable: (1..=5).collect(),
                    excluded: LineSet::new(),
                    instrumented: true,
                },
                Arc::from(""),
            ));
            let store = SharedStore::default();
            let tests = vec![TestCase::from_fn("spawns", || {
                record_hit(SPAWNED, 1);
                std::thread::spawn(|| record_hit(SPAWNED, 3)).join().unwrap();
            })];
            let results = CoverageRunner::new(&registry).run(&tests, &store).unwrap();
            assert!(results.all_passed());
            assert_eq!(results.sessions, 1);
            assert_eq!(
                store.snapshot().hits(&UnitId::new(SPAWNED)).cloned(),
                Some(LineSet::from([1, 3]))
            );
        }

        #[test]
        fn test_from_config() {
            let registry = registry();
            let config = CoverageConfig::builder()
                .jobs(2)
                .session_scope(SessionScope::PerTest)
                .build();
            let runner = CoverageRunner::from_config(&registry, &config);
            assert_eq!(runner.jobs, 2);
            assert_eq!(runner.scope, SessionScope::PerTest);
        }
    }
}
