//! Test Runner Adapter
//!
//! Discovers tests through a [`TestSource`], runs each one inside a tracer
//! session, and hands finished sessions to a [`SharedStore`](crate::store::SharedStore).
//! Pass/fail belongs to the test body; the runner only observes it.

mod runner;

pub use runner::{CoverageRunner, TestResult, TestResults};

use crate::result::CubrirResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

type TestBody = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// How sessions map onto test executions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionScope {
    /// One session per worker thread, spanning all of its tests
    #[default]
    PerWorker,
    /// One session per test
    PerTest,
}

/// A discovered test
#[derive(Clone)]
pub struct TestCase {
    /// Test name
    pub name: String,
    body: TestBody,
}

impl TestCase {
    /// Create a test from a fallible body
    pub fn new(
        name: impl Into<String>,
        body: impl Fn() -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Create a test whose body signals failure by panicking
    pub fn from_fn(name: impl Into<String>, body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(name, move || {
            body();
            Ok(())
        })
    }

    pub(crate) fn call(&self) -> Result<(), String> {
        (self.body)()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Discovery contract of an external test framework
pub trait TestSource {
    /// List the tests to run
    fn discover(&self) -> CubrirResult<Vec<TestCase>>;
}

impl TestSource for Vec<TestCase> {
    fn discover(&self) -> CubrirResult<Vec<TestCase>> {
        Ok(self.clone())
    }
}

impl TestSource for [TestCase] {
    fn discover(&self) -> CubrirResult<Vec<TestCase>> {
        Ok(self.to_vec())
    }
}
