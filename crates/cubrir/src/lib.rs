//! Cubrir: line coverage for Rust test suites
//!
//! Cubrir (Spanish: "to cover") runs a test suite under line instrumentation,
//! aggregates which executable lines ran across threads, processes, and runs,
//! and renders the result as a text summary, an HTML report, or an LCOV file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  probes   ┌──────────┐  sessions  ┌──────────────┐
//! │ #[instrument]│──────────►│  Tracer  │───────────►│ CoverageStore│
//! │ (cubrir-     │           │ (thread- │  (mpsc /   │  (unit → hit │
//! │  derive)     │           │  local)  │ fragments) │    lines)    │
//! └──────────────┘           └──────────┘            └──────┬───────┘
//!        ▲                                                  │ snapshot
//! ┌──────┴───────┐                                   ┌──────▼───────┐
//! │     Unit     │  executable lines                 │  Aggregate   │
//! │  Identifier  │──────────────────────────────────►│    Report    │
//! └──────────────┘                                   └──────┬───────┘
//!                                                           │
//!                                           text · html · lcov renderers
//! ```
//!
//! # Instrumenting code
//!
//! ```ignore
//! #[cubrir::instrument]
//! impl Calculator {
//!     pub fn add(&mut self, x: i64) {
//!         self.total += x;
//!     }
//! }
//! ```
//!
//! Probes go to the innermost tracer session on the current thread and do
//! nothing when none is active, so instrumented code can ship in normal
//! builds.

#![warn(missing_docs)]

pub mod adapter;
pub mod config;
pub mod render;
pub mod report;
pub mod result;
pub mod store;
pub mod tracer;
pub mod unit;

#[cfg(test)]
mod tests;

pub use adapter::{CoverageRunner, SessionScope, TestCase, TestResult, TestResults, TestSource};
pub use config::{CoverageConfig, CoverageConfigBuilder};
pub use report::{AggregateReport, LineState, Ratio, Totals, UnitCoverage, UnitStatus};
pub use result::{CubrirError, CubrirResult, RecoveredError, RecoveredKind};
pub use store::{merge, CoverageStore, SharedStore};
pub use tracer::{Session, SessionGuard, SessionHandle, ThreadTracer, Tracer};
pub use unit::{LineSet, Unit, UnitId, UnitIdentifier, UnitRegistry};

/// Insert line probes into a fn, impl, trait, or inline module
#[cfg(feature = "derive")]
pub use cubrir_derive::instrument;

/// Common imports
pub mod prelude {
    pub use super::adapter::*;
    pub use super::config::*;
    pub use super::render::*;
    pub use super::report::*;
    pub use super::result::*;
    pub use super::store::{merge, CoverageStore, SharedStore};
    pub use super::tracer::{Session, SessionGuard, SessionHandle, ThreadTracer, Tracer};
    pub use super::unit::*;
    #[cfg(feature = "derive")]
    pub use cubrir_derive::instrument;
}
