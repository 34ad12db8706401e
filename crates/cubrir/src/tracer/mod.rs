//! Tracer
//!
//! Records which lines of which units run while a session is active.
//!
//! ## Model
//!
//! - Every thread owns a stack of active sessions in thread-local storage.
//!   Probes inserted by `#[cubrir::instrument]` call [`record_hit`], which
//!   writes into the innermost session of the current thread without locking.
//! - Deactivating a nested session folds its hits into the enclosing one.
//! - A probe on a thread with no active session goes to every open
//!   [`StrayCapture`]; `CoverageRunner` keeps one open for the length of a run
//!   so threads spawned by a test are measured too.
//! - When the process was started with `CUBRIR_DATA_DIR` set, a frameless
//!   probe also opens an ambient session that is written to that directory as
//!   a fragment when the thread exits or [`flush_ambient`] is called. With
//!   neither, the probe does nothing.
//!
//! ## Example
//!
//! ```
//! use cubrir::tracer::{self, Tracer, ThreadTracer};
//!
//! let tracer = ThreadTracer;
//! let handle = tracer.activate("example");
//! tracer::record_hit("src/lib.rs", 3);
//! let session = tracer.deactivate(handle).unwrap();
//! assert!(session.lines("src/lib.rs").unwrap().contains(&3));
//! ```

mod guard;
mod session;
mod stray;
mod thread_local;

pub use guard::SessionGuard;
pub use session::{Session, SessionHandle};
pub use stray::{StrayCapture, STRAY_SCOPE};
pub use thread_local::HitBuffer;

use crate::result::{CubrirError, CubrirResult};
use crate::store::write_fragment;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Environment variable naming the ambient fragment directory
pub const DATA_DIR_ENV: &str = "CUBRIR_DATA_DIR";

/// Scope name given to ambient sessions
pub const AMBIENT_SCOPE: &str = "ambient";

/// Capability interface for hit tracking
///
/// Hides how probes reach a session. The in-tree implementation is
/// [`ThreadTracer`], fed by compile-time probes from `cubrir-derive`.
pub trait Tracer: Send + Sync {
    /// Open a session on the current execution context
    fn activate(&self, scope: &str) -> SessionHandle;

    /// Record a hit directly into the session named by `handle`
    fn record_hit(&self, handle: SessionHandle, unit: &str, line: u32);

    /// Close the session named by `handle` and take its hits
    fn deactivate(&self, handle: SessionHandle) -> CubrirResult<Session>;
}

/// Tracer backed by per-thread session stacks
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadTracer;

impl Tracer for ThreadTracer {
    fn activate(&self, scope: &str) -> SessionHandle {
        activate(scope)
    }

    fn record_hit(&self, handle: SessionHandle, unit: &str, line: u32) {
        let _ = CONTEXT.try_with(|ctx| {
            if let Ok(mut ctx) = ctx.try_borrow_mut() {
                if let Some(frame) = ctx.frames.iter_mut().find(|f| f.handle == handle) {
                    let _ = frame.buffer.record(unit, line);
                }
            }
        });
    }

    fn deactivate(&self, handle: SessionHandle) -> CubrirResult<Session> {
        deactivate(handle)
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> SessionHandle {
    SessionHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

/// Ambient fragment directory, read once per process
fn ambient_dir() -> Option<&'static Path> {
    static DIR: OnceLock<Option<PathBuf>> = OnceLock::new();
    DIR.get_or_init(|| {
        std::env::var_os(DATA_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
    .as_deref()
}

/// An active session and its live hit buffer
#[derive(Debug)]
struct Frame {
    handle: SessionHandle,
    session: Session,
    buffer: HitBuffer,
}

impl Frame {
    fn open(handle: SessionHandle, scope: &str) -> Self {
        Self {
            handle,
            session: Session::new(scope),
            buffer: HitBuffer::new(),
        }
    }

    fn close(mut self) -> Session {
        self.session.hits = self.buffer.drain();
        self.session.finish();
        self.session
    }
}

/// Per-thread tracer state
#[derive(Debug, Default)]
struct ThreadContext {
    frames: Vec<Frame>,
    ambient: Option<Frame>,
}

impl ThreadContext {
    fn probe(&mut self, unit: &'static str, line: u32, ambient_enabled: bool) {
        if let Some(frame) = self.frames.last_mut() {
            let _ = frame.buffer.record_static(unit, line);
            return;
        }
        if stray::is_open() {
            stray::record(unit, line);
        }
        if ambient_enabled {
            let frame = self
                .ambient
                .get_or_insert_with(|| Frame::open(next_handle(), AMBIENT_SCOPE));
            let _ = frame.buffer.record_static(unit, line);
        }
    }

    fn deactivate(&mut self, handle: SessionHandle) -> CubrirResult<Session> {
        let Some(position) = self.frames.iter().position(|f| f.handle == handle) else {
            return Err(CubrirError::SessionNotActive {
                handle: handle.as_u64(),
            });
        };

        // Sessions opened inside the target and never closed end with it
        while self.frames.len() > position + 1 {
            if let Some(inner) = self.frames.pop() {
                tracing::debug!(handle = %inner.handle, "closing unfinished nested session");
                let inner = inner.close();
                self.fold(&inner);
            }
        }

        let Some(frame) = self.frames.pop() else {
            return Err(CubrirError::SessionNotActive {
                handle: handle.as_u64(),
            });
        };
        let session = frame.close();
        self.fold(&session);
        Ok(session)
    }

    /// Hand a closed session's hits to the enclosing window
    fn fold(&mut self, closed: &Session) {
        let parent = match self.frames.last_mut() {
            Some(frame) => Some(frame),
            None => self.ambient.as_mut(),
        };
        if let Some(parent) = parent {
            parent.buffer.absorb(&closed.hits);
        }
    }

    fn take_ambient(&mut self) -> Option<Session> {
        self.ambient.take().map(Frame::close)
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        let Some(dir) = ambient_dir() else {
            return;
        };
        while let Some(frame) = self.frames.pop() {
            let closed = frame.close();
            if self.frames.is_empty() && self.ambient.is_none() && !closed.is_empty() {
                self.ambient = Some(Frame::open(next_handle(), AMBIENT_SCOPE));
            }
            self.fold(&closed);
        }
        if let Some(session) = self.take_ambient() {
            if !session.is_empty() {
                if let Err(e) = write_fragment(dir, &session) {
                    tracing::warn!(error = %e, "failed to write ambient session");
                }
            }
        }
    }
}

thread_local! {
    static CONTEXT: RefCell<ThreadContext> = RefCell::new(ThreadContext::default());
}

/// Open a session on the current thread
///
/// Probes on this thread target the new session until it is deactivated or
/// another session is opened inside it.
pub fn activate(scope: &str) -> SessionHandle {
    let handle = next_handle();
    let frame = Frame::open(handle, scope);
    let opened = CONTEXT
        .try_with(|ctx| match ctx.try_borrow_mut() {
            Ok(mut ctx) => {
                ctx.frames.push(frame);
                true
            }
            Err(_) => false,
        })
        .unwrap_or(false);
    if opened {
        tracing::debug!(%handle, scope, "session activated");
    } else {
        tracing::warn!(%handle, scope, "tracer unavailable on this thread");
    }
    handle
}

/// Close the session named by `handle` on the current thread
pub fn deactivate(handle: SessionHandle) -> CubrirResult<Session> {
    let result = CONTEXT
        .try_with(|ctx| match ctx.try_borrow_mut() {
            Ok(mut ctx) => ctx.deactivate(handle),
            Err(_) => Err(CubrirError::SessionNotActive {
                handle: handle.as_u64(),
            }),
        })
        .unwrap_or(Err(CubrirError::SessionNotActive {
            handle: handle.as_u64(),
        }));
    if let Ok(session) = &result {
        tracing::debug!(%handle, scope = %session.scope, hits = session.hit_count(), "session deactivated");
    }
    result
}

/// Probe entry point called by instrumented code
///
/// Never blocks and never panics, including during thread teardown.
#[inline]
pub fn record_hit(unit: &'static str, line: u32) {
    let _ = CONTEXT.try_with(|ctx| {
        if let Ok(mut ctx) = ctx.try_borrow_mut() {
            ctx.probe(unit, line, ambient_dir().is_some());
        }
    });
}

/// Number of sessions active on the current thread
#[must_use]
pub fn active_depth() -> usize {
    CONTEXT
        .try_with(|ctx| ctx.try_borrow().map(|c| c.frames.len()).unwrap_or(0))
        .unwrap_or(0)
}

/// Write the current thread's ambient session as a fragment now
///
/// Returns the fragment path, or `None` when ambient mode is off or nothing
/// was recorded.
pub fn flush_ambient() -> CubrirResult<Option<PathBuf>> {
    let Some(dir) = ambient_dir() else {
        return Ok(None);
    };
    let session = CONTEXT
        .try_with(|ctx| ctx.try_borrow_mut().ok().and_then(|mut c| c.take_ambient()))
        .ok()
        .flatten();
    match session {
        Some(session) if !session.is_empty() => write_fragment(dir, &session).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    mod session_stack_tests {
        use super::*;

        #[test]
        fn test_probe_without_session_is_noop() {
            assert_eq!(active_depth(), 0);
            record_hit("src/lib.rs", 1);
            let handle = activate("after");
            let session = deactivate(handle).unwrap();
            assert!(session.is_empty());
        }

        #[test]
        fn test_hits_recorded_while_active() {
            let handle = activate("t");
            record_hit("src/lib.rs", 3);
            record_hit("src/lib.rs", 3);
            record_hit("src/lib.rs", 5);
            let session = deactivate(handle).unwrap();
            assert_eq!(session.scope, "t");
            assert_eq!(session.lines("src/lib.rs").unwrap(), &BTreeSet::from([3, 5]));
            assert!(session.finished_at.is_some());
        }

        #[test]
        fn test_nested_session_folds_into_outer() {
            let outer = activate("outer");
            record_hit("src/a.rs", 1);
            let inner = activate("inner");
            record_hit("src/a.rs", 2);
            let inner_session = deactivate(inner).unwrap();
            record_hit("src/a.rs", 3);
            let outer_session = deactivate(outer).unwrap();

            assert_eq!(inner_session.lines("src/a.rs").unwrap(), &BTreeSet::from([2]));
            assert_eq!(
                outer_session.lines("src/a.rs").unwrap(),
                &BTreeSet::from([1, 2, 3])
            );
        }

        #[test]
        fn test_closing_outer_closes_unfinished_inner() {
            let outer = activate("outer");
            let inner = activate("inner");
            record_hit("src/a.rs", 9);
            let session = deactivate(outer).unwrap();
            assert!(session.lines("src/a.rs").unwrap().contains(&9));
            assert!(matches!(
                deactivate(inner),
                Err(CubrirError::SessionNotActive { .. })
            ));
            assert_eq!(active_depth(), 0);
        }

        #[test]
        fn test_deactivate_twice_fails() {
            let handle = activate("t");
            let _ = deactivate(handle).unwrap();
            assert!(matches!(
                deactivate(handle),
                Err(CubrirError::SessionNotActive { .. })
            ));
        }

        #[test]
        fn test_sessions_are_isolated_per_thread() {
            let handle = activate("main");
            record_hit("src/main.rs", 1);

            let other = std::thread::spawn(|| {
                let handle = activate("worker");
                record_hit("src/worker.rs", 2);
                deactivate(handle).unwrap()
            })
            .join()
            .unwrap();

            let main = deactivate(handle).unwrap();
            assert!(main.lines("src/worker.rs").is_none());
            assert!(other.lines("src/main.rs").is_none());
            assert!(other.lines("src/worker.rs").unwrap().contains(&2));
        }

        #[test]
        fn test_handle_from_other_thread_is_not_active() {
            let handle = activate("main");
            let result = std::thread::spawn(move || deactivate(handle)).join().unwrap();
            assert!(matches!(result, Err(CubrirError::SessionNotActive { .. })));
            let _ = deactivate(handle).unwrap();
        }
    }

    mod tracer_trait_tests {
        use super::*;

        #[test]
        fn test_thread_tracer_direct_record() {
            let tracer = ThreadTracer;
            let outer = tracer.activate("outer");
            let inner = tracer.activate("inner");
            tracer.record_hit(outer, "src/x.rs", 4);
            let inner_session = tracer.deactivate(inner).unwrap();
            let outer_session = tracer.deactivate(outer).unwrap();
            assert!(inner_session.is_empty());
            assert!(outer_session.lines("src/x.rs").unwrap().contains(&4));
        }
    }

    mod ambient_tests {
        use super::*;

        #[test]
        fn test_ambient_session_opens_on_first_probe() {
            let mut ctx = ThreadContext::default();
            ctx.probe("src/lib.rs", 1, true);
            ctx.probe("src/lib.rs", 2, true);
            let session = ctx.take_ambient().unwrap();
            assert_eq!(session.scope, AMBIENT_SCOPE);
            assert_eq!(session.hit_count(), 2);
        }

        #[test]
        fn test_ambient_disabled_records_nothing() {
            let mut ctx = ThreadContext::default();
            ctx.probe("src/lib.rs", 1, false);
            assert!(ctx.take_ambient().is_none());
        }

        #[test]
        fn test_explicit_session_folds_into_ambient() {
            let mut ctx = ThreadContext::default();
            ctx.probe("src/lib.rs", 1, true);
            let handle = next_handle();
            ctx.frames.push(Frame::open(handle, "explicit"));
            ctx.probe("src/lib.rs", 2, true);
            let explicit = ctx.deactivate(handle).unwrap();
            assert_eq!(explicit.hit_count(), 1);

            let ambient = ctx.take_ambient().unwrap();
            assert_eq!(ambient.lines("src/lib.rs").unwrap(), &BTreeSet::from([1, 2]));
        }

        #[test]
        fn test_flush_without_data_dir_is_none() {
            if ambient_dir().is_none() {
                assert!(flush_ambient().unwrap().is_none());
            }
        }
    }
}
