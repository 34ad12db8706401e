//! Hits from threads with no active session
//!
//! A test may run instrumented code on a thread it spawns itself. That thread
//! never activated a session, so its probes have no frame to land in. While a
//! [`StrayCapture`] is open, such probes are recorded into every open capture
//! instead of being dropped.

use super::{next_handle, HitBuffer, Session};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Scope name given to sessions built from a capture
pub const STRAY_SCOPE: &str = "stray";

static OPEN: AtomicUsize = AtomicUsize::new(0);
static CAPTURES: Mutex<Vec<(u64, HitBuffer)>> = Mutex::new(Vec::new());

fn captures() -> MutexGuard<'static, Vec<(u64, HitBuffer)>> {
    CAPTURES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether any capture is open; checked before taking the lock
#[inline]
pub(super) fn is_open() -> bool {
    OPEN.load(Ordering::Acquire) > 0
}

pub(super) fn record(unit: &'static str, line: u32) {
    for (_, buffer) in captures().iter_mut() {
        let _ = buffer.record_static(unit, line);
    }
}

/// Collector for probes that fire outside any session
///
/// Closing happens in [`finish`](Self::finish) or on drop.
#[derive(Debug)]
pub struct StrayCapture {
    id: u64,
}

impl StrayCapture {
    /// Start collecting frameless hits from every thread of the process
    #[must_use]
    pub fn open() -> Self {
        let id = next_handle().as_u64();
        captures().push((id, HitBuffer::new()));
        let _ = OPEN.fetch_add(1, Ordering::AcqRel);
        Self { id }
    }

    /// Stop collecting and return what arrived as a finished session
    #[must_use]
    pub fn finish(self) -> Session {
        let mut session = Session::new(STRAY_SCOPE);
        if let Some(mut buffer) = self.close() {
            session.hits = buffer.drain();
        }
        session.finish();
        session
    }

    fn close(&self) -> Option<HitBuffer> {
        let mut open = captures();
        let position = open.iter().position(|(id, _)| *id == self.id)?;
        let (_, buffer) = open.remove(position);
        let _ = OPEN.fetch_sub(1, Ordering::AcqRel);
        Some(buffer)
    }
}

impl Drop for StrayCapture {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tracer::{activate, deactivate, record_hit};
    use std::collections::BTreeSet;

    #[test]
    fn test_spawned_thread_hits_are_captured() {
        let capture = StrayCapture::open();
        std::thread::spawn(|| {
            record_hit("src/stray_spawned.rs", 4);
            record_hit("src/stray_spawned.rs", 6);
        })
        .join()
        .unwrap();
        let session = capture.finish();
        assert_eq!(session.scope, STRAY_SCOPE);
        assert_eq!(
            session.lines("src/stray_spawned.rs").unwrap(),
            &BTreeSet::from([4, 6])
        );
    }

    #[test]
    fn test_hits_inside_a_session_stay_there() {
        let capture = StrayCapture::open();
        let handle = activate("owned");
        record_hit("src/stray_owned.rs", 2);
        let owned = deactivate(handle).unwrap();
        let stray = capture.finish();
        assert!(owned.lines("src/stray_owned.rs").unwrap().contains(&2));
        assert!(stray.lines("src/stray_owned.rs").is_none());
    }

    #[test]
    fn test_drop_closes_capture() {
        let capture = StrayCapture::open();
        let id = capture.id;
        assert!(is_open());
        drop(capture);
        assert!(captures().iter().all(|(open, _)| *open != id));
    }
}
