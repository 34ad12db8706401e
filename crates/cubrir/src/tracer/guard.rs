//! RAII session scope

use super::{activate, deactivate, Session, SessionHandle};
use crate::result::CubrirResult;
use std::fmt;
use std::sync::mpsc::Sender;

type Sink = Box<dyn FnOnce(Session)>;

/// Activates a session on creation and flushes it to a sink when dropped
///
/// The flush also runs while unwinding from a panic, so a failing test still
/// delivers the hits it recorded before failing.
pub struct SessionGuard {
    handle: Option<SessionHandle>,
    sink: Option<Sink>,
}

impl SessionGuard {
    /// Open a session whose hits are passed to `sink` on drop
    pub fn new(scope: &str, sink: impl FnOnce(Session) + 'static) -> Self {
        Self {
            handle: Some(activate(scope)),
            sink: Some(Box::new(sink)),
        }
    }

    /// Open a session whose hits are sent over `tx` on drop
    pub fn to_channel(scope: &str, tx: Sender<Session>) -> Self {
        Self::new(scope, move |session| {
            if tx.send(session).is_err() {
                tracing::warn!("session receiver dropped before flush");
            }
        })
    }

    /// Handle of the guarded session
    #[must_use]
    pub fn handle(&self) -> Option<SessionHandle> {
        self.handle
    }

    /// Close the session now and return it instead of calling the sink
    pub fn finish(mut self) -> CubrirResult<Session> {
        let _ = self.sink.take();
        match self.handle.take() {
            Some(handle) => deactivate(handle),
            None => Ok(Session::new("closed")),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match deactivate(handle) {
            Ok(session) => {
                if let Some(sink) = self.sink.take() {
                    sink(session);
                }
            }
            Err(e) => tracing::warn!(%handle, error = %e, "session lost on flush"),
        }
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("handle", &self.handle)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
