//! Thread-local hit buffering
//!
//! Probes write into a buffer owned by the current thread's innermost session.
//! No atomics or locks are involved; hits only leave the thread when the
//! session is drained on deactivation.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-session hit buffer (one per active session frame)
#[derive(Debug, Default)]
pub struct HitBuffer {
    /// Lines hit per raw unit path
    hits: HashMap<Cow<'static, str>, BTreeSet<u32>>,
}

impl HitBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a probe hit keyed by a `file!()` literal
    ///
    /// Hot path: the key is borrowed, never allocated. Returns `true` when
    /// the pair was new.
    #[inline]
    pub fn record_static(&mut self, unit: &'static str, line: u32) -> bool {
        self.hits.entry(Cow::Borrowed(unit)).or_default().insert(line)
    }

    /// Record a hit for a unit name with a non-static lifetime
    pub fn record(&mut self, unit: &str, line: u32) -> bool {
        if let Some(lines) = self.hits.get_mut(unit) {
            lines.insert(line)
        } else {
            let _ = self.hits.insert(Cow::Owned(unit.to_string()), BTreeSet::from([line]));
            true
        }
    }

    /// Fold already-drained hits (from an inner session) into this buffer
    pub fn absorb(&mut self, hits: &BTreeMap<String, BTreeSet<u32>>) {
        for (unit, lines) in hits {
            for &line in lines {
                let _ = self.record(unit, line);
            }
        }
    }

    /// Take every buffered hit, leaving the buffer empty
    #[must_use]
    pub fn drain(&mut self) -> BTreeMap<String, BTreeSet<u32>> {
        self.hits
            .drain()
            .map(|(unit, lines)| (unit.into_owned(), lines))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_set_semantics() {
        let mut buffer = HitBuffer::new();
        assert!(buffer.record_static("src/lib.rs", 3));
        assert!(!buffer.record_static("src/lib.rs", 3));
        assert!(buffer.record("src/lib.rs", 4));
        assert!(!buffer.record("src/lib.rs", 4));
        assert_eq!(buffer.drain()["src/lib.rs"], BTreeSet::from([3, 4]));
    }

    #[test]
    fn test_drain_resets() {
        let mut buffer = HitBuffer::new();
        let _ = buffer.record_static("src/a.rs", 1);
        let _ = buffer.record_static("src/b.rs", 2);

        let hits = buffer.drain();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits["src/a.rs"], BTreeSet::from([1]));
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_absorb_unions() {
        let mut buffer = HitBuffer::new();
        let _ = buffer.record_static("src/a.rs", 1);
        let inner = BTreeMap::from([
            ("src/a.rs".to_string(), BTreeSet::from([1, 2])),
            ("src/b.rs".to_string(), BTreeSet::from([7])),
        ]);
        buffer.absorb(&inner);
        let hits = buffer.drain();
        assert_eq!(hits["src/a.rs"], BTreeSet::from([1, 2]));
        assert_eq!(hits["src/b.rs"], BTreeSet::from([7]));
    }
}
