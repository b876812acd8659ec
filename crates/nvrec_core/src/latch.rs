//! Per-kind latches holding the most recent completion event.

use nvrec_engine::{EngineError, EventKind};

/// One latch slot per [`EventKind`].
///
/// A slot holds the result of the most recent completion of that kind,
/// or nothing. Only the exact matching completion fills a slot, and the
/// adapter clears a slot immediately before issuing a new operation of
/// that kind, so a stale result can never be mistaken for a fresh one.
#[derive(Debug, Default)]
pub(crate) struct EventLatch {
    slots: [Option<Result<(), EngineError>>; EventKind::COUNT],
}

impl EventLatch {
    /// Creates a latch table with every slot empty.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Empties the slot for `kind`.
    pub(crate) fn clear(&mut self, kind: EventKind) {
        self.slots[kind.index()] = None;
    }

    /// Unconditionally overwrites the slot for `kind`.
    pub(crate) fn record(&mut self, kind: EventKind, result: Result<(), EngineError>) {
        self.slots[kind.index()] = Some(result);
    }

    /// Returns the stored result for `kind`, if one has arrived.
    pub(crate) fn try_read(&self, kind: EventKind) -> Option<&Result<(), EngineError>> {
        self.slots[kind.index()].as_ref()
    }
}
