//! Completion events emitted by the engine.

use crate::error::EngineError;

/// The class of an asynchronous store operation.
///
/// Exactly one event of the matching kind is emitted for every accepted
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    /// Store initialization (mount).
    Init = 0,
    /// A new record was written.
    Write = 1,
    /// A record was replaced by a new copy.
    Update = 2,
    /// A single record was deleted.
    DeleteRecord = 3,
    /// All records of one file were deleted.
    DeleteFile = 4,
    /// A garbage collection pass ran.
    GarbageCollect = 5,
}

impl EventKind {
    /// Number of event kinds.
    pub const COUNT: usize = 6;

    /// All kinds, in index order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Init,
        Self::Write,
        Self::Update,
        Self::DeleteRecord,
        Self::DeleteFile,
        Self::GarbageCollect,
    ];

    /// Stable slot index of this kind.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One completed store operation: the kind it belongs to plus its
/// outcome code.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    /// The operation class this event completes.
    pub kind: EventKind,
    /// The outcome; `Ok(())` is the success code.
    pub result: Result<(), EngineError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_and_unique() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
