//! Error types for the record store engine.

use nvrec_media::MediaError;
use thiserror::Error;

use crate::types::RecordId;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the record store engine.
///
/// `Clone` because completion codes are held in the event latch and
/// handed back to the caller of the pending call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// A media operation was rejected.
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    /// The store has not completed initialization.
    #[error("store not initialized")]
    NotInitialized,

    /// Another operation is still in flight.
    #[error("operation already in flight")]
    Busy,

    /// No live record carries the requested ID.
    #[error("record not found: {id}")]
    RecordNotFound {
        /// The ID that was looked up.
        id: RecordId,
    },

    /// No data page has room for the record.
    #[error("no space in flash: need {needed_words} words, largest free run is {available_words}")]
    NoSpace {
        /// Words needed, header included.
        needed_words: usize,
        /// Largest contiguous free run found.
        available_words: usize,
    },

    /// The record can never fit a page, even one that is empty.
    #[error("record too large: {length_words} data words exceed the page capacity of {max_words}")]
    RecordTooLarge {
        /// Requested data length, in words.
        length_words: usize,
        /// Largest representable data length, in words.
        max_words: usize,
    },

    /// The record key is a reserved value.
    #[error("invalid record key: {value:#06x} is reserved")]
    InvalidKey {
        /// The rejected key value.
        value: u16,
    },

    /// The file ID is a reserved value.
    #[error("invalid file id: {value:#06x} is reserved")]
    InvalidFileId {
        /// The rejected file ID value.
        value: u16,
    },

    /// A record must carry at least one data byte.
    #[error("empty record data")]
    EmptyRecord,

    /// Stored data fails its integrity check.
    #[error("CRC mismatch on record {id}: header says {expected:#06x}, data hashes to {actual:#06x}")]
    CrcMismatch {
        /// The record that failed verification.
        id: RecordId,
        /// CRC stored in the header.
        expected: u16,
        /// CRC computed over the stored record.
        actual: u16,
    },

    /// The mounted image does not look like a store.
    #[error("corrupted image: {message}")]
    Corrupted {
        /// Description of the inconsistency.
        message: String,
    },
}

impl EngineError {
    /// Creates a corrupted-image error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}
