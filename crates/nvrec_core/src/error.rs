//! Error types for the record store API.

use nvrec_engine::EngineError;
use nvrec_media::MediaError;
use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the record store API.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The engine rejected or failed the operation.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The media rejected the operation at issue time.
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    /// The image buffer is not word-aligned.
    #[error("unaligned image address: {addr:#x} is not word-aligned")]
    UnalignedAddress {
        /// The rejected buffer address.
        addr: usize,
    },

    /// The image buffer does not match the configured capacity.
    #[error("invalid image size: expected {expected} bytes, got {actual}")]
    InvalidImageSize {
        /// Capacity the configuration requires.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// The completion queue ran dry while an operation was still
    /// waiting for its event.
    ///
    /// The simulated media completes instantly, so this is unreachable
    /// in the reference environment. A port to interrupt-driven media
    /// replaces the arm that produces this error with a genuine
    /// blocking wait, woken when a completion is enqueued.
    #[error("no completion pending: the media driver deferred delivery")]
    WouldBlock,
}
