//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur when issuing a media operation.
///
/// These are issue-time rejections: an operation that returns one of
/// these was never accepted and will produce no completion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    /// An argument was invalid (for example, a zero length).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// The operation would touch words outside the device.
    #[error("address out of bounds: word {addr} + {len_words} words exceeds device size of {total_words} words")]
    InvalidAddress {
        /// First word address of the operation.
        addr: usize,
        /// Length of the operation, in words.
        len_words: usize,
        /// Total device size, in words.
        total_words: usize,
    },
}

impl MediaError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
