//! # nvrec engine
//!
//! The flash record store engine.
//!
//! This crate owns everything between the record API and the raw media:
//!
//! - the on-flash layout (page tags, record headers, CRC16)
//! - the asynchronous operation state machine: each accepted operation
//!   is planned as a sequence of media actions, and each media
//!   completion drives the next action until a [`StoreEvent`] is emitted
//! - synchronous metadata traversal (`find_next`) and record access
//!   (`open`)
//! - swap-page garbage collection
//!
//! The engine never delivers an event from inside the call that issued
//! the operation. Even an operation that needs no media work completes
//! through the completion queue, so the pump loop is the only place
//! events surface.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod event;
mod layout;
mod types;

pub use engine::{Engine, RecordView};
pub use error::{EngineError, EngineResult};
pub use event::{EventKind, StoreEvent};
pub use layout::{
    compute_crc16, record_crc, words_to_bytes, RecordHeader, DIRTY_MASK_WORD, PAGE_TAG_DATA,
    PAGE_TAG_MAGIC, PAGE_TAG_SWAP, PAGE_TAG_WORDS, RECORD_HEADER_WORDS, RECORD_KEY_DIRTY,
};
pub use types::{FileId, FindToken, RecordId, RecordKey};
