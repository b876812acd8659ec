//! # nvrec core
//!
//! A synchronous record store API over the asynchronous flash engine.
//!
//! The engine underneath ([`nvrec_engine`]) completes every operation
//! through a callback-style event, and forbids delivering that event
//! from inside the call that issued the operation. This crate bridges
//! the two worlds with a pump-and-wait adapter: issue the primitive,
//! then drain pending media completions through the engine until the
//! completion for *this* operation lands in the event latch, and return
//! its code. Callers see a plain blocking API with no event plumbing.
//!
//! ## Example
//!
//! ```rust
//! use nvrec_core::{FileId, RecordKey, RecordStore, StoreConfig};
//!
//! let config = StoreConfig::new();
//! let mut store = RecordStore::mount_fresh(&config).unwrap();
//!
//! let id = store
//!     .write(RecordKey::new(100), FileId::new(6), b"Hello World.")
//!     .unwrap();
//! let view = store.get(id).unwrap();
//! assert_eq!(view.data, b"Hello World.");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod latch;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::{RecordData, RecordIds, RecordStore};

// The vocabulary types callers need alongside the store.
pub use nvrec_engine::{EventKind, FileId, RecordId, RecordKey, RecordView};
pub use nvrec_media::{CompletionQueue, FlashMedia, Geometry, SimFlash};
