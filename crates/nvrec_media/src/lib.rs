//! # nvrec media
//!
//! Flash media abstraction for nvrec.
//!
//! This crate provides the lowest layer of the stack:
//!
//! - [`FlashMedia`] - the word-addressed program/erase/read contract
//! - [`CompletionQueue`] - the bounded queue that carries asynchronous
//!   completion codes from the media driver back to the pump loop
//! - [`SimFlash`] - a simulated NOR device that completes instantly
//!
//! Media drivers are **dumb devices**: they move bits and report one
//! completion per accepted operation. All record-level interpretation
//! lives in `nvrec_engine`.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nvrec_media::{CompletionQueue, FlashMedia, Geometry, SimFlash};
//!
//! let queue = Arc::new(CompletionQueue::new(16));
//! let mut flash = SimFlash::new(Geometry::new(2, 8), Arc::clone(&queue));
//! flash.program(0, &0xC0FF_EE00u32.to_le_bytes()).unwrap();
//! assert_eq!(queue.pop(), Some(Ok(())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod geometry;
mod media;
mod queue;
mod sim;

pub use error::{MediaError, MediaResult};
pub use geometry::{Geometry, ERASED_BYTE, ERASED_WORD, WORD_BYTES};
pub use media::FlashMedia;
pub use queue::{CompletionCode, CompletionQueue, DEFAULT_QUEUE_CAPACITY};
pub use sim::SimFlash;
