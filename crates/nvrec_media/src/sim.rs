//! Simulated NOR flash for testing.

use crate::error::{MediaError, MediaResult};
use crate::geometry::{Geometry, ERASED_BYTE, WORD_BYTES};
use crate::media::FlashMedia;
use crate::queue::CompletionQueue;
use std::sync::Arc;

/// A simulated NOR flash device.
///
/// Backed by a plain byte buffer, word-addressed, and completing every
/// accepted operation instantly into the shared [`CompletionQueue`].
///
/// Programming models real NOR behavior: the new content is bitwise
/// ANDed with the existing content, so bits can only be cleared until
/// the covering page is erased. Writing over a non-erased region
/// corrupts silently rather than failing.
///
/// A production media driver replaces this type with one whose
/// completions arrive from an interrupt handler; consumers must not
/// rely on the instant-completion timing this simulation provides.
#[derive(Debug)]
pub struct SimFlash {
    geometry: Geometry,
    bytes: Vec<u8>,
    completions: Arc<CompletionQueue>,
}

impl SimFlash {
    /// Creates a fully erased device.
    #[must_use]
    pub fn new(geometry: Geometry, completions: Arc<CompletionQueue>) -> Self {
        Self {
            geometry,
            bytes: vec![ERASED_BYTE; geometry.total_bytes()],
            completions,
        }
    }

    /// Creates a device holding a previously exported image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image length does not match the geometry.
    pub fn from_image(
        geometry: Geometry,
        completions: Arc<CompletionQueue>,
        image: &[u8],
    ) -> MediaResult<Self> {
        if image.len() != geometry.total_bytes() {
            return Err(MediaError::invalid_argument(format!(
                "image is {} bytes, geometry requires {}",
                image.len(),
                geometry.total_bytes()
            )));
        }
        Ok(Self {
            geometry,
            bytes: image.to_vec(),
            completions,
        })
    }

    /// The raw device content.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.bytes
    }

    fn check_range(&self, addr: usize, len_words: usize) -> MediaResult<()> {
        let total_words = self.geometry.total_words();
        if addr.saturating_add(len_words) > total_words {
            return Err(MediaError::InvalidAddress {
                addr,
                len_words,
                total_words,
            });
        }
        Ok(())
    }
}

impl FlashMedia for SimFlash {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn read(&self, addr: usize, len_words: usize) -> MediaResult<&[u8]> {
        self.check_range(addr, len_words)?;
        let start = addr * WORD_BYTES;
        Ok(&self.bytes[start..start + len_words * WORD_BYTES])
    }

    fn program(&mut self, dest: usize, src: &[u8]) -> MediaResult<()> {
        if src.is_empty() {
            return Err(MediaError::invalid_argument("program of zero length"));
        }
        if src.len() % WORD_BYTES != 0 {
            return Err(MediaError::invalid_argument(format!(
                "program of {} bytes is not whole words",
                src.len()
            )));
        }
        self.check_range(dest, src.len() / WORD_BYTES)?;

        let start = dest * WORD_BYTES;
        for (cell, &byte) in self.bytes[start..start + src.len()].iter_mut().zip(src) {
            *cell &= byte;
        }

        self.completions.push(Ok(()));
        Ok(())
    }

    fn erase(&mut self, page: usize, num_pages: usize) -> MediaResult<()> {
        if num_pages == 0 {
            return Err(MediaError::invalid_argument("erase of zero pages"));
        }
        if page.saturating_add(num_pages) > self.geometry.pages {
            return Err(MediaError::InvalidAddress {
                addr: self.geometry.page_base(page),
                len_words: num_pages * self.geometry.page_size_words,
                total_words: self.geometry.total_words(),
            });
        }

        let start = self.geometry.page_base(page) * WORD_BYTES;
        let len = num_pages * self.geometry.page_size_words * WORD_BYTES;
        self.bytes[start..start + len].fill(ERASED_BYTE);

        self.completions.push(Ok(()));
        Ok(())
    }
}
