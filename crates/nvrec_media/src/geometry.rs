//! Flash device geometry.

/// Size of one flash word, in bytes.
///
/// Words are the programming and addressing granularity of the device;
/// every address handed to [`crate::FlashMedia`] is a word offset.
pub const WORD_BYTES: usize = 4;

/// The value a fully erased word reads as.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// The value every byte of an erased region reads as.
pub const ERASED_BYTE: u8 = 0xFF;

/// Physical layout of a flash device.
///
/// Erases always cover whole pages; programs may target any word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Number of virtual pages.
    pub pages: usize,
    /// Size of one page, in words.
    pub page_size_words: usize,
}

impl Geometry {
    /// Creates a geometry from a page count and page size.
    #[must_use]
    pub const fn new(pages: usize, page_size_words: usize) -> Self {
        Self {
            pages,
            page_size_words,
        }
    }

    /// Total device size, in words.
    #[must_use]
    pub const fn total_words(self) -> usize {
        self.pages * self.page_size_words
    }

    /// Total device size, in bytes.
    #[must_use]
    pub const fn total_bytes(self) -> usize {
        self.total_words() * WORD_BYTES
    }

    /// Word address of the first word of `page`.
    #[must_use]
    pub const fn page_base(self, page: usize) -> usize {
        page * self.page_size_words
    }
}

impl Default for Geometry {
    /// Three pages of 1024 words (4 KiB pages), matching the reference
    /// configuration this crate was calibrated against.
    fn default() -> Self {
        Self::new(3, 1024)
    }
}
