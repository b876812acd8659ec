//! Core type definitions for the record store.

use std::fmt;

use crate::layout::PAGE_TAG_WORDS;

/// Stable identifier of one stored record instance.
///
/// Record IDs are monotonically increasing and never reused within a
/// mounted image. An update assigns a *new* ID to the new copy of the
/// record; garbage collection relocates records without changing IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u32);

impl RecordId {
    /// Creates a record ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec:{}", self.0)
    }
}

/// Logical grouping tag for records; a file is deletable as a unit.
///
/// The value `0xFFFF` reads as erased flash and is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u16);

impl FileId {
    /// Creates a file ID.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.0)
    }
}

/// Type/lookup tag attached to a record at write time.
///
/// The value `0` marks a deleted record on flash and `0xFFFF` reads as
/// erased, so both are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey(pub u16);

impl RecordKey {
    /// Creates a record key.
    #[must_use]
    pub const fn new(key: u16) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", self.0)
    }
}

/// Cursor for a restartable traversal of the live records.
///
/// A fresh (default) token starts the traversal from the first page;
/// each successful `find_next` call advances it past the returned
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindToken {
    /// Page currently being scanned.
    pub(crate) page: usize,
    /// Word offset of the next header candidate within the page.
    pub(crate) offset_words: usize,
}

impl Default for FindToken {
    fn default() -> Self {
        Self {
            page: 0,
            offset_words: PAGE_TAG_WORDS,
        }
    }
}

impl FindToken {
    /// Creates a token positioned at the start of the store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_ordering() {
        assert!(RecordId::new(1) < RecordId::new(2));
    }

    #[test]
    fn display_forms() {
        assert_eq!(format!("{}", RecordId::new(7)), "rec:7");
        assert_eq!(format!("{}", FileId::new(10)), "file:10");
        assert_eq!(format!("{}", RecordKey::new(3)), "key:3");
    }

    #[test]
    fn fresh_token_skips_page_tag() {
        let token = FindToken::new();
        assert_eq!(token.page, 0);
        assert_eq!(token.offset_words, PAGE_TAG_WORDS);
    }
}
