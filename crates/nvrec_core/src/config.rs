//! Store configuration.

use nvrec_media::{Geometry, DEFAULT_QUEUE_CAPACITY};

/// Configuration for mounting a record store.
///
/// Page count and page size fix the total addressable capacity; the
/// queue capacity bounds the completion fan-out of a single operation
/// (see [`nvrec_media::CompletionQueue`]).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of virtual pages (one is always the swap page).
    pub pages: usize,

    /// Size of one page, in words.
    pub page_size_words: usize,

    /// Capacity of the completion queue.
    pub queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let geometry = Geometry::default();
        Self {
            pages: geometry.pages,
            page_size_words: geometry.page_size_words,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page count.
    #[must_use]
    pub const fn pages(mut self, pages: usize) -> Self {
        self.pages = pages;
        self
    }

    /// Sets the page size, in words.
    #[must_use]
    pub const fn page_size_words(mut self, words: usize) -> Self {
        self.page_size_words = words;
        self
    }

    /// Sets the completion queue capacity.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// The flash geometry this configuration describes.
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        Geometry::new(self.pages, self.page_size_words)
    }

    /// Total store capacity, in bytes.
    #[must_use]
    pub const fn capacity_bytes(&self) -> usize {
        self.geometry().total_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.pages, 3);
        assert_eq!(config.page_size_words, 1024);
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.capacity_bytes(), 3 * 1024 * 4);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .pages(4)
            .page_size_words(64)
            .queue_capacity(32);

        assert_eq!(config.pages, 4);
        assert_eq!(config.page_size_words, 64);
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.capacity_bytes(), 4 * 64 * 4);
    }
}
