//! Flash media trait definition.

use crate::error::MediaResult;
use crate::geometry::Geometry;

/// A word-addressed flash device.
///
/// Reads are synchronous (NOR flash is memory-mapped); programs and
/// erases are asynchronous. A program or erase call either returns an
/// immediate rejection, or returns `Ok(())` meaning *queued* and later
/// delivers exactly one [`crate::CompletionCode`] through the completion
/// queue the device was constructed with.
///
/// # Invariants
///
/// - Every queued operation produces exactly one completion, in the
///   order the operations were accepted.
/// - A rejected operation produces no completion.
/// - Programming can only clear bits; only an erase sets them again.
///   Programming over non-erased words silently corrupts, it does not
///   fail. Callers own the erase discipline.
/// - The completion callback path must never be entered from inside
///   `program` or `erase` themselves; completions go through the queue.
pub trait FlashMedia {
    /// The device geometry.
    fn geometry(&self) -> Geometry;

    /// Reads `len_words` words starting at word address `addr`.
    ///
    /// Returns exactly `len_words * 4` borrowed bytes. The borrow is
    /// invalidated by the next mutating operation on the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the device.
    fn read(&self, addr: usize, len_words: usize) -> MediaResult<&[u8]>;

    /// Queues a program of `src` at word address `dest`.
    ///
    /// `src.len()` must be a non-zero multiple of the word size.
    ///
    /// # Errors
    ///
    /// Returns an error if `src` is empty or not whole words, or if the
    /// destination range extends beyond the device.
    fn program(&mut self, dest: usize, src: &[u8]) -> MediaResult<()>;

    /// Queues an erase of `num_pages` pages starting at page index `page`.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_pages` is zero or the range extends
    /// beyond the device.
    fn erase(&mut self, page: usize, num_pages: usize) -> MediaResult<()>;
}
