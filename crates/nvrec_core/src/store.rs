//! The record store: pump-and-wait adapter plus the record API.

use std::sync::Arc;

use nvrec_engine::{
    Engine, EngineResult, EventKind, FileId, FindToken, RecordId, RecordKey, RecordView,
};
use nvrec_media::{CompletionQueue, FlashMedia, SimFlash, WORD_BYTES};
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::latch::EventLatch;

/// An owned copy of one stored record, as returned by
/// [`RecordStore::read_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordData {
    /// The record's identifier.
    pub id: RecordId,
    /// File the record belongs to.
    pub file_id: FileId,
    /// The record's key.
    pub key: RecordKey,
    /// Word-padded record data.
    pub data: Vec<u8>,
}

/// A record store mounted over a flash device.
///
/// Every mutating call takes `&mut self`, which is the serialization
/// the design requires: at most one operation is ever in flight through
/// the adapter, enforced at compile time instead of by caller
/// convention.
///
/// # Adapter
///
/// The engine completes operations asynchronously and must not have
/// its event path entered from the call that issued the operation.
/// Each API call therefore runs the same loop: clear the event latch
/// for the operation's kind, issue the engine primitive, then pop
/// media completions one at a time and feed them to the engine until
/// the engine emits the event that fills the latch, and return its
/// code. An issue-time rejection returns immediately: no completion
/// will ever arrive for a call that was never accepted.
#[derive(Debug)]
pub struct RecordStore<M: FlashMedia> {
    engine: Engine<M>,
    completions: Arc<CompletionQueue>,
    latch: EventLatch,
}

impl RecordStore<SimFlash> {
    /// Mounts a store over a previously exported image.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::UnalignedAddress`] if the image buffer
    /// is not word-aligned (no engine call is issued), with
    /// [`StoreError::InvalidImageSize`] if its length does not match
    /// the configured capacity, or with an engine error if the image
    /// content is not a valid store.
    pub fn mount(config: &StoreConfig, image: &[u8]) -> StoreResult<Self> {
        let addr = image.as_ptr() as usize;
        if addr % WORD_BYTES != 0 {
            return Err(StoreError::UnalignedAddress { addr });
        }
        let expected = config.capacity_bytes();
        if image.len() != expected {
            return Err(StoreError::InvalidImageSize {
                expected,
                actual: image.len(),
            });
        }

        let completions = Arc::new(CompletionQueue::new(config.queue_capacity));
        let media = SimFlash::from_image(config.geometry(), Arc::clone(&completions), image)?;
        Self::mount_with(media, completions)
    }

    /// Mounts a store over a fresh, fully erased image.
    ///
    /// # Errors
    ///
    /// Fails if initialization fails.
    pub fn mount_fresh(config: &StoreConfig) -> StoreResult<Self> {
        let completions = Arc::new(CompletionQueue::new(config.queue_capacity));
        let media = SimFlash::new(config.geometry(), Arc::clone(&completions));
        Self::mount_with(media, completions)
    }

    /// Exports the current flash image, suitable for a later
    /// [`RecordStore::mount`].
    #[must_use]
    pub fn image(&self) -> Vec<u8> {
        self.engine.media().image().to_vec()
    }
}

impl<M: FlashMedia> RecordStore<M> {
    /// Mounts a store over an arbitrary media implementation.
    ///
    /// `completions` must be the queue the media delivers into.
    ///
    /// # Errors
    ///
    /// Fails if store initialization is rejected or completes with an
    /// error.
    pub fn mount_with(media: M, completions: Arc<CompletionQueue>) -> StoreResult<Self> {
        let engine = Engine::new(media, Arc::clone(&completions));
        let mut store = Self {
            engine,
            completions,
            latch: EventLatch::new(),
        };
        store.clear_and_issue(EventKind::Init, Engine::begin_init)?;
        debug!("store mounted");
        Ok(store)
    }

    /// Writes a new record and returns its ID.
    ///
    /// Data is padded to whole words; the padding is part of the stored
    /// record.
    ///
    /// # Errors
    ///
    /// Fails on reserved key/file values, empty or oversized data, or
    /// when no page has room (garbage collection may reclaim space).
    pub fn write(&mut self, key: RecordKey, file_id: FileId, data: &[u8]) -> StoreResult<RecordId> {
        self.clear_and_issue(EventKind::Write, |engine| {
            engine.begin_write(key, file_id, data)
        })
    }

    /// Replaces a record's content, keeping its key and file ID.
    ///
    /// The record's identity is read back first; if that fails, the
    /// update is never issued. The new copy gets a fresh ID (which is
    /// returned); the old copy is reclaimed no later than the next
    /// garbage collection.
    ///
    /// # Errors
    ///
    /// Fails if the record does not exist or the new content cannot be
    /// placed.
    pub fn update(&mut self, id: RecordId, data: &[u8]) -> StoreResult<RecordId> {
        let (key, file_id) = {
            let view = self.get(id)?;
            (view.key, view.file_id)
        };
        self.clear_and_issue(EventKind::Update, |engine| {
            engine.begin_update(id, key, file_id, data)
        })
    }

    /// Deletes a single record.
    ///
    /// Its space is reclaimed by the next garbage collection.
    ///
    /// # Errors
    ///
    /// Fails if no live record carries `id`.
    pub fn delete(&mut self, id: RecordId) -> StoreResult<()> {
        self.clear_and_issue(EventKind::DeleteRecord, |engine| {
            engine.begin_delete_record(id)
        })
    }

    /// Deletes every record belonging to `file_id`.
    ///
    /// Deleting a file with no records succeeds.
    ///
    /// # Errors
    ///
    /// Fails only if the engine rejects the operation.
    pub fn delete_file(&mut self, file_id: FileId) -> StoreResult<()> {
        self.clear_and_issue(EventKind::DeleteFile, |engine| {
            engine.begin_delete_file(file_id)
        })
    }

    /// Opens a record for reading.
    ///
    /// Purely synchronous; no event is waited on. The returned view
    /// borrows the store, so it is valid exactly until the next
    /// mutating operation.
    ///
    /// # Errors
    ///
    /// Fails if the record does not exist or its integrity check fails.
    pub fn get(&self, id: RecordId) -> StoreResult<RecordView<'_>> {
        Ok(self.engine.open(id)?)
    }

    /// Iterates over the IDs of all live records.
    ///
    /// Each call starts a fresh traversal; the sequence is finite and
    /// reflects physical record order. Purely synchronous metadata
    /// reads; no event is waited on.
    pub fn iter(&self) -> RecordIds<'_, M> {
        RecordIds {
            store: self,
            token: FindToken::new(),
            done: false,
        }
    }

    /// Reads every live record into an owned snapshot.
    ///
    /// # Errors
    ///
    /// Fails if any record cannot be opened.
    pub fn read_all(&self) -> StoreResult<Vec<RecordData>> {
        let mut records = Vec::new();
        for id in self.iter() {
            let id = id?;
            let view = self.get(id)?;
            records.push(RecordData {
                id,
                file_id: view.file_id,
                key: view.key,
                data: view.data.to_vec(),
            });
        }
        Ok(records)
    }

    /// Runs a garbage collection pass, reclaiming the space of deleted
    /// and superseded records. Surviving records keep their IDs.
    ///
    /// # Errors
    ///
    /// Fails if the engine rejects the pass or a media action fails.
    pub fn gc(&mut self) -> StoreResult<()> {
        self.clear_and_issue(EventKind::GarbageCollect, Engine::begin_gc)
    }

    /// The pump-and-wait adapter.
    ///
    /// Clears the latch slot for `kind`, issues the engine primitive,
    /// then drains completions through the engine until the matching
    /// event fills the slot. Completions are delivered strictly in
    /// enqueue order, and the latch is checked between every delivery,
    /// so an event for a different kind can never satisfy this wait.
    fn clear_and_issue<T>(
        &mut self,
        kind: EventKind,
        issue: impl FnOnce(&mut Engine<M>) -> EngineResult<T>,
    ) -> StoreResult<T> {
        self.latch.clear(kind);
        // An immediate rejection means the operation was never queued;
        // no completion will ever arrive, so don't wait for one.
        let accepted = issue(&mut self.engine)?;

        loop {
            if let Some(result) = self.latch.try_read(kind) {
                return match result {
                    Ok(()) => Ok(accepted),
                    Err(err) => Err(err.clone().into()),
                };
            }
            let Some(code) = self.completions.pop() else {
                // The real wait point: interrupt-driven media parks the
                // caller here until a completion is enqueued.
                return Err(StoreError::WouldBlock);
            };
            if let Some(event) = self.engine.on_media_complete(code) {
                self.latch.record(event.kind, event.result);
            }
        }
    }
}

/// Iterator over the IDs of the live records, in physical order.
///
/// Returned by [`RecordStore::iter`].
#[derive(Debug)]
pub struct RecordIds<'a, M: FlashMedia> {
    store: &'a RecordStore<M>,
    token: FindToken,
    done: bool,
}

impl<M: FlashMedia> Iterator for RecordIds<'_, M> {
    type Item = StoreResult<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.store.engine.find_next(&mut self.token) {
            Ok(Some(id)) => Some(Ok(id)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvrec_engine::EngineError;

    fn small_config() -> StoreConfig {
        StoreConfig::new().pages(3).page_size_words(32)
    }

    fn collect_ids(store: &RecordStore<SimFlash>) -> Vec<RecordId> {
        store.iter().collect::<StoreResult<Vec<_>>>().unwrap()
    }

    #[test]
    fn mount_fresh_store_is_empty() {
        let store = RecordStore::mount_fresh(&small_config()).unwrap();
        assert!(collect_ids(&store).is_empty());
    }

    #[test]
    fn mount_rejects_unaligned_image() {
        let config = small_config();
        let bytes = vec![0xFFu8; config.capacity_bytes() + 4];
        // Pick the slice start so the image pointer lands one byte off
        // a word boundary, wherever the allocation itself landed.
        let off = (5 - (bytes.as_ptr() as usize % 4)) % 4;
        let image = &bytes[off..off + config.capacity_bytes()];

        let result = RecordStore::mount(&config, image);
        assert!(matches!(result, Err(StoreError::UnalignedAddress { .. })));
    }

    #[test]
    fn mount_rejects_wrong_size_image() {
        let config = small_config();
        let image = vec![0xFFu8; config.capacity_bytes() + 4];
        let result = RecordStore::mount(&config, &image);
        assert!(matches!(result, Err(StoreError::InvalidImageSize { .. })));
    }

    #[test]
    fn write_returns_latest_completion_for_its_kind() {
        let mut store = RecordStore::mount_fresh(&small_config()).unwrap();
        let id = store
            .write(RecordKey::new(1), FileId::new(10), &[0xAA, 0xBB])
            .unwrap();
        // The queue is fully drained once the call returns.
        assert!(store.completions.is_empty());
        assert_eq!(collect_ids(&store), vec![id]);
    }

    #[test]
    fn update_on_missing_record_short_circuits() {
        let mut store = RecordStore::mount_fresh(&small_config()).unwrap();
        let id = store
            .write(RecordKey::new(1), FileId::new(1), &[1, 2, 3, 4])
            .unwrap();
        store.delete(id).unwrap();

        let result = store.update(id, &[5, 6, 7, 8]);
        assert_eq!(
            result.unwrap_err(),
            StoreError::Engine(EngineError::RecordNotFound { id })
        );
        // The failed precondition must leave no stray completions.
        assert!(store.completions.is_empty());
    }

    #[test]
    fn iter_restarts_from_the_beginning() {
        let mut store = RecordStore::mount_fresh(&small_config()).unwrap();
        store.write(RecordKey::new(1), FileId::new(1), &[1]).unwrap();
        store.write(RecordKey::new(2), FileId::new(1), &[2]).unwrap();

        let first = collect_ids(&store);
        let second = collect_ids(&store);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn read_all_returns_owned_records() {
        let mut store = RecordStore::mount_fresh(&small_config()).unwrap();
        let id = store
            .write(RecordKey::new(100), FileId::new(6), b"Hello World.")
            .unwrap();

        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].file_id, FileId::new(6));
        assert_eq!(all[0].key, RecordKey::new(100));
        assert_eq!(all[0].data, b"Hello World.");
    }

    #[test]
    fn view_borrow_ends_before_next_mutation() {
        let mut store = RecordStore::mount_fresh(&small_config()).unwrap();
        let id = store
            .write(RecordKey::new(1), FileId::new(1), &[7, 7, 7, 7])
            .unwrap();

        let data = {
            let view = store.get(id).unwrap();
            view.data.to_vec()
        };
        // A mutating call is fine once the view is gone.
        store.delete(id).unwrap();
        assert_eq!(data, vec![7, 7, 7, 7]);
    }
}
