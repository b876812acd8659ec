//! The record store engine and its asynchronous operation machinery.

use std::collections::VecDeque;
use std::sync::Arc;

use nvrec_media::{
    CompletionCode, CompletionQueue, FlashMedia, Geometry, ERASED_WORD, WORD_BYTES,
};
use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};
use crate::event::{EventKind, StoreEvent};
use crate::layout::{
    record_crc, words_to_bytes, RecordHeader, DIRTY_MASK_WORD, PAGE_TAG_DATA, PAGE_TAG_MAGIC,
    PAGE_TAG_SWAP, PAGE_TAG_WORDS, RECORD_HEADER_WORDS,
};
use crate::types::{FileId, FindToken, RecordId, RecordKey};

/// A record as it sits on flash, borrowed from the media.
///
/// The data slice aliases device-owned memory; the borrow ends at the
/// next mutating operation on the store, which is exactly the validity
/// window of the underlying flash content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordView<'a> {
    /// File the record belongs to.
    pub file_id: FileId,
    /// The record's key.
    pub key: RecordKey,
    /// Data length, in words.
    pub length_words: u16,
    /// Word-padded record data.
    pub data: &'a [u8],
}

/// One low-level media operation planned for an in-flight operation.
#[derive(Debug)]
enum MediaAction {
    Program { dest: usize, bytes: Vec<u8> },
    Erase { page: usize, num_pages: usize },
}

/// The single in-flight operation.
#[derive(Debug)]
struct PendingOp {
    kind: EventKind,
    actions: VecDeque<MediaAction>,
}

/// How a page is tagged on flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Data,
    Swap,
    Untagged,
}

/// A record located on flash: header plus the word address it starts at.
#[derive(Debug, Clone, Copy)]
struct RecordSlot {
    addr: usize,
    header: RecordHeader,
}

/// The flash record store engine.
///
/// Operations follow a strict issue/complete split:
///
/// 1. A `begin_*` call validates its inputs, plans the full sequence of
///    media actions, issues the first one, and returns *queued* (or an
///    immediate rejection, in which case no event will ever follow).
/// 2. Each media completion fed into [`Engine::on_media_complete`]
///    issues the next planned action; when the plan is exhausted the
///    matching [`StoreEvent`] is returned to the pump.
///
/// An operation whose plan is empty pushes one synthetic success
/// completion instead, so its event still travels through the queue and
/// is never delivered from inside the issuing call.
///
/// At most one operation is in flight; a second `begin_*` while one is
/// pending is rejected with [`EngineError::Busy`].
#[derive(Debug)]
pub struct Engine<M: FlashMedia> {
    media: M,
    completions: Arc<CompletionQueue>,
    geometry: Geometry,
    next_record_id: u32,
    initialized: bool,
    pending: Option<PendingOp>,
}

impl<M: FlashMedia> Engine<M> {
    /// Creates an engine over `media`, pushing synthetic completions
    /// into `completions` (the same queue the media itself feeds).
    pub fn new(media: M, completions: Arc<CompletionQueue>) -> Self {
        let geometry = media.geometry();
        Self {
            media,
            completions,
            geometry,
            next_record_id: 1,
            initialized: false,
            pending: None,
        }
    }

    /// The underlying media.
    pub fn media(&self) -> &M {
        &self.media
    }

    /// Largest data length a record can carry, in words.
    #[must_use]
    pub fn max_record_words(&self) -> usize {
        self.geometry.page_size_words - PAGE_TAG_WORDS - RECORD_HEADER_WORDS
    }

    // ------------------------------------------------------------------
    // Asynchronous primitives
    // ------------------------------------------------------------------

    /// Queues store initialization: classifies every page, formats
    /// untagged ones, and establishes the next record ID.
    ///
    /// # Errors
    ///
    /// Rejects immediately if an operation is pending or the image does
    /// not look like a store (bad tags, no possible swap page).
    pub fn begin_init(&mut self) -> EngineResult<()> {
        if self.pending.is_some() {
            return Err(EngineError::Busy);
        }

        let mut kinds = Vec::with_capacity(self.geometry.pages);
        for page in 0..self.geometry.pages {
            kinds.push(self.page_kind(page)?);
        }

        let swap_count = kinds.iter().filter(|&&k| k == PageKind::Swap).count();
        if swap_count > 1 {
            return Err(EngineError::corrupted(format!(
                "{swap_count} swap pages, expected exactly one"
            )));
        }
        let untagged = kinds.iter().filter(|&&k| k == PageKind::Untagged).count();
        if swap_count == 0 && untagged == 0 {
            return Err(EngineError::corrupted("no swap page and no erased page"));
        }

        // Format erased pages: the first one covers a missing swap page,
        // the rest become data pages.
        let mut actions = VecDeque::new();
        let mut have_swap = swap_count == 1;
        for (page, kind) in kinds.iter().enumerate() {
            if *kind != PageKind::Untagged {
                continue;
            }
            let tag = if have_swap { PAGE_TAG_DATA } else { PAGE_TAG_SWAP };
            have_swap = true;
            actions.push_back(MediaAction::Program {
                dest: self.geometry.page_base(page),
                bytes: words_to_bytes(&[PAGE_TAG_MAGIC, tag]),
            });
        }

        // Record IDs are never reused, deleted records included.
        let mut max_id = 0;
        for (page, kind) in kinds.iter().enumerate() {
            if *kind != PageKind::Data {
                continue;
            }
            for slot in self.page_records(page)?.0 {
                max_id = max_id.max(slot.header.record_id.as_u32());
            }
        }
        self.next_record_id = max_id + 1;

        debug!(
            formatted = actions.len(),
            next_record_id = self.next_record_id,
            "init queued"
        );
        self.start_op(EventKind::Init, actions)
    }

    /// Queues a write of a new record.
    ///
    /// Data is padded to whole words. The record ID is assigned at
    /// issue time and returned immediately; the write itself completes
    /// through the event pump.
    ///
    /// # Errors
    ///
    /// Rejects immediately on reserved key/file values, empty or
    /// oversized data, or when no data page has room.
    pub fn begin_write(
        &mut self,
        key: RecordKey,
        file_id: FileId,
        data: &[u8],
    ) -> EngineResult<RecordId> {
        self.check_ready()?;
        validate_identity(key, file_id)?;
        let data = self.pad_and_check(data)?;
        let length_words = data.len() / WORD_BYTES;

        let slot_addr = self.find_free_slot(RECORD_HEADER_WORDS + length_words)?;
        let record_id = self.take_record_id();
        let header = RecordHeader {
            key,
            length_words: length_words as u16,
            file_id,
            crc: record_crc(key, length_words as u16, file_id, record_id, &data),
            record_id,
        };

        debug!(%record_id, %key, %file_id, length_words, "write queued");
        let actions = VecDeque::from([
            MediaAction::Program {
                dest: slot_addr + RECORD_HEADER_WORDS,
                bytes: data,
            },
            MediaAction::Program {
                dest: slot_addr,
                bytes: words_to_bytes(&header.to_words()),
            },
        ]);
        self.start_op(EventKind::Write, actions)?;
        Ok(record_id)
    }

    /// Queues an update: a new copy of the record carrying `key` and
    /// `file_id` is written under a fresh ID, then the old copy is
    /// marked deleted. Deleting the old copy is this primitive's
    /// responsibility; callers never issue a separate delete.
    ///
    /// # Errors
    ///
    /// Rejects immediately if the old record does not exist or the new
    /// data cannot be placed.
    pub fn begin_update(
        &mut self,
        id: RecordId,
        key: RecordKey,
        file_id: FileId,
        data: &[u8],
    ) -> EngineResult<RecordId> {
        self.check_ready()?;
        validate_identity(key, file_id)?;
        let old = self
            .locate_record(id)?
            .ok_or(EngineError::RecordNotFound { id })?;
        let data = self.pad_and_check(data)?;
        let length_words = data.len() / WORD_BYTES;

        let slot_addr = self.find_free_slot(RECORD_HEADER_WORDS + length_words)?;
        let record_id = self.take_record_id();
        let header = RecordHeader {
            key,
            length_words: length_words as u16,
            file_id,
            crc: record_crc(key, length_words as u16, file_id, record_id, &data),
            record_id,
        };

        debug!(old = %id, new = %record_id, "update queued");
        let actions = VecDeque::from([
            MediaAction::Program {
                dest: slot_addr + RECORD_HEADER_WORDS,
                bytes: data,
            },
            MediaAction::Program {
                dest: slot_addr,
                bytes: words_to_bytes(&header.to_words()),
            },
            MediaAction::Program {
                dest: old.addr,
                bytes: words_to_bytes(&[DIRTY_MASK_WORD]),
            },
        ]);
        self.start_op(EventKind::Update, actions)?;
        Ok(record_id)
    }

    /// Queues deletion of a single record.
    ///
    /// # Errors
    ///
    /// Rejects immediately if no live record carries `id`.
    pub fn begin_delete_record(&mut self, id: RecordId) -> EngineResult<()> {
        self.check_ready()?;
        let slot = self
            .locate_record(id)?
            .ok_or(EngineError::RecordNotFound { id })?;

        debug!(%id, "delete queued");
        let actions = VecDeque::from([MediaAction::Program {
            dest: slot.addr,
            bytes: words_to_bytes(&[DIRTY_MASK_WORD]),
        }]);
        self.start_op(EventKind::DeleteRecord, actions)
    }

    /// Queues deletion of every record belonging to `file_id`.
    ///
    /// Deleting a file with no records is a successful no-op.
    ///
    /// # Errors
    ///
    /// Rejects immediately if an operation is pending or the store is
    /// not initialized.
    pub fn begin_delete_file(&mut self, file_id: FileId) -> EngineResult<()> {
        self.check_ready()?;

        let mut actions = VecDeque::new();
        for page in self.data_pages()? {
            for slot in self.page_records(page)?.0 {
                if !slot.header.is_deleted() && slot.header.file_id == file_id {
                    actions.push_back(MediaAction::Program {
                        dest: slot.addr,
                        bytes: words_to_bytes(&[DIRTY_MASK_WORD]),
                    });
                }
            }
        }

        debug!(%file_id, records = actions.len(), "file delete queued");
        self.start_op(EventKind::DeleteFile, actions)
    }

    /// Queues a garbage collection pass.
    ///
    /// For every data page holding deleted records, the live records
    /// are copied to the swap page (IDs preserved), the swap page is
    /// promoted to a data page, the dirty page is erased and becomes
    /// the new swap page. Collecting a clean store is a successful
    /// no-op.
    ///
    /// # Errors
    ///
    /// Rejects immediately if an operation is pending or the store is
    /// not initialized.
    pub fn begin_gc(&mut self) -> EngineResult<()> {
        self.check_ready()?;
        let mut swap = self
            .swap_page()?
            .ok_or_else(|| EngineError::corrupted("no swap page available for collection"))?;

        let mut actions = VecDeque::new();
        for page in self.data_pages()? {
            let (slots, _) = self.page_records(page)?;
            if slots.iter().all(|s| !s.header.is_deleted()) {
                continue;
            }

            // Copy live records into the swap page, verbatim.
            let mut dest = self.geometry.page_base(swap) + PAGE_TAG_WORDS;
            for slot in slots.iter().filter(|s| !s.header.is_deleted()) {
                let total_words = RECORD_HEADER_WORDS + usize::from(slot.header.length_words);
                let bytes = self.media.read(slot.addr, total_words)?.to_vec();
                actions.push_back(MediaAction::Program { dest, bytes });
                dest += total_words;
            }
            // Promote the swap page, then recycle the dirty page.
            actions.push_back(MediaAction::Program {
                dest: self.geometry.page_base(swap) + 1,
                bytes: words_to_bytes(&[PAGE_TAG_DATA]),
            });
            actions.push_back(MediaAction::Erase { page, num_pages: 1 });
            actions.push_back(MediaAction::Program {
                dest: self.geometry.page_base(page),
                bytes: words_to_bytes(&[PAGE_TAG_MAGIC, PAGE_TAG_SWAP]),
            });
            swap = page;
        }

        debug!(actions = actions.len(), "gc queued");
        self.start_op(EventKind::GarbageCollect, actions)
    }

    /// Feeds one media completion into the state machine.
    ///
    /// Issues the next planned action of the in-flight operation, or
    /// returns the operation's [`StoreEvent`] once the plan is
    /// exhausted (or an action failed). A completion with no operation
    /// in flight is dropped.
    pub fn on_media_complete(&mut self, code: CompletionCode) -> Option<StoreEvent> {
        let Some(mut op) = self.pending.take() else {
            debug!("completion with no operation in flight, dropped");
            return None;
        };

        if let Err(err) = code {
            return Some(self.finish(op.kind, Err(err.into())));
        }

        match op.actions.pop_front() {
            Some(action) => {
                if let Err(err) = self.issue(action) {
                    return Some(self.finish(op.kind, Err(err)));
                }
                self.pending = Some(op);
                None
            }
            None => Some(self.finish(op.kind, Ok(()))),
        }
    }

    // ------------------------------------------------------------------
    // Synchronous primitives
    // ------------------------------------------------------------------

    /// Advances `token` to the next live record and returns its ID, or
    /// `None` when the traversal is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not initialized or a metadata
    /// read fails.
    pub fn find_next(&self, token: &mut FindToken) -> EngineResult<Option<RecordId>> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }

        while token.page < self.geometry.pages {
            if self.page_kind(token.page)? != PageKind::Data {
                token.page += 1;
                token.offset_words = PAGE_TAG_WORDS;
                continue;
            }

            let base = self.geometry.page_base(token.page);
            while token.offset_words + RECORD_HEADER_WORDS <= self.geometry.page_size_words {
                let addr = base + token.offset_words;
                if self.read_word(addr)? == ERASED_WORD {
                    break;
                }
                let header = self.read_header(addr)?;
                let length = usize::from(header.length_words);
                if token.offset_words + RECORD_HEADER_WORDS + length
                    > self.geometry.page_size_words
                {
                    // Torn tail write; nothing usable past this point.
                    break;
                }
                token.offset_words += RECORD_HEADER_WORDS + length;
                if !header.is_deleted() {
                    return Ok(Some(header.record_id));
                }
            }

            token.page += 1;
            token.offset_words = PAGE_TAG_WORDS;
        }
        Ok(None)
    }

    /// Opens the live record carrying `id`, verifying its CRC.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not initialized, the record
    /// does not exist (or was deleted), or its stored CRC does not
    /// match the data.
    pub fn open(&self, id: RecordId) -> EngineResult<RecordView<'_>> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        let slot = self
            .locate_record(id)?
            .ok_or(EngineError::RecordNotFound { id })?;
        let header = slot.header;

        let data = self
            .media
            .read(slot.addr + RECORD_HEADER_WORDS, usize::from(header.length_words))?;
        let actual = record_crc(header.key, header.length_words, header.file_id, id, data);
        if actual != header.crc {
            return Err(EngineError::CrcMismatch {
                id,
                expected: header.crc,
                actual,
            });
        }

        Ok(RecordView {
            file_id: header.file_id,
            key: header.key,
            length_words: header.length_words,
            data,
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn check_ready(&self) -> EngineResult<()> {
        if self.pending.is_some() {
            return Err(EngineError::Busy);
        }
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        Ok(())
    }

    fn take_record_id(&mut self) -> RecordId {
        let id = RecordId::new(self.next_record_id);
        self.next_record_id += 1;
        id
    }

    fn pad_and_check(&self, data: &[u8]) -> EngineResult<Vec<u8>> {
        if data.is_empty() {
            return Err(EngineError::EmptyRecord);
        }
        let length_words = data.len().div_ceil(WORD_BYTES);
        if length_words > self.max_record_words() || length_words > usize::from(u16::MAX) {
            return Err(EngineError::RecordTooLarge {
                length_words,
                max_words: self.max_record_words(),
            });
        }
        let mut padded = data.to_vec();
        padded.resize(length_words * WORD_BYTES, 0);
        Ok(padded)
    }

    fn start_op(&mut self, kind: EventKind, mut actions: VecDeque<MediaAction>) -> EngineResult<()> {
        match actions.pop_front() {
            // An issue-time rejection here means the operation was never
            // accepted; the caller gets the error and no event follows.
            Some(action) => self.issue(action)?,
            // Nothing to do on media: complete through the queue anyway,
            // so the event is delivered by the pump, never reentrantly.
            None => self.completions.push(Ok(())),
        }
        self.pending = Some(PendingOp { kind, actions });
        Ok(())
    }

    fn issue(&mut self, action: MediaAction) -> EngineResult<()> {
        match action {
            MediaAction::Program { dest, bytes } => {
                trace!(dest, len = bytes.len(), "program");
                self.media.program(dest, &bytes)?;
            }
            MediaAction::Erase { page, num_pages } => {
                trace!(page, num_pages, "erase");
                self.media.erase(page, num_pages)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, kind: EventKind, result: Result<(), EngineError>) -> StoreEvent {
        if kind == EventKind::Init && result.is_ok() {
            self.initialized = true;
        }
        debug!(?kind, ok = result.is_ok(), "operation complete");
        StoreEvent { kind, result }
    }

    fn read_word(&self, addr: usize) -> EngineResult<u32> {
        let bytes = self.media.read(addr, 1)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_header(&self, addr: usize) -> EngineResult<RecordHeader> {
        Ok(RecordHeader::from_words([
            self.read_word(addr)?,
            self.read_word(addr + 1)?,
            self.read_word(addr + 2)?,
        ]))
    }

    fn page_kind(&self, page: usize) -> EngineResult<PageKind> {
        let base = self.geometry.page_base(page);
        let w0 = self.read_word(base)?;
        let w1 = self.read_word(base + 1)?;
        match (w0, w1) {
            (PAGE_TAG_MAGIC, PAGE_TAG_DATA) => Ok(PageKind::Data),
            (PAGE_TAG_MAGIC, PAGE_TAG_SWAP) => Ok(PageKind::Swap),
            (ERASED_WORD, ERASED_WORD) => Ok(PageKind::Untagged),
            _ => Err(EngineError::corrupted(format!(
                "page {page} carries an unknown tag ({w0:#010x}, {w1:#010x})"
            ))),
        }
    }

    fn data_pages(&self) -> EngineResult<Vec<usize>> {
        let mut pages = Vec::new();
        for page in 0..self.geometry.pages {
            if self.page_kind(page)? == PageKind::Data {
                pages.push(page);
            }
        }
        Ok(pages)
    }

    fn swap_page(&self) -> EngineResult<Option<usize>> {
        for page in 0..self.geometry.pages {
            if self.page_kind(page)? == PageKind::Swap {
                return Ok(Some(page));
            }
        }
        Ok(None)
    }

    /// Scans one page; returns every record slot (deleted included) and
    /// the word offset of the free tail.
    fn page_records(&self, page: usize) -> EngineResult<(Vec<RecordSlot>, usize)> {
        let base = self.geometry.page_base(page);
        let mut offset = PAGE_TAG_WORDS;
        let mut slots = Vec::new();

        while offset + RECORD_HEADER_WORDS <= self.geometry.page_size_words {
            let addr = base + offset;
            if self.read_word(addr)? == ERASED_WORD {
                break;
            }
            let header = self.read_header(addr)?;
            let length = usize::from(header.length_words);
            if offset + RECORD_HEADER_WORDS + length > self.geometry.page_size_words {
                break;
            }
            slots.push(RecordSlot { addr, header });
            offset += RECORD_HEADER_WORDS + length;
        }
        Ok((slots, offset))
    }

    fn locate_record(&self, id: RecordId) -> EngineResult<Option<RecordSlot>> {
        for page in self.data_pages()? {
            for slot in self.page_records(page)?.0 {
                if slot.header.record_id == id && !slot.header.is_deleted() {
                    return Ok(Some(slot));
                }
            }
        }
        Ok(None)
    }

    fn find_free_slot(&self, needed_words: usize) -> EngineResult<usize> {
        let mut largest_free = 0;
        for page in self.data_pages()? {
            let (_, end) = self.page_records(page)?;
            let free = self.geometry.page_size_words - end;
            if free >= needed_words {
                return Ok(self.geometry.page_base(page) + end);
            }
            largest_free = largest_free.max(free);
        }
        Err(EngineError::NoSpace {
            needed_words,
            available_words: largest_free,
        })
    }
}

fn validate_identity(key: RecordKey, file_id: FileId) -> EngineResult<()> {
    let key_value = key.as_u16();
    if key_value == crate::layout::RECORD_KEY_DIRTY || key_value == 0xFFFF {
        return Err(EngineError::InvalidKey { value: key_value });
    }
    if file_id.as_u16() == 0xFFFF {
        return Err(EngineError::InvalidFileId {
            value: file_id.as_u16(),
        });
    }
    Ok(())
}
