//! On-flash layout: page tags, record headers, and checksums.
//!
//! Every page opens with a two-word tag. The data tag is the swap tag
//! with one additional bit cleared, so promoting the swap page to a
//! data page after garbage collection is a plain program on NOR flash
//! (programming can only clear bits).
//!
//! Records are a three-word header followed by word-padded data:
//!
//! ```text
//! word 0: record key (high 16) | length in words (low 16)
//! word 1: file id    (high 16) | CRC16           (low 16)
//! word 2: record id
//! ```
//!
//! A record is deleted by programming the key half-word to zero, which
//! again only clears bits. Data is programmed before the header, so a
//! record only becomes visible once its header lands.

use nvrec_media::WORD_BYTES;

use crate::types::{FileId, RecordId, RecordKey};

/// Words occupied by the page tag.
pub const PAGE_TAG_WORDS: usize = 2;

/// First tag word: identifies a page formatted by this store.
pub const PAGE_TAG_MAGIC: u32 = 0x4E56_5245;

/// Second tag word of the swap page.
pub const PAGE_TAG_SWAP: u32 = 0x0000_F1FF;

/// Second tag word of a data page. Equal to the swap tag with one more
/// bit cleared, so swap pages promote in place.
pub const PAGE_TAG_DATA: u32 = 0x0000_F1FE;

/// Words occupied by a record header.
pub const RECORD_HEADER_WORDS: usize = 3;

/// Key half-word value marking a deleted record.
pub const RECORD_KEY_DIRTY: u16 = 0;

/// Word programmed over header word 0 to delete a record: clears the
/// key half-word, preserves the length half-word.
pub const DIRTY_MASK_WORD: u32 = 0x0000_FFFF;

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record key; [`RECORD_KEY_DIRTY`] if the record was deleted.
    pub key: RecordKey,
    /// Length of the record data, in words.
    pub length_words: u16,
    /// File the record belongs to.
    pub file_id: FileId,
    /// CRC16 over the record identity and data.
    pub crc: u16,
    /// Record identifier.
    pub record_id: RecordId,
}

impl RecordHeader {
    /// Decodes a header from its three on-flash words.
    #[must_use]
    pub fn from_words(words: [u32; 3]) -> Self {
        Self {
            key: RecordKey::new((words[0] >> 16) as u16),
            length_words: (words[0] & 0xFFFF) as u16,
            file_id: FileId::new((words[1] >> 16) as u16),
            crc: (words[1] & 0xFFFF) as u16,
            record_id: RecordId::new(words[2]),
        }
    }

    /// Encodes the header into its three on-flash words.
    #[must_use]
    pub fn to_words(&self) -> [u32; 3] {
        [
            (u32::from(self.key.as_u16()) << 16) | u32::from(self.length_words),
            (u32::from(self.file_id.as_u16()) << 16) | u32::from(self.crc),
            self.record_id.as_u32(),
        ]
    }

    /// Returns `true` if the key half-word marks this record deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.key.as_u16() == RECORD_KEY_DIRTY
    }
}

/// Serializes words into the little-endian byte stream the media takes.
#[must_use]
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * WORD_BYTES);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

/// Computes a CRC16 (CCITT polynomial) over `data`.
#[must_use]
pub fn compute_crc16(data: &[u8]) -> u16 {
    const CRC16_TABLE: [u16; 256] = {
        let mut table = [0u16; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = (i as u16) << 8;
            let mut j = 0;
            while j < 8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ 0x1021;
                } else {
                    crc <<= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_u16;
    for &byte in data {
        let index = (((crc >> 8) ^ u16::from(byte)) & 0xFF) as usize;
        crc = (crc << 8) ^ CRC16_TABLE[index];
    }
    crc
}

/// Computes the CRC stored in a record header: identity fields first,
/// then the word-padded data.
#[must_use]
pub fn record_crc(
    key: RecordKey,
    length_words: u16,
    file_id: FileId,
    record_id: RecordId,
    data: &[u8],
) -> u16 {
    let mut buf = Vec::with_capacity(10 + data.len());
    buf.extend_from_slice(&key.as_u16().to_le_bytes());
    buf.extend_from_slice(&length_words.to_le_bytes());
    buf.extend_from_slice(&file_id.as_u16().to_le_bytes());
    buf.extend_from_slice(&record_id.as_u32().to_le_bytes());
    buf.extend_from_slice(data);
    compute_crc16(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_word_round_trip() {
        let header = RecordHeader {
            key: RecordKey::new(100),
            length_words: 4,
            file_id: FileId::new(6),
            crc: 0xBEEF,
            record_id: RecordId::new(42),
        };
        assert_eq!(RecordHeader::from_words(header.to_words()), header);
    }

    #[test]
    fn data_tag_is_programmable_from_swap_tag() {
        // Promotion must be expressible as a bit-clearing program.
        assert_eq!(PAGE_TAG_SWAP & PAGE_TAG_DATA, PAGE_TAG_DATA);
        assert_ne!(PAGE_TAG_SWAP, PAGE_TAG_DATA);
    }

    #[test]
    fn dirty_mask_clears_key_keeps_length() {
        let header = RecordHeader {
            key: RecordKey::new(100),
            length_words: 7,
            file_id: FileId::new(6),
            crc: 0,
            record_id: RecordId::new(1),
        };
        let dirtied = RecordHeader::from_words([
            header.to_words()[0] & DIRTY_MASK_WORD,
            header.to_words()[1],
            header.to_words()[2],
        ]);
        assert!(dirtied.is_deleted());
        assert_eq!(dirtied.length_words, 7);
        assert_eq!(dirtied.record_id, RecordId::new(1));
    }

    #[test]
    fn crc16_known_vector() {
        // CCITT-FALSE check value for "123456789".
        assert_eq!(compute_crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn record_crc_changes_with_data() {
        let a = record_crc(
            RecordKey::new(1),
            1,
            FileId::new(2),
            RecordId::new(3),
            &[0xAA, 0xBB, 0x00, 0x00],
        );
        let b = record_crc(
            RecordKey::new(1),
            1,
            FileId::new(2),
            RecordId::new(3),
            &[0xAA, 0xCC, 0x00, 0x00],
        );
        assert_ne!(a, b);
    }

    #[test]
    fn words_to_bytes_is_little_endian() {
        assert_eq!(
            words_to_bytes(&[0x0102_0304]),
            vec![0x04, 0x03, 0x02, 0x01]
        );
    }

    proptest::proptest! {
        #[test]
        fn table_crc_matches_bitwise_reference(data in proptest::collection::vec(
            proptest::prelude::any::<u8>(),
            0..128,
        )) {
            let mut crc = 0xFFFF_u16;
            for &byte in &data {
                crc ^= u16::from(byte) << 8;
                for _ in 0..8 {
                    crc = if crc & 0x8000 != 0 {
                        (crc << 1) ^ 0x1021
                    } else {
                        crc << 1
                    };
                }
            }
            proptest::prop_assert_eq!(compute_crc16(&data), crc);
        }
    }
}
