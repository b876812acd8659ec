//! Property tests for the record store API.

use nvrec_core::{FileId, RecordKey, RecordStore, StoreConfig, StoreResult};
use proptest::collection::vec;
use proptest::prelude::*;

proptest! {
    #[test]
    fn any_payload_round_trips(
        key in 1u16..0xFFFF,
        file_id in 0u16..0xFFFF,
        payload in vec(any::<u8>(), 1..=64),
    ) {
        let mut store = RecordStore::mount_fresh(&StoreConfig::new()).unwrap();
        let id = store
            .write(RecordKey::new(key), FileId::new(file_id), &payload)
            .unwrap();

        let view = store.get(id).unwrap();
        prop_assert_eq!(view.key, RecordKey::new(key));
        prop_assert_eq!(view.file_id, FileId::new(file_id));
        // Stored data is the payload plus zero padding to a word boundary.
        prop_assert_eq!(&view.data[..payload.len()], &payload[..]);
        prop_assert!(view.data[payload.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn traversal_tracks_the_live_set(deletions in vec(any::<bool>(), 8)) {
        let mut store = RecordStore::mount_fresh(&StoreConfig::new()).unwrap();
        let mut live = Vec::new();
        for (i, &delete) in deletions.iter().enumerate() {
            let id = store
                .write(RecordKey::new(1), FileId::new(1), &[i as u8])
                .unwrap();
            if delete {
                store.delete(id).unwrap();
            } else {
                live.push(id);
            }
        }

        let listed = store.iter().collect::<StoreResult<Vec<_>>>().unwrap();
        prop_assert_eq!(listed, live);
    }
}
