//! Reading and writing individual record slots.

use crate::codec;
use crate::error::{LexiclassError, Result};
use crate::storage::Storage;
use crate::vectorizer::VectorizedRecord;

const SLOT_MAGIC: &[u8; 4] = b"LXVR";
const SLOT_VERSION: u32 = 1;

/// Storage name of the slot holding record `index`.
pub fn slot_name(index: usize) -> String {
    index.to_string()
}

/// Persist one vectorized record.
pub fn write_slot(storage: &dyn Storage, index: usize, record: &VectorizedRecord) -> Result<()> {
    let mut output = storage.create_output(&slot_name(index))?;
    codec::write_frame(&mut output, SLOT_MAGIC, SLOT_VERSION, record)?;
    output.close()
}

/// Load one vectorized record.
pub fn read_slot(storage: &dyn Storage, index: usize) -> Result<VectorizedRecord> {
    let mut input = storage.open_input(&slot_name(index))?;
    codec::read_frame(&mut input, SLOT_MAGIC, SLOT_VERSION)
        .map_err(|e| LexiclassError::data(format!("slot {index}: {e}")))
}

/// Count the slots of a dataset, checking they are exactly `0..N-1`.
pub fn count_slots(storage: &dyn Storage) -> Result<usize> {
    let mut indices: Vec<usize> = storage
        .list_files()?
        .iter()
        .filter_map(|name| name.parse().ok())
        .collect();
    indices.sort_unstable();

    for (expected, found) in indices.iter().enumerate() {
        if expected != *found {
            return Err(LexiclassError::data(format!(
                "dataset is missing slot {expected}"
            )));
        }
    }

    Ok(indices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_write_read_count() {
        let storage = MemoryStorage::new();
        for i in 0..3 {
            write_slot(&storage, i, &VectorizedRecord::new(vec![i as f64], vec![1.0])).unwrap();
        }

        assert_eq!(count_slots(&storage).unwrap(), 3);
        assert_eq!(read_slot(&storage, 2).unwrap().features, vec![2.0]);
    }

    #[test]
    fn test_gap_is_detected() {
        let storage = MemoryStorage::new();
        let record = VectorizedRecord::new(vec![], vec![]);
        write_slot(&storage, 0, &record).unwrap();
        write_slot(&storage, 2, &record).unwrap();

        assert!(count_slots(&storage).is_err());
    }

    #[test]
    fn test_corrupt_slot_is_data_error() {
        use std::io::Write;

        let storage = MemoryStorage::new();
        let mut output = storage.create_output("0").unwrap();
        output.write_all(b"garbage!").unwrap();
        output.close().unwrap();

        assert!(matches!(read_slot(&storage, 0), Err(LexiclassError::Data(_))));
    }
}
