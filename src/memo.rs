use std::collections::HashMap;

use crate::error::DecodeError;
use crate::value::Value;

/// Per-decode reference table.
///
/// Keys come from the stream (the producer assigns them), so they are
/// sparse and may be large; a map rather than a vector keeps a single
/// `LONG_BINPUT 0x04030201` from allocating millions of slots. Stored values
/// are cheap: heap objects are ids, so fetching the same key twice yields the
/// same object rather than a copy.
#[derive(Debug, Default)]
pub struct MemoTable {
    entries: HashMap<u64, Value>,
    max_entries: usize,
}

impl MemoTable {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `value` under `key`, replacing any earlier entry.
    pub fn store(&mut self, key: u64, value: Value, offset: usize) -> Result<(), DecodeError> {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            return Err(DecodeError::malformed(
                offset,
                format!("memo exceeds maximum of {} entries", self.max_entries),
            ));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn fetch(&self, key: u64) -> Result<Value, DecodeError> {
        self.entries
            .get(&key)
            .cloned()
            .ok_or(DecodeError::InvalidMemoKey(key))
    }
}
