use std::sync::atomic::{AtomicU64, Ordering::SeqCst};

use dashmap::DashMap;

use crate::types::{Key, TxnId, Value};

#[derive(Debug, Clone, Copy)]
struct Record {
    value: Value,
    writer: TxnId,
    /// Logical clock tick of the write. Forward validation compares these
    /// against the clock snapshot a transaction took at execution start.
    tick: u64,
}

/// Single-version key/value storage: Key → (value, last writer, write tick).
///
/// The calling protocol serializes conflicting writes; the map only has to
/// keep concurrent readers and the committing writer from tearing each other,
/// which entry-level locking covers.
pub struct SingleVersionStorage {
    data: DashMap<Key, Record>,
    clock: AtomicU64,
    num_keys: u64,
}

impl SingleVersionStorage {
    /// Pre-initializes the dense key range `[0, num_keys)` to value 0,
    /// written by transaction 0 at tick 0.
    pub fn new(num_keys: u64) -> Self {
        let data = DashMap::with_capacity(num_keys as usize);
        for key in 0..num_keys {
            data.insert(
                key,
                Record {
                    value: 0,
                    writer: 0,
                    tick: 0,
                },
            );
        }
        SingleVersionStorage {
            data,
            clock: AtomicU64::new(0),
            num_keys,
        }
    }

    pub fn num_keys(&self) -> u64 {
        self.num_keys
    }

    pub fn read(&self, key: Key) -> Option<Value> {
        self.data.get(&key).map(|r| r.value)
    }

    /// Unconditionally overwrites `key`, recording the writer and stamping the
    /// write with the next clock tick.
    pub fn write(&self, key: Key, value: Value, writer: TxnId) {
        let tick = self.clock.fetch_add(1, SeqCst) + 1;
        self.data.insert(
            key,
            Record {
                value,
                writer,
                tick,
            },
        );
    }

    /// Clock tick of the last write to `key`; 0 if never written since init.
    pub fn timestamp(&self, key: Key) -> u64 {
        self.data.get(&key).map(|r| r.tick).unwrap_or(0)
    }

    /// Id of the transaction that last wrote `key`.
    pub fn last_writer(&self, key: Key) -> Option<TxnId> {
        self.data.get(&key).map(|r| r.writer)
    }

    /// Current clock value. A transaction snapshots this at execution start;
    /// any write applied afterwards carries a strictly larger tick.
    pub fn clock(&self) -> u64 {
        self.clock.load(SeqCst)
    }
}
