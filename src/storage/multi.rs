use std::sync::{Mutex, MutexGuard};

use crate::types::{Key, TxnId, Value};

/// One entry in a version chain. Created by its writer; only `max_read_ts`
/// ever changes afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Version {
    value: Value,
    write_ts: TxnId,
    max_read_ts: TxnId,
}

impl Version {
    pub fn value(&self) -> Value {
        self.value
    }

    pub fn write_ts(&self) -> TxnId {
        self.write_ts
    }

    pub fn max_read_ts(&self) -> TxnId {
        self.max_read_ts
    }
}

/// Per-key version chain, newest first. `write_ts` is strictly decreasing
/// from head to tail and the chain never shrinks.
#[derive(Debug, Default)]
pub struct VersionChain {
    versions: Vec<Version>,
}

impl VersionChain {
    /// Returns the value of the newest version with `write_ts <= reader`.
    /// When that version is the head, the reader is recorded in its
    /// `max_read_ts`.
    pub fn read(&mut self, reader: TxnId) -> Option<Value> {
        let pos = self.versions.iter().position(|v| v.write_ts <= reader)?;
        if pos == 0 {
            let head = &mut self.versions[0];
            head.max_read_ts = head.max_read_ts.max(reader);
        }
        Some(self.versions[pos].value)
    }

    /// Timestamp-ordering write check: no reader newer than `writer` may have
    /// observed the head version.
    pub fn check_write_ts(&self, writer: TxnId) -> bool {
        self.versions
            .first()
            .map_or(true, |head| head.max_read_ts <= writer)
    }

    /// 2PL-over-MV write check: the head version must not be from the future.
    pub fn check_write_version(&self, writer: TxnId) -> bool {
        self.versions
            .first()
            .map_or(true, |head| head.write_ts <= writer)
    }

    /// Prepends `⟨value, writer, writer⟩`. Call only after the relevant check
    /// succeeded.
    pub fn write(&mut self, value: Value, writer: TxnId) {
        debug_assert!(
            self.versions.first().map_or(true, |h| h.write_ts < writer) || writer == 0,
            "version chain must stay strictly write_ts-descending"
        );
        self.versions.insert(
            0,
            Version {
                value,
                write_ts: writer,
                max_read_ts: writer,
            },
        );
    }

    pub fn head(&self) -> Option<&Version> {
        self.versions.first()
    }

    /// All versions, newest first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Multi-version storage: a dense table of version chains, one mutex per key.
/// The mutex protects both the chain structure and `max_read_ts`, so every
/// operation goes through the guard returned by [`lock`](Self::lock).
pub struct MultiVersionStorage {
    chains: Vec<Mutex<VersionChain>>,
}

impl MultiVersionStorage {
    /// Pre-initializes the dense key range `[0, num_keys)` with one version:
    /// value 0 written by transaction 0.
    pub fn new(num_keys: u64) -> Self {
        let chains = (0..num_keys)
            .map(|_| {
                let mut chain = VersionChain::default();
                chain.write(0, 0);
                Mutex::new(chain)
            })
            .collect();
        MultiVersionStorage { chains }
    }

    pub fn num_keys(&self) -> u64 {
        self.chains.len() as u64
    }

    /// Takes the per-key mutex. Holding the guard is what entitles the caller
    /// to read or grow the chain.
    pub fn lock(&self, key: Key) -> MutexGuard<'_, VersionChain> {
        self.chains[key as usize]
            .lock()
            .expect("Can't handle poisoned locks!")
    }
}
