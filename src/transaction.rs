use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::types::{Key, TxnId, Value};

/// All possible statuses of a transaction, from admission to terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// Not yet executed (or reset for a retry).
    Incomplete,
    /// The body finished and asked to commit; writes are not yet visible.
    CompletedCommit,
    /// The body finished and asked to abort.
    CompletedAbort,
    /// Terminal: writes applied and visible.
    Committed,
    /// Terminal: no visible write was made.
    Aborted,
}

impl TxnStatus {
    /// True for the two states a client can observe from `next_result`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxnStatus::Committed | TxnStatus::Aborted)
    }
}

/// Commit/abort decision returned by a transaction body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Commit,
    Abort,
}

/// The body's window onto its transaction: the reads the executor performed
/// for it, and the write buffer it fills in.
pub struct TxnView<'a> {
    pub reads: &'a BTreeMap<Key, Value>,
    pub writes: &'a mut BTreeMap<Key, Value>,
}

/// User-supplied transaction logic. Runs after the executor has populated the
/// read buffer; may run more than once if the protocol re-admits the
/// transaction after a validation failure.
pub type Body = Box<dyn FnMut(TxnView<'_>) -> Verdict + Send>;

/// A transaction descriptor. Read and write sets are declared up front; the
/// engine fills `reads` before the body runs and applies `writes` on commit.
///
/// Ownership moves into the processor on `submit` and back to the client on
/// `next_result`.
pub struct Transaction {
    id: TxnId,
    read_set: BTreeSet<Key>,
    write_set: BTreeSet<Key>,
    reads: BTreeMap<Key, Value>,
    writes: BTreeMap<Key, Value>,
    status: TxnStatus,
    /// Storage clock snapshot at execution start, used by forward validation.
    start_ts: u64,
    /// Committed-history length at execution start, used by backward validation.
    start_idx: usize,
    body: Body,
}

impl Transaction {
    pub fn new(
        read_set: impl IntoIterator<Item = Key>,
        write_set: impl IntoIterator<Item = Key>,
        body: Body,
    ) -> Self {
        Transaction {
            id: 0,
            read_set: read_set.into_iter().collect(),
            write_set: write_set.into_iter().collect(),
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            status: TxnStatus::Incomplete,
            start_ts: 0,
            start_idx: 0,
            body,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn status(&self) -> TxnStatus {
        self.status
    }

    pub fn read_set(&self) -> &BTreeSet<Key> {
        &self.read_set
    }

    pub fn write_set(&self) -> &BTreeSet<Key> {
        &self.write_set
    }

    /// Values the executor read for this transaction, keyed by key.
    pub fn reads(&self) -> &BTreeMap<Key, Value> {
        &self.reads
    }

    /// Values the body wrote. Only keys in the declared write set may appear.
    pub fn writes(&self) -> &BTreeMap<Key, Value> {
        &self.writes
    }

    pub(crate) fn set_id(&mut self, id: TxnId) {
        self.id = id;
    }

    pub(crate) fn set_status(&mut self, status: TxnStatus) {
        self.status = status;
    }

    pub(crate) fn start_ts(&self) -> u64 {
        self.start_ts
    }

    pub(crate) fn start_idx(&self) -> usize {
        self.start_idx
    }

    pub(crate) fn snapshot_start(&mut self, start_ts: u64, start_idx: usize) {
        self.start_ts = start_ts;
        self.start_idx = start_idx;
    }

    pub(crate) fn record_read(&mut self, key: Key, value: Value) {
        self.reads.insert(key, value);
    }

    /// Runs the body and records its verdict in the status field.
    pub(crate) fn run_body(&mut self) {
        let verdict = (self.body)(TxnView {
            reads: &self.reads,
            writes: &mut self.writes,
        });
        debug_assert!(
            self.writes.keys().all(|k| self.write_set.contains(k)),
            "body wrote outside its declared write set"
        );
        self.status = match verdict {
            Verdict::Commit => TxnStatus::CompletedCommit,
            Verdict::Abort => TxnStatus::CompletedAbort,
        };
    }

    /// Clears accumulated state so the transaction can be re-admitted under a
    /// fresh id after a validation failure.
    pub(crate) fn reset_for_retry(&mut self, id: TxnId) {
        self.reads.clear();
        self.writes.clear();
        self.status = TxnStatus::Incomplete;
        self.start_ts = 0;
        self.start_idx = 0;
        self.id = id;
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("read_set", &self.read_set)
            .field("write_set", &self.write_set)
            .finish_non_exhaustive()
    }
}
