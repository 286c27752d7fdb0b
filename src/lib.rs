//! In-memory transaction processor driving the same workload through nine
//! concurrency-control protocols: serial execution, strict 2PL (exclusive-only
//! and shared/exclusive), OCC with serial or parallel validation in forward
//! and backward flavors, MVCC timestamp ordering, and 2PL over multi-version
//! storage.
//!
//! Clients build a [`Transaction`] with declared read/write sets and a body,
//! submit it to a [`TxnProcessor`], and poll results:
//!
//! ```
//! use txnlab::{CCMode, ProcessorConfig, Transaction, TxnStatus, TxnView, Verdict, TxnProcessor};
//!
//! let mut processor = TxnProcessor::with_config(
//!     CCMode::LockingB,
//!     ProcessorConfig { workers: 4, num_keys: 64 },
//! );
//! processor.submit(Transaction::new([], [7], Box::new(|view: TxnView<'_>| {
//!     view.writes.insert(7, 42);
//!     Verdict::Commit
//! })));
//! let done = processor.next_result();
//! assert_eq!(done.status(), TxnStatus::Committed);
//! processor.shutdown();
//! ```

pub mod lock_manager;
pub mod processor;
pub mod storage;
pub mod transaction;
pub mod types;

mod history;
mod worker_pool;

pub use processor::{ProcessorConfig, TxnProcessor};
pub use transaction::{Body, Transaction, TxnStatus, TxnView, Verdict};
pub use types::{CCMode, Key, ModeParseError, TxnId, Value};
