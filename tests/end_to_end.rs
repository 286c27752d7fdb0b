use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use txnlab::{
    CCMode, ProcessorConfig, Transaction, TxnProcessor, TxnStatus, TxnView, Verdict,
};

fn small_config() -> ProcessorConfig {
    ProcessorConfig {
        workers: 4,
        num_keys: 32,
    }
}

/// Read-modify-write on a single key: `k := k + 1`.
fn increment_txn(key: u64) -> Transaction {
    Transaction::new(
        [key],
        [key],
        Box::new(move |view: TxnView<'_>| {
            let v = view.reads.get(&key).copied().unwrap_or(0);
            view.writes.insert(key, v.wrapping_add(1));
            Verdict::Commit
        }),
    )
}

/// Moves one unit from `a` to `b`; the wrapping sum over all keys is
/// invariant under any serializable interleaving.
fn transfer_txn(a: u64, b: u64) -> Transaction {
    Transaction::new(
        [a, b],
        [a, b],
        Box::new(move |view: TxnView<'_>| {
            let va = view.reads.get(&a).copied().unwrap_or(0);
            let vb = view.reads.get(&b).copied().unwrap_or(0);
            view.writes.insert(a, va.wrapping_sub(1));
            view.writes.insert(b, vb.wrapping_add(1));
            Verdict::Commit
        }),
    )
}

fn read_txn(keys: impl IntoIterator<Item = u64>) -> Transaction {
    Transaction::new(keys, [], Box::new(|_: TxnView<'_>| Verdict::Commit))
}

fn collect(processor: &TxnProcessor, n: usize) -> Vec<Transaction> {
    (0..n).map(|_| processor.next_result()).collect()
}

/// Runs a read-only transaction to completion and returns what it saw.
fn observe(processor: &TxnProcessor, keys: &[u64]) -> Vec<u64> {
    processor.submit(read_txn(keys.iter().copied()));
    let result = processor.next_result();
    assert_eq!(result.status(), TxnStatus::Committed);
    keys.iter()
        .map(|k| result.reads().get(k).copied().expect("key is pre-initialized"))
        .collect()
}

#[test]
fn serial_preserves_submission_order() {
    let mut processor = TxnProcessor::with_config(CCMode::Serial, small_config());

    processor.submit(Transaction::new(
        [],
        [5],
        Box::new(|view: TxnView<'_>| {
            view.writes.insert(5, 100);
            Verdict::Commit
        }),
    ));
    processor.submit(read_txn([5]));

    let first = processor.next_result();
    let second = processor.next_result();
    assert_eq!(first.status(), TxnStatus::Committed);
    assert_eq!(second.status(), TxnStatus::Committed);
    assert!(first.id() < second.id());
    // The writer committed before the reader was dispatched.
    assert_eq!(second.reads().get(&5), Some(&100));

    processor.shutdown();
}

#[test]
fn every_mode_serializes_increments_on_one_key() {
    const N: usize = 12;
    for mode in CCMode::ALL {
        let processor = TxnProcessor::with_config(mode, small_config());
        for _ in 0..N {
            processor.submit(increment_txn(0));
        }
        let results = collect(&processor, N);
        for txn in &results {
            assert_eq!(txn.status(), TxnStatus::Committed, "mode {mode}");
        }
        let seen = observe(&processor, &[0]);
        assert_eq!(seen, vec![N as u64], "mode {mode}");
    }
}

#[test]
fn every_mode_preserves_the_sum_under_contention() {
    const N: usize = 20;
    const KEYS: u64 = 8;
    let mut rng = rand::thread_rng();
    for mode in CCMode::ALL {
        let processor = TxnProcessor::with_config(mode, small_config());
        for _ in 0..N {
            let a = rng.gen_range(0..KEYS);
            let b = (a + rng.gen_range(1..KEYS)) % KEYS;
            processor.submit(transfer_txn(a, b));
        }
        let results = collect(&processor, N);
        assert!(
            results.iter().all(|t| t.status() == TxnStatus::Committed),
            "mode {mode}"
        );
        let all_keys: Vec<u64> = (0..KEYS).collect();
        let values = observe(&processor, &all_keys);
        let sum = values.iter().fold(0u64, |acc, v| acc.wrapping_add(*v));
        assert_eq!(sum, 0, "mode {mode}: transfers must not create or lose units");
    }
}

#[test]
fn empty_read_and_write_sets_commit_everywhere() {
    for mode in CCMode::ALL {
        let processor = TxnProcessor::with_config(mode, small_config());
        processor.submit(Transaction::new([], [], Box::new(|_: TxnView<'_>| Verdict::Commit)));
        let result = processor.next_result();
        assert_eq!(result.status(), TxnStatus::Committed, "mode {mode}");
    }
}

#[test]
fn body_abort_is_terminal_and_leaves_no_trace() {
    for mode in CCMode::ALL {
        let processor = TxnProcessor::with_config(mode, small_config());
        processor.submit(Transaction::new(
            [],
            [9],
            Box::new(|view: TxnView<'_>| {
                view.writes.insert(9, 123);
                Verdict::Abort
            }),
        ));
        let result = processor.next_result();
        assert_eq!(result.status(), TxnStatus::Aborted, "mode {mode}");

        let seen = observe(&processor, &[9]);
        assert_eq!(seen, vec![0], "mode {mode}: aborted write must stay invisible");
    }
}

#[test]
fn admission_ids_strictly_increase() {
    let processor = TxnProcessor::with_config(CCMode::Serial, small_config());
    assert_eq!(processor.mode(), CCMode::Serial);
    assert!(processor.try_next_result().is_none());
    let mut last = 0;
    for _ in 0..5 {
        let id = processor.submit(increment_txn(1));
        assert!(id > last);
        last = id;
    }
    let mut seen = 0;
    while seen < 5 {
        if processor.try_next_result().is_some() {
            seen += 1;
        }
    }
}

#[test]
fn locking_b_reader_sees_earlier_writers_value() {
    // The writer is admitted first, so the reader's shared request queues
    // behind the exclusive lock and can only read committed state.
    let processor = TxnProcessor::with_config(CCMode::LockingB, small_config());
    processor.submit(Transaction::new(
        [],
        [7],
        Box::new(|view: TxnView<'_>| {
            view.writes.insert(7, 99);
            Verdict::Commit
        }),
    ));
    processor.submit(read_txn([7]));

    let mut reader = None;
    for txn in collect(&processor, 2) {
        assert_eq!(txn.status(), TxnStatus::Committed);
        if !txn.read_set().is_empty() {
            reader = Some(txn);
        }
    }
    assert_eq!(reader.expect("reader finished").reads().get(&7), Some(&99));
}

#[test]
fn mv2pl_reads_cover_write_only_keys() {
    // Key 3 is only in the write set; the executor must still hand its
    // current value to the body, or the increment below would clobber the
    // seeded 7 with 1.
    let processor = TxnProcessor::with_config(CCMode::Mvcc2pl, small_config());
    processor.submit(Transaction::new(
        [],
        [3],
        Box::new(|view: TxnView<'_>| {
            view.writes.insert(3, 7);
            Verdict::Commit
        }),
    ));
    assert_eq!(processor.next_result().status(), TxnStatus::Committed);

    processor.submit(Transaction::new(
        [],
        [3],
        Box::new(|view: TxnView<'_>| {
            let v = view.reads.get(&3).copied().unwrap_or(0);
            view.writes.insert(3, v.wrapping_add(1));
            Verdict::Commit
        }),
    ));
    assert_eq!(processor.next_result().status(), TxnStatus::Committed);

    let seen = observe(&processor, &[3]);
    assert_eq!(seen, vec![8]);
}

#[test]
fn mixed_random_workload_reaches_terminal_state_everywhere() {
    const N: usize = 30;
    const KEYS: u64 = 12;
    let mut rng = rand::thread_rng();
    let keys: Vec<u64> = (0..KEYS).collect();
    for mode in CCMode::ALL {
        let processor = TxnProcessor::with_config(mode, small_config());
        for _ in 0..N {
            let read_keys: BTreeSet<u64> =
                keys.choose_multiple(&mut rng, 3).copied().collect();
            let write_keys: BTreeSet<u64> =
                keys.choose_multiple(&mut rng, 2).copied().collect();
            let ws = write_keys.clone();
            processor.submit(Transaction::new(
                read_keys,
                write_keys,
                Box::new(move |view: TxnView<'_>| {
                    for &k in &ws {
                        let v = view.reads.get(&k).copied().unwrap_or(0);
                        view.writes.insert(k, v.wrapping_add(1));
                    }
                    Verdict::Commit
                }),
            ));
        }
        let results = collect(&processor, N);
        assert_eq!(results.len(), N);
        assert!(
            results.iter().all(|t| t.status().is_terminal()),
            "mode {mode}"
        );
    }
}
