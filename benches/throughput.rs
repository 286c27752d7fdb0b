use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use txnlab::{CCMode, ProcessorConfig, Transaction, TxnProcessor, TxnView, Verdict};

const TXNS: usize = 100;
const DB_SIZE: u64 = 100;
const WRITE_SET: usize = 5;

/// High-contention read-modify-write transaction: bumps a handful of random
/// keys in a small database, mirroring the contended half of the workload the
/// protocols are meant to differentiate on.
fn rmw_txn(rng: &mut impl Rng) -> Transaction {
    let mut keys = std::collections::BTreeSet::new();
    while keys.len() < WRITE_SET {
        keys.insert(rng.gen_range(0..DB_SIZE));
    }
    let write_keys = keys.clone();
    Transaction::new(
        keys.clone(),
        keys,
        Box::new(move |view: TxnView<'_>| {
            for &k in &write_keys {
                let v = view.reads.get(&k).copied().unwrap_or(0);
                view.writes.insert(k, v.wrapping_add(1));
            }
            Verdict::Commit
        }),
    )
}

fn bench_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("high_contention_rmw");
    group.throughput(Throughput::Elements(TXNS as u64));
    group.sample_size(10);

    for mode in CCMode::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, &mode| {
            b.iter(|| {
                let mut rng = rand::thread_rng();
                let processor = TxnProcessor::with_config(
                    mode,
                    ProcessorConfig {
                        workers: 8,
                        num_keys: DB_SIZE,
                    },
                );
                for _ in 0..TXNS {
                    processor.submit(rmw_txn(&mut rng));
                }
                for _ in 0..TXNS {
                    processor.next_result();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_modes);
criterion_main!(benches);
