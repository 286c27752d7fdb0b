use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::trace;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads executing transaction bodies. Workers
/// drain jobs until every sender is gone, then exit.
pub(crate) struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let workers = (0..size)
            .map(|i| {
                let receiver: Receiver<Job> = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("txnlab-worker-{i}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                        trace!(worker = i, "worker exiting");
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();
        WorkerPool {
            sender: Some(sender),
            workers,
        }
    }

    /// A handle the scheduler thread uses to dispatch work.
    pub fn sender(&self) -> Sender<Job> {
        self.sender
            .as_ref()
            .expect("worker pool already shut down")
            .clone()
    }

    /// Closes the job channel and joins every worker. In-flight jobs finish
    /// first.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            handle.join().expect("worker thread panicked");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
