use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

use crate::error::DecodeError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Queued jobs allowed per worker before `execute` blocks the submitter.
const QUEUE_DEPTH_PER_WORKER: usize = 4;
/// Upper bound on the job channel; `bounded` allocates it up front.
const MAX_QUEUE_DEPTH: usize = 1024;

fn queue_depth(size: usize) -> usize {
    size.saturating_mul(QUEUE_DEPTH_PER_WORKER).min(MAX_QUEUE_DEPTH)
}

/// Fixed set of decode threads fed from one bounded job channel.
///
/// Dropping or shutting the pool down closes the channel; workers finish the
/// jobs already queued and are then joined.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, DecodeError> {
        if size == 0 {
            return Err(DecodeError::InvalidWorkerCount);
        }

        let (sender, receiver) = bounded::<Job>(queue_depth(size));
        let mut workers = Vec::with_capacity(size);

        for worker_idx in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("ctc-decode-{worker_idx}"))
                .spawn(move || {
                    for job in receiver.iter() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            log::error!("Decode worker {} recovered from a panicking job", worker_idx);
                        }
                    }
                    log::debug!("Decode worker {} exiting", worker_idx);
                });

            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    let mut partial = Self {
                        sender: Some(sender),
                        workers,
                    };
                    partial.shutdown();
                    return Err(DecodeError::Spawn(err));
                }
            }
        }

        log::debug!("Worker pool started with {} threads", size);
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender.is_none()
    }

    /// Queues `job`, blocking while the channel is full.
    pub fn execute<F>(&self, job: F) -> Result<(), DecodeError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(DecodeError::PoolShutDown)?;
        sender
            .send(Box::new(job))
            .map_err(|_| DecodeError::PoolShutDown)
    }

    /// Stops accepting jobs, lets the queue drain and joins every worker.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() && self.workers.is_empty() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Decode worker terminated abnormally");
            }
        }
        log::debug!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(DecodeError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn queue_depth_is_capped() {
        assert_eq!(queue_depth(2), 8);
        assert_eq!(queue_depth(usize::MAX), MAX_QUEUE_DEPTH);
        assert_eq!(queue_depth(MAX_QUEUE_DEPTH), MAX_QUEUE_DEPTH);
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(2).unwrap();
        for _ in 0..20 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert!(pool.is_shut_down());
    }

    #[test]
    fn execute_after_shutdown_fails() {
        let mut pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        assert!(matches!(
            pool.execute(|| {}),
            Err(DecodeError::PoolShutDown)
        ));
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(1).unwrap();
        pool.execute(|| panic!("boom")).unwrap();
        let c = counter.clone();
        pool.execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
