use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::worker::job::Job;

/// Runs one dequeued job to completion. Implemented by the engine's runner.
pub trait JobHandler: Send + Sync {
    fn handle(&self, job: &Job);

    /// Called after `handle` returns or panics.
    fn finished(&self, job: &Job);
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool is shut down")]
    ChannelClosed,
}

/// Fixed set of OS threads fed by an unbounded channel.
///
/// Submitting never blocks; concurrency is bounded by the thread count.
pub struct WorkerPool {
    job_sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl WorkerPool {
    pub fn new(worker_count: usize, handler: Arc<dyn JobHandler>) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let worker_handler = Arc::clone(&handler);

            let spawned = thread::Builder::new()
                .name(format!("fileparse-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, job_rx, worker_handler));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => error!("Failed to spawn worker {}: {}", worker_id, e),
            }
        }

        info!("Started {} workers", workers.len());

        Self {
            job_sender: Mutex::new(Some(job_sender)),
            workers: Mutex::new(workers),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn submit(&self, job: Job) -> Result<(), PoolError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::ChannelClosed);
        }

        let sender = lock(&self.job_sender);
        match sender.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| PoolError::ChannelClosed),
            None => Err(PoolError::ChannelClosed),
        }
    }

    /// Stops accepting new jobs. Queued jobs still run.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!("Shutting down worker pool...");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn worker_count(&self) -> usize {
        lock(&self.workers).len()
    }

    /// Closes the queue and joins every worker once it has drained.
    pub fn wait(&self) {
        self.shutdown();
        // Drop sender to signal workers to exit
        lock(&self.job_sender).take();

        let workers: Vec<_> = lock(&self.workers).drain(..).collect();
        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers exit on their own once the queue disconnects.
        lock(&self.job_sender).take();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            warn!("Worker pool lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn run_worker(worker_id: usize, job_receiver: Receiver<Job>, handler: Arc<dyn JobHandler>) {
    debug!("Worker {} started", worker_id);

    for job in job_receiver.iter() {
        debug!(
            "Worker {} processing job {} (queued {:?})",
            worker_id,
            job.id,
            job.enqueued_at.elapsed()
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&job)));
        if outcome.is_err() {
            error!("Worker {} panicked while running job {}", worker_id, job.id);
        }
        handler.finished(&job);
    }

    debug!("Worker {} job channel disconnected", worker_id);
}
