//! The fixed-size worker pool dispatcher.
//!
//! `submit` serializes a request envelope, registers the job id in the
//! pending table, and queues the bytes for the next idle worker; when every
//! worker is busy, jobs wait in the shared channel. A dedicated router
//! thread decodes worker replies and resolves the matching pending handle,
//! exactly once per job. The pool is the only component aware of worker
//! identity; the engine is stateless between jobs.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    task::{Context, Poll},
    thread,
};

use crossbeam_channel::Receiver;
use futures::ready;
use pin_project::pin_project;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    config::Config,
    message::{JobError, WorkerReply, WorkerRequest, WorkerResponse},
};

mod worker;

/// The outcome the router sends through a pending job's channel.
type JobResult = Result<WorkerResponse, JobError>;

/// In-flight jobs, keyed by correlation id.
type PendingJobs = Arc<Mutex<HashMap<u64, oneshot::Sender<JobResult>>>>;

/// Errors surfaced by [`WorkerPool::submit`] and [`JobHandle`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum PoolError {
    /// The pool has shut down before resolving the job.
    #[error("worker pool is shut down")]
    Closed,
    /// Another job with the same correlation id is still pending.
    #[error("a job with id {0} is already pending")]
    DuplicateJobId(u64),
    /// The worker reported a failure. Jobs are pure functions of their
    /// request, so an equivalent request may be retried.
    #[error(transparent)]
    Job(#[from] JobError),
}

/// The pending result of a submitted job.
///
/// Resolves exactly once: with the worker's response, with the worker's
/// reported failure, or with [`PoolError::Closed`] when the pool shuts
/// down first. Dropping the handle abandons interest in the result; the
/// job itself is not preempted. Deadlines belong to the caller, for
/// example with `tokio::time::timeout`.
#[pin_project]
#[derive(Debug)]
pub struct JobHandle {
    job_id: u64,
    #[pin]
    rx: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    /// The correlation id of the submitted job.
    pub fn job_id(&self) -> u64 {
        self.job_id
    }
}

impl Future for JobHandle {
    type Output = Result<WorkerResponse, PoolError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match ready!(this.rx.poll(cx)) {
            Ok(Ok(response)) => Poll::Ready(Ok(response)),
            Ok(Err(error)) => Poll::Ready(Err(PoolError::Job(error))),
            Err(_) => Poll::Ready(Err(PoolError::Closed)),
        }
    }
}

/// A fixed pool of decryption worker threads plus the reply router.
#[derive(Debug)]
pub struct WorkerPool {
    work_tx: Option<crossbeam_channel::Sender<Vec<u8>>>,
    pending: PendingJobs,
    next_job_id: AtomicU64,
    worker_threads: Vec<thread::JoinHandle<()>>,
    router_thread: Option<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `config.worker_count()` named worker threads and the router.
    pub fn spawn(config: &Config) -> Self {
        let worker_count = config.worker_count();
        let (work_tx, work_rx) = crossbeam_channel::unbounded();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let pending = PendingJobs::default();

        let worker_threads = (0..worker_count)
            .map(|index| {
                let work_rx = work_rx.clone();
                let reply_tx = reply_tx.clone();
                thread::Builder::new()
                    .name(format!("smelt-scan-worker-{index}"))
                    .spawn(move || worker::run(index, work_rx, reply_tx))
                    .expect("failed to spawn a worker thread")
            })
            .collect();

        // The router exits when the last worker drops its reply sender.
        drop(reply_tx);

        let router_thread = {
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("smelt-scan-router".to_string())
                .spawn(move || route(reply_rx, pending))
                .expect("failed to spawn the router thread")
        };

        debug!(workers = worker_count, "started decryption worker pool");

        Self {
            work_tx: Some(work_tx),
            pending,
            next_job_id: AtomicU64::new(0),
            worker_threads,
            router_thread: Some(router_thread),
        }
    }

    /// A fresh correlation id for [`submit`](Self::submit).
    pub fn next_job_id(&self) -> u64 {
        self.next_job_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Serialize `request` and queue it for the next idle worker.
    ///
    /// Returns without blocking on the job. The handle resolves when the
    /// router sees a reply carrying the request's job id; ids already
    /// pending are rejected so every handle is resolved exactly once, by
    /// exactly one router action.
    pub fn submit(&self, request: &WorkerRequest) -> Result<JobHandle, PoolError> {
        let job_id = request.job_id();
        let job = request.encode();

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.lock_pending();
            if pending.contains_key(&job_id) {
                return Err(PoolError::DuplicateJobId(job_id));
            }
            pending.insert(job_id, tx);
        }

        let sent = self
            .work_tx
            .as_ref()
            .expect("the work channel stays open until the pool is dropped")
            .send(job)
            .is_ok();
        if !sent {
            self.lock_pending().remove(&job_id);
            return Err(PoolError::Closed);
        }

        metrics::counter!("scan.jobs.queued", 1);
        debug!(job_id, "queued decryption job");

        Ok(JobHandle { job_id, rx })
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<JobResult>>> {
        self.pending
            .lock()
            .expect("a thread panicked while holding the pending jobs lock")
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the work channel lets the workers drain the queue and
        // exit; the router follows once the last reply sender drops.
        self.work_tx.take();

        for worker in self.worker_threads.drain(..) {
            let _ = worker.join();
        }
        if let Some(router) = self.router_thread.take() {
            let _ = router.join();
        }
    }
}

/// Resolve pending handles as worker replies arrive.
fn route(reply_rx: Receiver<Vec<u8>>, pending: PendingJobs) {
    for reply in reply_rx.iter() {
        let reply = match WorkerReply::decode(&reply) {
            Ok(reply) => reply,
            Err(error) => {
                warn!(%error, "dropping undecodable worker reply");
                continue;
            }
        };

        let job_id = reply.job_id();
        let sender = pending
            .lock()
            .expect("a thread panicked while holding the pending jobs lock")
            .remove(&job_id);
        let Some(sender) = sender else {
            warn!(job_id, "dropping reply for an unknown job");
            continue;
        };

        let outcome = match reply {
            WorkerReply::Response(response) => Ok(response),
            WorkerReply::Failed { error, .. } => Err(error),
        };
        // A send error means the caller dropped its handle.
        let _ = sender.send(outcome);
    }

    // Pool shutdown: jobs still pending will never get a reply, and
    // dropping their senders resolves the handles with `Closed`.
    let unresolved = {
        let mut pending = pending
            .lock()
            .expect("a thread panicked while holding the pending jobs lock");
        let count = pending.len();
        pending.clear();
        count
    };
    if unresolved > 0 {
        debug!(jobs = unresolved, "dropped unresolved jobs at shutdown");
    }

    debug!("router exiting: all workers finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::request::{DecryptNotesRequest, DecryptOptions};

    fn empty_request(job_id: u64) -> WorkerRequest {
        WorkerRequest::DecryptNotes(DecryptNotesRequest::new(
            Vec::new(),
            Vec::new(),
            DecryptOptions::default(),
            job_id,
        ))
    }

    #[tokio::test]
    async fn handles_resolve_closed_when_the_sender_is_dropped() {
        smelt_test::init();

        let (tx, rx) = oneshot::channel();
        let handle = JobHandle { job_id: 1, rx };
        drop(tx);

        assert_eq!(handle.await, Err(PoolError::Closed));
    }

    #[tokio::test]
    async fn handles_surface_worker_failures() {
        smelt_test::init();

        let (tx, rx) = oneshot::channel();
        let handle = JobHandle { job_id: 4, rx };
        tx.send(Err(JobError::new("engine exploded")))
            .expect("handle still holds the receiver");

        assert_eq!(
            handle.await,
            Err(PoolError::Job(JobError::new("engine exploded"))),
        );
    }

    #[test]
    fn duplicate_job_ids_are_rejected() {
        smelt_test::init();

        let pool = WorkerPool::spawn(&Config { workers: Some(1) });

        // Occupy the id without involving a worker.
        let (tx, _rx) = oneshot::channel();
        pool.lock_pending().insert(7, tx);

        let result = pool.submit(&empty_request(7));
        assert!(matches!(result, Err(PoolError::DuplicateJobId(7))));
    }

    #[test]
    fn job_ids_are_handed_out_sequentially() {
        smelt_test::init();

        let pool = WorkerPool::spawn(&Config { workers: Some(1) });
        let first = pool.next_job_id();
        let second = pool.next_job_id();
        assert_ne!(first, second);
    }
}
