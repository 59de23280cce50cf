//! # Bounded-concurrency background job pool.
//!
//! ```text
//! submit(job)
//!   ├─ Buffering ──► Vec<Job>                     (before start, unbounded)
//!   ├─ Running   ──► queue (mpsc, FIFO) ──► worker 1 ─┐
//!   │                                  ──► worker 2 ─┼─► job(resolver)
//!   │                                  ──► worker N ─┘     ├─ Err   → JobFailed
//!   │                                                      └─ panic → JobPanicked
//!   └─ Closed    ──► dropped, JobDropped
//!
//! start(resolver): buffer drained into the queue in submission order, buffer retired.
//! close():         queue sender dropped; workers exit once the queue is empty.
//! wait():          resolves after all N workers exited.
//! ```
//!
//! ## Rules
//! - At most `N` jobs run at once: each worker runs one job at a time.
//! - A failing or panicking job never takes its worker down.
//! - `submit` never blocks, in any phase.

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::task::TaskTracker;
use tracing::debug;

use super::lock;
use crate::container::Resolver;
use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::Job;

enum Phase {
    Buffering(Vec<Job>),
    Running(mpsc::UnboundedSender<Job>),
    Closed,
}

/// Fixed-size pool of job workers.
pub struct JobPool {
    workers: usize,
    phase: Mutex<Phase>,
    tracker: TaskTracker,
    bus: Bus,
}

impl JobPool {
    /// Creates a pool of `workers` workers (at least one). Nothing runs before [`start`](Self::start).
    pub fn new(workers: usize, bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            workers: workers.max(1),
            phase: Mutex::new(Phase::Buffering(Vec::new())),
            tracker: TaskTracker::new(),
            bus,
        })
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns a cloneable submitter.
    pub fn handle(self: &Arc<Self>) -> JobHandle {
        JobHandle {
            pool: Arc::clone(self),
        }
    }

    /// Buffers, queues or drops `job` depending on the pool phase.
    pub fn submit(&self, job: Job) {
        let mut phase = self.lock_phase();
        let rejected = match &mut *phase {
            Phase::Buffering(buffer) => {
                buffer.push(job);
                return;
            }
            Phase::Running(tx) => tx.send(job).is_err(),
            Phase::Closed => true,
        };
        drop(phase);
        if rejected {
            self.bus.publish(Event::new(EventKind::JobDropped));
        }
    }

    /// Spawns the workers and drains the buffer into the queue.
    ///
    /// Returns the number of buffered jobs handed over. Calling it again, or after
    /// [`close`](Self::close), does nothing.
    pub fn start(&self, resolver: Arc<dyn Resolver>) -> usize {
        let mut phase = self.lock_phase();
        let buffered = match &mut *phase {
            Phase::Buffering(buffer) => std::mem::take(buffer),
            Phase::Running(_) | Phase::Closed => return 0,
        };

        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let drained = buffered.len();
        for job in buffered {
            // receiver is alive, cannot fail
            let _ = tx.send(job);
        }
        *phase = Phase::Running(tx);
        drop(phase);

        let rx = Arc::new(AsyncMutex::new(rx));
        for worker in 0..self.workers {
            let rx = Arc::clone(&rx);
            let resolver = Arc::clone(&resolver);
            let bus = self.bus.clone();
            self.tracker.spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(job) = next else { break };
                    run_job(job, Arc::clone(&resolver), &bus).await;
                }
                debug!(worker, "job worker exited");
            });
        }
        debug!(workers = self.workers, drained, "job pool started");
        drained
    }

    /// Stops accepting jobs. Queued jobs still run; never-started buffers are dropped.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.lock_phase(), Phase::Closed);
        if let Phase::Buffering(buffer) = previous {
            for _ in buffer {
                self.bus.publish(Event::new(EventKind::JobDropped));
            }
        }
        self.tracker.close();
    }

    /// Resolves once the pool is closed and every worker exited.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    fn lock_phase(&self) -> std::sync::MutexGuard<'_, Phase> {
        lock(&self.phase)
    }
}

async fn run_job(job: Job, resolver: Arc<dyn Resolver>, bus: &Bus) {
    let fut = async move { job.call(resolver).await };
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            bus.publish(Event::new(EventKind::JobFailed).with_reason(format!("{err:#}")));
        }
        Err(panic) => {
            bus.publish(Event::new(EventKind::JobPanicked).with_reason(panic_message(panic.as_ref())));
        }
    }
}

/// Cloneable submitter bound into the resolver, so running components can queue work.
#[derive(Clone)]
pub struct JobHandle {
    pool: Arc<JobPool>,
}

impl JobHandle {
    /// Submits a job.
    pub fn submit(&self, job: Job) {
        self.pool.submit(job);
    }

    /// Submits a closure as a job.
    pub fn run<F, Fut>(&self, f: F)
    where
        F: FnOnce(Arc<dyn Resolver>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.pool.submit(Job::new(f));
    }
}
