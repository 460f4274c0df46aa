//! Pool of persistent connections pulling jobs from a shared queue.
//!
//! Each worker owns one [`Connection`]. Workers take the next job from a
//! bounded queue, execute it, and on a transport failure pause, reconnect and
//! retry the job exactly once before answering. The pool can grow and shrink
//! at runtime; a removed worker finishes its current job and exits.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rcon_shared::Generation;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::commands::Command;
use crate::config::{ClientOptions, ServerConfig};
use crate::error::RconError;
use crate::transport::{Connection, ReadMode};

pub const QUEUE_CAPACITY: usize = 100;
/// Fixed pause before the single reconnect attempt.
pub const RETRY_PAUSE: Duration = Duration::from_millis(500);

pub type Reply = Result<String, RconError>;

/// A command plus the single-use slot its answer goes into.
pub struct Job {
    pub command: Command,
    pub reply: oneshot::Sender<Reply>,
}

impl Job {
    pub fn new(command: Command) -> (Self, oneshot::Receiver<Reply>) {
        let (reply, rx) = oneshot::channel();
        (Job { command, reply }, rx)
    }
}

/// Which queue a job goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Shared,
    /// The dedicated log worker, when one runs. Falls back to `Shared`.
    Log,
}

type JobReceiver = Arc<AsyncMutex<mpsc::Receiver<Job>>>;

struct Roster {
    next_id: u64,
    workers: BTreeMap<u64, CancellationToken>,
}

#[derive(Clone)]
struct WorkerContext {
    config: Arc<ServerConfig>,
    generation: Generation,
    legacy_preamble: bool,
    roster: Arc<Mutex<Roster>>,
}

pub struct WorkerPool {
    context: WorkerContext,
    jobs: mpsc::Sender<Job>,
    receiver: JobReceiver,
    log_jobs: Option<mpsc::Sender<Job>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Starts `options.workers` workers, plus the dedicated log worker when
    /// enabled. Workers connect in the background.
    pub fn start(
        config: Arc<ServerConfig>,
        options: &ClientOptions,
        shutdown: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        let (jobs, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let context = WorkerContext {
            config,
            generation: options.generation,
            legacy_preamble: options.legacy_preamble,
            roster: Arc::new(Mutex::new(Roster {
                next_id: 1,
                workers: BTreeMap::new(),
            })),
        };

        let log_jobs = if options.uses_fast_log_worker() {
            let (log_tx, log_rx) = mpsc::channel(QUEUE_CAPACITY);
            tracker.spawn(run_worker(
                context.clone(),
                0,
                ReadMode::FastUnsafe,
                Arc::new(AsyncMutex::new(log_rx)),
                shutdown.child_token(),
            ));
            info!("Dedicated log worker started");
            Some(log_tx)
        } else {
            None
        };

        let pool = WorkerPool {
            context,
            jobs,
            receiver: Arc::new(AsyncMutex::new(receiver)),
            log_jobs,
            shutdown,
            tracker,
        };
        pool.add_workers(options.workers);
        pool
    }

    /// Queues `job`, waiting for room when the queue is full.
    ///
    /// Log jobs go to the shared queue once the dedicated log worker is gone.
    pub async fn submit(&self, lane: Lane, job: Job) -> Result<(), RconError> {
        let job = match (lane, &self.log_jobs) {
            (Lane::Log, Some(log_jobs)) => match log_jobs.send(job).await {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(job)) => {
                    debug!("Log worker unavailable, queueing `{}` on the pool", job.command.name);
                    job
                }
            },
            _ => job,
        };
        self.jobs.send(job).await.map_err(|_| RconError::Closed)
    }

    pub fn worker_count(&self) -> usize {
        self.context.roster.lock().workers.len()
    }

    pub fn add_workers(&self, count: usize) {
        let mut roster = self.context.roster.lock();
        for _ in 0..count {
            let id = roster.next_id;
            roster.next_id += 1;
            let stop = self.shutdown.child_token();
            roster.workers.insert(id, stop.clone());
            self.tracker.spawn(run_worker(
                self.context.clone(),
                id,
                ReadMode::Safe,
                self.receiver.clone(),
                stop,
            ));
        }
        debug!("Pool now has {} workers", roster.workers.len());
    }

    /// Stops up to `count` workers, newest first. Returns how many were
    /// stopped.
    pub fn remove_workers(&self, count: usize) -> usize {
        let mut roster = self.context.roster.lock();
        let victims: Vec<u64> = roster.workers.keys().rev().take(count).copied().collect();
        for id in &victims {
            if let Some(stop) = roster.workers.remove(id) {
                stop.cancel();
            }
        }
        debug!("Pool now has {} workers", roster.workers.len());
        victims.len()
    }

    pub fn resize(&self, target: usize) {
        let current = self.worker_count();
        if target > current {
            self.add_workers(target - current);
        } else if target < current {
            self.remove_workers(current - target);
        }
    }
}

async fn run_worker(
    context: WorkerContext,
    id: u64,
    mode: ReadMode,
    jobs: JobReceiver,
    stop: CancellationToken,
) {
    let open = Connection::open(
        context.config.clone(),
        context.generation,
        context.legacy_preamble,
        mode,
    );
    let connection = tokio::select! {
        _ = stop.cancelled() => {
            context.roster.lock().workers.remove(&id);
            return;
        }
        connection = open => connection,
    };

    let mut connection = match connection {
        Ok(connection) => connection,
        Err(e) => {
            error!("Worker {} could not connect: {}", id, e);
            context.roster.lock().workers.remove(&id);
            return;
        }
    };
    debug!("Worker {} ready", id);

    loop {
        let job = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            job = next_job(&jobs) => match job {
                Some(job) => job,
                None => break,
            },
        };

        if job.reply.is_closed() {
            debug!("Worker {} skipping abandoned `{}`", id, job.command.name);
            continue;
        }

        let result = execute_with_retry(id, &mut connection, &job.command).await;
        // The caller may have given up already.
        let _ = job.reply.send(result);
    }

    context.roster.lock().workers.remove(&id);
    debug!("Worker {} stopped", id);
}

async fn next_job(jobs: &JobReceiver) -> Option<Job> {
    jobs.lock().await.recv().await
}

async fn execute_with_retry(
    id: u64,
    connection: &mut Connection,
    command: &Command,
) -> Reply {
    let err = match connection.execute(command).await {
        Ok(payload) => return Ok(payload),
        Err(e) if !e.is_transport() => return Err(e),
        Err(e) => e,
    };

    warn!(
        "Worker {}: `{}` failed ({}), reconnecting in {:?}",
        id, command.name, err, RETRY_PAUSE
    );
    tokio::time::sleep(RETRY_PAUSE).await;

    if let Err(e) = connection.reconnect().await {
        warn!("Worker {} could not reconnect: {}", id, e);
        return Err(e);
    }
    connection.execute(command).await
}
