/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::common::DirSpec;

////////////////////////////////////////////////////////////////////////////////
// struct SyncJob

///One file's copy task. Jobs are immutable after creation and owned by
///exactly one place at a time: first the queue, then the worker that
///dequeued them. A job carries everything the transfer needs and no
///back-reference to its originating sync pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncJob {
    pub source: DirSpec,
    pub target: DirSpec,
    pub filename: String,
}

///Returned by [`JobQueue::push()`](struct.JobQueue.html) when the pool is
///shutting down. Carries the job back to the caller, which decides how to
///report the loss.
#[derive(Debug)]
pub struct RejectedJob(pub SyncJob);

////////////////////////////////////////////////////////////////////////////////
// struct JobQueue

struct QueueState {
    jobs: VecDeque<SyncJob>,
    shutdown: bool,
}

///The bounded FIFO buffer between the sync orchestrator (producer) and the
///workers (consumers).
///
///One mutex protects the queue and the shutdown flag; one condition
///variable per direction carries the not-empty and not-full signals. Both
///are broadcast on shutdown so every blocked producer and consumer
///re-examines the state.
pub struct JobQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> JobQueue {
        assert!(capacity > 0, "job queue capacity must be positive");
        JobQueue {
            state: Mutex::new(QueueState {
                jobs: VecDeque::with_capacity(capacity),
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    ///Appends a job, blocking while the queue is at capacity. Once shutdown
    ///has been signalled the job is handed back instead of enqueued, also
    ///when the call was already blocked at that moment.
    pub fn push(&self, job: SyncJob) -> Result<(), RejectedJob> {
        let mut state = self.state.lock().unwrap();
        while state.jobs.len() >= self.capacity && !state.shutdown {
            state = self.not_full.wait(state).unwrap();
        }
        if state.shutdown {
            return Err(RejectedJob(job));
        }
        state.jobs.push_back(job);
        self.not_empty.notify_one();
        Ok(())
    }

    ///Removes the oldest job, blocking while the queue is empty. After
    ///shutdown has been signalled, remaining jobs are still handed out so
    ///the queue drains completely; only then does this return None, telling
    ///the worker to exit.
    pub fn pop(&self) -> Option<SyncJob> {
        let mut state = self.state.lock().unwrap();
        while state.jobs.is_empty() && !state.shutdown {
            state = self.not_empty.wait(state).unwrap();
        }
        match state.jobs.pop_front() {
            Some(job) => {
                self.not_full.notify_one();
                Some(job)
            }
            None => None, //shutdown and drained
        }
    }

    ///Signals shutdown and wakes everyone blocked on the queue. Idempotent
    ///and non-blocking.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

////////////////////////////////////////////////////////////////////////////////
// trait JobRunner

///The work a worker performs per job. Implemented by the transfer engine;
///tests substitute recorders.
///
///Implementations must contain their own failures: whatever `run` could
///not accomplish has been logged by the time it returns, and the worker
///simply continues with the next job.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, worker_id: usize, job: SyncJob);
}

////////////////////////////////////////////////////////////////////////////////
// struct WorkerPool

///A fixed set of worker threads consuming a shared [JobQueue](struct.JobQueue.html).
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    ///Spawns `worker_count` workers on the given queue. Worker ids are the
    ///stable indices `0..worker_count`; they appear in transfer log lines.
    pub fn new<R: JobRunner>(
        worker_count: usize,
        queue: Arc<JobQueue>,
        runner: Arc<R>,
    ) -> io::Result<WorkerPool> {
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let queue = queue.clone();
            let runner = runner.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{}", worker_id))
                .spawn(move || {
                    log::debug!("worker {} started", worker_id);
                    while let Some(job) = queue.pop() {
                        runner.run(worker_id, job);
                    }
                    log::debug!("worker {} finished", worker_id);
                })?;
            workers.push(handle);
        }
        Ok(WorkerPool { queue, workers })
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    ///Signals the queue to shut down. Workers keep consuming until the
    ///queue has drained.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    ///Waits for every worker to exit. Callers signal `shutdown()` first,
    ///otherwise this blocks until someone else does.
    pub fn join(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("a worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    ///Dropping the pool is a graceful shutdown: remaining queued jobs are
    ///drained by the workers before they exit.
    fn drop(&mut self) {
        self.queue.shutdown();
        self.join();
    }
}
