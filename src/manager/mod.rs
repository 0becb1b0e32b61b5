/*******************************************************************************
* Copyright 2020 Stefan Majewsky <majewsky@gmx.net>
* SPDX-License-Identifier: Apache-2.0
* Refer to the file "LICENSE" for details.
*******************************************************************************/

/*!
The manager is the coordinator of the whole system. It accepts console
connections on its TCP port, keeps the registry of declared sync pairs, and
drives all file transfers through a bounded worker pool:

```text
console ──> accept loop ──> command handler ──> registry
                                   │
                                   └──> orchestrator (LIST at source)
                                              │ one job per file
                                              v
                                    bounded job queue ──> N workers ──> transfer
```

The orchestrator enqueues jobs from the console handler thread, so a full
queue stalls the handler and thereby the console's `add` reply. That
backpressure is intentional: the console only learns that an `add`
succeeded once every resulting job has been accepted by the pool.

Shutdown (console command or signal) is graceful: the accept loop stops,
the queue rejects new jobs but drains the queued ones, and the manager only
exits after every worker has finished.
*/

use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::common::net::{self, PollingListener};
use crate::common::proto;
use crate::common::{signal, DirSpec, LogFile};

mod config;
mod console;
pub use console::*;
mod pool;
pub use pool::*;
mod registry;
pub use registry::*;
mod transfer;
pub use transfer::*;

#[cfg(test)]
mod tests;

///Startup parameters of the manager, straight from the command line.
#[derive(Clone, Debug)]
pub struct ManagerOptions {
    pub port: u16,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub logfile_path: PathBuf,
    pub config_path: PathBuf,
}

///The result of an `add` command, as reported to the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddResult {
    Added,
    AlreadyExists,
    Failed,
}

///The result of a `cancel` command, as reported to the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelResult {
    Stopped,
    NotSynchronized,
    Failed,
}

////////////////////////////////////////////////////////////////////////////////
// struct ManagerInner

///The state shared between the accept loop, the console handler threads
///and (through `Arc`s of its fields) the workers. There is no global
///manager instance: everything that needs this state receives it
///explicitly.
pub struct ManagerInner {
    registry: Arc<SyncRegistry>,
    queue: Arc<JobQueue>,
    log: Arc<LogFile>,
    shutdown: AtomicBool,
}

impl ManagerInner {
    ///True once shutdown has been requested, by console command or by a
    ///termination signal. All accept and receive loops poll this.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) || signal::received()
    }

    ///Raises the shutdown flag and wakes everyone blocked on the job
    ///queue. The accept loop observes the flag on its next poll.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.shutdown();
    }

    pub fn registry(&self) -> &SyncRegistry {
        &self.registry
    }

    ///Handles one `add` command (from the console or the config file).
    pub fn handle_add(&self, source_spec: &str, target_spec: &str) -> AddResult {
        let source: DirSpec = match source_spec.parse() {
            Ok(spec) => spec,
            Err(e) => {
                log::error!("add rejected: {}", e);
                return AddResult::Failed;
            }
        };
        let target: DirSpec = match target_spec.parse() {
            Ok(spec) => spec,
            Err(e) => {
                log::error!("add rejected: {}", e);
                return AddResult::Failed;
            }
        };

        match self.registry.add(source.clone(), target.clone()) {
            AddOutcome::AlreadyExists => {
                self.log.line(&format!("Already in queue: {}", source));
                return AddResult::AlreadyExists;
            }
            AddOutcome::Added => {}
        }

        //The entry stays registered even if the initial sync cannot start:
        //a later identical add still reports the duplicate, exactly as if
        //the LIST had succeeded with zero files.
        if let Err(e) = self.start_sync(&source, &target) {
            log::error!("initial sync for {} failed: {}", source, e);
            self.log.line(&format!("Failed to start sync for {}", source));
            return AddResult::Failed;
        }

        self.log.line(&format!("Started sync: {} -> {}", source, target));
        AddResult::Added
    }

    ///Handles one `cancel` command.
    pub fn handle_cancel(&self, source_spec: &str) -> CancelResult {
        let source: DirSpec = match source_spec.parse() {
            Ok(spec) => spec,
            Err(e) => {
                log::error!("cancel rejected: {}", e);
                return CancelResult::Failed;
            }
        };
        if self.registry.deactivate(&source) {
            self.log.line(&format!("Synchronization stopped for {}", source));
            CancelResult::Stopped
        } else {
            self.log
                .line(&format!("Directory not being synchronized: {}", source));
            CancelResult::NotSynchronized
        }
    }

    //The sync orchestrator: asks the source client for its file list and
    //turns every filename into one job. This runs on the caller's thread
    //and blocks on the queue when it is full; the resulting delay of the
    //console reply is the intended end-to-end backpressure.
    fn start_sync(&self, source: &DirSpec, target: &DirSpec) -> io::Result<()> {
        let mut stream = match net::dial(&source.endpoint) {
            Ok(stream) => stream,
            Err(e) => {
                self.log
                    .line(&format!("Failed to connect to source {}", source.endpoint));
                return Err(e);
            }
        };
        proto::write_list_request(&mut stream, &source.dir)?;
        let mut reader = BufReader::new(stream);
        let filenames = proto::read_list_response(&mut reader)?;

        for filename in filenames {
            let job = SyncJob {
                source: source.clone(),
                target: target.clone(),
                filename: filename.clone(),
            };
            match self.queue.push(job) {
                Ok(()) => self.log.line(&format!(
                    "Added file: {}/{}@{} -> {}/{}@{}",
                    source.dir, filename, source.endpoint, target.dir, filename, target.endpoint
                )),
                //only happens during shutdown; the job is released here and
                //the loss is on record
                Err(RejectedJob(_)) => self
                    .log
                    .line(&format!("Failed to enqueue job for file: {}", filename)),
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// struct Manager

///The manager process: owns the listener, the worker pool and the shared
///state. Constructed at startup, consumed by [`run()`](#method.run).
pub struct Manager {
    inner: Arc<ManagerInner>,
    listener: PollingListener,
    pool: WorkerPool,
}

impl Manager {
    ///Binds the console port, opens the log file and starts the workers.
    ///Failures here are startup failures; the caller exits nonzero.
    pub fn new(options: &ManagerOptions) -> io::Result<Manager> {
        let log = Arc::new(LogFile::create(&options.logfile_path)?);
        let listener = PollingListener::new(net::listen(options.port)?)?;

        let registry = Arc::new(SyncRegistry::new());
        let queue = Arc::new(JobQueue::new(options.queue_capacity));
        let engine = Arc::new(TransferEngine::new(registry.clone(), log.clone()));
        let pool = WorkerPool::new(options.worker_count, queue.clone(), engine)?;

        log.line(&format!(
            "manager initialized on port {} with {} workers",
            options.port, options.worker_count
        ));

        Ok(Manager {
            inner: Arc::new(ManagerInner {
                registry,
                queue,
                log,
                shutdown: AtomicBool::new(false),
            }),
            listener,
            pool,
        })
    }

    ///Applies the startup configuration file.
    pub fn load_config(&self, path: &Path) -> io::Result<()> {
        config::load(&self.inner, path)
    }

    ///Returns a copy of the currently registered sync pairs, for display.
    pub fn sync_pairs(&self) -> Vec<SyncPair> {
        self.inner.registry.snapshot()
    }

    ///Accepts console connections until shutdown is requested, then drains
    ///the worker pool and exits.
    pub fn run(mut self) -> io::Result<()> {
        log::info!("manager accepting console connections");
        let mut handlers = Vec::new();
        loop {
            let inner = self.inner.clone();
            match self.listener.accept(|| inner.shutdown_requested()) {
                Ok(None) => break,
                Ok(Some((stream, addr))) => {
                    log::info!("console connected from {}", addr);
                    let inner = self.inner.clone();
                    let handle = thread::Builder::new()
                        .name(format!("console-{}", addr))
                        .spawn(move || console::handle_connection(&inner, stream, addr))?;
                    handlers.push(handle);
                }
                Err(e) => {
                    log::error!("accept failed: {}", e);
                    break;
                }
            }
        }

        self.inner.log.line("Shutting down manager...");
        self.inner.log.line("Waiting for all active workers to finish.");
        self.pool.shutdown();
        self.inner.log.line("Processing remaining queued tasks.");
        self.pool.join();
        for handler in handlers {
            if handler.join().is_err() {
                log::error!("a console handler thread panicked");
            }
        }
        self.inner.log.line("Manager shutdown complete.");
        Ok(())
    }
}
