//! Optional background rendering: one engine per thread, behind a job queue.
//!
//! [`RenderWorker`] sits outside the core ownership graph. [`Library`],
//! documents, pages and their views are single-threaded and never start a
//! thread of their own; only spawning a worker does. Each worker runs a
//! complete [`Library`] on its thread and crosses the thread boundary with
//! owned bytes only:
//!
//! ```text
//! Caller thread(s)                         Worker thread
//!     |                                        |
//!     |--render() / submit()------------------>| jobs.recv()
//!     |   [jobs: bounded(queue_capacity)]       | open_document(bytes)
//!     |                                        | get_page(index).render()
//!     |                                        | dispose page, document
//!     |<--Result<RenderedBitmap> via reply-----|
//! ```
//!
//! No handle, page, or arena offset is ever sent. The engine itself is
//! built on the worker thread from a factory, so it need not be `Send`.
//!
//! ```
//! use vellum_doc::{RenderOptions, RenderWorker, WorkerConfig};
//! use vellum_test_utils::fixtures::{self, SAMPLE};
//!
//! let worker = RenderWorker::spawn(fixtures::engine, WorkerConfig::default())?;
//! let bitmap = worker.render(SAMPLE, None, 0, RenderOptions::new(8.0, 6.0))?;
//! assert_eq!((bitmap.width, bitmap.height), (8, 6));
//! # Ok::<(), vellum_core::Error>(())
//! ```

use std::fmt;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};
use vellum_core::{ConfigError, Disposable, Error, Result};
use vellum_engine::Engine;

use crate::config::WorkerConfig;
use crate::library::Library;
use crate::render::{RenderOptions, RenderedBitmap};

struct RenderJob {
    bytes: Vec<u8>,
    password: Option<String>,
    page_index: usize,
    options: RenderOptions,
    reply: Sender<Result<RenderedBitmap>>,
}

/// A pending reply from [`RenderWorker::submit`].
#[derive(Debug)]
pub struct RenderTicket {
    reply: Receiver<Result<RenderedBitmap>>,
}

impl RenderTicket {
    /// Block until the job has run.
    pub fn wait(self) -> Result<RenderedBitmap> {
        self.reply.recv().map_err(|_| worker_gone("wait"))?
    }

    /// The result, if the job has already run.
    pub fn try_wait(&self) -> Option<Result<RenderedBitmap>> {
        self.reply.try_recv().ok()
    }
}

/// A background thread owning its own engine.
pub struct RenderWorker {
    jobs: Option<Sender<RenderJob>>,
    thread: Option<JoinHandle<usize>>,
    name: String,
}

impl RenderWorker {
    /// Start a worker whose engine is built on the new thread by `factory`.
    ///
    /// Returns after the worker's library is initialised, so configuration
    /// and engine start-up errors surface here.
    pub fn spawn<F, E>(factory: F, config: WorkerConfig) -> Result<Self>
    where
        F: FnOnce() -> E + Send + 'static,
        E: Engine + 'static,
    {
        config.validate()?;
        let (job_tx, job_rx) = crossbeam_channel::bounded(config.queue_capacity);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let library_config = config.library;
        let name = config.thread_name;

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let library = match Library::new(factory(), library_config) {
                    Ok(library) => library,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return 0;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return 0;
                }
                serve(&library, &job_rx)
            })
            .map_err(|err| ConfigError::ThreadSpawnFailed {
                reason: err.to_string(),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(worker = %name, queue = config.queue_capacity, "render worker started");
                Ok(Self {
                    jobs: Some(job_tx),
                    thread: Some(thread),
                    name,
                })
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(worker_gone("spawn"))
            }
        }
    }

    /// Queue a job without waiting for it.
    ///
    /// Blocks only while the queue is full.
    pub fn submit(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        page_index: usize,
        options: RenderOptions,
    ) -> Result<RenderTicket> {
        let jobs = self.jobs.as_ref().ok_or_else(|| worker_gone("submit"))?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let job = RenderJob {
            bytes: bytes.to_vec(),
            password: password.map(str::to_owned),
            page_index,
            options,
            reply: reply_tx,
        };
        jobs.send(job).map_err(|_| worker_gone("submit"))?;
        Ok(RenderTicket { reply: reply_rx })
    }

    /// Render page `page_index` of `bytes` and wait for the result.
    pub fn render(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        page_index: usize,
        options: RenderOptions,
    ) -> Result<RenderedBitmap> {
        self.submit(bytes, password, page_index, options)?.wait()
    }

    /// Whether the worker still accepts jobs.
    pub fn is_running(&self) -> bool {
        self.jobs.is_some()
    }

    /// Close the queue, let queued jobs finish, and join the thread.
    ///
    /// Returns the number of jobs served. Idempotent.
    pub fn shutdown(&mut self) -> usize {
        self.jobs.take();
        let Some(thread) = self.thread.take() else {
            return 0;
        };
        match thread.join() {
            Ok(served) => {
                debug!(worker = %self.name, served, "render worker stopped");
                served
            }
            Err(_) => {
                warn!(worker = %self.name, "render worker panicked");
                0
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for RenderWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderWorker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

fn worker_gone(operation: &'static str) -> Error {
    Error::InvalidState {
        operation,
        state: "render worker stopped",
    }
}

/// Serve until every sender is gone. Returns the number of jobs run.
fn serve(library: &Library, jobs: &Receiver<RenderJob>) -> usize {
    let mut served = 0;
    for job in jobs.iter() {
        let result = run_job(library, &job);
        served += 1;
        if job.reply.send(result).is_err() {
            trace!(page = job.page_index, "render ticket dropped before reply");
        }
    }
    served
}

fn run_job(library: &Library, job: &RenderJob) -> Result<RenderedBitmap> {
    let document = library.open_document(&job.bytes, job.password.as_deref())?;
    let page = document.get_page(job.page_index)?;
    let bitmap = page.render(&job.options);
    page.dispose()?;
    drop(page);
    document.dispose()?;
    bitmap
}
