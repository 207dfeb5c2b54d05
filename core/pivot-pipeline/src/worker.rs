//! FILENAME: core/pivot-pipeline/src/worker.rs
//! Offload channel abstraction and the worker-thread implementation.
//!
//! The pipeline owns its channel as an injected handle. `WorkerChannel`
//! runs the engine on a dedicated OS thread and speaks the JSON protocol
//! in `protocol`, so nothing but serialized text crosses the boundary.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use pivot_engine::{compute, log_debug, log_error, log_info};
use tokio::sync::{mpsc, oneshot};

use crate::error::PipelineError;
use crate::protocol::{self, WorkerResponse};

/// An isolated execution context that answers CALCULATE messages.
pub trait OffloadChannel: Send + Sync {
    fn is_available(&self) -> bool;

    /// Sends one encoded request. The receiver resolves with the encoded
    /// response, or errors if the context drops the request.
    fn submit(&self, payload: String) -> Result<oneshot::Receiver<String>, PipelineError>;
}

struct Job {
    payload: String,
    reply: oneshot::Sender<String>,
}

pub struct WorkerChannel {
    jobs: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WorkerChannel {
    pub fn open() -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let thread = thread::Builder::new()
            .name("pivot-offload".to_string())
            .spawn(move || run_worker(rx))
            .map_err(|e| PipelineError::Transport(format!("failed to start worker thread: {}", e)))?;
        log_info!("WORKER", "offload worker started");
        Ok(WorkerChannel { jobs: Mutex::new(Some(tx)), thread: Mutex::new(Some(thread)) })
    }

    /// Stops accepting requests and joins the worker once queued
    /// requests drain. Idempotent.
    pub fn close(&self) {
        let sender = lock(&self.jobs).take();
        drop(sender);
        if let Some(handle) = lock(&self.thread).take() {
            if handle.join().is_err() {
                log_error!("WORKER", "offload worker exited with a panic");
            }
        }
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl OffloadChannel for WorkerChannel {
    fn is_available(&self) -> bool {
        lock(&self.jobs).as_ref().map_or(false, |tx| !tx.is_closed())
    }

    fn submit(&self, payload: String) -> Result<oneshot::Receiver<String>, PipelineError> {
        let (reply, rx) = oneshot::channel();
        let jobs = lock(&self.jobs);
        let tx = jobs.as_ref().ok_or(PipelineError::Unavailable)?;
        tx.send(Job { payload, reply })
            .map_err(|_| PipelineError::Transport("worker thread has exited".to_string()))?;
        Ok(rx)
    }
}

fn run_worker(mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.blocking_recv() {
        let response = handle_request(&job.payload);
        if job.reply.send(response).is_err() {
            log_debug!("WORKER", "requester went away; response dropped");
        }
    }
    log_info!("WORKER", "offload worker stopped");
}

/// Answers one encoded request with an encoded response. Decode failures
/// and computation panics become ERROR responses.
pub fn handle_request(payload: &str) -> String {
    let response = match protocol::decode_request(payload) {
        Ok(request) => {
            let id = request.id;
            match compute(&request.config.records, request.config.pivot.as_config()) {
                Ok(result) => WorkerResponse::result(id, result),
                Err(e) => WorkerResponse::error(id, e.to_string()),
            }
        }
        Err(e) => WorkerResponse::error(protocol::peek_id(payload), e.to_string()),
    };
    protocol::encode_response(&response).unwrap_or_else(|e| {
        log_error!("WORKER", "failed to encode response {}: {}", response.id, e);
        String::new()
    })
}
