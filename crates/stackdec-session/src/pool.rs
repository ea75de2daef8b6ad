use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::protocol::{Request, Response};
use crate::service::DecoderService;
use crate::ServiceError;

struct Job {
    request: Request,
    reply: mpsc::Sender<Response>,
}

/// Fixed set of worker threads answering requests against one service.
///
/// Workers pull jobs from a shared queue; readers run concurrently while a
/// writer request waits for the model lock like any other caller.
pub struct RequestPool {
    job_tx: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl RequestPool {
    pub fn new(service: Arc<DecoderService>, size: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let mut workers = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            let service = Arc::clone(&service);
            let job_rx = Arc::clone(&job_rx);
            let spawned = thread::Builder::new()
                .name(format!("stackdec-worker-{i}"))
                .spawn(move || worker(i, service, job_rx));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => error!(worker = i, error = %e, "failed to spawn worker"),
            }
        }
        Self {
            job_tx: Some(job_tx),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `request`; the response arrives on the returned channel.
    pub fn submit(&self, request: Request) -> Result<mpsc::Receiver<Response>, ServiceError> {
        let (reply, rx) = mpsc::channel();
        self.job_tx
            .as_ref()
            .ok_or(ServiceError::PoolClosed)?
            .send(Job { request, reply })
            .map_err(|_| ServiceError::PoolClosed)?;
        Ok(rx)
    }

    /// Queue `request` and wait for its response.
    pub fn call(&self, request: Request) -> Result<Response, ServiceError> {
        self.submit(request)?
            .recv()
            .map_err(|_| ServiceError::PoolClosed)
    }
}

impl Drop for RequestPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop.
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker(id: usize, service: Arc<DecoderService>, jobs: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let Ok(rx) = jobs.lock() else {
                error!(worker = id, "job queue lock poisoned");
                return;
            };
            match rx.recv() {
                Ok(job) => job,
                Err(_) => break,
            }
        };
        let write = job.request.is_write();
        debug!(worker = id, write, "handling request");
        let response = service.handle(job.request);
        let _ = job.reply.send(response);
    }
    debug!(worker = id, "worker stopped");
}
