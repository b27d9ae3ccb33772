//! Tokio-backed bounded worker pool.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use log::{debug, error};
use tokio::{runtime::Handle, sync::Semaphore, task};

use super::{Completion, TaskExecutor, Work, WorkOutcome};
use crate::error::{OrchestrationError, Result};

/// Worker pool running units of work on tokio's blocking threads.
///
/// At most `max_workers` units run at once; the rest wait for a permit in
/// submission order. Each unit's completion callback runs on the same worker
/// thread right after the work, while the permit is still held.
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_workers: usize,
    accepting: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Creates a stopped pool bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::Configuration` outside a tokio runtime
    /// and `OrchestrationError::InvalidInput` if `max_workers` is zero.
    pub fn new(max_workers: usize) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| OrchestrationError::Configuration {
            message: format!("Worker pool requires a tokio runtime: {e}"),
        })?;
        Self::with_handle(handle, max_workers)
    }

    /// Creates a stopped pool that spawns onto the given runtime.
    pub fn with_handle(handle: Handle, max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(OrchestrationError::invalid_input("max_workers")
                .with_reason("worker pool needs at least one worker"));
        }
        Ok(Self {
            handle,
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            accepting: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Accepted units whose callback has not returned yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for WorkerPool {
    fn start(&self) -> Result<()> {
        self.accepting.store(true, Ordering::SeqCst);
        debug!("Worker pool started with {} workers", self.max_workers);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.accepting.store(false, Ordering::SeqCst);
        debug!(
            "Worker pool stopped with {} units still in flight",
            self.in_flight()
        );
        Ok(())
    }

    fn submit(&self, task_id: String, work: Work, on_complete: Completion) -> Result<()> {
        if !self.is_running() {
            return Err(OrchestrationError::Executor {
                message: format!("worker pool is not running, rejected {task_id}"),
            });
        }

        let permits = Arc::clone(&self.permits);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);
        debug!("Queued unit of work {task_id}");

        self.handle.spawn(async move {
            let permit = permits.acquire_owned().await.ok();
            let joined = task::spawn_blocking(move || {
                let outcome = if permit.is_some() {
                    run_work(task_id, work)
                } else {
                    WorkOutcome::Failed {
                        task_id,
                        error: "worker pool shut down before the work started".to_string(),
                    }
                };
                on_complete(outcome);
                drop(permit);
            })
            .await;

            in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = joined {
                error!("Completion callback did not finish: {e}");
            }
        });

        Ok(())
    }
}

fn run_work(task_id: String, work: Work) -> WorkOutcome {
    let started = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(result)) => WorkOutcome::Succeeded {
            task_id,
            result,
            elapsed: started.elapsed(),
        },
        Ok(Err(error)) => WorkOutcome::Failed { task_id, error },
        Err(payload) => WorkOutcome::Failed {
            error: format!("unit of work panicked: {}", panic_message(payload.as_ref())),
            task_id,
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
