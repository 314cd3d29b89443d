//! OrderedTaskQueue - FIFO queue drained by exactly one worker task

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::metrics::QueueMetrics;

/// Task body executed by the queue worker
///
/// The worker awaits each invocation to completion before popping the next
/// task, so implementations may keep unsynchronised mutable state.
pub trait TaskHandler<T>: Send {
    /// Failure type reported to the error callback or the log
    type Error: fmt::Display + Send;

    /// Process one task
    fn handle(&mut self, task: T) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Callback invoked with every handler failure
pub type ErrorCallback<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Builder for an OrderedTaskQueue
pub struct QueueBuilder<T, H: TaskHandler<T>> {
    name: String,
    handler: H,
    on_error: Option<ErrorCallback<H::Error>>,
    _task: PhantomData<fn(T)>,
}

impl<T, H> QueueBuilder<T, H>
where
    T: Send + 'static,
    H: TaskHandler<T> + 'static,
{
    /// Register a failure callback
    ///
    /// Without one, failures are logged at error level.
    pub fn on_error(mut self, callback: impl Fn(&H::Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Spawn the worker and return the queue handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> OrderedTaskQueue<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(QueueMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = self.name.clone();
        let handler = self.handler;
        let on_error = self.on_error;

        let worker_handle = tokio::spawn(async move {
            queue_worker(handler, rx, worker_metrics, on_error, worker_name).await;
        });

        OrderedTaskQueue {
            name: self.name,
            tx,
            metrics,
            worker_handle,
        }
    }
}

/// Handle to a running queue
pub struct OrderedTaskQueue<T> {
    /// Queue name (used for logging/metrics)
    name: String,
    /// Channel feeding the worker
    tx: mpsc::UnboundedSender<T>,
    /// Shared metrics
    metrics: Arc<QueueMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl<T: Send + 'static> OrderedTaskQueue<T> {
    /// Start building a queue around `handler`
    pub fn builder<H>(name: impl Into<String>, handler: H) -> QueueBuilder<T, H>
    where
        H: TaskHandler<T> + 'static,
    {
        QueueBuilder {
            name: name.into(),
            handler,
            on_error: None,
            _task: PhantomData,
        }
    }

    /// Spawn a queue that logs handler failures
    pub fn spawn<H>(name: impl Into<String>, handler: H) -> Self
    where
        H: TaskHandler<T> + 'static,
    {
        Self::builder(name, handler).spawn()
    }

    /// Get queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<QueueMetrics> {
        &self.metrics
    }

    /// Append a task to the tail of the queue
    ///
    /// Never blocks. If the worker is gone the task is dropped and logged.
    pub fn push(&self, task: T) {
        let pending = self.metrics.on_push();
        observability::record_queue_depth(&self.name, pending);

        if self.tx.send(task).is_err() {
            self.metrics.on_start();
            error!(queue = %self.name, "Queue worker stopped, task dropped");
        }
    }

    /// Stop accepting tasks, drain what was already pushed, then stop
    #[instrument(name = "ordered_task_queue_shutdown", skip(self), fields(queue = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop once drained
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(queue = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(queue = %self.name, "Queue shutdown complete");
    }
}

/// Worker task: pops one task at a time and awaits its handler
#[instrument(
    name = "ordered_task_queue_worker",
    skip(handler, rx, metrics, on_error),
    fields(queue = %name)
)]
async fn queue_worker<T, H>(
    mut handler: H,
    mut rx: mpsc::UnboundedReceiver<T>,
    metrics: Arc<QueueMetrics>,
    on_error: Option<ErrorCallback<H::Error>>,
    name: String,
) where
    H: TaskHandler<T>,
{
    debug!(queue = %name, "Queue worker started");

    while let Some(task) = rx.recv().await {
        let pending = metrics.on_start();
        observability::record_queue_depth(&name, pending);

        // A panicking handler counts as a failed task; the worker keeps going
        let outcome = AssertUnwindSafe(handler.handle(task)).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {
                metrics.inc_completed();
                observability::record_task_outcome(&name, true);
            }
            Ok(Err(e)) => {
                metrics.inc_failed();
                observability::record_task_outcome(&name, false);
                match &on_error {
                    Some(callback) => callback(&e),
                    None => error!(queue = %name, error = %e, "Task failed"),
                }
            }
            Err(panic) => {
                metrics.inc_failed();
                observability::record_task_outcome(&name, false);
                error!(queue = %name, panic = %panic_message(&*panic), "Task panicked");
            }
        }
    }

    debug!(queue = %name, "Queue worker stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
