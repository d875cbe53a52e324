//! Relay coordinator: owns the queue, the dispatcher and every listener.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::DeviceDirectory;
use crate::dispatch::Dispatcher;
use crate::lifecycle::Shutdown;
use crate::listener::{Listener, RequestQueue};
use crate::observability::metrics;
use crate::wol::WakeSender;

/// Default bounded wait for tasks to finish after cancellation.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Default request queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every task finished within the grace period.
    Graceful,
    /// The grace period elapsed first; remaining tasks were abandoned.
    TimedOut,
}

/// A relay that has not been started yet.
pub struct Relay {
    directory: Option<Arc<DeviceDirectory>>,
    sender: Arc<dyn WakeSender>,
    listeners: Vec<Arc<dyn Listener>>,
    queue_capacity: usize,
    grace: Duration,
}

impl Relay {
    pub fn new(
        directory: Option<Arc<DeviceDirectory>>,
        sender: Arc<dyn WakeSender>,
        queue_capacity: usize,
        grace: Duration,
    ) -> Self {
        Self {
            directory,
            sender,
            listeners: Vec::new(),
            queue_capacity: queue_capacity.max(1),
            grace,
        }
    }

    /// Register a listener to be started with the relay.
    pub fn with_listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Spawn the dispatcher and every registered listener.
    pub fn start(self) -> RunningRelay {
        let shutdown = Shutdown::new();
        let (queue, receiver) = mpsc::channel(self.queue_capacity);
        let mut handles = Vec::with_capacity(self.listeners.len() + 1);

        let dispatcher = Dispatcher::new(self.directory, self.sender);
        handles.push(tokio::spawn(dispatcher.run(receiver, shutdown.token())));

        for listener in &self.listeners {
            handles.push(spawn_listener(
                listener.clone(),
                shutdown.token(),
                queue.clone(),
            ));
        }

        tracing::info!(
            listeners = self.listeners.len(),
            queue_capacity = self.queue_capacity,
            "Relay started"
        );

        RunningRelay {
            shutdown,
            queue: Some(queue),
            listeners: self.listeners,
            handles,
            grace: self.grace,
        }
    }
}

fn spawn_listener(
    listener: Arc<dyn Listener>,
    cancel: CancellationToken,
    queue: RequestQueue,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = listener.name();
        metrics::record_listener_started(name);
        tracing::info!(listener = name, "Starting listener");

        if let Err(e) = listener.start(cancel, queue).await {
            tracing::error!(listener = name, error = %e, "Listener stopped with error");
        }

        metrics::record_listener_stopped(name);
        tracing::info!(listener = name, "Listener stopped");
    })
}

/// A started relay.
pub struct RunningRelay {
    shutdown: Shutdown,
    queue: Option<RequestQueue>,
    listeners: Vec<Arc<dyn Listener>>,
    handles: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl RunningRelay {
    /// Another producer handle on the shared queue.
    pub fn queue(&self) -> Option<RequestQueue> {
        self.queue.clone()
    }

    /// Token that fires when shutdown begins.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    /// Cancel every task, stop the listeners and wait up to the grace period.
    pub async fn shutdown(mut self) -> ShutdownOutcome {
        tracing::info!("Shutting down relay");
        self.shutdown.trigger();

        for listener in &self.listeners {
            if let Err(e) = listener.stop().await {
                tracing::error!(listener = listener.name(), error = %e, "Error stopping listener");
            }
        }

        // The relay's own producer handle; listeners drop theirs on exit.
        self.queue.take();

        let handles = std::mem::take(&mut self.handles);
        match tokio::time::timeout(self.grace, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Relay task panicked");
                    }
                }
                tracing::info!("All tasks finished");
                ShutdownOutcome::Graceful
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.grace.as_secs_f64(),
                    "Shutdown grace period elapsed, abandoning remaining tasks"
                );
                ShutdownOutcome::TimedOut
            }
        }
    }
}
