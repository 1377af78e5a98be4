//! Best-effort realtime push: a bounded queue drained by one dedicated thread.
//!
//! The request path only ever calls [`PushQueue::enqueue`], which never blocks.
//! A full or closed queue drops the push and counts it; there is no retry. The
//! notification row is already durable at that point, only the live update is lost.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use dealflow_core::{CompanyId, NotificationId};
use dealflow_realtime::RealtimeChannel;

use crate::notification::{Notification, PushEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("push queue is full")]
    QueueFull,

    #[error("push worker is not running")]
    Closed,

    #[error("push envelope serialization failed: {0}")]
    Serialize(String),

    #[error("failed to spawn push worker: {0}")]
    Spawn(String),
}

/// Push worker configuration.
#[derive(Debug, Clone)]
pub struct PushWorkerConfig {
    /// Thread name, also used in logs.
    pub name: String,
    /// Queue bound; pushes beyond it are dropped.
    pub capacity: usize,
    /// How long the worker waits for a job before checking for shutdown.
    pub poll_interval: Duration,
}

impl Default for PushWorkerConfig {
    fn default() -> Self {
        Self {
            name: "realtime-push".to_string(),
            capacity: 1024,
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl PushWorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug)]
struct PushJob {
    company_id: CompanyId,
    notification_id: NotificationId,
    payload: serde_json::Value,
}

/// Producer side of the push queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PushQueue {
    tx: mpsc::SyncSender<PushJob>,
    stats: Arc<Mutex<PushStats>>,
}

impl PushQueue {
    fn bounded(capacity: usize) -> (Self, mpsc::Receiver<PushJob>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let queue = Self {
            tx,
            stats: Arc::new(Mutex::new(PushStats::default())),
        };
        (queue, rx)
    }

    /// Queue a `new_notification` envelope for the recipient's company.
    pub fn enqueue(&self, notification: &Notification) -> Result<(), PushError> {
        let envelope = PushEnvelope::NewNotification {
            notification: notification.clone(),
        };
        let payload = serde_json::to_value(&envelope).map_err(|e| PushError::Serialize(e.to_string()))?;

        let job = PushJob {
            company_id: envelope.company_id(),
            notification_id: notification.id,
            payload,
        };

        match self.tx.try_send(job) {
            Ok(()) => {
                self.bump(|s| s.enqueued += 1);
                Ok(())
            }
            Err(mpsc::TrySendError::Full(job)) => {
                self.bump(|s| s.dropped += 1);
                warn!(notification_id = %job.notification_id, "push queue full; realtime update dropped");
                Err(PushError::QueueFull)
            }
            Err(mpsc::TrySendError::Disconnected(job)) => {
                self.bump(|s| s.dropped += 1);
                warn!(notification_id = %job.notification_id, "push worker gone; realtime update dropped");
                Err(PushError::Closed)
            }
        }
    }

    pub fn stats(&self) -> PushStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    fn bump(&self, f: impl FnOnce(&mut PushStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}

/// Handle to stop and join the push worker.
#[derive(Debug)]
pub struct PushWorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<PushStats>>,
}

impl PushWorkerHandle {
    /// Request shutdown, let the worker drain what is already queued, and join it.
    pub fn shutdown(mut self) -> PushStats {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
        self.stats()
    }

    pub fn stats(&self) -> PushStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }
}

/// Dedicated realtime push worker.
#[derive(Debug)]
pub struct PushWorker;

impl PushWorker {
    pub fn spawn<C>(config: PushWorkerConfig, channel: C) -> Result<(PushQueue, PushWorkerHandle), PushError>
    where
        C: RealtimeChannel + 'static,
    {
        let (queue, rx) = PushQueue::bounded(config.capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = queue.stats.clone();
        let worker_stats = stats.clone();
        let name = config.name.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker_loop(&name, rx, shutdown_rx, config.poll_interval, channel, worker_stats))
            .map_err(|e| PushError::Spawn(e.to_string()))?;

        info!(worker = %config.name, capacity = config.capacity, "push worker started");

        Ok((
            queue,
            PushWorkerHandle {
                shutdown: shutdown_tx,
                join: Some(join),
                stats,
            },
        ))
    }
}

fn worker_loop<C: RealtimeChannel>(
    name: &str,
    rx: mpsc::Receiver<PushJob>,
    shutdown_rx: mpsc::Receiver<()>,
    tick: Duration,
    channel: C,
    stats: Arc<Mutex<PushStats>>,
) {
    loop {
        if shutdown_rx.try_recv().is_ok() {
            // Drain whatever made it into the queue before shutdown.
            while let Ok(job) = rx.try_recv() {
                deliver(name, &channel, job, &stats);
            }
            break;
        }

        match rx.recv_timeout(tick) {
            Ok(job) => deliver(name, &channel, job, &stats),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = name, "push worker stopped");
}

fn deliver<C: RealtimeChannel>(name: &str, channel: &C, job: PushJob, stats: &Mutex<PushStats>) {
    let outcome = channel.broadcast(job.company_id, &job.payload);

    if let Ok(mut s) = stats.lock() {
        match &outcome {
            Ok(_) => s.delivered += 1,
            Err(_) => s.failed += 1,
        }
    }

    match outcome {
        Ok(connections) => debug!(
            worker = name,
            notification_id = %job.notification_id,
            company_id = %job.company_id,
            connections,
            "realtime push delivered"
        ),
        Err(err) => warn!(
            worker = name,
            notification_id = %job.notification_id,
            company_id = %job.company_id,
            error = %err,
            "realtime push failed"
        ),
    }
}
