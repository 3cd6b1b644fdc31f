//! ---
//! ems_section: "09-integration-interoperability"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Write approval, heartbeat resolution and power-limit use cases."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Bounded worker pool sending automatic approvals.
//!
//! Writes that need no application decision are accepted off the calling
//! thread: `submit` only enqueues, workers run the blocking accept call and
//! publish every completion on a broadcast channel.
use std::sync::Arc;

use ems_link_common::ApprovalConfig;
use ems_link_features::MsgCounter;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::event::WriteMessage;
use crate::link::WriteResponder;
use crate::metrics::ApprovalMetrics;

const OUTCOME_CAPACITY: usize = 64;

/// Why a write could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Every queue slot is taken.
    #[error("approval queue is full")]
    QueueFull,
    /// The dispatcher was shut down.
    #[error("approval dispatcher is closed")]
    Closed,
}

/// Completion of one automatic approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    /// Correlation id of the approved write, if it carried one.
    pub counter: Option<MsgCounter>,
    /// `Err` carries the engine's failure message.
    pub result: Result<(), String>,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<WriteMessage>>>;

/// Worker pool accepting writes that need no decision.
pub struct ApprovalDispatcher {
    sender: Mutex<Option<mpsc::Sender<WriteMessage>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    outcomes: broadcast::Sender<ApprovalOutcome>,
    metrics: Option<ApprovalMetrics>,
}

impl ApprovalDispatcher {
    /// Spawn `config.workers` workers on the current tokio runtime.
    pub fn start(
        config: &ApprovalConfig,
        responder: Arc<dyn WriteResponder>,
        metrics: Option<ApprovalMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_depth.max(1));
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers: Vec<JoinHandle<()>> = (0..config.workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    receiver.clone(),
                    responder.clone(),
                    outcomes.clone(),
                    metrics.clone(),
                ))
            })
            .collect();
        info!(
            workers = config.workers,
            queue_depth = config.queue_depth,
            "approval dispatcher started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            outcomes,
            metrics,
        }
    }

    /// Queue `request` for acceptance. Never blocks.
    pub fn submit(&self, request: WriteMessage) -> Result<(), DispatchError> {
        let result = match self.sender.lock().as_ref() {
            None => Err(DispatchError::Closed),
            Some(sender) => sender.try_send(request).map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
            }),
        };
        if let Err(err) = &result {
            warn!(error = %err, "automatic approval dropped");
            if let Some(metrics) = &self.metrics {
                metrics.observe_dispatch_rejected();
            }
        }
        result
    }

    /// Receive every completion from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalOutcome> {
        self.outcomes.subscribe()
    }

    /// Stop accepting writes, let the workers drain the queue and wait for them.
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "approval worker ended abnormally");
            }
        }
        info!("approval dispatcher stopped");
    }
}

async fn run_worker(
    worker: usize,
    receiver: SharedReceiver,
    responder: Arc<dyn WriteResponder>,
    outcomes: broadcast::Sender<ApprovalOutcome>,
    metrics: Option<ApprovalMetrics>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(request) = next else {
            debug!(worker, "approval queue closed");
            return;
        };

        let counter = request.counter();
        let responder = responder.clone();
        let result = match tokio::task::spawn_blocking(move || responder.accept(&request)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(format!("accept task failed: {err}")),
        };

        match (&result, &metrics) {
            (Ok(()), Some(metrics)) => metrics.observe_auto_approved(),
            (Err(_), Some(metrics)) => metrics.observe_failed(),
            (_, None) => {}
        }
        if let Err(err) = &result {
            warn!(worker, counter = ?counter, error = %err, "automatic approval failed");
        } else {
            debug!(worker, counter = ?counter, "write approved automatically");
        }
        // No subscriber is fine.
        let _ = outcomes.send(ApprovalOutcome { counter, result });
    }
}
