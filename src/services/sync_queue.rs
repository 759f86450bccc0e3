//! On-demand reconciliation requests processed by a single background worker.

use crate::domain::TitleId;
use crate::services::syncer::Syncer;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Sync queue is full, dropped request for title {0}")]
    Full(TitleId),

    #[error("Sync queue is closed, dropped request for title {0}")]
    Closed(TitleId),
}

/// Cloneable submission side of the queue.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<TitleId>,
}

impl SyncHandle {
    /// Enqueues without waiting. Fails when the queue is full or closed.
    pub fn submit(&self, title_id: TitleId) -> Result<(), SubmitError> {
        self.tx.try_send(title_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(id) => SubmitError::Full(id),
            mpsc::error::TrySendError::Closed(id) => SubmitError::Closed(id),
        })
    }
}

pub struct SyncQueue {
    handle: SyncHandle,
    worker: JoinHandle<()>,
}

impl SyncQueue {
    /// Spawns the worker. It stops when `shutdown` fires or once every
    /// handle is dropped and the backlog is empty.
    #[must_use]
    pub fn start(
        syncer: Arc<Syncer>,
        capacity: usize,
        shutdown: CancellationToken,
        span: Span,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(Self::run(syncer, rx, shutdown).instrument(span));

        Self {
            handle: SyncHandle { tx },
            worker,
        }
    }

    async fn run(
        syncer: Arc<Syncer>,
        mut rx: mpsc::Receiver<TitleId>,
        shutdown: CancellationToken,
    ) {
        info!("Sync queue worker started");
        loop {
            let title_id = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                next = rx.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            match syncer.reconcile(title_id).await {
                Ok(report) => info!(
                    %title_id,
                    episodes_created = report.episodes_created,
                    "On-demand sync finished"
                ),
                Err(e) if e.is_permanent() => {
                    warn!(%title_id, error = %e, "On-demand sync rejected");
                }
                Err(e) => error!(%title_id, error = %e, "On-demand sync failed"),
            }
        }
        info!("Sync queue worker stopped");
    }

    #[must_use]
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    pub fn submit(&self, title_id: TitleId) -> Result<(), SubmitError> {
        self.handle.submit(title_id)
    }

    /// Closes this queue's own handle and waits for the worker to exit.
    ///
    /// The worker drains the backlog unless the shutdown token has fired,
    /// in which case queued requests are dropped. Other live handles keep
    /// the worker running.
    pub async fn close(self) {
        drop(self.handle);
        if let Err(e) = self.worker.await {
            error!(error = %e, "Sync queue worker panicked");
        }
    }
}
