//! Background execution of a blocking wire exchange.
//!
//! The scheduler is single-threaded and must never block inside a tick,
//! so a [`PendingExchange`] runs the transport call on a dedicated worker
//! thread and lets the owning task poll for the reply once per tick. The
//! worker communicates exclusively through an mpsc channel (the reply)
//! and a [`TransferProgress`] atomic (byte-level completion), so no
//! locking crosses the thread boundary.
//!
//! Dropping a `PendingExchange` (task cancelled) detaches the worker: it
//! runs to transport timeout and its reply send fails silently.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use tracing::warn;

use super::{Transport, TransferProgress, WireReply, WireRequest};

/// A wire exchange in flight on a worker thread.
pub struct PendingExchange {
    rx: Receiver<WireReply>,
    progress: Arc<TransferProgress>,
}

impl PendingExchange {
    /// Starts the exchange on a worker thread and returns immediately.
    pub fn dispatch(transport: Arc<dyn Transport>, request: WireRequest) -> Self {
        let (tx, rx) = mpsc::channel();
        let progress = Arc::new(TransferProgress::default());

        let worker_progress = Arc::clone(&progress);
        let worker_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("scenebrush-transport".to_string())
            .spawn(move || {
                let reply = transport.execute(&request, &worker_progress);
                // The receiver is gone when the task was cancelled;
                // nothing to do with the reply then.
                let _ = worker_tx.send(reply);
            });

        if let Err(e) = spawned {
            warn!("failed to spawn transport worker: {}", e);
            let _ = tx.send(WireReply::unreachable(format!(
                "Failed to start transport worker: {}",
                e
            )));
        }

        PendingExchange { rx, progress }
    }

    /// Takes the reply if the exchange has finished.
    ///
    /// Non-blocking; returns `None` while the worker is still running.
    /// Must be called at most until it returns `Some`.
    pub fn try_take(&mut self) -> Option<WireReply> {
        match self.rx.try_recv() {
            Ok(reply) => Some(reply),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(WireReply::unreachable(
                "Transport worker terminated unexpectedly",
            )),
        }
    }

    /// Fraction of the exchange completed so far, in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f32 {
        self.progress.get()
    }
}
