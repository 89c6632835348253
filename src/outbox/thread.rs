use std::sync::mpsc::{channel, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use super::publisher::OutboxPublisher;
use super::store::OutboxStore;
use super::worker::OutboxWorker;

/// Counters accumulated by a background worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
    pub polls: usize,
    pub store_errors: usize,
}

/// Runs [`OutboxWorker::drain_once`] on its own thread every `poll_interval`.
///
/// ```ignore
/// let store = HashMapStore::new();
/// let worker = OutboxWorker::new(LogPublisher::default());
/// let handle = OutboxWorkerThread::spawn(store.clone(), worker, Duration::from_millis(50));
///
/// // ... write entities through the store ...
///
/// let stats = handle.stop();
/// ```
pub struct OutboxWorkerThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl OutboxWorkerThread {
    /// Spawn a worker thread that drains `store` every `poll_interval`.
    pub fn spawn<S, P>(store: S, mut worker: OutboxWorker<P>, poll_interval: Duration) -> Self
    where
        S: OutboxStore + 'static,
        P: OutboxPublisher + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = WorkerStats::default();
            info!("outbox worker started");

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                stats.polls += 1;
                match worker.drain_once(&store) {
                    Ok(result) => {
                        stats.published += result.published;
                        stats.retried += result.retried;
                        stats.failed += result.failed;
                    }
                    Err(err) => {
                        stats.store_errors += 1;
                        warn!(error = %err, "outbox drain aborted");
                    }
                }

                // Doubles as the poll sleep; a stop signal cuts it short.
                match stop_rx.recv_timeout(poll_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            info!(
                polls = stats.polls,
                published = stats.published,
                "outbox worker stopped"
            );
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker and wait for the current cycle to finish.
    pub fn stop(mut self) -> WorkerStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => WorkerStats::default(),
        }
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for OutboxWorkerThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
