use crossbeam_channel::{Receiver, Sender};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// A set of named worker threads sharing one exit flag and one stop channel.
///
/// Workers receive both signals on spawn: a flag to poll inside hot loops and
/// a channel to `select!` on while parked. Shutdown sets the flag, drops the
/// stop sender so every receiver clone wakes with a disconnect, then joins.
pub struct WorkerSet {
    exit: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl WorkerSet {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        Self {
            exit: Arc::new(AtomicBool::new(false)),
            stop_tx: Some(stop_tx),
            stop_rx,
            handles: Vec::new(),
        }
    }

    pub fn spawn<F>(&mut self, name: &str, f: F)
    where
        F: FnOnce(Arc<AtomicBool>, Receiver<()>) + Send + 'static,
    {
        let exit = self.exit.clone();
        let stop_rx = self.stop_rx.clone();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || f(exit, stop_rx))
            .expect("failed to spawn worker thread");

        self.handles.push((name.to_string(), handle));
    }

    pub fn exit_signal(&self) -> Arc<AtomicBool> {
        self.exit.clone()
    }

    /// Idempotent. Safe to call from Drop after an explicit shutdown.
    pub fn shutdown(&mut self) {
        if self.stop_tx.is_none() {
            return;
        }
        self.exit.store(true, Ordering::SeqCst);
        // Dropping the sender disconnects every receiver clone at once.
        self.stop_tx = None;

        for (name, handle) in self.handles.drain(..) {
            if let Err(e) = handle.join() {
                error!("failed to join worker {}: {:?}", name, e);
            }
        }
        info!("worker set shut down");
    }
}

impl Default for WorkerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.shutdown();
    }
}
