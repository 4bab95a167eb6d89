//! Cooperative shutdown for in-flight retry loops
//!
//! The consumption loop keeps the [`ShutdownHandle`]; each executor gets a
//! [`ShutdownSignal`]. Executors only look at the signal between attempts,
//! never in the middle of one.

use tokio::sync::watch;

/// Sender side held by the consumption loop
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiver side handed to retry executors. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Construct a linked handle/signal pair
pub fn new_pair() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    /// Broadcast shutdown to every outstanding signal
    pub fn trigger(&self) {
        // Fails only when no signal is left to observe it.
        let _ = self.tx.send(true);
    }

    /// Create another signal bound to this handle
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// Whether shutdown has been triggered
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is triggered
    ///
    /// Resolves immediately if it already was. Dropping the handle without
    /// triggering is not a shutdown: the future then never resolves.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|&triggered| triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
