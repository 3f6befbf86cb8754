//! Process-wide shutdown signal
//!
//! A cloneable handle over a `watch` channel. Loops, retries and in-flight
//! RPCs race [`Shutdown::wait`] so a triggered shutdown abandons them
//! instead of letting them run to completion.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signal every holder of this handle; idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any handle, so this cannot fail
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}
