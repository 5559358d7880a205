use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tracing::debug;

pub struct HeartbeatManager {
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl HeartbeatManager {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the ticker; each tick asks the channel loop to put one
    /// heartbeat on the wire.
    pub fn start(&self, tick_tx: mpsc::Sender<()>) -> tokio::task::JoinHandle<()> {
        let interval = self.interval;
        let running = self.running.clone();

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;

                if !running.load(Ordering::SeqCst) {
                    break;
                }

                if tick_tx.send(()).await.is_err() {
                    debug!("Heartbeat channel closed");
                    break;
                }
            }

            debug!("Heartbeat loop stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for HeartbeatManager {
    fn drop(&mut self) {
        self.stop();
    }
}
