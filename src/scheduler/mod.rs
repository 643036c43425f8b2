pub mod clock;

pub use clock::{Clock, ManualClock, TokioClock};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// Fixed-period pulse driving the lifecycle supervisor.
///
/// Pulses are strictly serialized: the next sleep only starts after the tick
/// callback has returned, so an overrunning tick coalesces instead of
/// building a backlog. Cancellation stops new pulses promptly; an in-flight
/// tick runs to completion.
pub struct TickScheduler {
    cancel_tx: flume::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl TickScheduler {
    pub fn spawn<F, Fut>(clock: Arc<dyn Clock>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (cancel_tx, cancel_rx) = flume::bounded::<()>(1);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_rx.recv_async() => {
                        debug!("tick scheduler cancelled");
                        break;
                    }
                    _ = clock.sleep(period) => {
                        tick().await;
                    }
                }
            }
        });

        Self { cancel_tx, task }
    }

    /// Stop delivering pulses. Idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.try_send(());
    }

    /// Cancel and wait for the loop (including any in-flight tick) to finish.
    pub async fn shutdown(self) {
        self.cancel();
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
