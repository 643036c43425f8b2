use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::Mutex;

/// Time capability: `now` plus a suspendable `sleep`, so supervisory code can
/// run against virtual time in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()>;
}

/// Wall-clock implementation over the tokio timer.
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(dur))
    }
}

/// Virtual clock. `sleep` advances the clock by the requested duration and
/// resolves immediately, so a scheduler loop steps through virtual time as
/// fast as the test can drive it. `advance` steps time by hand between direct
/// supervisor ticks.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, dur: Duration) {
        let mut now = self.now.lock();
        *now += dur;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }

    fn sleep(&self, dur: Duration) -> BoxFuture<'static, ()> {
        let now = self.now.clone();
        Box::pin(async move {
            *now.lock() += dur;
            // Yield once so cancellation has a chance to win the race.
            tokio::task::yield_now().await;
        })
    }
}
