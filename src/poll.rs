//! Periodic refresh with explicit cancellation.
//!
//! Each `start` owns exactly one timer task. Every tick spawns the action on
//! its own task, so a slow response never delays or suppresses the next tick;
//! overlapping responses are applied in completion order. Action errors (and
//! panics) are recorded on the handle and logged, never propagated.

use anyhow::{anyhow, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::AbortHandle;
use tokio::time::{Duration, MissedTickBehavior};

/// Lower bound on the refresh period; shorter requests are clamped up.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Local error state of one polling loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollStatus {
    pub ticks: u64,
    pub completed: u64,
    pub failures: u64,
    /// Error of the most recently completed tick, cleared by the next success.
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct HandleInner {
    label: String,
    period: Duration,
    cancelled: AtomicBool,
    timer: Mutex<Option<AbortHandle>>,
    status: Mutex<PollStatus>,
}

impl HandleInner {
    fn status(&self) -> std::sync::MutexGuard<'_, PollStatus> {
        self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, outcome: Result<()>) {
        let mut status = self.status();
        status.completed += 1;
        match outcome {
            Ok(()) => status.last_error = None,
            Err(e) => {
                log::warn!("[poll] {} tick failed: {e:#}", self.label);
                status.failures += 1;
                status.last_error = Some(format!("{e:#}"));
            }
        }
    }
}

/// Opaque cancellation handle returned by [`PollingScheduler::start`].
///
/// Clones share the same loop. Dropping a handle does not cancel it.
#[derive(Clone, Debug)]
pub struct PollHandle {
    inner: Arc<HandleInner>,
}

impl PollHandle {
    /// Stop future ticks. Idempotent; an action already in flight still runs
    /// to completion and its outcome is still recorded.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(timer) = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            timer.abort();
        }
        log::info!("[poll] {} cancelled", self.inner.label);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PollStatus {
        self.inner.status().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.status().last_error.clone()
    }

    /// Effective period after clamping.
    pub fn period(&self) -> Duration {
        self.inner.period
    }
}

#[derive(Clone, Debug)]
pub struct PollingScheduler {
    min_period: Duration,
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self {
            min_period: MIN_POLL_INTERVAL,
        }
    }
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` now and then every `period` until the handle is cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, label: &str, period: Duration, action: F) -> PollHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let period = if period < self.min_period {
            log::warn!(
                "[poll] {label}: period {}ms below minimum, using {}ms",
                period.as_millis(),
                self.min_period.as_millis()
            );
            self.min_period
        } else {
            period
        };

        let inner = Arc::new(HandleInner {
            label: label.to_string(),
            period,
            cancelled: AtomicBool::new(false),
            timer: Mutex::new(None),
            status: Mutex::new(PollStatus::default()),
        });

        let loop_inner = inner.clone();
        let timer = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if loop_inner.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                loop_inner.status().ticks += 1;
                log::debug!("[poll] {} tick", loop_inner.label);

                // The closure itself may panic before handing back a future.
                let fut = match std::panic::catch_unwind(AssertUnwindSafe(&action)) {
                    Ok(fut) => AssertUnwindSafe(fut).catch_unwind(),
                    Err(_) => {
                        loop_inner.record(Err(anyhow!("poll action panicked")));
                        continue;
                    }
                };
                let tick_inner = loop_inner.clone();
                tokio::spawn(async move {
                    let outcome = match fut.await {
                        Ok(res) => res,
                        Err(_) => Err(anyhow!("poll action panicked")),
                    };
                    tick_inner.record(outcome);
                });
            }
        });

        *inner.timer.lock().unwrap_or_else(|p| p.into_inner()) = Some(timer.abort_handle());
        // cancel() may have raced ahead of storing the abort handle
        if inner.cancelled.load(Ordering::SeqCst) {
            timer.abort();
        }

        log::info!("[poll] {label} started, every {}ms", period.as_millis());
        PollHandle { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_period_and_stops_after_cancel() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = PollingScheduler::new().start("blocks", Duration::from_millis(12_000), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });

        tokio::time::sleep(Duration::from_millis(30_000)).await;
        settle().await;
        // t = 0, 12s, 24s
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_millis(60_000)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(handle.status().completed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_recorded_and_do_not_stop_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = PollingScheduler::new().start("flaky", Duration::from_secs(1), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n % 2 == 0 {
                    Err(anyhow!("backend returned 502"))
                } else {
                    Ok(())
                }
            }
        });

        // ticks at 0..=4s
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        settle().await;
        let status = handle.status();
        assert_eq!(status.ticks, 5);
        assert_eq!(status.failures, 3);
        assert!(status.last_error.as_deref().unwrap().contains("502"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(handle.last_error(), None);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_action_is_contained() {
        let handle = PollingScheduler::new().start("boom", Duration::from_secs(1), || async {
            if true {
                panic!("bad payload");
            }
            Ok(())
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        settle().await;
        let status = handle.status();
        assert_eq!(status.ticks, 2);
        assert_eq!(status.failures, 2);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn synchronous_panic_does_not_stop_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let handle = PollingScheduler::new().start("eager", Duration::from_secs(1), move || {
            if c.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("bad config while building request");
            }
            async { Ok(()) }
        });

        // ticks at 0..=4s, the second one panics before returning a future
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let status = handle.status();
        assert_eq!(status.ticks, 5);
        assert_eq!(status.completed, 5);
        assert_eq!(status.failures, 1);
        assert!(!handle.is_cancelled());
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ticks_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (f, m) = (in_flight.clone(), max_seen.clone());
        let handle = PollingScheduler::new().start("slow", Duration::from_secs(1), move || {
            let (f, m) = (f.clone(), m.clone());
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(3_500)).await;
                f.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        settle().await;
        assert!(max_seen.load(Ordering::SeqCst) >= 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        // in-flight ticks were not aborted by cancel
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(handle.status().completed, handle.status().ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn period_is_clamped() {
        let handle = PollingScheduler::new().start("storm", Duration::from_millis(10), || async { Ok(()) });
        assert_eq!(handle.period(), MIN_POLL_INTERVAL);
        handle.cancel();
    }
}
