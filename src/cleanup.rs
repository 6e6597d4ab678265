//! Background eviction task for [`DedupCache`].
//!
//! The task holds only a `Weak` handle to the cache, upgrading it once per tick,
//! so an abandoned cache is freed and the task winds down on its own. Stopping is
//! signalled over a watch channel and only observed between ticks: a sweep that
//! has started always runs to the end.

use crate::dedupe::DedupCache;
use std::hash::Hash;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

pub struct CleanupRoutine {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl CleanupRoutine {
    pub(crate) fn spawn<V>(
        cache: Weak<DedupCache<V>>,
        every: Duration,
        max_idle_secs: u64,
    ) -> Self
    where
        V: Eq + Hash + Clone + Send + Sync + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately, skip

            info!(
                interval_ms = saturating_millis(every),
                max_idle_secs, "[Cleanup] routine started"
            );

            loop {
                tokio::select! {
                    // Err means the sender is gone, which is a stop as well.
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else { break };
                        let evicted = cache.sweep_idle(max_idle_secs).await;
                        if evicted > 0 {
                            debug!(evicted, "[Cleanup] tick");
                        }
                    }
                }
            }

            info!("[Cleanup] routine stopped");
        });

        Self { stop, join }
    }

    /// Signals the task to stop after the current tick.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Signals stop and waits until the task has exited.
    pub async fn stop_and_wait(self) {
        self.stop();
        if let Err(e) = self.join.await {
            tracing::warn!(?e, "[Cleanup] routine ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

fn saturating_millis(every: Duration) -> u64 {
    u64::try_from(every.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::saturating_millis;
    use crate::clock::ManualClock;
    use crate::dedupe::DedupCache;
    use crate::types::Ticket;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn evicts_on_tick_and_stops() {
        let clock = Arc::new(ManualClock::new(100));
        let cache = Arc::new(DedupCache::<Ticket>::with_clock(clock.clone()));
        let seat = Ticket::new("batman", 2, 7);
        cache.try_set("bookseat", &seat).await;
        cache.start_cleanup(Duration::from_secs(4), 3).unwrap();

        clock.advance(2);
        tokio::time::sleep(Duration::from_millis(4_100)).await;
        assert!(cache.exists("bookseat", &seat).await);

        clock.advance(2);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!cache.exists("bookseat", &seat).await);

        cache.shutdown().await;
        assert!(!cache.is_cleanup_running());
    }

    #[tokio::test]
    async fn dropping_cache_ends_routine() {
        let cache = Arc::new(DedupCache::<Ticket>::new());
        cache.start_cleanup(Duration::from_millis(10), 1).unwrap();
        let weak = Arc::downgrade(&cache);
        drop(cache);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn interval_millis_saturate() {
        assert_eq!(saturating_millis(Duration::from_millis(4_000)), 4_000);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }
}
