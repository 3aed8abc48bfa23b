use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::FeedCache;

pub const DEFAULT_REBUILD_INTERVAL: Duration = Duration::from_secs(15);

/// Rebuilds one feed per tick, cycling through the feeds in schema order.
pub struct RebuildScheduler {
    cache: Arc<FeedCache>,
    interval: Duration,
    next: usize,
}

impl RebuildScheduler {
    #[must_use]
    pub fn new(cache: Arc<FeedCache>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            next: 0,
        }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            feeds = self.cache.feed_names().len(),
            "Starting feed rebuild scheduler"
        );

        let mut ticker = rebuild_ticker(self.interval);
        // The first tick completes immediately; startup already built every feed.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Feed rebuild scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Rebuild the next feed in rotation. Returns the feed it picked.
    pub async fn tick(&mut self) -> Option<String> {
        let feed = self.next_feed()?;
        match self.cache.try_rebuild(&feed).await {
            Ok(Some(snapshot)) => {
                debug!(feed = %feed, tag = %snapshot.tag, items = snapshot.len(), "Scheduled rebuild done");
            }
            Ok(None) => {}
            Err(e) => error!(feed = %feed, "Scheduled rebuild failed: {e}"),
        }
        Some(feed)
    }

    fn next_feed(&mut self) -> Option<String> {
        let names = self.cache.feed_names();
        if names.is_empty() {
            return None;
        }
        let feed = names[self.next % names.len()].clone();
        self.next = (self.next + 1) % names.len();
        Some(feed)
    }
}

// A slow rebuild pushes the next tick back instead of bursting.
fn rebuild_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
