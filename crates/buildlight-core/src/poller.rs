use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::source::StatusSource;
use crate::status::Status;

/// Watches one repository on a fixed interval
///
/// Successful polls go to the aggregator. Failed polls are logged and
/// otherwise ignored, the repository keeps its last known status until a
/// poll succeeds again.
pub struct Poller {
    repository: String,
    interval: Duration,
    source: Arc<dyn StatusSource>,
    aggregator: Arc<Aggregator>,
}

impl Poller {
    pub fn new(
        repository: impl Into<String>,
        interval: Duration,
        source: Arc<dyn StatusSource>,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            repository: repository.into(),
            interval,
            source,
            aggregator,
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Poll once; returns the status that was forwarded, if any
    pub async fn poll(&self) -> Option<Status> {
        match self.source.fetch(&self.repository).await {
            Ok(status) => {
                debug!("{} is {}", self.repository, status);
                self.aggregator.update(&self.repository, status);
                Some(status)
            }
            Err(e) => {
                warn!("failed to get build status: {}", e);
                None
            }
        }
    }

    /// Poll now and then every `interval` until `shutdown` fires
    #[instrument(skip(self, shutdown), fields(repo = %self.repository))]
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Poller started, checking every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping poller");
                    break;
                }

                _ = ticker.tick() => {
                    // A slow fetch still gives up promptly on shutdown
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.poll() => {}
                    }
                }
            }
        }
    }
}
