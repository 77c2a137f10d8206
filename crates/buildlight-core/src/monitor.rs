use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::aggregator::{reduce, Aggregator};
use crate::config::Config;
use crate::indicator::IndicatorDriver;
use crate::mailbox::mailbox;
use crate::poller::Poller;
use crate::source::{Indicator, StatusSource};
use crate::status::Status;
use crate::Result;

/// Everything wired together: one poller per repository feeding one light
pub struct Monitor {
    config: Config,
    source: Arc<dyn StatusSource>,
    indicator: Arc<dyn Indicator>,
}

impl Monitor {
    pub fn new(config: Config, source: Arc<dyn StatusSource>, indicator: Arc<dyn Indicator>) -> Self {
        Self {
            config,
            source,
            indicator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run pollers and the indicator driver until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.config.validate()?;

        let (sender, receiver) = mailbox(Status::NotSet);
        let aggregator = Arc::new(Aggregator::new(sender));

        let driver = IndicatorDriver::new(
            Arc::clone(&self.indicator),
            self.config.palette,
            self.config.tick_interval,
            receiver,
        );

        let mut tasks = Vec::with_capacity(self.config.repositories.len() + 1);
        tasks.push(tokio::spawn(driver.run(shutdown.clone())));

        for repo in &self.config.repositories {
            let poller = Poller::new(
                repo.clone(),
                self.config.poll_interval,
                Arc::clone(&self.source),
                Arc::clone(&aggregator),
            );
            tasks.push(tokio::spawn(poller.run(shutdown.clone())));
        }

        info!(
            "Watching {} repositories, polling every {:?}",
            self.config.repositories.len(),
            self.config.poll_interval
        );

        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!("monitor task ended abnormally: {}", e);
            }
        }

        info!("Monitor stopped");
        Ok(())
    }
}

/// Result of polling every repository once
#[derive(Debug)]
pub struct CheckReport {
    pub results: Vec<(String, Result<Status>)>,
}

impl CheckReport {
    /// Aggregate over the repositories that answered, `NotSet` if none did
    pub fn aggregate(&self) -> Status {
        reduce(
            self.results
                .iter()
                .filter_map(|(_, result)| result.as_ref().ok().copied()),
        )
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|(_, result)| result.is_err())
    }
}

/// Poll every repository once, in parallel
pub async fn check_once(source: &dyn StatusSource, repositories: &[String]) -> CheckReport {
    let fetches = repositories.iter().map(|repo| async move {
        let result = source.fetch(repo).await;
        (repo.clone(), result)
    });

    CheckReport {
        results: join_all(fetches).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MockIndicator, MockStatusSource};
    use crate::Error;
    use std::time::Duration;

    fn repos(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_check_once_reports_each_repo() {
        let mut source = MockStatusSource::new();
        source.expect_fetch().returning(|repo| match repo {
            "acme/a" => Ok(Status::Success),
            "acme/b" => Ok(Status::InProgress),
            _ => Err(Error::fetch(repo, "404")),
        });

        let report = check_once(&source, &repos(&["acme/a", "acme/b", "acme/gone"])).await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].0, "acme/a");
        assert!(report.has_errors());
        assert_eq!(report.aggregate(), Status::InProgress);
    }

    #[tokio::test]
    async fn test_check_once_all_errors_is_not_set() {
        let mut source = MockStatusSource::new();
        source
            .expect_fetch()
            .returning(|repo| Err(Error::fetch(repo, "timeout")));

        let report = check_once(&source, &repos(&["acme/a"])).await;
        assert_eq!(report.aggregate(), Status::NotSet);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let monitor = Monitor::new(
            Config::default(),
            Arc::new(MockStatusSource::new()),
            Arc::new(MockIndicator::new()),
        );
        let result = monitor.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let mut source = MockStatusSource::new();
        source.expect_fetch().returning(|_| Ok(Status::Success));
        let mut indicator = MockIndicator::new();
        indicator.expect_set_hue().times(1).returning(|_| Ok(()));

        let config = Config {
            repositories: repos(&["acme/a", "acme/b"]),
            ..Default::default()
        };
        let monitor = Arc::new(Monitor::new(config, Arc::new(source), Arc::new(indicator)));

        let shutdown = CancellationToken::new();
        let handle = {
            let monitor = Arc::clone(&monitor);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { monitor.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
    }
}
