//! Worker loop for the listing search service.
//!
//! Optionally rebuilds the search corpus from the catalog at startup, then
//! refreshes the trending cache on a fixed interval until shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

use crate::service::DiscoveryService;
use crate::AppError;

/// Configuration for the worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub trending_refresh_interval: Duration,
    /// Rebuild the search corpus from the catalog before the first refresh.
    pub reindex_on_start: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            trending_refresh_interval: Duration::from_secs(900),
            reindex_on_start: false,
        }
    }
}

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub refreshes: u64,
    pub failed_refreshes: u64,
}

pub struct Worker {
    service: Arc<DiscoveryService>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(service: Arc<DiscoveryService>, config: WorkerConfig) -> Self {
        Self { service, config }
    }

    /// Run until Ctrl-C is received.
    pub async fn run(&self) -> Result<WorkerReport, AppError> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        };
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` completes.
    ///
    /// A failed startup rebuild or trending refresh is logged and the loop
    /// keeps going; the previous corpus and ranking stay active.
    #[instrument(skip(self, shutdown))]
    pub async fn run_until(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<WorkerReport, AppError> {
        info!(
            backend = self.service.backend_name(),
            refresh_interval_secs = self.config.trending_refresh_interval.as_secs(),
            "Starting listing search worker"
        );

        if !self.service.is_healthy().await {
            warn!(backend = self.service.backend_name(), "Search backend is not healthy");
        }

        if self.config.reindex_on_start {
            match self.service.reindex_from_catalog().await {
                Ok(summary) => info!(
                    indexed = summary.indexed,
                    active_index = ?summary.active_index,
                    "Startup reindex complete"
                ),
                Err(e) => error!(error = %e, "Startup reindex failed"),
            }
        }

        let mut report = WorkerReport::default();
        let mut refresh_timer = interval(self.config.trending_refresh_interval);
        refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = refresh_timer.tick() => {
                    let started = Instant::now();
                    match self.service.refresh_trending().await {
                        Ok(ranked) => {
                            report.refreshes += 1;
                            info!(
                                ranked = ranked,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "Trending refresh complete"
                            );
                        }
                        Err(e) => {
                            report.failed_refreshes += 1;
                            error!(error = %e, "Trending refresh failed");
                        }
                    }
                }
            }
        }

        info!(
            refreshes = report.refreshes,
            failed_refreshes = report.failed_refreshes,
            "Worker shutdown complete"
        );
        Ok(report)
    }
}
