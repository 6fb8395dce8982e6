use crate::config::ExporterConfig;
use crate::error::{LagError, Result};
use crate::pipeline::cycle::LagPipeline;
use crate::pipeline::status::{CycleReport, PipelineStatus, UNHEALTHY_AFTER_FAILURES};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Drives [`LagPipeline::run_cycle`] on a fixed interval.
pub struct Scheduler {
    pipeline: LagPipeline,
    status: Arc<PipelineStatus>,
    poll_interval: Duration,
    collection_timeout: Duration,
    max_backoff: Duration,
}

impl Scheduler {
    pub fn new(
        pipeline: LagPipeline,
        status: Arc<PipelineStatus>,
        exporter_config: &ExporterConfig,
    ) -> Self {
        if exporter_config.collection_timeout < exporter_config.poll_interval {
            warn!(
                poll_interval = ?exporter_config.poll_interval,
                collection_timeout = ?exporter_config.collection_timeout,
                "collection_timeout is shorter than poll_interval; slow cycles will be cut off"
            );
        }

        Self {
            pipeline,
            status,
            poll_interval: exporter_config.poll_interval,
            collection_timeout: exporter_config.collection_timeout,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Run one bounded cycle and record its outcome in the shared status.
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        let result =
            tokio::time::timeout(self.collection_timeout, self.pipeline.run_cycle()).await;

        match result {
            Ok(Ok(report)) => {
                self.status.record_success(report.clone());
                Ok(report)
            }
            Ok(Err(e)) => {
                let consecutive_errors = self.status.record_failure();
                error!(
                    error = %e,
                    consecutive_errors = consecutive_errors,
                    "Collection failed"
                );
                Err(e)
            }
            Err(_elapsed) => {
                let consecutive_errors = self.status.record_failure();
                error!(
                    timeout_secs = self.collection_timeout.as_secs(),
                    consecutive_errors = consecutive_errors,
                    "Collection timed out"
                );
                Err(LagError::Timeout(format!(
                    "cycle {} did not finish within {}s",
                    self.pipeline.cycle(),
                    self.collection_timeout.as_secs()
                )))
            }
        }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            poll_interval = ?self.poll_interval,
            collection_timeout = ?self.collection_timeout,
            "Starting collection loop"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current_backoff = INITIAL_BACKOFF;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.run_once().await.is_ok() {
                        current_backoff = INITIAL_BACKOFF;
                        continue;
                    }

                    if self.status.consecutive_failures() < UNHEALTHY_AFTER_FAILURES {
                        continue;
                    }

                    let backoff = current_backoff.min(self.max_backoff);
                    warn!(
                        backoff_secs = backoff.as_secs(),
                        "Applying backoff due to consecutive errors"
                    );

                    let interrupted = tokio::select! {
                        () = tokio::time::sleep(backoff) => false,
                        _ = shutdown.recv() => true,
                    };
                    if interrupted {
                        info!("Received shutdown signal during backoff");
                        break;
                    }
                    current_backoff = (current_backoff * 2).min(self.max_backoff);
                }
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!(cycles = self.pipeline.cycle(), "Collection loop stopped");
    }
}
