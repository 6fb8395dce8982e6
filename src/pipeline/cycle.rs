use crate::backend::MonitoringBackend;
use crate::collector::lag_extractor::LagExtractor;
use crate::config::{Config, DeviceConfig, GroupFilters};
use crate::error::{LagError, Result};
use crate::kafka::ConsumerGroupSource;
use crate::kafka::command::CommandGroupSource;
use crate::kafka::fixture::FixtureGroupSource;
use crate::metrics::batch::MetricBatchBuilder;
use crate::metrics::definitions::{
    METRIC_ID_TEMPLATE, METRIC_TYPE, THRESHOLD_CATALOG_FILTER, device_registration,
};
use crate::metrics::splitter::BatchSplitter;
use crate::metrics::types::MetricBatch;
use crate::pipeline::status::CycleReport;
use crate::reconcile::threshold::{ConfigFileThresholds, ThresholdSource};
use crate::reconcile::{MetricReconciler, ThresholdReconciler};
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{Level, debug, error, info, instrument, warn};

/// Everything that talks to the monitoring backend. Absent in development and
/// kafka-only runs.
struct BackendStage {
    api: Arc<MonitoringBackend>,
    metrics: MetricReconciler,
    thresholds: ThresholdReconciler,
    device: String,
    device_config: DeviceConfig,
    threshold_filter: Regex,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct PublishTally {
    published: usize,
    failed: usize,
    retryable: usize,
}

#[derive(Debug, Default)]
struct ReconcileTally {
    metric_failures: usize,
    threshold_failures: usize,
}

impl BackendStage {
    async fn reconcile(&self, groups: &[String], overwrite: bool) -> ReconcileTally {
        let mut tally = ReconcileTally::default();

        let metric_catalog = match self.api.fetch_metric_catalog().await {
            Ok(catalog) => {
                if catalog.is_empty() {
                    info!(category = "APICall", "Metric catalog is empty");
                } else {
                    debug!(entries = catalog.len(), "Fetched metric catalog");
                }
                Some(catalog)
            }
            Err(e) => {
                error!(category = "APICall", error = %e, "unable to obtain metrics list");
                None
            }
        };

        for group in groups {
            let outcome = self
                .metrics
                .ensure_metric_exists(group, metric_catalog.as_ref())
                .await;
            if outcome.is_failure() {
                tally.metric_failures += 1;
            }
        }

        // An overwriting pass writes every threshold regardless of what exists.
        let threshold_catalog = if overwrite {
            None
        } else {
            match self
                .api
                .fetch_threshold_catalog(Some(&self.threshold_filter))
                .await
            {
                Ok(catalog) => Some(catalog),
                Err(e) => {
                    error!(category = "GetThresholds", error = %e, "unable to get thresholds");
                    None
                }
            }
        };

        for group in groups {
            let outcome = self
                .thresholds
                .ensure_threshold(group, threshold_catalog.as_ref(), overwrite)
                .await;
            if outcome.is_failure() {
                tally.threshold_failures += 1;
            }
        }

        tally
    }

    /// Split and publish, counting requests by outcome.
    async fn publish(&self, batch: &MetricBatch, budget: usize) -> Result<PublishTally> {
        let splitter = BatchSplitter::new(batch, budget)?;
        let plan = splitter.plan();
        debug!(
            category = "PushMetrics",
            total_bytes = plan.total_bytes,
            num_splits = plan.num_splits,
            increment = plan.increment,
            "Publishing"
        );

        let mut tally = PublishTally::default();
        for part in splitter {
            match self.api.publish_batch(&self.device, &part).await {
                Ok(_) => tally.published += 1,
                Err(e) => {
                    let retryable = e.is_retryable();
                    error!(
                        category = "PushMetrics",
                        series = part.len(),
                        status = ?e.status(),
                        retryable = retryable,
                        error = %e,
                        "unable to push metrics"
                    );
                    tally.failed += 1;
                    if retryable {
                        tally.retryable += 1;
                    }
                }
            }
        }

        Ok(tally)
    }
}

/// One discover → reconcile → extract → publish pass per call to [`run_cycle`].
///
/// [`run_cycle`]: LagPipeline::run_cycle
pub struct LagPipeline {
    source: Arc<dyn ConsumerGroupSource>,
    backend: Option<BackendStage>,
    filters: GroupFilters,
    reconcile_every: u64,
    send_byte_size_limit: usize,
    cycle: u64,
}

impl LagPipeline {
    pub fn new(
        config: &Config,
        source: Arc<dyn ConsumerGroupSource>,
        thresholds: Arc<dyn ThresholdSource>,
    ) -> Result<Self> {
        let backend = if config.backend_enabled() {
            let api = Arc::new(MonitoringBackend::new(&config.backend)?);
            Some(BackendStage {
                metrics: MetricReconciler::new(Arc::clone(&api)),
                thresholds: ThresholdReconciler::new(Arc::clone(&api), thresholds),
                device: config.backend.custom_device.clone(),
                device_config: config.backend.device.clone(),
                threshold_filter: Regex::new(THRESHOLD_CATALOG_FILTER)?,
                api,
            })
        } else {
            None
        };

        info!(
            development = config.exporter.development,
            kafka_only = config.exporter.kafka_only,
            backend_enabled = backend.is_some(),
            check_metrics_every_x_loops = config.exporter.check_metrics_every_x_loops,
            send_byte_size_limit = config.exporter.send_byte_size_limit,
            "Created lag pipeline"
        );

        Ok(Self {
            source,
            backend,
            filters: config.kafka.compile_filters()?,
            reconcile_every: config.exporter.check_metrics_every_x_loops.max(1),
            send_byte_size_limit: config.exporter.send_byte_size_limit,
            cycle: 0,
        })
    }

    /// Wire the pipeline to the Kafka tooling (or fixtures in development) and to the
    /// threshold section of the file at `config_path`.
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self> {
        let source: Arc<dyn ConsumerGroupSource> = if config.exporter.development {
            Arc::new(FixtureGroupSource::new())
        } else {
            Arc::new(CommandGroupSource::new(&config.kafka))
        };
        let thresholds = Arc::new(ConfigFileThresholds::new(config_path));

        Self::new(config, source, thresholds)
    }

    /// Number of cycles started so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    fn reconcile_due(&self) -> bool {
        self.cycle == 1 || self.cycle % self.reconcile_every == 0
    }

    /// Run a single cycle.
    ///
    /// Only a failure to list consumer groups fails the cycle. Per-group and per-request
    /// failures are logged and counted in the report.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let start = Instant::now();
        let mut report = CycleReport {
            cycle: self.cycle,
            started_at_ms: now_ms(),
            ..CycleReport::default()
        };

        info!(category = "Loop", cycle = self.cycle, "Starting");

        let discovered = self.source.list_groups().await?;
        report.groups_discovered = discovered.len();

        let groups: Vec<String> = discovered
            .into_iter()
            .filter(|g| self.filters.matches(g))
            .collect();
        report.groups_selected = groups.len();

        info!(
            category = "GetConsumerGroups",
            discovered = report.groups_discovered,
            selected = report.groups_selected,
            "Results"
        );
        debug!(category = "GetConsumerGroups", groups = ?groups, "Selected groups");

        if let Some(stage) = &self.backend
            && self.reconcile_due()
        {
            // The first cycle rewrites every threshold; later passes only fill gaps.
            let overwrite = self.cycle == 1;
            let tally = stage.reconcile(&groups, overwrite).await;
            report.reconciled = true;
            report.metric_failures = tally.metric_failures;
            report.threshold_failures = tally.threshold_failures;
        }

        let mut batch = MetricBatch::new(METRIC_TYPE);
        for group in &groups {
            match self.collect_group(group, &mut batch).await {
                Ok(true) => report.groups_with_lag += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        category = "GetLag",
                        group = %group,
                        error = %e,
                        "Unable to describe consumer group, skipping"
                    );
                    report.group_failures += 1;
                }
            }
        }
        report.series = batch.len();

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                category = "PushMetrics",
                payload = %serde_json::to_string(&batch)?,
                "JSON"
            );
        }

        if let Some(stage) = &self.backend {
            if batch.is_empty() {
                info!(category = "PushMetrics", "No series to publish");
            } else {
                let tally = stage.publish(&batch, self.send_byte_size_limit).await?;
                report.batches_published = tally.published;
                report.batches_failed = tally.failed;
                report.batches_retryable = tally.retryable;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        report.duration_ms = duration_ms;

        info!(
            category = "Loop",
            cycle = report.cycle,
            duration_ms = report.duration_ms,
            groups = report.groups_selected,
            series = report.series,
            batches_published = report.batches_published,
            batches_failed = report.batches_failed,
            batches_retryable = report.batches_retryable,
            "Finished"
        );

        Ok(report)
    }

    /// Describe one group and append its topics to `batch`. Returns whether any series
    /// were added.
    async fn collect_group(&self, group: &str, batch: &mut MetricBatch) -> Result<bool> {
        debug!(category = "GetLag", group = group, "Starting");
        let raw = self.source.describe_group(group).await?;

        let Some(lag) = LagExtractor::extract(group, &raw) else {
            debug!(category = "GetLag", group = group, "No data");
            return Ok(false);
        };

        info!(
            category = "GetLag",
            group = group,
            topics = ?lag.topics,
            parsed_rows = lag.parsed_rows,
            unknown_rows = lag.unknown_rows,
            faulted_rows = lag.faulted_rows,
            "Results"
        );

        let timestamp_ms = now_ms();
        for (topic, value) in &lag.topics {
            MetricBatchBuilder::append(
                batch,
                METRIC_ID_TEMPLATE,
                group,
                topic,
                timestamp_ms,
                *value,
            );
        }

        Ok(!lag.topics.is_empty())
    }

    /// Upsert thresholds for `groups`, overwriting existing ones. Returns the number of
    /// groups that failed.
    pub async fn create_thresholds(&self, groups: &[String]) -> Result<usize> {
        let stage = self.require_backend()?;

        let mut failures = 0;
        for group in groups {
            if stage
                .thresholds
                .ensure_threshold(group, None, true)
                .await
                .is_failure()
            {
                failures += 1;
            }
        }

        Ok(failures)
    }

    /// Remove the metric definition of `group`. Returns whether the backend accepted it.
    pub async fn delete_metric(&self, group: &str) -> Result<bool> {
        let stage = self.require_backend()?;
        Ok(stage.metrics.delete_metric(group).await)
    }

    /// Register the custom device with a heartbeat point. Returns whether the backend
    /// accepted it.
    pub async fn define_device(&self) -> Result<bool> {
        let stage = self.require_backend()?;
        let registration = device_registration(&stage.device, &stage.device_config, now_ms());

        match stage.api.define_custom_device(&stage.device, &registration).await {
            Ok(outcome) => {
                info!(
                    category = "DefineDevice",
                    device = %stage.device,
                    status = outcome.status_code,
                    "Device defined"
                );
                Ok(true)
            }
            Err(e) => {
                error!(
                    category = "DefineDevice",
                    device = %stage.device,
                    retryable = e.is_retryable(),
                    error = %e,
                    "unable to define custom device"
                );
                Ok(false)
            }
        }
    }

    fn require_backend(&self) -> Result<&BackendStage> {
        self.backend.as_ref().ok_or_else(|| {
            LagError::Config(
                "backend calls are disabled (development or kafka_only is set)".to_string(),
            )
        })
    }
}

impl std::fmt::Debug for LagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LagPipeline")
            .field("cycle", &self.cycle)
            .field("backend_enabled", &self.backend.is_some())
            .field("reconcile_every", &self.reconcile_every)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdSettings;
    use crate::reconcile::threshold::ThresholdDefinition;
    use mockito::Matcher;
    use serde_json::{Map, json};

    struct FailingSource;

    #[async_trait::async_trait]
    impl ConsumerGroupSource for FailingSource {
        async fn list_groups(&self) -> Result<Vec<String>> {
            Err(LagError::Process("kafka-consumer-groups.sh exited with 1".to_string()))
        }

        async fn describe_group(&self, _group: &str) -> Result<String> {
            unreachable!("listing failed")
        }
    }

    /// Lists two groups; describing `broken` fails.
    struct PartialSource;

    #[async_trait::async_trait]
    impl ConsumerGroupSource for PartialSource {
        async fn list_groups(&self) -> Result<Vec<String>> {
            Ok(vec!["broken".to_string(), "healthy".to_string()])
        }

        async fn describe_group(&self, group: &str) -> Result<String> {
            if group == "broken" {
                return Err(LagError::Timeout("describe took too long".to_string()));
            }
            Ok(format!(
                "GROUP TOPIC PARTITION CURRENT-OFFSET LOG-END-OFFSET LAG OWNER\n\
                 {group} T1 0 10 15 5 c1\n\
                 {group} T1 1 10 13 3 c1\n\
                 {group} T2 0 unknown 0 unknown c2\n"
            ))
        }
    }

    fn thresholds() -> ThresholdSettings {
        ThresholdSettings {
            default_threshold: "default".to_string(),
            threshold_list: vec![ThresholdDefinition {
                consumer_group: "default".to_string(),
                event_name: "Kafka lag for $consumer_group".to_string(),
                description: "Lag of $consumer_group".to_string(),
                threshold_id: None,
                timeseries_id: None,
                extra: Map::from_iter([("threshold".to_string(), json!(1000))]),
            }],
        }
    }

    fn development_config() -> Config {
        let mut config = Config::default();
        config.exporter.development = true;
        config
    }

    fn backend_config(url: &str) -> Config {
        let mut config = Config::default();
        config.backend.url_tenant = url.to_string();
        config.backend.custom_device = "kafka-test".to_string();
        config.thresholds = thresholds();
        config
    }

    fn pipeline(config: &Config, source: Arc<dyn ConsumerGroupSource>) -> LagPipeline {
        LagPipeline::new(config, source, Arc::new(thresholds())).unwrap()
    }

    #[tokio::test]
    async fn test_development_cycle_uses_fixture() {
        let mut pipeline = pipeline(&development_config(), Arc::new(FixtureGroupSource::new()));

        let report = pipeline.run_cycle().await.unwrap();

        assert_eq!(report.cycle, 1);
        assert_eq!(report.groups_discovered, 10);
        assert_eq!(report.groups_selected, 10);
        assert_eq!(report.groups_with_lag, 10);
        // perf_db_dt_wa_raw_5 and synth_error per group; the all-unknown topics are absent.
        assert_eq!(report.series, 20);
        assert!(!report.reconciled);
        assert_eq!(report.batches_published, 0);
    }

    #[tokio::test]
    async fn test_blacklist_filters_groups() {
        let mut config = development_config();
        config.kafka.group_blacklist = vec!["^syntheticengine_".to_string()];
        let mut pipeline = pipeline(&config, Arc::new(FixtureGroupSource::new()));

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.groups_discovered, 10);
        assert_eq!(report.groups_selected, 7);
        assert_eq!(report.series, 14);
    }

    #[tokio::test]
    async fn test_listing_failure_fails_cycle() {
        let mut pipeline = pipeline(&development_config(), Arc::new(FailingSource));
        assert!(matches!(
            pipeline.run_cycle().await,
            Err(LagError::Process(_))
        ));
        assert_eq!(pipeline.cycle(), 1);
    }

    #[tokio::test]
    async fn test_describe_failure_skips_group() {
        let mut pipeline = pipeline(&development_config(), Arc::new(PartialSource));

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.group_failures, 1);
        assert_eq!(report.groups_with_lag, 1);
        assert_eq!(report.series, 1);
    }

    #[tokio::test]
    async fn test_kafka_only_skips_backend() {
        // Nothing listens here; any backend call would be counted as a failure.
        let mut config = backend_config("http://127.0.0.1:1");
        config.exporter.kafka_only = true;
        let mut pipeline = pipeline(&config, Arc::new(PartialSource));

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.series, 1);
        assert!(!report.reconciled);
        assert_eq!(report.batches_published, 0);
        assert_eq!(report.batches_failed, 0);
    }

    #[tokio::test]
    async fn test_first_cycle_reconciles_and_publishes() {
        let mut server = mockito::Server::new_async().await;
        let catalog = server
            .mock("GET", "/api/v1/timeseries")
            .with_status(200)
            .with_body(r#"[{"timeseriesId":"custom:kafka.consumerlag.broken.count"}]"#)
            .expect(1)
            .create_async()
            .await;
        let create_metric = server
            .mock("PUT", "/api/v1/timeseries/custom:kafka.consumerlag.healthy.count")
            .with_status(201)
            .expect(1)
            .create_async()
            .await;
        let threshold_catalog = server
            .mock("GET", "/api/v1/thresholds")
            .expect(0)
            .create_async()
            .await;
        let threshold_puts = server
            .mock("PUT", Matcher::Regex(r"^/api/v1/thresholds/kafka\.consumerlag\.".to_string()))
            .match_body(Matcher::PartialJson(json!({"threshold": 1000})))
            .with_status(201)
            .expect(2)
            .create_async()
            .await;
        let publish = server
            .mock("POST", "/api/v1/entity/infrastructure/custom/kafka-test")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"type": "Kafka"})),
                Matcher::Regex(
                    r#""timeseriesId":"custom:kafka\.consumerlag\.healthy\.count""#.to_string(),
                ),
                Matcher::Regex(r#""dimensions":\{"topic":"T1"\}"#.to_string()),
            ]))
            .with_status(202)
            .expect(1)
            .create_async()
            .await;

        let mut pipeline = pipeline(&backend_config(&server.url()), Arc::new(PartialSource));
        let report = pipeline.run_cycle().await.unwrap();

        assert!(report.reconciled);
        assert_eq!(report.metric_failures, 0);
        assert_eq!(report.threshold_failures, 0);
        assert_eq!(report.batches_published, 1);
        assert_eq!(report.batches_failed, 0);

        catalog.assert_async().await;
        create_metric.assert_async().await;
        threshold_catalog.assert_async().await;
        threshold_puts.assert_async().await;
        publish.assert_async().await;
    }

    #[tokio::test]
    async fn test_cadence_cycle_fills_threshold_gaps() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/timeseries")
            .with_status(200)
            .with_body(
                r#"[{"timeseriesId":"custom:kafka.consumerlag.broken.count"},
                    {"timeseriesId":"custom:kafka.consumerlag.healthy.count"}]"#,
            )
            .expect(2)
            .create_async()
            .await;
        let threshold_catalog = server
            .mock("GET", "/api/v1/thresholds")
            .with_status(200)
            .with_body(r#"[{"thresholdId":"kafka.consumerlag.broken"},{"thresholdId":"cpu"}]"#)
            .expect(1)
            .create_async()
            .await;
        // Cycle 1 overwrites both; cycle 2 only creates the missing one.
        let broken = server
            .mock("PUT", "/api/v1/thresholds/kafka.consumerlag.broken")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let healthy = server
            .mock("PUT", "/api/v1/thresholds/kafka.consumerlag.healthy")
            .with_status(204)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("POST", Matcher::Any)
            .with_status(202)
            .create_async()
            .await;

        let mut config = backend_config(&server.url());
        config.exporter.check_metrics_every_x_loops = 2;
        let mut pipeline = pipeline(&config, Arc::new(PartialSource));

        assert!(pipeline.run_cycle().await.unwrap().reconciled);
        assert!(pipeline.run_cycle().await.unwrap().reconciled);

        threshold_catalog.assert_async().await;
        broken.assert_async().await;
        healthy.assert_async().await;
    }

    #[tokio::test]
    async fn test_reconciliation_skipped_between_cadence_cycles() {
        let mut server = mockito::Server::new_async().await;
        let catalog = server
            .mock("GET", "/api/v1/timeseries")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;
        server
            .mock("PUT", Matcher::Any)
            .with_status(201)
            .create_async()
            .await;
        let publish = server
            .mock("POST", Matcher::Any)
            .with_status(202)
            .expect(2)
            .create_async()
            .await;

        let mut config = backend_config(&server.url());
        config.exporter.check_metrics_every_x_loops = 5;
        let mut pipeline = pipeline(&config, Arc::new(PartialSource));

        assert!(pipeline.run_cycle().await.unwrap().reconciled);
        assert!(!pipeline.run_cycle().await.unwrap().reconciled);

        catalog.assert_async().await;
        publish.assert_async().await;
    }

    #[tokio::test]
    async fn test_oversized_batch_is_split() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/timeseries")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("PUT", Matcher::Any)
            .with_status(201)
            .create_async()
            .await;
        let publish = server
            .mock("POST", "/api/v1/entity/infrastructure/custom/kafka-test")
            .with_status(202)
            .expect_at_least(2)
            .create_async()
            .await;

        let mut config = backend_config(&server.url());
        config.exporter.send_byte_size_limit = 1000;
        let mut pipeline = pipeline(&config, Arc::new(FixtureGroupSource::new()));

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.series, 20);
        assert!(report.batches_published >= 2);
        assert_eq!(report.batches_failed, 0);
        publish.assert_async().await;
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_cycle() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/timeseries")
            .with_status(503)
            .create_async()
            .await;
        let create = server
            .mock("PUT", "/api/v1/timeseries/custom:kafka.consumerlag.healthy.count")
            .expect(0)
            .create_async()
            .await;
        server
            .mock("PUT", Matcher::Regex("^/api/v1/thresholds/".to_string()))
            .with_status(201)
            .create_async()
            .await;
        server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let mut pipeline = pipeline(&backend_config(&server.url()), Arc::new(PartialSource));
        let report = pipeline.run_cycle().await.unwrap();

        assert_eq!(report.batches_published, 0);
        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.batches_retryable, 1);
        // Catalog unavailable: nothing created, nothing counted as failed.
        assert_eq!(report.metric_failures, 0);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_publish_is_not_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/timeseries")
            .with_status(200)
            .with_body(r#"[{"timeseriesId":"custom:kafka.consumerlag.healthy.count"}]"#)
            .create_async()
            .await;
        server
            .mock("PUT", Matcher::Regex("^/api/v1/thresholds/".to_string()))
            .with_status(201)
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/entity/infrastructure/custom/kafka-test")
            .with_status(400)
            .with_body(r#"{"error":{"message":"invalid series"}}"#)
            .create_async()
            .await;

        let mut pipeline = pipeline(&backend_config(&server.url()), Arc::new(PartialSource));
        let report = pipeline.run_cycle().await.unwrap();

        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.batches_retryable, 0);
    }

    #[tokio::test]
    async fn test_define_device_registers_heartbeat() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/entity/infrastructure/custom/kafka-test")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "displayName": "kafka-test",
                    "type": "Kafka"
                })),
                Matcher::Regex(r#""timeseriesId":"custom:device.heartbeat.count""#.to_string()),
            ]))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let pipeline = pipeline(&backend_config(&server.url()), Arc::new(PartialSource));
        assert!(pipeline.define_device().await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_define_device_reports_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/entity/infrastructure/custom/kafka-test")
            .with_status(403)
            .create_async()
            .await;

        let pipeline = pipeline(&backend_config(&server.url()), Arc::new(PartialSource));
        assert!(!pipeline.define_device().await.unwrap());
    }

    #[tokio::test]
    async fn test_one_shot_commands_need_backend() {
        let pipeline = pipeline(&development_config(), Arc::new(FixtureGroupSource::new()));
        assert!(matches!(
            pipeline.create_thresholds(&["g".to_string()]).await,
            Err(LagError::Config(_))
        ));
        assert!(matches!(
            pipeline.delete_metric("g").await,
            Err(LagError::Config(_))
        ));
        assert!(matches!(
            pipeline.define_device().await,
            Err(LagError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_create_thresholds_overwrites_named_groups() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v1/thresholds/kafka.consumerlag.mongoinserter")
            .match_body(Matcher::PartialJson(json!({
                "eventName": "Kafka lag for MongoInserter"
            })))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let pipeline = pipeline(
            &backend_config(&server.url()),
            Arc::new(FixtureGroupSource::new()),
        );
        let failures = pipeline
            .create_thresholds(&["MongoInserter".to_string()])
            .await
            .unwrap();

        assert_eq!(failures, 0);
        mock.assert_async().await;
    }
}
