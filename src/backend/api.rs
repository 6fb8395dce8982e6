use crate::backend::catalog::{RemoteCatalog, THRESHOLD_KEY, TIMESERIES_KEY};
use crate::backend::request::{HttpOutcome, RequestError, RequestExecutor};
use crate::config::BackendConfig;
use crate::error::{LagError, Result};
use crate::metrics::definitions::{API_CUSTOM_DEVICE, API_THRESHOLDS, API_TIMESERIES};
use crate::metrics::types::{CustomDeviceRegistration, MetricBatch, MetricDefinition};
use crate::reconcile::threshold::ThresholdDefinition;
use regex::Regex;
use reqwest::Url;
use tracing::{debug, warn};

type CallResult = std::result::Result<HttpOutcome, RequestError>;

/// Typed access to the monitoring backend endpoints.
pub struct MonitoringBackend {
    executor: RequestExecutor,
    base: Url,
}

impl MonitoringBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let executor = RequestExecutor::new(&config.headers, config.request_timeout)?;
        Self::with_executor(executor, &config.url_tenant)
    }

    pub fn with_executor(executor: RequestExecutor, url_tenant: &str) -> Result<Self> {
        let base = Url::parse(url_tenant)
            .map_err(|e| LagError::Config(format!("backend.url_tenant '{url_tenant}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(LagError::Config(format!(
                "backend.url_tenant '{url_tenant}' cannot be used as a base URL"
            )));
        }

        Ok(Self { executor, base })
    }

    /// Append `api_path` and an optional trailing segment to the tenant URL. Segments are
    /// percent-encoded individually, so ids may contain any character.
    fn endpoint(&self, api_path: &str, id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(api_path.split('/'));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    /// List existing metric definitions.
    pub async fn fetch_metric_catalog(&self) -> Result<RemoteCatalog> {
        let outcome = self
            .executor
            .get("APICall", self.endpoint(API_TIMESERIES, None))
            .await?;
        catalog_from(&outcome, TIMESERIES_KEY, None)
    }

    /// List existing thresholds, keeping those whose id matches `filter`.
    pub async fn fetch_threshold_catalog(&self, filter: Option<&Regex>) -> Result<RemoteCatalog> {
        let outcome = self
            .executor
            .get("GetThresholds", self.endpoint(API_THRESHOLDS, None))
            .await?;
        catalog_from(&outcome, THRESHOLD_KEY, filter)
    }

    pub async fn put_metric_definition(
        &self,
        metric_id: &str,
        definition: &MetricDefinition,
    ) -> CallResult {
        self.executor
            .put(
                "CreateMetric",
                self.endpoint(API_TIMESERIES, Some(metric_id)),
                definition,
            )
            .await
    }

    pub async fn delete_metric_definition(&self, metric_id: &str) -> CallResult {
        self.executor
            .delete("DeleteMetric", self.endpoint(API_TIMESERIES, Some(metric_id)))
            .await
    }

    pub async fn put_threshold(
        &self,
        threshold_id: &str,
        definition: &ThresholdDefinition,
    ) -> CallResult {
        self.executor
            .put(
                "CreateThresholds",
                self.endpoint(API_THRESHOLDS, Some(threshold_id)),
                definition,
            )
            .await
    }

    /// Publish one (already size-bounded) batch to the custom device.
    pub async fn publish_batch(&self, device: &str, batch: &MetricBatch) -> CallResult {
        debug!(
            device = device,
            series = batch.len(),
            "Publishing metric batch"
        );
        self.executor
            .post(
                "PushMetrics",
                self.endpoint(API_CUSTOM_DEVICE, Some(device)),
                batch,
            )
            .await
    }

    /// Create or update the custom device entity itself.
    pub async fn define_custom_device(
        &self,
        device: &str,
        registration: &CustomDeviceRegistration,
    ) -> CallResult {
        self.executor
            .post(
                "DefineDevice",
                self.endpoint(API_CUSTOM_DEVICE, Some(device)),
                registration,
            )
            .await
    }
}

fn catalog_from(outcome: &HttpOutcome, key: &str, filter: Option<&Regex>) -> Result<RemoteCatalog> {
    RemoteCatalog::from_listing(&outcome.json, key, filter).ok_or_else(|| {
        warn!(key = key, "Catalog listing has an unexpected shape");
        LagError::Catalog(format!("listing response carries no '{key}' entries"))
    })
}
