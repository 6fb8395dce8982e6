use crate::backend::{MonitoringBackend, RemoteCatalog};
use crate::metrics::definitions::{
    DIMENSION_TOPIC, METRIC_DISPLAY_PREFIX, METRIC_TYPE, METRIC_UNIT, metric_id,
};
use crate::metrics::types::MetricDefinition;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome {
    /// The backend accepted the definition; carries the response body.
    Created(Value),
    AlreadyExists,
    /// No catalog to check against, so nothing was created.
    Unverified,
    Failed,
}

impl MetricOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Ensures a timeseries definition exists for every observed group.
pub struct MetricReconciler {
    backend: Arc<MonitoringBackend>,
}

impl MetricReconciler {
    pub fn new(backend: Arc<MonitoringBackend>) -> Self {
        Self { backend }
    }

    pub fn definition(group: &str) -> MetricDefinition {
        MetricDefinition {
            display_name: format!("{METRIC_DISPLAY_PREFIX}{group}"),
            unit: METRIC_UNIT.to_string(),
            dimensions: vec![DIMENSION_TOPIC.to_string()],
            types: vec![METRIC_TYPE.to_string()],
        }
    }

    #[instrument(skip(self, catalog))]
    pub async fn ensure_metric_exists(
        &self,
        group: &str,
        catalog: Option<&RemoteCatalog>,
    ) -> MetricOutcome {
        let id = metric_id(group);

        let Some(catalog) = catalog else {
            warn!(
                category = "CreateMetric",
                metric_id = %id,
                "Metric catalog unavailable, not creating"
            );
            return MetricOutcome::Unverified;
        };

        if catalog.contains(&id) {
            info!(
                category = "CreateMetric",
                metric_id = %id,
                "Skipped, already exists"
            );
            return MetricOutcome::AlreadyExists;
        }

        match self
            .backend
            .put_metric_definition(&id, &Self::definition(group))
            .await
        {
            Ok(outcome) => {
                info!(
                    category = "CreateMetric",
                    metric_id = %id,
                    status = outcome.status_code,
                    "Created"
                );
                MetricOutcome::Created(outcome.json)
            }
            Err(e) => {
                error!(
                    category = "CreateMetric",
                    metric_id = %id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "unable to create metric"
                );
                MetricOutcome::Failed
            }
        }
    }

    /// Remove the group's timeseries definition. Returns whether the backend accepted it.
    #[instrument(skip(self))]
    pub async fn delete_metric(&self, group: &str) -> bool {
        let id = metric_id(group);
        match self.backend.delete_metric_definition(&id).await {
            Ok(outcome) => {
                info!(
                    category = "DeleteMetric",
                    metric_id = %id,
                    status = outcome.status_code,
                    "Deleted"
                );
                true
            }
            Err(e) => {
                error!(
                    category = "DeleteMetric",
                    metric_id = %id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "unable to delete metric"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::request::RequestExecutor;
    use mockito::Matcher;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn reconciler(url: &str) -> MetricReconciler {
        let executor = RequestExecutor::new(&HashMap::new(), Duration::from_secs(5)).unwrap();
        let backend = MonitoringBackend::with_executor(executor, url).unwrap();
        MetricReconciler::new(Arc::new(backend))
    }

    #[test]
    fn test_definition_shape() {
        let definition = MetricReconciler::definition("MongoInserter");
        assert_eq!(
            serde_json::to_value(&definition).unwrap(),
            json!({
                "displayName": "Lag - MongoInserter",
                "unit": "Count",
                "dimensions": ["topic"],
                "types": ["Kafka"]
            })
        );
    }

    #[tokio::test]
    async fn test_existing_metric_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let catalog: RemoteCatalog = ["custom:kafka.consumerlag.mongoinserter.count"]
            .into_iter()
            .collect();
        let outcome = reconciler(&server.url())
            .ensure_metric_exists("MongoInserter", Some(&catalog))
            .await;

        assert_eq!(outcome, MetricOutcome::AlreadyExists);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_metric_is_created() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v1/timeseries/custom:kafka.consumerlag.harsplitter.count")
            .match_body(Matcher::PartialJson(json!({"displayName": "Lag - HARSplitter"})))
            .with_status(201)
            .with_body(r#"{"timeseriesId":"custom:kafka.consumerlag.harsplitter.count"}"#)
            .expect(1)
            .create_async()
            .await;

        let outcome = reconciler(&server.url())
            .ensure_metric_exists("HARSplitter", Some(&RemoteCatalog::default()))
            .await;

        assert_eq!(
            outcome,
            MetricOutcome::Created(json!({
                "timeseriesId": "custom:kafka.consumerlag.harsplitter.count"
            }))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unavailable_catalog_does_not_create() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let outcome = reconciler(&server.url())
            .ensure_metric_exists("HARSplitter", None)
            .await;

        assert_eq!(outcome, MetricOutcome::Unverified);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_create_is_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let outcome = reconciler(&server.url())
            .ensure_metric_exists("HARSplitter", Some(&RemoteCatalog::default()))
            .await;

        assert!(outcome.is_failure());
    }

    #[tokio::test]
    async fn test_delete_metric() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/v1/timeseries/custom:kafka.consumerlag.synth.count")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        assert!(reconciler(&server.url()).delete_metric("Synth").await);
        mock.assert_async().await;
    }
}
