use crate::backend::request::RequestError;
use crate::backend::{MonitoringBackend, RemoteCatalog};
use crate::config::{Config, ThresholdSettings};
use crate::error::{LagError, Result};
use crate::metrics::definitions::{CONSUMER_GROUP_PLACEHOLDER, metric_id, threshold_id};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const BAD_REQUEST: u16 = 400;

/// One alerting rule bound to a group's timeseries.
///
/// Fields the exporter does not interpret (threshold value, alert condition, sampling...)
/// travel through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDefinition {
    pub consumer_group: String,
    #[serde(rename = "eventName")]
    pub event_name: String,
    pub description: String,
    #[serde(rename = "thresholdId", default, skip_serializing_if = "Option::is_none")]
    pub threshold_id: Option<String>,
    #[serde(rename = "timeseriesId", default, skip_serializing_if = "Option::is_none")]
    pub timeseries_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where threshold definitions come from. Called once per resolution.
pub trait ThresholdSource: Send + Sync {
    fn load(&self) -> Result<ThresholdSettings>;
}

/// Re-reads the `[thresholds]` section of the configuration file on every load.
pub struct ConfigFileThresholds {
    path: PathBuf,
}

impl ConfigFileThresholds {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ThresholdSource for ConfigFileThresholds {
    fn load(&self) -> Result<ThresholdSettings> {
        Config::load_thresholds(&self.path)
    }
}

impl ThresholdSource for ThresholdSettings {
    fn load(&self) -> Result<ThresholdSettings> {
        Ok(self.clone())
    }
}

/// Compute the effective definition for `group` from a set of settings.
///
/// The returned value is always an independent copy; `settings` is never modified.
pub fn effective_definition(
    settings: &ThresholdSettings,
    group: &str,
) -> Result<ThresholdDefinition> {
    let mut definition = match settings
        .threshold_list
        .iter()
        .find(|d| d.consumer_group == group)
    {
        Some(found) => {
            debug!(group = group, "Using threshold override");
            found.clone()
        }
        None => {
            let mut copy = settings.default_definition().cloned().ok_or_else(|| {
                LagError::Config(format!(
                    "no threshold entry named by default_threshold '{}'",
                    settings.default_threshold
                ))
            })?;
            copy.consumer_group = group.to_string();
            copy
        }
    };

    definition.event_name = definition.event_name.replace(CONSUMER_GROUP_PLACEHOLDER, group);
    definition.description = definition.description.replace(CONSUMER_GROUP_PLACEHOLDER, group);
    definition.timeseries_id = Some(metric_id(group));
    definition.threshold_id = Some(threshold_id(group));

    Ok(definition)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdOutcome {
    Skipped,
    Upserted { status_code: u16 },
    /// Threshold catalog unavailable and overwrite not requested.
    Unverified,
    /// The backend answered 400: the definition itself is wrong.
    Rejected,
    Failed,
}

impl ThresholdOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected | Self::Failed)
    }
}

pub struct ThresholdReconciler {
    backend: Arc<MonitoringBackend>,
    source: Arc<dyn ThresholdSource>,
}

impl ThresholdReconciler {
    pub fn new(backend: Arc<MonitoringBackend>, source: Arc<dyn ThresholdSource>) -> Self {
        Self { backend, source }
    }

    /// Resolve against freshly loaded settings.
    pub fn resolve(&self, group: &str) -> Result<ThresholdDefinition> {
        let settings = self.source.load()?;
        effective_definition(&settings, group)
    }

    #[instrument(skip(self, catalog))]
    pub async fn ensure_threshold(
        &self,
        group: &str,
        catalog: Option<&RemoteCatalog>,
        overwrite: bool,
    ) -> ThresholdOutcome {
        let key = threshold_id(group);

        if !overwrite {
            match catalog {
                Some(catalog) if catalog.contains(&key) => {
                    info!(category = "CreateThresholds", threshold_id = %key, "Skipped");
                    return ThresholdOutcome::Skipped;
                }
                Some(_) => {}
                None => {
                    warn!(
                        category = "CreateThresholds",
                        threshold_id = %key,
                        "Threshold catalog unavailable, not creating"
                    );
                    return ThresholdOutcome::Unverified;
                }
            }
        }

        let definition = match self.resolve(group) {
            Ok(d) => d,
            Err(e) => {
                error!(
                    category = "CreateThresholds",
                    consumer_group = group,
                    error = %e,
                    "unable to resolve threshold"
                );
                return ThresholdOutcome::Failed;
            }
        };

        info!(
            category = "CreateThresholds",
            threshold_id = %key,
            event_name = %definition.event_name,
            overwrite = overwrite,
            "Starting"
        );

        match self.backend.put_threshold(&key, &definition).await {
            Ok(outcome) if outcome.status_code == BAD_REQUEST => {
                error!(category = "CreateThresholds", threshold_id = %key, "Threshold rejected");
                ThresholdOutcome::Rejected
            }
            Ok(outcome) => {
                info!(
                    category = "CreateThresholds",
                    threshold_id = %key,
                    status = outcome.status_code,
                    "Results"
                );
                ThresholdOutcome::Upserted {
                    status_code: outcome.status_code,
                }
            }
            Err(RequestError::Rejected {
                status: BAD_REQUEST,
                content,
                ..
            }) => {
                error!(
                    category = "CreateThresholds",
                    threshold_id = %key,
                    content = %content,
                    "Threshold rejected"
                );
                ThresholdOutcome::Rejected
            }
            Err(e) => {
                error!(
                    category = "CreateThresholds",
                    threshold_id = %key,
                    status = ?e.status(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "unable to create threshold"
                );
                ThresholdOutcome::Failed
            }
        }
    }
}
