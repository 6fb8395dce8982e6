use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Dimensions = BTreeMap<String, String>;

/// A single `(timestamp_ms, value)` sample, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDataPoint(pub i64, pub i64);

impl MetricDataPoint {
    pub const fn new(timestamp_ms: i64, value: i64) -> Self {
        Self(timestamp_ms, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeriesEntry {
    pub timeseries_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: Dimensions,
    pub data_points: Vec<MetricDataPoint>,
}

/// Publish payload for the custom-device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricBatch {
    #[serde(rename = "type")]
    pub metric_type: String,
    pub series: Vec<MetricSeriesEntry>,
}

impl MetricBatch {
    pub fn new(metric_type: impl Into<String>) -> Self {
        Self {
            metric_type: metric_type.into(),
            series: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Size of the compact JSON encoding, which is what goes on the wire.
    pub fn encoded_len(&self) -> serde_json::Result<usize> {
        serde_json::to_vec(self).map(|bytes| bytes.len())
    }
}

/// Body of `PUT /api/v1/timeseries/<metricId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub display_name: String,
    pub unit: String,
    pub dimensions: Vec<String>,
    pub types: Vec<String>,
}

/// Body of `POST /api/v1/entity/infrastructure/custom/<device>` when registering the
/// device itself. Carries a single heartbeat series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDeviceRegistration {
    pub display_name: String,
    pub ip_addresses: Vec<String>,
    pub listen_ports: Vec<u16>,
    #[serde(rename = "type")]
    pub device_type: String,
    pub config_url: String,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub series: Vec<MetricSeriesEntry>,
}
