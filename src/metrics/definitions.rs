use crate::config::DeviceConfig;
use crate::metrics::types::{
    CustomDeviceRegistration, Dimensions, MetricDataPoint, MetricSeriesEntry,
};

pub const METRIC_ID_TEMPLATE: &str = "custom:kafka.consumerlag.$metric_key.count";
pub const METRIC_KEY_PLACEHOLDER: &str = "$metric_key";
pub const THRESHOLD_ID_PREFIX: &str = "kafka.consumerlag.";
pub const CONSUMER_GROUP_PLACEHOLDER: &str = "$consumer_group";

pub const METRIC_TYPE: &str = "Kafka";
pub const METRIC_UNIT: &str = "Count";
pub const METRIC_DISPLAY_PREFIX: &str = "Lag - ";
pub const DIMENSION_TOPIC: &str = "topic";

/// Client-side filter applied to the remote threshold catalog.
pub const THRESHOLD_CATALOG_FILTER: &str = "kafka";

pub const DEFAULT_SEND_BYTE_SIZE_LIMIT: usize = 10_000;

pub const API_TIMESERIES: &str = "api/v1/timeseries";
pub const API_THRESHOLDS: &str = "api/v1/thresholds";
pub const API_CUSTOM_DEVICE: &str = "api/v1/entity/infrastructure/custom";

pub const HEARTBEAT_TIMESERIES_ID: &str = "custom:device.heartbeat.count";

/// Timeseries id for a consumer group. Case-insensitive on the group name.
pub fn metric_id(group: &str) -> String {
    METRIC_ID_TEMPLATE.replace(METRIC_KEY_PLACEHOLDER, &group.to_lowercase())
}

/// Threshold key for a consumer group, used both as `thresholdId` and in the URL.
pub fn threshold_id(group: &str) -> String {
    format!("{THRESHOLD_ID_PREFIX}{}", group.to_lowercase())
}

/// Registration payload for `device`, with one heartbeat point at `timestamp_ms`.
pub fn device_registration(
    device: &str,
    config: &DeviceConfig,
    timestamp_ms: i64,
) -> CustomDeviceRegistration {
    let display_name = if config.display_name.is_empty() {
        device.to_string()
    } else {
        config.display_name.clone()
    };

    CustomDeviceRegistration {
        display_name,
        ip_addresses: config.ip_addresses.clone(),
        listen_ports: config.listen_ports.clone(),
        device_type: config.device_type.clone(),
        config_url: config.config_url.clone(),
        tags: config.tags.clone(),
        properties: config.properties.clone(),
        series: vec![MetricSeriesEntry {
            timeseries_id: HEARTBEAT_TIMESERIES_ID.to_string(),
            dimensions: Dimensions::new(),
            data_points: vec![MetricDataPoint::new(timestamp_ms, 1)],
        }],
    }
}
