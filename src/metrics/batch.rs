use crate::metrics::definitions::{DIMENSION_TOPIC, METRIC_KEY_PLACEHOLDER};
use crate::metrics::types::{Dimensions, MetricBatch, MetricDataPoint, MetricSeriesEntry};

/// Accumulates one sample per group/topic into a publishable batch.
pub struct MetricBatchBuilder;

impl MetricBatchBuilder {
    /// Append a single-point series entry for `group`/`topic`.
    ///
    /// `$metric_key` in `template` is replaced by the lowercased group name. Repeated calls
    /// for the same group and topic append separate entries.
    pub fn append(
        batch: &mut MetricBatch,
        template: &str,
        group: &str,
        topic: &str,
        timestamp_ms: i64,
        value: i64,
    ) {
        let timeseries_id = template.replace(METRIC_KEY_PLACEHOLDER, &group.to_lowercase());

        let mut dimensions = Dimensions::new();
        dimensions.insert(DIMENSION_TOPIC.to_string(), topic.to_string());

        batch.series.push(MetricSeriesEntry {
            timeseries_id,
            dimensions,
            data_points: vec![MetricDataPoint::new(timestamp_ms, value)],
        });
    }
}
