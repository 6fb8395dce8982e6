//! Idempotent creation of metric and threshold definitions on the backend.

pub mod metric;
pub mod threshold;

pub use metric::MetricReconciler;
pub use threshold::ThresholdReconciler;
