//! Monitoring backend access: the request chokepoint, catalog listings and typed endpoints.

pub mod api;
pub mod catalog;
pub mod request;

pub use api::MonitoringBackend;
pub use catalog::RemoteCatalog;
