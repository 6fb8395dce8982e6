use crate::error::{LagError, Result};
use crate::reconcile::threshold::ThresholdDefinition;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\??([^}:-]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
});

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub exporter: ExporterConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub thresholds: ThresholdSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExporterConfig {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Upper bound on a whole cycle. Groups are processed one at a time, so this may
    /// legitimately exceed `poll_interval`.
    #[serde(with = "humantime_serde", default = "default_collection_timeout")]
    pub collection_timeout: Duration,
    /// Metric and threshold existence is reconciled on the first cycle and then on every
    /// cycle number divisible by this value.
    #[serde(default = "default_check_every")]
    pub check_metrics_every_x_loops: u64,
    /// Byte budget for a single publish request; larger batches are split.
    #[serde(default = "default_send_byte_size_limit")]
    pub send_byte_size_limit: usize,
    /// Use fixture data instead of invoking the Kafka tooling, skip backend calls and stop
    /// after a single cycle.
    #[serde(default)]
    pub development: bool,
    /// Compute lag but never talk to the monitoring backend.
    #[serde(default)]
    pub kafka_only: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Command that prints one consumer group per line, e.g.
    /// `["kafka-consumer-groups.sh", "--bootstrap-server", "host:9092", "--list"]`.
    #[serde(default)]
    pub list_command: Vec<String>,
    /// Command that describes a group; `--group <name>` is appended per call.
    #[serde(default)]
    pub describe_command: Vec<String>,
    #[serde(with = "humantime_serde", default = "default_command_timeout")]
    pub command_timeout: Duration,
    #[serde(default = "default_whitelist")]
    pub group_whitelist: Vec<String>,
    #[serde(default)]
    pub group_blacklist: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default)]
    pub url_tenant: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_custom_device")]
    pub custom_device: String,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub device: DeviceConfig,
}

/// How the custom device presents itself when registered with `define-device`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Falls back to `custom_device` when empty.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub listen_ports: Vec<u16>,
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,
    #[serde(default)]
    pub config_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Threshold definitions as stored on disk: one named default plus per-group overrides.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ThresholdSettings {
    #[serde(default)]
    pub default_threshold: String,
    #[serde(default)]
    pub threshold_list: Vec<ThresholdDefinition>,
}

#[derive(Deserialize)]
struct ThresholdsOnly {
    #[serde(default)]
    thresholds: ThresholdSettings,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_collection_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_check_every() -> u64 {
    10
}

fn default_send_byte_size_limit() -> usize {
    crate::metrics::definitions::DEFAULT_SEND_BYTE_SIZE_LIMIT
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_whitelist() -> Vec<String> {
    vec![".*".to_string()]
}

fn default_custom_device() -> String {
    "kafka-consumerlag".to_string()
}

fn default_device_type() -> String {
    crate::metrics::definitions::METRIC_TYPE.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            collection_timeout: default_collection_timeout(),
            check_metrics_every_x_loops: default_check_every(),
            send_byte_size_limit: default_send_byte_size_limit(),
            development: false,
            kafka_only: false,
            debug: false,
            health: HealthConfig::default(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            list_command: Vec::new(),
            describe_command: Vec::new(),
            command_timeout: default_command_timeout(),
            group_whitelist: default_whitelist(),
            group_blacklist: Vec::new(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url_tenant: String::new(),
            headers: HashMap::new(),
            custom_device: default_custom_device(),
            request_timeout: default_request_timeout(),
            device: DeviceConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            ip_addresses: Vec::new(),
            listen_ports: Vec::new(),
            device_type: default_device_type(),
            config_url: String::new(),
            tags: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let content = read_config_file(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Re-read only the threshold section from disk. Used on every threshold resolution so
    /// that no in-memory copy can drift between groups.
    pub fn load_thresholds(path: &Path) -> Result<ThresholdSettings> {
        let content = read_config_file(path)?;
        let parsed: ThresholdsOnly = toml::from_str(&content)?;
        Ok(parsed.thresholds)
    }

    fn substitute_env_vars(content: &str) -> String {
        // Supports:
        // - ${VAR} - replaced with env var value, empty string if not set
        // - ${VAR:-default} - replaced with env var value, or "default" if not set
        // - ${?VAR} - same as ${VAR}
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default_value = caps.get(2).map_or("", |m| m.as_str());
                std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
            })
            .to_string()
    }

    /// Whether this run is allowed to call the monitoring backend at all.
    pub fn backend_enabled(&self) -> bool {
        !self.exporter.development && !self.exporter.kafka_only
    }

    pub fn validate(&self) -> Result<()> {
        if self.exporter.send_byte_size_limit == 0 {
            return Err(LagError::Config(
                "send_byte_size_limit must be a positive integer".to_string(),
            ));
        }

        if self.exporter.collection_timeout.is_zero() {
            return Err(LagError::Config(
                "collection_timeout must be greater than zero".to_string(),
            ));
        }

        if self.exporter.check_metrics_every_x_loops == 0 {
            return Err(LagError::Config(
                "check_metrics_every_x_loops must be a positive integer".to_string(),
            ));
        }

        if !self.exporter.development {
            if self.kafka.list_command.is_empty() {
                return Err(LagError::Config(
                    "kafka.list_command cannot be empty".to_string(),
                ));
            }
            if self.kafka.describe_command.is_empty() {
                return Err(LagError::Config(
                    "kafka.describe_command cannot be empty".to_string(),
                ));
            }
        }

        self.kafka.compile_filters()?;

        if self.backend_enabled() {
            self.backend.validate()?;
            self.thresholds.validate()?;
        }

        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(LagError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    Ok(Config::substitute_env_vars(&content))
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url_tenant.is_empty() {
            return Err(LagError::Config(
                "backend.url_tenant cannot be empty".to_string(),
            ));
        }

        url::Url::parse(&self.url_tenant).map_err(|e| {
            LagError::Config(format!("backend.url_tenant '{}': {e}", self.url_tenant))
        })?;

        if self.custom_device.is_empty() {
            return Err(LagError::Config(
                "backend.custom_device cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl ThresholdSettings {
    /// Locate the entry named by `default_threshold`.
    pub fn default_definition(&self) -> Option<&ThresholdDefinition> {
        self.threshold_list
            .iter()
            .find(|d| d.consumer_group == self.default_threshold)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_threshold.is_empty() {
            return Err(LagError::Config(
                "thresholds.default_threshold cannot be empty".to_string(),
            ));
        }

        if self.default_definition().is_none() {
            return Err(LagError::Config(format!(
                "thresholds.threshold_list has no entry for default_threshold '{}'",
                self.default_threshold
            )));
        }

        Ok(())
    }
}

impl KafkaConfig {
    pub fn compile_filters(&self) -> Result<GroupFilters> {
        let whitelist = self
            .group_whitelist
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let blacklist = self
            .group_blacklist
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(GroupFilters {
            whitelist,
            blacklist,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GroupFilters {
    pub whitelist: Vec<Regex>,
    pub blacklist: Vec<Regex>,
}

impl GroupFilters {
    pub fn matches(&self, group: &str) -> bool {
        let matches_whitelist = self.whitelist.iter().any(|r| r.is_match(group));
        let matches_blacklist = self.blacklist.iter().any(|r| r.is_match(group));
        matches_whitelist && !matches_blacklist
    }
}
