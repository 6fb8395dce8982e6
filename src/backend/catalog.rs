use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

pub const TIMESERIES_KEY: &str = "timeseriesId";
pub const THRESHOLD_KEY: &str = "thresholdId";

/// The set of keys present in a remote listing. Only existence is ever checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteCatalog {
    keys: BTreeSet<String>,
}

impl RemoteCatalog {
    /// Collect `key` from every entry of a listing response.
    ///
    /// Accepts a bare array or an object wrapping the array under `values`. Returns `None`
    /// when the response has neither shape.
    pub fn from_listing(listing: &Value, key: &str, filter: Option<&Regex>) -> Option<Self> {
        let entries = match listing {
            Value::Array(entries) => entries,
            Value::Object(map) => map.get("values")?.as_array()?,
            _ => return None,
        };

        let keys = entries
            .iter()
            .filter_map(|entry| entry.get(key)?.as_str())
            .filter(|k| filter.is_none_or(|re| re.is_match(k)))
            .map(str::to_string)
            .collect();

        Some(Self { keys })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RemoteCatalog {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}
