use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Substring the describe tool prints for a group that is gone or rebalancing.
pub const GROUP_MISSING_MARKER: &str = "does not exist";
pub const UNKNOWN_LAG: &str = "unknown";

const FIELD_GROUP: &str = "group";
const FIELD_TOPIC: &str = "topic";
const FIELD_PARTITION: &str = "partition";
const FIELD_CURRENT_OFFSET: &str = "current-offset";
const FIELD_LOG_END_OFFSET: &str = "log-end-offset";
const FIELD_LAG: &str = "lag";
const FIELD_OWNER: &str = "owner";
const FIELD_CONSUMER_ID: &str = "consumer-id";

/// Summed lag per topic for one group. Topics whose partitions are all `unknown` are absent.
pub type TopicLag = BTreeMap<String, i64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagValue {
    Known(i64),
    /// No committed offset yet, so lag cannot be measured.
    Unknown,
}

impl fmt::Display for LagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{v}"),
            Self::Unknown => f.write_str(UNKNOWN_LAG),
        }
    }
}

/// One data row of describe output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagLine {
    pub group: String,
    pub topic: String,
    pub partition: Option<String>,
    pub current_offset: Option<String>,
    pub log_end_offset: Option<String>,
    pub lag: LagValue,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLag {
    pub group_id: String,
    pub topics: TopicLag,
    pub parsed_rows: u64,
    pub unknown_rows: u64,
    pub faulted_rows: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowFault {
    #[error("expected {expected} columns, found {found}")]
    ColumnMismatch { expected: usize, found: usize },

    #[error("missing '{0}' column")]
    MissingField(&'static str),

    #[error("lag '{0}' is not a non-negative integer")]
    InvalidLag(String),
}

pub struct LagExtractor;

impl LagExtractor {
    /// Aggregate describe output for `group` into per-topic lag.
    ///
    /// Returns `None` ("no data") when the group is missing or the output has no data
    /// rows. `Some` with an empty map means rows were present but none were measurable.
    pub fn extract(group: &str, raw: &str) -> Option<GroupLag> {
        if raw.contains(GROUP_MISSING_MARKER) {
            warn!(group = group, "Consumer group does not exist or is rebalancing");
            return None;
        }

        let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<String> = lines
            .next()?
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut result = GroupLag {
            group_id: group.to_string(),
            topics: TopicLag::new(),
            parsed_rows: 0,
            unknown_rows: 0,
            faulted_rows: 0,
        };
        let mut saw_data_line = false;

        for (index, line) in lines.enumerate() {
            saw_data_line = true;

            let lag_line = match parse_row(group, &header, line) {
                Ok(l) => l,
                Err(fault) => {
                    warn!(
                        group = group,
                        row = index + 1,
                        error = %fault,
                        "Skipping malformed describe row"
                    );
                    result.faulted_rows += 1;
                    continue;
                }
            };

            debug!(
                group = %lag_line.group,
                topic = %lag_line.topic,
                partition = lag_line.partition.as_deref().unwrap_or("-"),
                current_offset = lag_line.current_offset.as_deref().unwrap_or("-"),
                log_end_offset = lag_line.log_end_offset.as_deref().unwrap_or("-"),
                lag = %lag_line.lag,
                owner = lag_line.owner.as_deref().unwrap_or("-"),
                "Lag row"
            );

            result.parsed_rows += 1;
            match lag_line.lag {
                LagValue::Known(lag) => {
                    let sum = result.topics.entry(lag_line.topic).or_insert(0);
                    *sum = sum.saturating_add(lag);
                }
                LagValue::Unknown => result.unknown_rows += 1,
            }
        }

        // Header only
        if !saw_data_line {
            return None;
        }

        Some(result)
    }
}

fn parse_row(group: &str, header: &[String], line: &str) -> Result<LagLine, RowFault> {
    let values: Vec<&str> = line.split_whitespace().collect();
    if values.len() != header.len() {
        return Err(RowFault::ColumnMismatch {
            expected: header.len(),
            found: values.len(),
        });
    }

    let record: HashMap<&str, &str> = header
        .iter()
        .map(String::as_str)
        .zip(values.iter().copied())
        .collect();

    let topic = record
        .get(FIELD_TOPIC)
        .ok_or(RowFault::MissingField(FIELD_TOPIC))?;
    let raw_lag = record
        .get(FIELD_LAG)
        .ok_or(RowFault::MissingField(FIELD_LAG))?;

    let lag = if *raw_lag == UNKNOWN_LAG {
        LagValue::Unknown
    } else {
        match raw_lag.parse::<i64>() {
            Ok(v) if v >= 0 => LagValue::Known(v),
            _ => return Err(RowFault::InvalidLag((*raw_lag).to_string())),
        }
    };

    let field = |name: &str| record.get(name).map(|v| (*v).to_string());

    Ok(LagLine {
        group: field(FIELD_GROUP).unwrap_or_else(|| group.to_string()),
        topic: (*topic).to_string(),
        partition: field(FIELD_PARTITION),
        current_offset: field(FIELD_CURRENT_OFFSET),
        log_end_offset: field(FIELD_LOG_END_OFFSET),
        lag,
        owner: field(FIELD_OWNER).or_else(|| field(FIELD_CONSUMER_ID)),
    })
}
