//! Access to consumer group listings and per-group describe output.
//!
//! Production runs shell out to the Kafka `kafka-consumer-groups` tool; development runs use
//! canned output so the rest of the pipeline can be exercised without a broker.

pub mod command;
pub mod fixture;

use crate::error::Result;

/// Source of consumer group names and their raw describe output.
#[async_trait::async_trait]
pub trait ConsumerGroupSource: Send + Sync {
    /// Group names, blank lines removed, sorted lexicographically.
    async fn list_groups(&self) -> Result<Vec<String>>;

    /// Tabular describe output for a single group, unparsed.
    async fn describe_group(&self, group: &str) -> Result<String>;
}

/// Turn newline-delimited listing output into a sorted group list.
pub fn parse_group_list(raw: &str) -> Vec<String> {
    let mut groups: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    groups.sort();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_list_sorts_and_drops_blanks() {
        let raw = "MongoInserter\n\nHARSplitter\nSyntheticEngine\n\n";
        assert_eq!(
            parse_group_list(raw),
            vec!["HARSplitter", "MongoInserter", "SyntheticEngine"]
        );
    }

    #[test]
    fn test_parse_group_list_empty() {
        assert!(parse_group_list("").is_empty());
        assert!(parse_group_list("\n\n").is_empty());
    }
}
