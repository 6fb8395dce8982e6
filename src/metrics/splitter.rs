use crate::error::{LagError, Result};
use crate::metrics::types::MetricBatch;
use std::borrow::Cow;
use tracing::debug;

/// How a batch will be partitioned for a given byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    pub total_bytes: usize,
    pub budget: usize,
    pub num_series: usize,
    pub num_splits: usize,
    pub increment: usize,
}

impl SplitPlan {
    fn compute(batch: &MetricBatch, budget: usize) -> Result<Self> {
        if budget == 0 {
            return Err(LagError::Config(
                "batch byte budget must be a positive integer".to_string(),
            ));
        }

        let total_bytes = batch.encoded_len()?;
        let num_series = batch.len();

        // An empty series list cannot be made smaller, so it is sent whole.
        if total_bytes < budget || num_series == 0 {
            return Ok(Self {
                total_bytes,
                budget,
                num_series,
                num_splits: 1,
                increment: num_series,
            });
        }

        let num_splits = total_bytes.div_ceil(budget);
        let increment = num_series.div_ceil(num_splits);

        Ok(Self {
            total_bytes,
            budget,
            num_series,
            num_splits,
            increment,
        })
    }

    pub fn is_split(&self) -> bool {
        self.total_bytes >= self.budget && self.num_series > 0
    }
}

/// Lazily yields sub-batches that each carry a contiguous slice of the series list.
///
/// A batch under budget is yielded once, borrowed and unchanged. Restart by constructing a
/// new splitter over the same batch.
pub struct BatchSplitter<'a> {
    batch: &'a MetricBatch,
    plan: SplitPlan,
    position: usize,
    emitted_whole: bool,
}

impl<'a> BatchSplitter<'a> {
    pub fn new(batch: &'a MetricBatch, budget: usize) -> Result<Self> {
        let plan = SplitPlan::compute(batch, budget)?;

        if plan.is_split() {
            debug!(
                category = "SplitRequest",
                byte_size_total = plan.total_bytes,
                byte_size_limit = plan.budget,
                num_series = plan.num_series,
                num_splits = plan.num_splits,
                increment = plan.increment,
                "Splitting batch into smaller requests"
            );
        } else {
            debug!(
                category = "SplitRequest",
                byte_size_total = plan.total_bytes,
                byte_size_limit = plan.budget,
                "Batch within budget, not splitting"
            );
        }

        Ok(Self {
            batch,
            plan,
            position: 0,
            emitted_whole: false,
        })
    }

    pub fn plan(&self) -> &SplitPlan {
        &self.plan
    }
}

impl<'a> Iterator for BatchSplitter<'a> {
    type Item = Cow<'a, MetricBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.plan.is_split() {
            if self.emitted_whole {
                return None;
            }
            self.emitted_whole = true;
            return Some(Cow::Borrowed(self.batch));
        }

        if self.position >= self.plan.num_series {
            return None;
        }

        let start = self.position;
        let end = (start + self.plan.increment).min(self.plan.num_series);
        self.position = end;

        let sub_batch = MetricBatch {
            metric_type: self.batch.metric_type.clone(),
            series: self.batch.series[start..end].to_vec(),
        };

        debug!(
            category = "SplitRequest",
            splice_start = start,
            splice_end = end,
            byte_size_smaller_request = sub_batch.encoded_len().unwrap_or_default(),
            "Smaller request"
        );

        Some(Cow::Owned(sub_batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::batch::MetricBatchBuilder;
    use crate::metrics::definitions::{METRIC_ID_TEMPLATE, METRIC_TYPE};
    use crate::test_strategies::strategies::arb_batch;
    use proptest::prelude::*;

    fn make_batch(num_series: usize) -> MetricBatch {
        let mut batch = MetricBatch::new(METRIC_TYPE);
        for i in 0..num_series {
            MetricBatchBuilder::append(
                &mut batch,
                METRIC_ID_TEMPLATE,
                "MongoInserter",
                &format!("topic-{i:02}"),
                1_700_000_000_000,
                42,
            );
        }
        batch
    }

    #[test]
    fn test_under_budget_yields_original() {
        let batch = make_batch(3);
        let parts: Vec<_> = BatchSplitter::new(&batch, 10_000).unwrap().collect();

        assert_eq!(parts.len(), 1);
        assert!(matches!(parts[0], Cow::Borrowed(_)));
        assert_eq!(parts[0].as_ref(), &batch);
    }

    #[test]
    fn test_hundred_series_split_into_three() {
        let batch = make_batch(100);
        let total = batch.encoded_len().unwrap();
        assert!(total > 10_000 && total <= 15_000, "total was {total}");

        let splitter = BatchSplitter::new(&batch, 5_000).unwrap();
        assert_eq!(splitter.plan().num_splits, 3);
        assert_eq!(splitter.plan().increment, 34);

        let sizes: Vec<usize> = splitter.map(|b| b.len()).collect();
        assert_eq!(sizes, vec![34, 34, 32]);
    }

    #[test]
    fn test_sub_batches_keep_type_tag() {
        let batch = make_batch(10);
        for part in BatchSplitter::new(&batch, 200).unwrap() {
            assert_eq!(part.metric_type, METRIC_TYPE);
        }
    }

    #[test]
    fn test_size_equal_to_budget_is_split() {
        let batch = make_batch(4);
        let total = batch.encoded_len().unwrap();

        let parts: Vec<_> = BatchSplitter::new(&batch, total).unwrap().collect();
        assert_eq!(parts.len(), 1);
        assert!(matches!(parts[0], Cow::Owned(_)));
        assert_eq!(parts[0].series, batch.series);
    }

    #[test]
    fn test_empty_batch_over_budget_yields_once() {
        let batch = MetricBatch::new(METRIC_TYPE);
        let parts: Vec<_> = BatchSplitter::new(&batch, 1).unwrap().collect();

        assert_eq!(parts.len(), 1);
        assert!(parts[0].is_empty());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let batch = make_batch(1);
        assert!(BatchSplitter::new(&batch, 0).is_err());
    }

    #[test]
    fn test_restartable() {
        let batch = make_batch(20);
        let first: Vec<_> = BatchSplitter::new(&batch, 500).unwrap().collect();
        let second: Vec<_> = BatchSplitter::new(&batch, 500).unwrap().collect();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_concatenation_reproduces_series(
            batch in arb_batch(),
            budget in 1usize..20_000,
        ) {
            let parts: Vec<_> = BatchSplitter::new(&batch, budget).unwrap().collect();
            prop_assert!(!parts.is_empty());

            let rejoined: Vec<_> = parts
                .iter()
                .flat_map(|p| p.series.iter().cloned())
                .collect();
            prop_assert_eq!(rejoined, batch.series.clone());

            if batch.encoded_len().unwrap() < budget {
                prop_assert_eq!(parts.len(), 1);
                prop_assert_eq!(parts[0].as_ref(), &batch);
            }
        }
    }
}
