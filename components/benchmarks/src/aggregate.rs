//! Sample aggregation
//!
//! Reduces a flat collection of per-trial samples into one score per
//! distinct snippet. Samples are grouped by `code`; the first name seen for
//! a code wins.

use core_types::{Sample, Test};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the samples of one snippet are reduced to a score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// Arithmetic mean, truncated toward zero
    #[default]
    Mean,
    /// Middle element of the sorted samples (upper middle for even counts)
    Median,
}

impl Statistic {
    fn reduce(self, mut ops: Vec<u64>) -> u64 {
        if ops.is_empty() {
            return 0;
        }
        match self {
            Statistic::Mean => {
                let sum: u128 = ops.iter().map(|&n| u128::from(n)).sum();
                (sum / ops.len() as u128) as u64
            }
            Statistic::Median => {
                ops.sort_unstable();
                ops[ops.len() / 2]
            }
        }
    }
}

/// Fold samples into one test per distinct code using the mean.
///
/// The output is ordered by code, so any permutation of the same samples
/// produces the same vector.
///
/// # Examples
///
/// ```
/// use benchmarks::aggregate;
/// use core_types::Sample;
///
/// let sample = |code: &str, ops| Sample { name: code.to_string(), code: code.to_string(), ops };
/// let scores = aggregate(&[sample("a", 10), sample("a", 20), sample("b", 5)]);
///
/// assert_eq!(scores.len(), 2);
/// assert_eq!((scores[0].code.as_str(), scores[0].ops), ("a", 15));
/// assert_eq!((scores[1].code.as_str(), scores[1].ops), ("b", 5));
/// ```
pub fn aggregate(samples: &[Sample]) -> Vec<Test> {
    aggregate_with(samples, Statistic::Mean)
}

/// Fold samples into one test per distinct code using `statistic`
pub fn aggregate_with(samples: &[Sample], statistic: Statistic) -> Vec<Test> {
    let mut groups: BTreeMap<&str, (&str, Vec<u64>)> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(sample.code.as_str())
            .or_insert_with(|| (sample.name.as_str(), Vec::new()))
            .1
            .push(sample.ops);
    }

    groups
        .into_iter()
        .map(|(code, (name, ops))| Test {
            name: name.to_string(),
            code: code.to_string(),
            ops: statistic.reduce(ops),
        })
        .collect()
}
