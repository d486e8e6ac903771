use crate::Embedding;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The layout of a single bucket.
pub struct BucketReport {
    /// The bucket key.
    pub key: u32,
    /// The bit code of the bucket key.
    pub bits: String,
    /// The positions of the bucket's pages, head first.
    pub pages: Vec<usize>,
    /// The number of items in the bucket.
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A diagnostic snapshot of an index, for logs and operational inspection.
///
/// The [`Display`](fmt::Display) form lists the hyperplanes, then one line per bucket in ascending key order, then a summary of how evenly items are spread across buckets.
pub struct DumpReport {
    /// The hyperplane normals, in bit order.
    pub hyperplanes: Vec<Embedding>,
    /// Every bucket, in ascending key order.
    pub buckets: Vec<BucketReport>,
    /// The number of items across all buckets.
    pub total_items: usize,
    /// The mean number of items per bucket.
    pub mean: f64,
    /// The population standard deviation of the number of items per bucket.
    pub stddev: f64,
}

impl DumpReport {
    pub(crate) fn new(hyperplanes: Vec<Embedding>, buckets: Vec<BucketReport>) -> Self {
        let (sum, square_sum) = buckets.iter().fold((0.0, 0.0), |(sum, square_sum), b| {
            let n = b.items as f64;
            (sum + n, square_sum + n * n)
        });
        let (mean, stddev) = match buckets.len() {
            0 => (0.0, 0.0),
            k => {
                let mean = sum / k as f64;
                // Rounding can leave the variance a hair below zero.
                let variance = (square_sum / k as f64 - mean * mean).max(0.0);
                (mean, variance.sqrt())
            }
        };
        Self {
            hyperplanes,
            total_items: buckets.iter().map(|b| b.items).sum(),
            buckets,
            mean,
            stddev,
        }
    }
}

impl fmt::Display for DumpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hyperplane --- ")?;
        for (i, hyperplane) in self.hyperplanes.iter().enumerate() {
            writeln!(f, "{}: {:?}", i, hyperplane)?;
        }
        for bucket in &self.buckets {
            writeln!(
                f,
                "key({:08}:{}) -> page({:?}) = {} items",
                bucket.key, bucket.bits, bucket.pages, bucket.items
            )?;
        }
        write!(
            f,
            "total items = {} / keys = {}, mean = {:.6}, stddev = {:.6}",
            self.total_items,
            self.buckets.len(),
            self.mean,
            self.stddev
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(key: u32, items: usize) -> BucketReport {
        BucketReport {
            key,
            bits: format!("{:04b}", key),
            pages: vec![key as usize],
            items,
        }
    }

    #[test]
    fn summary_statistics() {
        let report = DumpReport::new(vec![], vec![bucket(1, 2), bucket(2, 4), bucket(3, 6)]);
        assert_eq!(report.total_items, 12);
        assert!((report.mean - 4.0).abs() < 1e-9);
        assert!((report.stddev - (8.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_report_has_zero_statistics() {
        let report = DumpReport::new(vec![vec![1.0, 2.0]], vec![]);
        assert_eq!(report.mean, 0.0);
        assert_eq!(report.stddev, 0.0);
        assert_eq!(
            report.to_string(),
            "hyperplane --- \n0: [1.0, 2.0]\ntotal items = 0 / keys = 0, mean = 0.000000, stddev = 0.000000"
        );
    }

    #[test]
    fn bucket_lines() {
        let report = DumpReport::new(vec![], vec![bucket(5, 3)]);
        let text = report.to_string();
        assert!(text.contains("key(00000005:0101) -> page([5]) = 3 items\n"));
        assert!(text.ends_with("mean = 3.000000, stddev = 0.000000"));
    }
}
