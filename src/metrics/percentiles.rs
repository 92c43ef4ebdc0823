use std::collections::BTreeMap;

use hdrhistogram::{CreationError, Histogram};
use serde::Serialize;

use crate::store::OperationLogEntry;

/// HdrHistogram range: 1 ms → 1 h, 3 significant figures.
/// Zero-millisecond samples land in the lowest bucket.
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 3_600_000;
const HIST_SIGFIG: u8 = 3;

/// A complete percentile breakdown of `execution_time` (ms).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: u64,
}

impl PercentileSet {
    /// Extract a full percentile set from an HdrHistogram.
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.is_empty() {
            return Self::empty();
        }

        Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.50),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            p999: hist.value_at_quantile(0.999),
            count: hist.len(),
        }
    }

    pub fn empty() -> Self {
        Self {
            min: 0,
            max: 0,
            mean: 0.0,
            p50: 0,
            p95: 0,
            p99: 0,
            p999: 0,
            count: 0,
        }
    }
}

/// Body of `GET /api/metrics/latency`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub overall: PercentileSet,
    pub by_operation: BTreeMap<String, PercentileSet>,
}

impl LatencyReport {
    /// Builds fresh histograms from the given entries; nothing is retained
    /// between calls.
    pub fn from_entries(entries: &[OperationLogEntry]) -> Result<Self, CreationError> {
        let mut overall = new_histogram()?;
        let mut per_op: BTreeMap<String, Histogram<u64>> = BTreeMap::new();

        for entry in entries {
            let ms = entry.execution_time.max(0) as u64;
            overall.saturating_record(ms);

            let key = entry.operation.as_str();
            if !per_op.contains_key(key) {
                per_op.insert(key.to_string(), new_histogram()?);
            }
            if let Some(hist) = per_op.get_mut(key) {
                hist.saturating_record(ms);
            }
        }

        Ok(Self {
            overall: PercentileSet::from_histogram(&overall),
            by_operation: per_op
                .iter()
                .map(|(op, hist)| (op.clone(), PercentileSet::from_histogram(hist)))
                .collect(),
        })
    }
}

fn new_histogram() -> Result<Histogram<u64>, CreationError> {
    Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Operation, OperationStatus};
    use chrono::Utc;
    use serde_json::Map;

    fn entry(id: i64, operation: Operation, ms: i64) -> OperationLogEntry {
        OperationLogEntry {
            id,
            operation,
            inputs: Map::new(),
            result: 0.0,
            timestamp: Utc::now(),
            execution_time: ms,
            status: OperationStatus::Success,
        }
    }

    #[test]
    fn empty_report() {
        let report = LatencyReport::from_entries(&[]).unwrap();
        assert_eq!(report.overall, PercentileSet::empty());
        assert!(report.by_operation.is_empty());
    }

    #[test]
    fn groups_by_operation() {
        let entries: Vec<_> = (1..=100)
            .map(|i| entry(i, Operation::Fibonacci, i))
            .chain([entry(101, Operation::Power, 0), entry(102, Operation::Power, 4)])
            .collect();

        let report = LatencyReport::from_entries(&entries).unwrap();
        assert_eq!(report.overall.count, 102);
        assert_eq!(report.overall.min, 0);
        assert_eq!(report.overall.max, 100);

        let fib = &report.by_operation["fibonacci"];
        assert_eq!(fib.count, 100);
        assert_eq!(fib.p50, 50);
        assert!((98..=100).contains(&fib.p99));

        let power = &report.by_operation["power"];
        assert_eq!(power.count, 2);
        assert_eq!(power.max, 4);
        assert!(!report.by_operation.contains_key("factorial"));
    }
}
