pub mod percentiles;
pub mod stream;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::UsageTotals;

pub use percentiles::LatencyReport;

/// Body of `GET /api/metrics`. Recomputed from the Log Store on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    pub total_requests: u64,
    /// Mean `execution_time` in milliseconds
    pub average_response_time: f64,
    /// Percentage (0–100) of entries with status "success"
    pub success_rate: f64,
    pub operation_counts: BTreeMap<String, u64>,
}

impl SystemMetrics {
    /// An empty store yields all zeros rather than dividing by zero.
    pub fn from_totals(totals: UsageTotals) -> Self {
        let (average_response_time, success_rate) = if totals.total_requests > 0 {
            let n = totals.total_requests as f64;
            (
                totals.total_execution_time as f64 / n,
                totals.successes as f64 / n * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total_requests: totals.total_requests,
            average_response_time,
            success_rate,
            operation_counts: totals.operation_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_store_is_all_zero() {
        let metrics = SystemMetrics::from_totals(UsageTotals::default());
        assert_eq!(
            serde_json::to_value(&metrics).unwrap(),
            json!({
                "total_requests": 0,
                "average_response_time": 0.0,
                "success_rate": 0.0,
                "operation_counts": {}
            })
        );
    }

    #[test]
    fn ratios_over_totals() {
        let mut counts = BTreeMap::new();
        counts.insert("power".to_string(), 3);
        counts.insert("fibonacci".to_string(), 1);
        let metrics = SystemMetrics::from_totals(UsageTotals {
            total_requests: 4,
            total_execution_time: 10,
            successes: 3,
            operation_counts: counts,
        });
        assert_eq!(metrics.total_requests, 4);
        assert!((metrics.average_response_time - 2.5).abs() < 1e-9);
        assert!((metrics.success_rate - 75.0).abs() < 1e-9);
        assert_eq!(metrics.operation_counts["power"], 3);
    }
}
