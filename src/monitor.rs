//! Point-in-time observability snapshot.
//!
//! Combines the quality aggregator's rolling statistics with the limiter's
//! current occupancy into one serializable value, for whatever external
//! tooling the embedding application wires up.

use crate::limiter::{ConcurrencyLimiter, LimiterOccupancy};
use crate::quality::{QualityAggregator, WindowStats};
use serde::Serialize;

/// Snapshot of pipeline health at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub quality: WindowStats,
    pub capacity: LimiterOccupancy,
}

impl MonitorSnapshot {
    pub fn capture(quality: &QualityAggregator, limiter: &ConcurrencyLimiter) -> Self {
        Self {
            quality: quality.global_stats(),
            capacity: limiter.occupancy(),
        }
    }
}
