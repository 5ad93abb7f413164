//! Synchronizer metrics
//!
//! Prometheus-facing helpers plus an in-memory aggregator that summarises one
//! replay run.

use std::collections::BTreeMap;

use contracts::{FrameBatch, MissReason, SyncMiss, Timestamp};
use metrics::{counter, gauge, histogram};

/// Record one message read from the log
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_message_received;
///
/// while let Some(msg) = log.next_message()? {
///     record_message_received(msg.kind());
///     // ...
/// }
/// ```
pub fn record_message_received(kind: &'static str) {
    counter!("rig_syncer_messages_received_total", "kind" => kind).increment(1);
}

/// Record the topology transition
pub fn record_topology_resolved(camera_count: usize) {
    gauge!("rig_syncer_cameras").set(camera_count as f64);
    gauge!("rig_syncer_streaming").set(1.0);
}

/// Record a batch handed to the estimation engine
pub fn record_batch_emitted(batch: &FrameBatch) {
    counter!("rig_syncer_batches_emitted_total").increment(1);
    gauge!("rig_syncer_last_batch_stamp_seconds").set(batch.stamp.as_secs_f64());
}

/// Record the gap between consecutive batches
pub fn record_batch_interval_ms(interval_ms: f64) {
    histogram!("rig_syncer_batch_interval_ms").record(interval_ms);
}

/// Record a dropped instant
pub fn record_sync_miss(reason: &MissReason) {
    counter!("rig_syncer_sync_misses_total", "reason" => reason.label()).increment(1);
}

/// Record an image that never reached a complete set (`stale`, `evicted`, `mismatched`)
pub fn record_image_rejected(reason: &'static str) {
    counter!("rig_syncer_images_rejected_total", "reason" => reason).increment(1);
}

/// Record inertial ring buffer occupancy
pub fn record_inertial_buffer_depth(depth: usize) {
    gauge!("rig_syncer_inertial_buffer_depth").set(depth as f64);
}

/// Record the number of pending join slots
pub fn record_pending_joins(pending: usize) {
    gauge!("rig_syncer_pending_joins").set(pending as f64);
}

/// Record a frame dropped by the monitoring side channel
pub fn record_monitor_dropped() {
    counter!("rig_syncer_monitor_dropped_total").increment(1);
}

/// Run statistics aggregator
///
/// Aggregates in memory so a summary can be printed at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct SyncStatsAggregator {
    /// Emitted batches
    pub total_batches: u64,

    /// Dropped complete instants
    pub total_misses: u64,

    /// Misses per reason label
    pub misses_by_reason: BTreeMap<&'static str, u64>,

    /// Batch interval (ms)
    pub interval_stats: RunningStats,

    last_stamp: Option<Timestamp>,
}

impl SyncStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for an emitted batch
    pub fn record_batch(&mut self, stamp: Timestamp) {
        self.total_batches += 1;
        if let Some(last) = self.last_stamp {
            let interval_ms = stamp.saturating_since(last) as f64 / 1e6;
            self.interval_stats.push(interval_ms);
            record_batch_interval_ms(interval_ms);
        }
        self.last_stamp = Some(stamp);
    }

    /// Account for a dropped instant
    pub fn record_miss(&mut self, miss: &SyncMiss) {
        self.total_misses += 1;
        *self.misses_by_reason.entry(miss.reason.label()).or_insert(0) += 1;
    }

    pub fn summary(&self) -> SyncSummary {
        let complete = self.total_batches + self.total_misses;
        SyncSummary {
            total_batches: self.total_batches,
            total_misses: self.total_misses,
            miss_rate: if complete > 0 {
                self.total_misses as f64 / complete as f64 * 100.0
            } else {
                0.0
            },
            batch_interval_ms: StatsSummary::from(&self.interval_stats),
            misses_by_reason: self.misses_by_reason.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub total_batches: u64,
    pub total_misses: u64,
    /// Misses over all complete image sets, in percent
    pub miss_rate: f64,
    pub batch_interval_ms: StatsSummary,
    pub misses_by_reason: BTreeMap<&'static str, u64>,
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sync Summary ===")?;
        writeln!(f, "Batches emitted: {}", self.total_batches)?;
        writeln!(
            f,
            "Synchronization misses: {} ({:.2}%)",
            self.total_misses, self.miss_rate
        )?;
        writeln!(f, "Batch interval (ms): {}", self.batch_interval_ms)?;

        if !self.misses_by_reason.is_empty() {
            writeln!(f, "Misses by reason:")?;
            for (reason, count) in &self.misses_by_reason {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of a RunningStats
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
