//! Pipeline statistics and metrics.

use std::path::PathBuf;
use std::time::Duration;

use observability::SyncSummary;
use replay::{LogReadStats, RunOutcome};

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Whether the run was stopped by a shutdown signal
    pub cancelled: bool,

    /// Messages handed to the session
    pub messages_read: u64,

    /// Batches handed to the engine
    pub batches_emitted: u64,

    /// Instants dropped for any reason
    pub misses: u64,

    /// Images received by the monitor consumer
    pub monitor_frames: u64,

    /// Log reader counters
    pub log: LogReadStats,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Where the rig estimate was written, if anywhere
    pub extrinsics_path: Option<PathBuf>,

    /// Batch interval and miss breakdown
    pub sync_summary: SyncSummary,
}

impl PipelineStats {
    pub fn from_outcome(outcome: &RunOutcome, log: LogReadStats, monitor_frames: u64) -> Self {
        let report = outcome.report();
        Self {
            cancelled: outcome.is_cancelled(),
            messages_read: report.messages_read,
            batches_emitted: report.stats.batches_emitted,
            misses: report.stats.total_misses(),
            monitor_frames,
            log,
            duration: report.elapsed,
            extrinsics_path: None,
            sync_summary: report.summary.clone(),
        }
    }

    /// Batches per second of wall time
    pub fn batch_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.batches_emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Replay Statistics                         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Status: {}", if self.cancelled { "cancelled" } else { "completed" });
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages read: {}", self.messages_read);
        println!("   ├─ Batches emitted: {}", self.batches_emitted);
        println!("   ├─ Batches/s: {:.2}", self.batch_rate());
        println!("   ├─ Misses: {}", self.misses);
        println!("   └─ Monitor frames: {}", self.monitor_frames);

        println!("\n📂 Log");
        println!("   ├─ Lines: {}", self.log.lines);
        println!("   ├─ Filtered: {}", self.log.filtered);
        println!("   ├─ Invalid: {}", self.log.invalid);
        println!("   └─ Missing image data: {}", self.log.missing_data);

        println!("\n{}", self.sync_summary);

        if let Some(path) = &self.extrinsics_path {
            println!("💾 Rig extrinsics: {}", path.display());
        }

        println!();
    }
}
