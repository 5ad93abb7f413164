//! Pipeline orchestrator - wires config, log, session and driver together.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use contracts::{CameraPose, SessionConfig, Topic};
use replay::{JsonlLog, MonitorChannel, ReplayDriver, RunOutcome, ShutdownFlag};
use sync_engine::CalibrationSession;

use super::PipelineStats;
use crate::engine::PassThroughEngine;
use crate::error::CliError;

/// File written to the output directory on completion
pub const EXTRINSICS_FILE: &str = "rig_extrinsics.json";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated session configuration
    pub session: SessionConfig,

    /// Log directory or `.jsonl` file
    pub log_path: PathBuf,

    /// Where to write the pose set (None = don't persist)
    pub output_dir: Option<PathBuf>,

    /// Stop after this many batches (None = unlimited)
    pub max_batches: Option<u64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Persisted form of the final rig estimate
#[derive(Debug, Serialize)]
struct ExtrinsicsFile<'a> {
    imu_topic: &'a Topic,
    cameras: &'a [CameraPose],
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Replay the log to completion or until `shutdown` is raised.
    pub async fn run(self, shutdown: ShutdownFlag) -> Result<PipelineStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let session =
            CalibrationSession::try_new(self.config.session.clone(), PassThroughEngine::new())
                .context("Invalid rig declaration")?;
        let topics = session.router().topics();
        info!(
            cameras = session.router().camera_count(),
            imu_topic = %session.router().imu_topic(),
            topics = topics.len(),
            "Calibration session configured"
        );

        let log = JsonlLog::open(&self.config.log_path)
            .with_context(|| format!("Failed to open log {}", self.config.log_path.display()))?
            .with_topic_filter(topics);

        let (monitor, monitor_rx) =
            MonitorChannel::bounded(self.config.session.replay.monitor_capacity);
        let monitor_task = tokio::spawn(async move {
            let mut received = 0u64;
            while let Ok(frame) = monitor_rx.recv().await {
                received += 1;
                debug!(topic = %frame.topic, stamp = %frame.stamp, "monitor frame");
            }
            received
        });

        let mut driver = ReplayDriver::new(log, shutdown).with_monitor(monitor);
        if let Some(max) = self.config.max_batches {
            driver = driver.with_max_batches(max);
        }

        info!(log = %self.config.log_path.display(), "Starting replay...");

        // The driver blocks on file IO; keep it off the async workers.
        let replay_task = tokio::task::spawn_blocking(move || {
            let mut session = session;
            let outcome = driver.run(&mut session);
            (outcome, driver.into_log().stats())
        });
        let (outcome, log_stats) = replay_task
            .await
            .map_err(|e| CliError::replay_execution(e.to_string()))?;
        let outcome = outcome.context("Replay failed")?;

        // The driver (and with it the sender) is gone, so the drain ends.
        let monitor_frames = monitor_task.await.unwrap_or_else(|e| {
            warn!(error = %e, "Monitor task failed");
            0
        });

        let mut stats = PipelineStats::from_outcome(&outcome, log_stats, monitor_frames);
        if let RunOutcome::Completed { poses, .. } = &outcome {
            if let Some(dir) = &self.config.output_dir {
                let path = write_extrinsics(dir, &self.config.session, poses)?;
                info!(path = %path.display(), cameras = poses.len(), "Rig extrinsics written");
                stats.extrinsics_path = Some(path);
            }
        }
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            cancelled = stats.cancelled,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

fn write_extrinsics(dir: &Path, session: &SessionConfig, poses: &[CameraPose]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| CliError::output(dir, e))?;
    let path = dir.join(EXTRINSICS_FILE);

    let file = ExtrinsicsFile {
        imu_topic: &session.rig.imu_topic,
        cameras: poses,
    };
    let json = serde_json::to_string_pretty(&file).context("Failed to serialize rig extrinsics")?;
    std::fs::write(&path, json).map_err(|e| CliError::output(&path, e))?;
    Ok(path)
}
