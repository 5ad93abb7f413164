//! Replay driver: reads the log in stored order and feeds the session.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use contracts::{
    CameraPose, ContractError, EstimationEngine, LogSource, MessagePayload, SyncMiss, SyncStats,
};
use observability::SyncSummary;
use sync_engine::{CalibrationSession, Route, SessionState};

use crate::monitor::MonitorChannel;
use crate::shutdown::ShutdownFlag;

/// Counters for one replay
#[derive(Debug, Clone)]
pub struct RunReport {
    pub messages_read: u64,
    pub images_monitored: u64,
    pub stats: SyncStats,
    pub misses: Vec<SyncMiss>,
    pub summary: SyncSummary,
    pub elapsed: Duration,
}

/// How a replay ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Log exhausted and the engine finalized
    Completed {
        report: RunReport,
        poses: Vec<CameraPose>,
    },
    /// Shutdown requested; the engine was not finalized
    Cancelled { report: RunReport },
}

impl RunOutcome {
    pub fn report(&self) -> &RunReport {
        match self {
            Self::Completed { report, .. } | Self::Cancelled { report } => report,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Drives one log through one calibration session
pub struct ReplayDriver<L> {
    log: L,
    shutdown: ShutdownFlag,
    monitor: Option<MonitorChannel>,
    max_batches: Option<u64>,
    messages_read: u64,
    images_monitored: u64,
}

impl<L: LogSource> ReplayDriver<L> {
    pub fn new(log: L, shutdown: ShutdownFlag) -> Self {
        Self {
            log,
            shutdown,
            monitor: None,
            max_batches: None,
            messages_read: 0,
            images_monitored: 0,
        }
    }

    /// Republish images to `monitor` while the rig is still being discovered.
    pub fn with_monitor(mut self, monitor: MonitorChannel) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Stop reading (without cancelling) once this many batches were emitted.
    pub fn with_max_batches(mut self, max_batches: u64) -> Self {
        self.max_batches = Some(max_batches);
        self
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn into_log(self) -> L {
        self.log
    }

    /// Replay the whole log.
    ///
    /// The log is closed on every exit path. The engine is finalized only
    /// when the replay was not cancelled.
    ///
    /// # Errors
    /// Log read failures, `TopologyResolution`, `TopologyIncomplete`,
    /// `EngineInit` and `EngineFinalize` are returned as-is.
    #[instrument(name = "replay_run", skip_all)]
    pub fn run<E: EstimationEngine>(
        &mut self,
        session: &mut CalibrationSession<E>,
    ) -> Result<RunOutcome, ContractError> {
        let started = Instant::now();
        let result = self.pump(session);
        self.log.close();

        let cancelled = result?;
        let report = self.report(session, started.elapsed());

        if cancelled {
            info!(
                messages = report.messages_read,
                batches = report.stats.batches_emitted,
                "replay cancelled, skipping finalize"
            );
            return Ok(RunOutcome::Cancelled { report });
        }

        let poses = session.finalize()?;
        info!(
            messages = report.messages_read,
            batches = report.stats.batches_emitted,
            misses = report.stats.total_misses(),
            cameras = poses.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "replay completed"
        );
        Ok(RunOutcome::Completed { report, poses })
    }

    /// Returns `true` when stopped by the shutdown flag.
    fn pump<E: EstimationEngine>(
        &mut self,
        session: &mut CalibrationSession<E>,
    ) -> Result<bool, ContractError> {
        loop {
            if self.shutdown.is_requested() {
                debug!(messages = self.messages_read, "shutdown observed");
                return Ok(true);
            }

            if let Some(limit) = self.max_batches {
                if session.stats().batches_emitted >= limit {
                    info!(limit, "batch limit reached, ending replay");
                    session.end_of_log()?;
                    return Ok(false);
                }
            }

            let Some(message) = self.log.next_message()? else {
                session.end_of_log()?;
                return Ok(false);
            };
            self.messages_read += 1;
            observability::record_message_received(message.kind());

            if session.state() == SessionState::AwaitingTopology {
                self.republish(session.route(&message.topic), &message);
            }

            session.handle(message)?;
        }
    }

    fn republish(&mut self, route: Option<Route>, message: &contracts::LogMessage) {
        let (Some(monitor), Some(Route::Image(_))) = (&self.monitor, route) else {
            return;
        };
        match &message.payload {
            MessagePayload::Image(image) => {
                if monitor.publish(&message.topic, message.stamp, image) {
                    self.images_monitored += 1;
                }
            }
            other => warn!(topic = %message.topic, kind = other.kind(), "non-image payload on image topic"),
        }
    }

    fn report<E: EstimationEngine>(
        &self,
        session: &CalibrationSession<E>,
        elapsed: Duration,
    ) -> RunReport {
        RunReport {
            messages_read: self.messages_read,
            images_monitored: self.images_monitored,
            stats: session.stats(),
            misses: session.misses().to_vec(),
            summary: session.summary(),
            elapsed,
        }
    }
}
