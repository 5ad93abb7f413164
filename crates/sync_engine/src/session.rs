//! Calibration session: the two-phase state machine driven by the replay loop.

use tracing::{debug, info, instrument, warn};

use contracts::{
    CameraPose, ContractError, EstimationEngine, LogMessage, MessagePayload, RigTopology,
    SessionConfig, SyncMiss, SyncStats, Timestamp, Topic,
};
use observability::{SyncStatsAggregator, SyncSummary};

use crate::discovery::{DiscoveryStep, TopologyDiscovery};
use crate::rig::RigTopologyBuilder;
use crate::routing::{Route, TopicRouter};
use crate::synchronizer::FrameSynchronizer;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for every declared camera's calibration message
    AwaitingTopology,
    /// Rig resolved; images and inertial samples are being synchronized
    Streaming,
}

/// What the session did with one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Topic not consumed, or not consumed in the current phase
    Ignored,
    /// Calibration accepted for `camera`
    CameraResolved { camera: usize },
    /// Last calibration accepted; session is now streaming
    TopologyResolved,
    /// Image or inertial sample absorbed without emission
    Buffered,
    /// A batch was handed to the engine
    BatchEmitted { stamp: Timestamp },
}

enum Phase {
    Discovery(TopologyDiscovery),
    Streaming {
        rig: RigTopology,
        sync: FrameSynchronizer,
    },
}

/// One calibration run over one log
pub struct CalibrationSession<E> {
    config: SessionConfig,
    router: TopicRouter,
    phase: Phase,
    engine: E,
    aggregator: SyncStatsAggregator,
    reported_misses: usize,
    finalized: bool,
}

impl<E: EstimationEngine> CalibrationSession<E> {
    /// Build a session after checking the rig can be routed.
    ///
    /// # Errors
    /// `ConfigValidation` when the rig has no stereo group or two derived
    /// topics collide.
    pub fn try_new(config: SessionConfig, engine: E) -> Result<Self, ContractError> {
        if config.rig.stereo_count() == 0 {
            return Err(ContractError::config_validation(
                "rig.groups",
                "at least one stereo group is required",
            ));
        }
        if let Some(topic) = config.rig.duplicate_topic(&config.topics) {
            return Err(ContractError::config_validation(
                format!("rig[topic={topic}]"),
                "duplicate topic",
            ));
        }
        Ok(Self::new(config, engine))
    }

    /// Build a session without checking the declaration; see [`Self::try_new`].
    pub fn new(config: SessionConfig, engine: E) -> Self {
        let router = TopicRouter::new(&config.rig, &config.topics);
        let builder = RigTopologyBuilder::new(&config.rig, router.cameras().to_vec());
        Self {
            config,
            router,
            phase: Phase::Discovery(TopologyDiscovery::new(builder)),
            engine,
            aggregator: SyncStatsAggregator::new(),
            reported_misses: 0,
            finalized: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Discovery(_) => SessionState::AwaitingTopology,
            Phase::Streaming { .. } => SessionState::Streaming,
        }
    }

    #[inline]
    pub fn route(&self, topic: &str) -> Option<Route> {
        self.router.route(topic)
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// Process one message in log order.
    ///
    /// # Errors
    /// - `TopologyResolution` for a malformed calibration message
    /// - `EngineInit` when the engine rejects the resolved rig
    #[instrument(
        name = "calibration_session_handle",
        level = "trace",
        skip_all,
        fields(topic = %message.topic, stamp = %message.stamp)
    )]
    pub fn handle(&mut self, message: LogMessage) -> Result<MessageOutcome, ContractError> {
        let Some(route) = self.router.route(&message.topic) else {
            return Ok(MessageOutcome::Ignored);
        };

        match &mut self.phase {
            Phase::Discovery(discovery) => {
                let Route::Calibration(camera) = route else {
                    return Ok(MessageOutcome::Ignored);
                };
                match discovery.offer(camera, &message)? {
                    DiscoveryStep::Duplicate { .. } => Ok(MessageOutcome::Ignored),
                    DiscoveryStep::Accepted { camera, .. } => {
                        Ok(MessageOutcome::CameraResolved { camera })
                    }
                    DiscoveryStep::Resolved(rig) => {
                        self.start_streaming(rig)?;
                        Ok(MessageOutcome::TopologyResolved)
                    }
                }
            }
            Phase::Streaming { sync, .. } => {
                let emitted = match (route, message.payload) {
                    (Route::Calibration(_), _) => return Ok(MessageOutcome::Ignored),
                    (Route::Image(camera), MessagePayload::Image(image)) => {
                        sync.on_image(camera, message.stamp, image)
                    }
                    (Route::Inertial, MessagePayload::Imu(sample)) => sync.on_inertial(sample),
                    (route, MessagePayload::Malformed(record)) => {
                        debug!(?route, line = record.line, "malformed record skipped");
                        return Ok(MessageOutcome::Ignored);
                    }
                    (route, payload) => {
                        debug!(?route, kind = payload.kind(), "payload does not match route");
                        sync.note_mismatched_payload();
                        return Ok(MessageOutcome::Ignored);
                    }
                };

                self.report_new_misses();
                match emitted {
                    Some(batch) => {
                        let stamp = batch.stamp;
                        observability::record_batch_emitted(&batch);
                        self.aggregator.record_batch(stamp);
                        self.engine.process_frame_batch(batch);
                        Ok(MessageOutcome::BatchEmitted { stamp })
                    }
                    None => Ok(MessageOutcome::Buffered),
                }
            }
        }
    }

    fn start_streaming(&mut self, rig: RigTopology) -> Result<(), ContractError> {
        info!(
            cameras = rig.len(),
            stereo_groups = self.config.rig.stereo_count(),
            engine = self.engine.name(),
            "rig topology resolved"
        );
        for camera in rig.cameras() {
            let t = camera.pose_in_rig.translation.vector;
            info!(
                index = camera.index,
                name = %camera.camera_name,
                role = %camera.role,
                x = t.x,
                y = t.y,
                z = t.z,
                "initial camera pose"
            );
        }

        self.engine.initialize(&rig).map_err(|e| match e {
            ContractError::EngineInit { .. } => e,
            other => ContractError::engine_init(other.to_string()),
        })?;

        observability::record_topology_resolved(rig.len());
        let sync = FrameSynchronizer::new(rig.len(), &self.config.sync);
        self.phase = Phase::Streaming { rig, sync };
        Ok(())
    }

    fn report_new_misses(&mut self) {
        if let Phase::Streaming { sync, .. } = &self.phase {
            for miss in &sync.misses()[self.reported_misses..] {
                self.aggregator.record_miss(miss);
            }
            self.reported_misses = sync.misses().len();
        }
    }

    /// The log is exhausted.
    ///
    /// # Errors
    /// `TopologyIncomplete` when discovery never finished.
    pub fn end_of_log(&mut self) -> Result<(), ContractError> {
        match &mut self.phase {
            Phase::Discovery(discovery) => Err(ContractError::TopologyIncomplete {
                missing: discovery.missing_topics(),
            }),
            Phase::Streaming { sync, .. } => {
                sync.flush();
                self.report_new_misses();
                Ok(())
            }
        }
    }

    /// Ask the engine for the final pose set. Runs at most once.
    ///
    /// # Errors
    /// `EngineFinalize` if called twice, before streaming, or when the engine fails.
    pub fn finalize(&mut self) -> Result<Vec<CameraPose>, ContractError> {
        if self.finalized {
            return Err(ContractError::engine_finalize("finalize already invoked"));
        }
        if self.rig().is_none() {
            return Err(ContractError::engine_finalize("rig topology was never resolved"));
        }
        self.finalized = true;

        let poses = self.engine.finalize().map_err(|e| match e {
            ContractError::EngineFinalize { .. } => e,
            other => ContractError::engine_finalize(other.to_string()),
        })?;
        if poses.is_empty() {
            warn!(engine = self.engine.name(), "engine returned no camera poses");
        }
        Ok(poses)
    }

    pub fn rig(&self) -> Option<&RigTopology> {
        match &self.phase {
            Phase::Streaming { rig, .. } => Some(rig),
            Phase::Discovery(_) => None,
        }
    }

    /// Calibration topics still unresolved (empty once streaming)
    pub fn missing_topics(&self) -> Vec<Topic> {
        match &self.phase {
            Phase::Discovery(discovery) => discovery.missing_topics(),
            Phase::Streaming { .. } => Vec::new(),
        }
    }

    pub fn stats(&self) -> SyncStats {
        match &self.phase {
            Phase::Streaming { sync, .. } => sync.stats().clone(),
            Phase::Discovery(_) => SyncStats::default(),
        }
    }

    pub fn misses(&self) -> &[SyncMiss] {
        match &self.phase {
            Phase::Streaming { sync, .. } => sync.misses(),
            Phase::Discovery(_) => &[],
        }
    }

    pub fn summary(&self) -> SyncSummary {
        self.aggregator.summary()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}
