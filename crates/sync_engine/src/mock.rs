//! Recording estimation engine for tests and dry runs.

use contracts::{CameraPose, ContractError, EstimationEngine, FrameBatch, RigTopology};

/// Engine that records every call it receives
///
/// `finalize` returns the initial rig poses.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    /// Rig passed to `initialize`
    pub initialized: Option<RigTopology>,
    /// Every batch in arrival order
    pub batches: Vec<FrameBatch>,
    pub finalize_calls: usize,
    fail_init: Option<String>,
}

impl RecordingEngine {
    /// Engine whose `initialize` always fails with `message`
    pub fn failing_init(message: impl Into<String>) -> Self {
        Self {
            fail_init: Some(message.into()),
            ..Self::default()
        }
    }

    /// Stamps of the received batches
    pub fn batch_stamps(&self) -> Vec<u64> {
        self.batches.iter().map(|b| b.stamp.as_nanos()).collect()
    }
}

impl EstimationEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn initialize(&mut self, rig: &RigTopology) -> Result<(), ContractError> {
        if let Some(message) = &self.fail_init {
            return Err(ContractError::engine_init(message.clone()));
        }
        self.initialized = Some(rig.clone());
        Ok(())
    }

    fn process_frame_batch(&mut self, batch: FrameBatch) {
        self.batches.push(batch);
    }

    fn finalize(&mut self) -> Result<Vec<CameraPose>, ContractError> {
        self.finalize_calls += 1;
        self.initialized
            .as_ref()
            .map(RigTopology::camera_poses)
            .ok_or_else(|| ContractError::engine_finalize("engine was never initialized"))
    }
}
