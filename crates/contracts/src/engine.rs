//! EstimationEngine trait - downstream calibration interface
//!
//! The core's job ends at producing synchronized frame batches and an initial
//! rig estimate. Everything after that belongs to the engine behind this trait.

use crate::{CameraPose, ContractError, FrameBatch, RigTopology};

/// Downstream estimation engine
///
/// All engine implementations must implement this trait.
pub trait EstimationEngine {
    /// Engine name (used for logging)
    fn name(&self) -> &str;

    /// Accept the resolved rig before any batch arrives.
    ///
    /// # Errors
    /// Returns `EngineInit` when the engine cannot work with this rig; the run aborts.
    fn initialize(&mut self, rig: &RigTopology) -> Result<(), ContractError>;

    /// Consume one synchronized batch. Called at most once per distinct timestamp.
    fn process_frame_batch(&mut self, batch: FrameBatch);

    /// Produce the final per-camera pose set once replay completed.
    fn finalize(&mut self) -> Result<Vec<CameraPose>, ContractError>;
}

impl<E: EstimationEngine + ?Sized> EstimationEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn initialize(&mut self, rig: &RigTopology) -> Result<(), ContractError> {
        (**self).initialize(rig)
    }

    fn process_frame_batch(&mut self, batch: FrameBatch) {
        (**self).process_frame_batch(batch)
    }

    fn finalize(&mut self) -> Result<Vec<CameraPose>, ContractError> {
        (**self).finalize()
    }
}
