//! Built-in pass-through estimation engine.
//!
//! Counts batches and reports the initial rig estimate on finalize. Real
//! estimators plug in through the same `EstimationEngine` trait.

use tracing::{debug, info};

use contracts::{CameraPose, ContractError, EstimationEngine, FrameBatch, RigTopology, Timestamp};

#[derive(Debug, Default)]
pub struct PassThroughEngine {
    rig: Option<RigTopology>,
    batches: u64,
    first_stamp: Option<Timestamp>,
    last_stamp: Option<Timestamp>,
}

impl PassThroughEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }
}

impl EstimationEngine for PassThroughEngine {
    fn name(&self) -> &str {
        "pass-through"
    }

    fn initialize(&mut self, rig: &RigTopology) -> Result<(), ContractError> {
        if rig.is_empty() {
            return Err(ContractError::engine_init("rig has no cameras"));
        }
        for camera in rig.cameras() {
            info!(
                index = camera.index,
                camera = %camera.camera_name,
                role = %camera.role,
                model = %camera.model,
                "camera registered"
            );
        }
        self.rig = Some(rig.clone());
        Ok(())
    }

    fn process_frame_batch(&mut self, batch: FrameBatch) {
        self.batches += 1;
        self.first_stamp.get_or_insert(batch.stamp);
        self.last_stamp = Some(batch.stamp);
        debug!(
            stamp = %batch.stamp,
            cameras = batch.camera_count(),
            batches = self.batches,
            "batch received"
        );
    }

    fn finalize(&mut self) -> Result<Vec<CameraPose>, ContractError> {
        let rig = self
            .rig
            .as_ref()
            .ok_or_else(|| ContractError::engine_finalize("engine was never initialized"))?;

        let span_secs = match (self.first_stamp, self.last_stamp) {
            (Some(first), Some(last)) => last.saturating_since(first) as f64 / 1e9,
            _ => 0.0,
        };
        info!(batches = self.batches, span_secs, "finalizing rig estimate");

        let poses = rig.camera_poses();
        for pose in &poses {
            let p = &pose.pose.position;
            let q = &pose.pose.orientation;
            info!(
                camera = %pose.camera_name,
                role = %pose.role,
                position = format!("[{:.6}, {:.6}, {:.6}]", p.x, p.y, p.z),
                orientation = format!("[{:.6}, {:.6}, {:.6}, {:.6}]", q.w, q.x, q.y, q.z),
                "camera extrinsics"
            );
        }
        Ok(poses)
    }
}
