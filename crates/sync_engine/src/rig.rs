//! Rig Topology Builder
//!
//! Re-anchors each camera's reported global pose to its own group: the left
//! (or only) camera of a group sits at identity and the right camera of a
//! stereo pair gets `inverse(P_left) * P_right`.

use nalgebra::Isometry3;
use tracing::debug;

use contracts::{
    CameraDescriptor, CameraGroupSpec, CameraInfo, CameraModelType, CameraRole, ContractError,
    DeclaredCamera, IntrinsicModel, RigDeclaration, RigTopology, Topic,
};

/// Camera whose calibration message has been accepted
#[derive(Debug, Clone)]
pub struct DiscoveredCamera {
    pub index: usize,
    pub camera_name: String,
    pub image_topic: Topic,
    pub info_topic: Topic,
    pub model: CameraModelType,
    pub intrinsics: IntrinsicModel,
    /// Pose as reported, in the global frame
    pub global_pose: Isometry3<f64>,
}

impl DiscoveredCamera {
    /// Build from a calibration message.
    ///
    /// # Errors
    /// `TopologyResolution` when the message cannot describe a camera.
    pub fn from_info(declared: &DeclaredCamera, info: &CameraInfo) -> Result<Self, ContractError> {
        let fail = |message: String| {
            ContractError::topology_resolution(declared.index, declared.info_topic.clone(), message)
        };

        let model = info.intrinsics.validate().map_err(fail)?;
        let global_pose = info.pose.to_isometry().map_err(fail)?;

        Ok(Self {
            index: declared.index,
            camera_name: info.camera_name.clone(),
            image_topic: declared.image_topic.clone(),
            info_topic: declared.info_topic.clone(),
            model,
            intrinsics: info.intrinsics.clone(),
            global_pose,
        })
    }

    fn into_descriptor(self, role: CameraRole, pose_in_rig: Isometry3<f64>) -> CameraDescriptor {
        CameraDescriptor {
            index: self.index,
            camera_name: self.camera_name,
            image_topic: self.image_topic,
            info_topic: self.info_topic,
            role,
            model: self.model,
            intrinsics: self.intrinsics,
            pose_in_rig,
        }
    }
}

/// One-shot builder from declared groups and discovered cameras
#[derive(Debug, Clone)]
pub struct RigTopologyBuilder {
    groups: Vec<CameraGroupSpec>,
    declared: Vec<DeclaredCamera>,
    imu_topic: Topic,
}

impl RigTopologyBuilder {
    pub fn new(declaration: &RigDeclaration, declared: Vec<DeclaredCamera>) -> Self {
        Self {
            groups: declaration.groups.clone(),
            declared,
            imu_topic: declaration.imu_topic.clone(),
        }
    }

    pub fn declared(&self) -> &[DeclaredCamera] {
        &self.declared
    }

    /// Assemble the rig. `cameras` may arrive in any order.
    ///
    /// # Errors
    /// `TopologyIncomplete` if a declared camera is absent.
    pub fn build(&self, cameras: Vec<DiscoveredCamera>) -> Result<RigTopology, ContractError> {
        let mut slots: Vec<Option<DiscoveredCamera>> = vec![None; self.declared.len()];
        for camera in cameras {
            if let Some(slot) = slots.get_mut(camera.index) {
                *slot = Some(camera);
            }
        }

        let missing: Vec<Topic> = slots
            .iter()
            .zip(&self.declared)
            .filter(|(slot, _)| slot.is_none())
            .map(|(_, declared)| declared.info_topic.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ContractError::TopologyIncomplete { missing });
        }

        let mut cameras = slots.into_iter().flatten();
        let mut descriptors = Vec::with_capacity(self.declared.len());

        for group in &self.groups {
            match group {
                CameraGroupSpec::Stereo { .. } => {
                    let (Some(left), Some(right)) = (cameras.next(), cameras.next()) else {
                        break;
                    };
                    let relative = left.global_pose.inverse() * right.global_pose;
                    debug!(
                        left = left.index,
                        right = right.index,
                        baseline = relative.translation.vector.norm(),
                        "stereo pair anchored"
                    );
                    descriptors.push(left.into_descriptor(CameraRole::StereoLeft, Isometry3::identity()));
                    descriptors.push(right.into_descriptor(CameraRole::StereoRight, relative));
                }
                CameraGroupSpec::Mono { .. } => {
                    let Some(camera) = cameras.next() else {
                        break;
                    };
                    descriptors.push(camera.into_descriptor(CameraRole::Mono, Isometry3::identity()));
                }
            }
        }

        Ok(RigTopology::new(descriptors, self.imu_topic.clone()))
    }
}
