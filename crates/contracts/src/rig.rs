//! Rig declaration and resolved rig topology
//!
//! The declaration is what the operator states before replay: ordered camera
//! groups plus the inertial topic. The topology is what the core derives once
//! every declared camera has reported its calibration.

use std::collections::HashSet;
use std::fmt;

use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};

use crate::{CameraModelType, GlobalPose, IntrinsicModel, Topic};

/// Declared camera group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraGroupSpec {
    /// Rigidly coupled pair, left first
    Stereo { left: Topic, right: Topic },
    /// Single camera
    Mono { topic: Topic },
}

impl CameraGroupSpec {
    pub fn stereo(left: impl Into<Topic>, right: impl Into<Topic>) -> Self {
        Self::Stereo {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn mono(topic: impl Into<Topic>) -> Self {
        Self::Mono {
            topic: topic.into(),
        }
    }

    /// Number of cameras (camera indices) the group consumes
    pub fn size(&self) -> usize {
        match self {
            Self::Stereo { .. } => 2,
            Self::Mono { .. } => 1,
        }
    }

    /// Camera namespaces in index order
    pub fn namespaces(&self) -> Vec<&Topic> {
        match self {
            Self::Stereo { left, right } => vec![left, right],
            Self::Mono { topic } => vec![topic],
        }
    }

    pub fn is_stereo(&self) -> bool {
        matches!(self, Self::Stereo { .. })
    }
}

/// Topic naming convention for per-camera topics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNaming {
    /// Appended to the camera namespace to form the image topic
    #[serde(default = "default_image_suffix")]
    pub image_suffix: String,

    /// Appended to the camera namespace to form the calibration topic
    #[serde(default = "default_info_suffix")]
    pub info_suffix: String,
}

fn default_image_suffix() -> String {
    "/image_raw".to_string()
}

fn default_info_suffix() -> String {
    "/camera_info".to_string()
}

impl Default for TopicNaming {
    fn default() -> Self {
        Self {
            image_suffix: default_image_suffix(),
            info_suffix: default_info_suffix(),
        }
    }
}

/// Operator-declared rig shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigDeclaration {
    /// Camera groups in declaration order
    pub groups: Vec<CameraGroupSpec>,

    /// Inertial topic, used verbatim
    pub imu_topic: Topic,
}

impl RigDeclaration {
    pub fn new(groups: Vec<CameraGroupSpec>, imu_topic: impl Into<Topic>) -> Self {
        Self {
            groups,
            imu_topic: imu_topic.into(),
        }
    }

    /// Total number of cameras across all groups
    pub fn camera_count(&self) -> usize {
        self.groups.iter().map(CameraGroupSpec::size).sum()
    }

    pub fn stereo_count(&self) -> usize {
        self.groups.iter().filter(|g| g.is_stereo()).count()
    }

    /// Expand groups into per-camera entries; index is the declaration position.
    pub fn cameras(&self, naming: &TopicNaming) -> Vec<DeclaredCamera> {
        let mut cameras = Vec::with_capacity(self.camera_count());
        for (group, spec) in self.groups.iter().enumerate() {
            for namespace in spec.namespaces() {
                cameras.push(DeclaredCamera {
                    index: cameras.len(),
                    group,
                    namespace: namespace.clone(),
                    image_topic: namespace.with_suffix(&naming.image_suffix),
                    info_topic: namespace.with_suffix(&naming.info_suffix),
                });
            }
        }
        cameras
    }

    /// Every topic the core consumes: N calibration, N image, 1 inertial.
    pub fn topics(&self, naming: &TopicNaming) -> Vec<Topic> {
        let cameras = self.cameras(naming);
        let mut topics: Vec<Topic> = cameras.iter().map(|c| c.info_topic.clone()).collect();
        topics.extend(cameras.iter().map(|c| c.image_topic.clone()));
        topics.push(self.imu_topic.clone());
        topics
    }

    /// First derived topic that collides with an earlier one
    pub fn duplicate_topic(&self, naming: &TopicNaming) -> Option<Topic> {
        let mut seen = HashSet::new();
        self.topics(naming)
            .into_iter()
            .find(|topic| !seen.insert(topic.clone()))
    }
}

/// One declared camera with its derived topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredCamera {
    pub index: usize,
    /// Index of the owning group in the declaration
    pub group: usize,
    pub namespace: Topic,
    pub image_topic: Topic,
    pub info_topic: Topic,
}

/// Role of a camera within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    StereoLeft,
    StereoRight,
    Mono,
}

impl CameraRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StereoLeft => "stereo-left",
            Self::StereoRight => "stereo-right",
            Self::Mono => "mono",
        }
    }

    pub fn is_stereo(self) -> bool {
        !matches!(self, Self::Mono)
    }
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub index: usize,
    pub camera_name: String,
    pub image_topic: Topic,
    pub info_topic: Topic,
    pub role: CameraRole,
    pub model: CameraModelType,
    /// Intrinsics handle, passed through to the estimation engine
    pub intrinsics: IntrinsicModel,
    /// Pose relative to the group's left/primary camera
    pub pose_in_rig: Isometry3<f64>,
}

/// Resolved rig, indexed 0..N-1; immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigTopology {
    cameras: Vec<CameraDescriptor>,
    imu_topic: Topic,
}

impl RigTopology {
    /// Cameras must already be ordered by index.
    pub fn new(cameras: Vec<CameraDescriptor>, imu_topic: Topic) -> Self {
        debug_assert!(cameras.iter().enumerate().all(|(i, c)| c.index == i));
        Self { cameras, imu_topic }
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn camera(&self, index: usize) -> Option<&CameraDescriptor> {
        self.cameras.get(index)
    }

    pub fn cameras(&self) -> &[CameraDescriptor] {
        &self.cameras
    }

    pub fn imu_topic(&self) -> &Topic {
        &self.imu_topic
    }

    /// Pose in rig for camera `index`
    pub fn pose(&self, index: usize) -> Option<&Isometry3<f64>> {
        self.cameras.get(index).map(|c| &c.pose_in_rig)
    }

    /// Snapshot of the current poses in the persisted form
    pub fn camera_poses(&self) -> Vec<CameraPose> {
        self.cameras.iter().map(CameraPose::from).collect()
    }
}

/// Persisted per-camera pose result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub index: usize,
    pub camera_name: String,
    pub image_topic: Topic,
    pub role: CameraRole,
    pub pose: GlobalPose,
}

impl From<&CameraDescriptor> for CameraPose {
    fn from(camera: &CameraDescriptor) -> Self {
        Self {
            index: camera.index,
            camera_name: camera.camera_name.clone(),
            image_topic: camera.image_topic.clone(),
            role: camera.role,
            pose: GlobalPose::from_isometry(&camera.pose_in_rig),
        }
    }
}
