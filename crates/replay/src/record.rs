//! On-disk record schema of `messages.jsonl`.
//!
//! One JSON object per line, internally tagged by `kind`. Image pixels live in
//! separate binary files referenced by `data_file`, relative to the log directory.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use contracts::{
    CameraInfo, GlobalPose, InertialSample, IntrinsicModel, PixelEncoding, Quaternion, Timestamp,
    Topic, Vector3,
};

/// Default file name inside a log directory
pub const MESSAGES_FILE: &str = "messages.jsonl";

/// Just enough of a line to apply the topic filter
#[derive(Debug, Deserialize)]
pub(crate) struct RecordHeader<'a> {
    #[serde(borrow)]
    pub topic: Cow<'a, str>,
}

/// One line of the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    CameraInfo {
        topic: Topic,
        stamp_ns: u64,
        camera_name: String,
        model_type: String,
        image_width: u32,
        image_height: u32,
        parameters: Vec<f64>,
        position: Vector3,
        orientation: Quaternion,
    },
    Image {
        topic: Topic,
        stamp_ns: u64,
        height: u32,
        width: u32,
        encoding: PixelEncoding,
        data_file: String,
    },
    Imu {
        topic: Topic,
        stamp_ns: u64,
        angular_velocity: Vector3,
        linear_acceleration: Vector3,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        orientation: Option<Quaternion>,
    },
}

impl LogRecord {
    pub fn topic(&self) -> &Topic {
        match self {
            Self::CameraInfo { topic, .. } | Self::Image { topic, .. } | Self::Imu { topic, .. } => {
                topic
            }
        }
    }

    pub fn stamp(&self) -> Timestamp {
        match self {
            Self::CameraInfo { stamp_ns, .. }
            | Self::Image { stamp_ns, .. }
            | Self::Imu { stamp_ns, .. } => Timestamp::from_nanos(*stamp_ns),
        }
    }

    pub fn camera_info(topic: Topic, stamp: Timestamp, info: &CameraInfo) -> Self {
        Self::CameraInfo {
            topic,
            stamp_ns: stamp.as_nanos(),
            camera_name: info.camera_name.clone(),
            model_type: info.intrinsics.model_type.clone(),
            image_width: info.intrinsics.image_width,
            image_height: info.intrinsics.image_height,
            parameters: info.intrinsics.parameters.clone(),
            position: info.pose.position,
            orientation: info.pose.orientation,
        }
    }

    pub fn imu(topic: Topic, sample: &InertialSample) -> Self {
        Self::Imu {
            topic,
            stamp_ns: sample.stamp.as_nanos(),
            angular_velocity: sample.angular_velocity,
            linear_acceleration: sample.linear_acceleration,
            orientation: sample.orientation,
        }
    }
}

/// Rebuild the calibration payload from record fields
pub(crate) fn camera_info_payload(
    camera_name: String,
    model_type: String,
    image_width: u32,
    image_height: u32,
    parameters: Vec<f64>,
    position: Vector3,
    orientation: Quaternion,
) -> CameraInfo {
    CameraInfo {
        camera_name,
        intrinsics: IntrinsicModel {
            model_type,
            image_width,
            image_height,
            parameters,
        },
        pose: GlobalPose {
            position,
            orientation,
        },
    }
}
