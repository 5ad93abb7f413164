//! LogMessage - what the replayed log yields
//!
//! Topic-tagged messages of three kinds: one-time camera calibration/pose
//! messages, camera images, and inertial samples.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use nalgebra::{Isometry3, Quaternion as NaQuaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::{Timestamp, Topic};

/// One record of the log, in stored order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    /// Topic the record was logged on
    pub topic: Topic,

    /// Record timestamp
    pub stamp: Timestamp,

    /// Decoded record body
    pub payload: MessagePayload,
}

impl LogMessage {
    pub fn new(topic: impl Into<Topic>, stamp: Timestamp, payload: MessagePayload) -> Self {
        Self {
            topic: topic.into(),
            stamp,
            payload,
        }
    }

    /// Short payload label for logs and metrics
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Message body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Camera calibration + global pose
    CameraInfo(CameraInfo),

    /// Camera image
    Image(ImageMessage),

    /// Inertial sample
    Imu(InertialSample),

    /// Record on a consumed topic that failed the log schema
    Malformed(MalformedRecord),
}

impl MessagePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CameraInfo(_) => "camera_info",
            Self::Image(_) => "image",
            Self::Imu(_) => "imu",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Undecodable log record, delivered so the consumer of its topic can decide
/// whether the failure is fatal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedRecord {
    /// Line number in the log
    pub line: u64,
    /// Parser error
    pub reason: String,
}

// ===== Camera calibration =====

/// One-time calibration message for a camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    /// Camera name as reported by the driver
    pub camera_name: String,

    /// Intrinsic model, passed through to the estimation engine
    pub intrinsics: IntrinsicModel,

    /// Pose of the camera in the global frame
    pub pose: GlobalPose,
}

/// Intrinsic camera model (opaque to the core apart from validation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicModel {
    /// Model type name as logged (`pinhole`, `kannala_brandt`, `mei`)
    pub model_type: String,

    pub image_width: u32,

    pub image_height: u32,

    /// Model parameters in the model's canonical order
    pub parameters: Vec<f64>,
}

impl IntrinsicModel {
    /// Check the model is one a camera can be built from.
    pub fn validate(&self) -> Result<CameraModelType, String> {
        let model: CameraModelType = self.model_type.parse()?;

        if self.image_width == 0 || self.image_height == 0 {
            return Err(format!(
                "image size must be non-zero, got {}x{}",
                self.image_width, self.image_height
            ));
        }

        let expected = model.parameter_count();
        if self.parameters.len() != expected {
            return Err(format!(
                "{model} model expects {expected} parameters, got {}",
                self.parameters.len()
            ));
        }

        if let Some(pos) = self.parameters.iter().position(|p| !p.is_finite()) {
            return Err(format!("parameter {pos} is not finite"));
        }

        Ok(model)
    }
}

/// Supported intrinsic camera models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraModelType {
    /// k1 k2 p1 p2 fx fy cx cy
    Pinhole,
    /// k2 k3 k4 k5 mu mv u0 v0
    KannalaBrandt,
    /// xi k1 k2 p1 p2 gamma1 gamma2 u0 v0
    Mei,
}

impl CameraModelType {
    pub fn parameter_count(self) -> usize {
        match self {
            Self::Pinhole => 8,
            Self::KannalaBrandt => 8,
            Self::Mei => 9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pinhole => "pinhole",
            Self::KannalaBrandt => "kannala_brandt",
            Self::Mei => "mei",
        }
    }
}

impl FromStr for CameraModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pinhole" => Ok(Self::Pinhole),
            "kannala_brandt" | "kannala-brandt" => Ok(Self::KannalaBrandt),
            "mei" => Ok(Self::Mei),
            other => Err(format!("unknown camera model type '{other}'")),
        }
    }
}

impl fmt::Display for CameraModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position + orientation as reported by a calibration message
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalPose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl GlobalPose {
    /// Convert to a rigid transform, normalising the orientation.
    pub fn to_isometry(&self) -> Result<Isometry3<f64>, String> {
        let p = self.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err("position is not finite".to_string());
        }
        let rotation = self.orientation.to_unit()?;
        Ok(Isometry3::from_parts(
            Translation3::new(p.x, p.y, p.z),
            rotation,
        ))
    }

    /// Inverse of [`GlobalPose::to_isometry`].
    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        let t = iso.translation.vector;
        let q = iso.rotation.quaternion();
        Self {
            position: Vector3 {
                x: t.x,
                y: t.y,
                z: t.z,
            },
            orientation: Quaternion {
                w: q.w,
                x: q.i,
                y: q.j,
                z: q.k,
            },
        }
    }
}

/// 3D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion (w, x, y, z)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    const MIN_NORM: f64 = 1e-9;

    pub fn to_unit(&self) -> Result<UnitQuaternion<f64>, String> {
        let q = NaQuaternion::new(self.w, self.x, self.y, self.z);
        if !q.coords.iter().all(|c| c.is_finite()) {
            return Err("orientation is not finite".to_string());
        }
        let norm = q.norm();
        if norm < Self::MIN_NORM {
            return Err(format!("orientation quaternion is degenerate (norm {norm:e})"));
        }
        Ok(UnitQuaternion::from_quaternion(q))
    }
}

// ===== Images =====

/// Raw image message as logged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMessage {
    pub height: u32,
    pub width: u32,
    pub encoding: PixelEncoding,
    /// Raw pixel bytes, row-major, no padding
    pub data: Bytes,
}

impl ImageMessage {
    /// Decode into the opaque height x width x channel buffer handed downstream.
    pub fn decode(&self) -> Result<Image, DecodeError> {
        if self.height == 0 || self.width == 0 {
            return Err(DecodeError::EmptyImage {
                height: self.height,
                width: self.width,
            });
        }

        let channels = self.encoding.channels();
        let expected = (self.height as usize)
            .checked_mul(self.width as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .and_then(|n| n.checked_mul(self.encoding.bytes_per_channel()))
            .ok_or(DecodeError::TooLarge {
                height: self.height,
                width: self.width,
            })?;
        if self.data.len() != expected {
            return Err(DecodeError::SizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }

        Ok(Image {
            height: self.height,
            width: self.width,
            channels,
            encoding: self.encoding,
            data: self.data.clone(),
        })
    }
}

/// Pixel encodings accepted from the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelEncoding {
    Mono8,
    Mono16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
}

impl PixelEncoding {
    pub fn channels(self) -> u8 {
        match self {
            Self::Mono8 | Self::Mono16 => 1,
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    pub fn bytes_per_channel(self) -> usize {
        match self {
            Self::Mono16 => 2,
            _ => 1,
        }
    }
}

/// Decoded image buffer (height x width x channels)
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub height: u32,
    pub width: u32,
    pub channels: u8,
    pub encoding: PixelEncoding,
    pub data: Bytes,
}

/// Image decode failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("image has zero extent ({height}x{width})")]
    EmptyImage { height: u32, width: u32 },

    #[error("payload size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("image extent {height}x{width} overflows the addressable size")]
    TooLarge { height: u32, width: u32 },
}

// ===== Inertial =====

/// Inertial sample, passed through unmodified
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    pub stamp: Timestamp,

    /// Gyroscope (rad/s)
    pub angular_velocity: Vector3,

    /// Accelerometer (m/s²)
    pub linear_acceleration: Vector3,

    /// Orientation estimate, when the driver provides one
    pub orientation: Option<Quaternion>,
}

impl InertialSample {
    /// Sample with zero motion at `stamp`
    pub fn at(stamp: Timestamp) -> Self {
        Self {
            stamp,
            angular_velocity: Vector3::default(),
            linear_acceleration: Vector3::new(0.0, 0.0, 9.81),
            orientation: None,
        }
    }
}
