//! FrameBatch - Sync Engine output
//!
//! One image per camera plus one inertial sample, all sharing one timestamp.

use serde::{Deserialize, Serialize};

use crate::{Image, InertialSample, Timestamp};

/// Synchronized frame batch
#[derive(Debug, Clone)]
pub struct FrameBatch {
    /// Shared timestamp of every image and the inertial sample
    pub stamp: Timestamp,

    /// One decoded image per camera index 0..N-1
    pub images: Vec<Image>,

    /// Inertial sample whose timestamp equals `stamp`
    pub inertial: InertialSample,
}

impl FrameBatch {
    pub fn camera_count(&self) -> usize {
        self.images.len()
    }
}

/// Instant that collected all images but could not become a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMiss {
    pub stamp: Timestamp,
    pub reason: MissReason,
}

/// Why an instant was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum MissReason {
    /// No inertial sample with the identical timestamp was buffered
    NoMatchingInertial,
    /// The image of this camera could not be decoded
    DecodeFailed { camera: usize },
}

impl MissReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoMatchingInertial => "no_matching_inertial",
            Self::DecodeFailed { .. } => "decode_failed",
        }
    }
}

/// Synchronizer counters (for diagnostics)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Images delivered to a join slot
    pub images_received: u64,

    /// Inertial samples appended to the ring buffer
    pub inertial_received: u64,

    /// Batches handed to the estimation engine
    pub batches_emitted: u64,

    /// Complete image sets without an exact inertial match
    pub inertial_misses: u64,

    /// Complete image sets abandoned because an image failed to decode
    pub decode_failures: u64,

    /// Incomplete pending sets evicted by the join queue bound or by a newer complete set
    pub evicted_incomplete: u64,

    /// Images at or before the last fired instant
    pub stale_images: u64,

    /// Second image from the same camera for a pending timestamp
    pub duplicate_images: u64,

    /// Images for a camera index outside the rig
    pub unknown_camera_images: u64,

    /// Messages whose payload kind did not match their topic's route
    pub mismatched_payloads: u64,

    /// Timestamp of the most recent emitted batch
    pub last_batch: Option<Timestamp>,
}

impl SyncStats {
    /// All dropped complete instants
    pub fn total_misses(&self) -> u64 {
        self.inertial_misses + self.decode_failures
    }
}
