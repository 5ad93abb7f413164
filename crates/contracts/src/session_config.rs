//! Session configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

use crate::{RigDeclaration, TopicNaming};

/// Complete configuration of one replay run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Declared rig shape
    pub rig: RigDeclaration,

    /// Per-camera topic naming
    #[serde(default)]
    pub topics: TopicNaming,

    /// Synchronizer tuning
    #[serde(default)]
    pub sync: SyncConfig,

    /// Replay driver tuning
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl SessionConfig {
    /// Defaults for everything but the rig
    pub fn for_rig(rig: RigDeclaration) -> Self {
        Self {
            rig,
            topics: TopicNaming::default(),
            sync: SyncConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

/// Synchronizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Inertial ring buffer capacity
    #[serde(default = "default_imu_buffer_capacity")]
    pub imu_buffer_capacity: usize,

    /// Maximum number of distinct pending timestamps in the image join
    #[serde(default = "default_join_queue_size")]
    pub join_queue_size: usize,

    /// What to do with a complete image set lacking an exact inertial match
    #[serde(default)]
    pub miss_policy: MissPolicy,
}

fn default_imu_buffer_capacity() -> usize {
    50
}

fn default_join_queue_size() -> usize {
    5
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            imu_buffer_capacity: default_imu_buffer_capacity(),
            join_queue_size: default_join_queue_size(),
            miss_policy: MissPolicy::default(),
        }
    }
}

/// Handling of complete image sets with no exact inertial match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Drop the instant immediately and record a miss
    #[default]
    Drop,
    /// Hold the image set until an inertial sample with the identical timestamp arrives
    AwaitInertial,
}

/// Replay driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Capacity of the monitoring side channel
    #[serde(default = "default_monitor_capacity")]
    pub monitor_capacity: usize,
}

fn default_monitor_capacity() -> usize {
    2
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            monitor_capacity: default_monitor_capacity(),
        }
    }
}
