//! Layered error definitions
//!
//! Categorized by source: config / log / topology / engine

use thiserror::Error;

use crate::Topic;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Log Errors =====
    /// Log container could not be opened
    #[error("cannot open log '{path}': {message}")]
    LogOpen { path: String, message: String },

    // ===== Topology Errors =====
    /// A declared camera produced a calibration message that cannot describe a camera
    #[error("cannot resolve camera {camera} from '{topic}': {message}")]
    TopologyResolution {
        camera: usize,
        topic: Topic,
        message: String,
    },

    /// The log ended before every declared camera was resolved
    #[error("log ended before topology was resolved, missing calibration on: {missing:?}")]
    TopologyIncomplete { missing: Vec<Topic> },

    // ===== Engine Errors =====
    /// Estimation engine rejected the rig
    #[error("estimation engine initialization failed: {message}")]
    EngineInit { message: String },

    /// Estimation engine failed to produce the final pose set
    #[error("estimation engine finalize failed: {message}")]
    EngineFinalize { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create log open error
    pub fn log_open(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LogOpen {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create topology resolution error
    pub fn topology_resolution(camera: usize, topic: Topic, message: impl Into<String>) -> Self {
        Self::TopologyResolution {
            camera,
            topic,
            message: message.into(),
        }
    }

    /// Create engine initialization error
    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::EngineInit {
            message: message.into(),
        }
    }

    /// Create engine finalize error
    pub fn engine_finalize(message: impl Into<String>) -> Self {
        Self::EngineFinalize {
            message: message.into(),
        }
    }

    /// Whether the error belongs to the configuration category
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. }
        )
    }
}
