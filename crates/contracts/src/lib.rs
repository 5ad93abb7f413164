//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the
//! replayed log's message model, the declared and resolved rig topology, the
//! synchronized frame batch, and the seams to the log container and the
//! downstream estimation engine.
//! Business crates depend only on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are integer nanoseconds; equality is exact
//! - No tolerance matching happens anywhere in the core

mod batch;
mod engine;
mod error;
mod message;
mod rig;
mod session_config;
mod source;
mod timestamp;
mod topic;

pub use batch::*;
pub use engine::EstimationEngine;
pub use error::*;
pub use message::*;
pub use rig::*;
pub use session_config::*;
pub use source::LogSource;
pub use timestamp::Timestamp;
pub use topic::Topic;
