//! # Sync Engine
//!
//! Topology discovery and exact-time frame synchronization for a replayed
//! camera + inertial log.
//!
//! Responsibilities:
//! - Route topics to calibration / image / inertial handlers
//! - Resolve the rig from the first calibration message of every camera
//! - Join images across cameras on identical timestamps
//! - Match each complete image set with an inertial sample at the same timestamp
//! - Hand `FrameBatch`es to the `EstimationEngine`
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{CalibrationSession, MessageOutcome};
//!
//! let mut session = CalibrationSession::new(config, engine);
//!
//! while let Some(message) = log.next_message()? {
//!     if let MessageOutcome::BatchEmitted { stamp } = session.handle(message)? {
//!         tracing::debug!(%stamp, "batch emitted");
//!     }
//! }
//! session.end_of_log()?;
//! let poses = session.finalize()?;
//! ```

mod buffer;
mod discovery;
mod join;
pub mod mock;
mod rig;
mod routing;
mod session;
mod synchronizer;

pub use buffer::{InertialRingBuffer, DEFAULT_INERTIAL_CAPACITY};
pub use discovery::{DiscoveryStep, TopologyDiscovery};
pub use join::{ExactTimeJoin, JoinOutcome, RejectReason};
pub use rig::{DiscoveredCamera, RigTopologyBuilder};
pub use routing::{Route, TopicRouter};
pub use session::{CalibrationSession, MessageOutcome, SessionState};
pub use synchronizer::FrameSynchronizer;

// Re-export contracts types
pub use contracts::{FrameBatch, MissPolicy, SyncConfig, SyncMiss, SyncStats};
