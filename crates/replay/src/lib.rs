//! Log replay for rig calibration sessions.
//!
//! - [`JsonlLog`] reads a recorded `messages.jsonl` log in stored order
//! - [`LogWriter`] produces such logs
//! - [`ReplayDriver`] feeds a log through a [`sync_engine::CalibrationSession`],
//!   honoring a cooperative [`ShutdownFlag`]
//! - [`MonitorChannel`] republishes images while the rig is being discovered

mod driver;
mod log;
mod monitor;
mod record;
mod shutdown;
mod writer;

pub use driver::{ReplayDriver, RunOutcome, RunReport};
pub use log::{JsonlLog, LogReadStats};
pub use monitor::{MonitorChannel, MonitoredImage};
pub use record::{LogRecord, MESSAGES_FILE};
pub use shutdown::ShutdownFlag;
pub use writer::LogWriter;
