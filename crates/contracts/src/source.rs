//! LogSource trait - sequential log container abstraction
//!
//! Decouples the replay driver from the concrete on-disk format. The core only
//! ever reads forward; no random access is assumed.

use crate::{ContractError, LogMessage};

/// Sequential, replayable, time-ordered message source
pub trait LogSource {
    /// Read the next message in stored order.
    ///
    /// Returns `Ok(None)` once the log is exhausted.
    fn next_message(&mut self) -> Result<Option<LogMessage>, ContractError>;

    /// Release the underlying resource. Reads after `close` return `Ok(None)`.
    fn close(&mut self);
}
