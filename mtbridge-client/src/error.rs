//! Error types for bridge operations.

use mtbridge_core::CommandName;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error type for bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The mailbox directory does not exist.
    #[error("mailbox directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// No hand-off file became free in time.
    #[error("command {command} (seq {seq}) not delivered within {timeout:?}")]
    CommandTimeout {
        /// Command that was abandoned.
        command: CommandName,
        /// Sequence id it was assigned.
        seq: u32,
        /// Configured delivery timeout.
        timeout: Duration,
    },

    /// Core error.
    #[error(transparent)]
    Core(#[from] mtbridge_core::Error),

    /// The bridge has been shut down.
    #[error("bridge shut down")]
    Shutdown,
}
