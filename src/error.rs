//! The crate's error type (§7's taxonomy, restricted to what is ever
//! surfaced to a caller — framing errors, address mismatches and unknown
//! commands are handled internally and never become an `Error`).

use thiserror::Error;

use crate::catalog::{Command, ErrorCode};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{field} out of range: {detail}")]
    InvalidArgument {
        field: &'static str,
        detail: String,
    },

    /// No reply arrived before the command's deadline. Every command
    /// except `RESET` treats this as a failure (§4.6, §5).
    #[error("{command:?} timed out waiting for a reply")]
    Timeout { command: Command },

    /// The reader answered with a non-success status code.
    #[error("{command:?} failed: reader reported {code:?} ({name})", name = code.name())]
    Protocol { command: Command, code: ErrorCode },

    /// The transport's read or write half returned an I/O error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A pending command's resolver was dropped without ever being
    /// completed — the read task exited before a reply or resync could
    /// reach it, normally because the engine itself was torn down.
    #[error("reader engine stopped before this command could complete")]
    EngineStopped,
}

pub type Result<T> = std::result::Result<T, Error>;
