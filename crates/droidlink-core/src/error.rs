//! Error types for the reliability engine.
//!
//! Only `send` surfaces errors to the caller; everything on the inbound
//! path (framing errors, decode failures, duplicates) is absorbed locally
//! per the protocol's error disposition, observable through the link's
//! accessors rather than an error channel.

use droidlink_proto::EncodeError;
use thiserror::Error;

/// Errors sending a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The command did not encode; nothing was recorded or written.
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// The stream rejected the frame. The sent-window and outstanding
    /// entries are retained, so the retry sweep re-attempts the message.
    #[error("stream write failed")]
    StreamWrite,
}
