use std::io;

use thiserror::Error;

use super::channel::{DEADLINE, MAX_LINE};

/// Everything that can go wrong on the wire. Each variant terminates only
/// the session that hit it; nothing here is ever escalated past the
/// listener.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// More than [`MAX_LINE`] bytes accumulated without a usable line.
    /// Protocol abuse or a corrupted peer.
    #[error("line exceeded {} bytes without a terminator", MAX_LINE)]
    LineTooLong,

    /// A line feed arrived without a preceding carriage return.
    #[error("line feed not preceded by carriage return")]
    MalformedLine,

    /// The peer closed the stream before sending anything. A normal
    /// disconnect, not a fault.
    #[error("peer closed the connection")]
    StreamClosed,

    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// A read error that survived the transient-retry budget.
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),

    #[error("no progress within the {}s deadline", DEADLINE.as_secs())]
    DeadlineExpired,
}
