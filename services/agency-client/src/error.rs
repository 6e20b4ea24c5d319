//! Client error taxonomy

use std::io;

/// Errors raised while reading bets or talking to the lottery server
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// File or socket could not be opened, read or sought
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport-level read/write failure other than a clean peer close
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),

    /// Peer closed the stream before the expected bytes arrived
    #[error("connection closed by peer after {received} of {expected} bytes")]
    UnexpectedEof { expected: usize, received: usize },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Unexpected confirmation content or frame type
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("encoded bet is {len} bytes, limit is {max}")]
    EncodingTooLarge { len: usize, max: usize },
}

impl ClientError {
    /// True when the peer closed before the expected bytes arrived
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, ClientError::UnexpectedEof { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
