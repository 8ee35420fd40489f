use thiserror::Error;

/// Primary error type for `bkv-core`.
///
/// Framing errors never escape the stream framer (`framer::StreamFramer::feed`
/// recovers from them internally by resyncing); the other variants surface to
/// callers of the adapter, dispatcher, or command source as documented per
/// component in spec.md §7.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("frame too short: need at least {needed} bytes, got {got}")]
    Short { needed: usize, got: usize },

    #[error("bad magic: {0:#06x}")]
    BadMagic(u16),

    #[error("declared length {declared} does not match available {available} bytes")]
    BadLen { declared: usize, available: usize },

    #[error("tail does not match expected 0xFCEE, got {0:#06x}")]
    BadTail(u16),

    #[error("checksum mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("direction byte {direction:#04x} disagrees with magic {magic:#06x}")]
    DirectionMismatch { direction: u8, magic: u16 },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("session rejected: {reason}")]
    SessionRejected { reason: String },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
