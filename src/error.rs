use thiserror::Error;

/// Errors raised by the reduction engine.
///
/// None of these are recoverable: a worker that observes one stops, and its
/// peers observe the disconnect as [FpError::Transport].
#[derive(Debug, Error)]
pub enum FpError {
    /// An item key does not fit in a wire element record.
    #[error("item key of {len} bytes exceeds the maximum key length of {max}")]
    KeyTooLong { len: usize, max: usize },

    /// A peer rank outside of `0..world_size` was addressed.
    #[error("rank {rank} is out of range for a world of size {world_size}")]
    RankOutOfRange { rank: usize, world_size: usize },

    /// The size header of a frame disagrees with its body.
    #[error("expected {expected} records, received {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Any other violation of the message protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A sort range that does not fit in the element array.
    #[error("sort range {start}..{end} exceeds {len} elements")]
    SortRange { start: usize, end: usize, len: usize },

    /// A tree or index invariant does not hold.
    #[error("structural invariant violated: {0}")]
    Structure(String),

    /// A peer went away mid-run.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed frame body")]
    Codec(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FpError>;
