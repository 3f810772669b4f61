//! Error types for the signal chain.
//!
//! Most stages never surface these to the caller: input degradation is modelled
//! with [`crate::Outcome`], and component boundaries convert internal failures
//! into their defined empty results. The fallible `try_*` entry points return
//! them directly.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("non-finite value in input ({0})")]
    NonFiniteInput(&'static str),
    #[error("insufficient samples: needed {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },
    #[error("buffer capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),
    #[error("frame size mismatch: expected {expected} bytes, got {got}")]
    FrameSizeMismatch { expected: usize, got: usize },
    #[error("invalid signal conditions: {0}")]
    InvalidConditions(String),
    #[error("snapshot encoding error: {0}")]
    Snapshot(String),
}

impl From<serde_json::Error> for SignalError {
    fn from(e: serde_json::Error) -> Self {
        SignalError::Snapshot(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;
