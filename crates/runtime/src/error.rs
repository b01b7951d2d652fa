//! Runtime error types.

use thiserror::Error;

/// Errors surfaced by the runtime layer.
///
/// The decision pipeline itself never fails a tick; these cover the edges
/// where the runtime talks to storage and serialization.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("core error: {0}")]
    Core(#[from] skirmish_core::CoreError),

    #[error("profile codec error: {0}")]
    ProfileCodec(#[from] bincode::Error),

    #[error("profile store error: {0}")]
    ProfileStore(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
