//! Core error types.
//!
//! The decision core is designed to degrade rather than fail: most edge
//! conditions (vanished entities, missing paths, stale intents) are handled
//! by skipping the affected candidate, not by returning an error. The
//! variants here cover the few operations that can genuinely reject input.

use thiserror::Error;

use crate::types::SpeciesId;

/// Errors surfaced by the decision core.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Profile blob could not be decoded into a [`crate::BehaviorProfile`].
    #[error("behavior profile for {0} is corrupt: {1}")]
    CorruptProfile(SpeciesId, String),

    /// A targeting rule failed validation at load time.
    #[error("invalid targeting rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
