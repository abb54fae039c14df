//! Arena error types
//!
//! One taxonomy shared by the stage controller, result engine, submission
//! desk and reveal workflow. Subscriber delivery failures live in
//! [`crate::hub::DeliveryError`] and never surface here.

use thiserror::Error;

use crate::state::{ClassId, ContestStage};

/// Result type alias for arena operations
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Errors that can occur during arena operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArenaError {
    /// Stage name is not a recognized variant
    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    /// Input rejected before any mutation (bad literal, out-of-bound score)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown class, contest or debater
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    /// Duplicate vote or duplicate judge score; the stored record wins
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The channel gating this submission is not open
    #[error("{channel} channel is closed")]
    ChannelClosed { channel: &'static str },

    /// Reveal requested while the class is not sealed with every channel closed
    #[error("Class {class_id} cannot reveal results from stage {stage}")]
    RevealNotReady { class_id: ClassId, stage: ContestStage },

    /// Collaborator store failure
    #[error("Store error: {0}")]
    Store(String),
}

impl ArenaError {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidStage(_) => "INVALID_STAGE",
            Self::Validation(_) => "VALIDATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ChannelClosed { .. } => "CHANNEL_CLOSED",
            Self::RevealNotReady { .. } => "REVEAL_NOT_READY",
            Self::Store(_) => "STORE",
        }
    }

    /// Whether retrying the same request may succeed without changing it
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
