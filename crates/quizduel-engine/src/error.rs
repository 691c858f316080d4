//! Error types for the engine layer.

use quizduel_protocol::UserId;

/// Errors surfaced by the engine's collaborators or its own session setup.
///
/// None of these are fatal to the process: a failing session start cleans up
/// queue and room state, and a fault inside a running session resolves that
/// one session as cancelled.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The content source has no eligible quiz tasks for the request.
    #[error("not enough quiz tasks available")]
    InsufficientContent,

    /// A paired player is unknown to the rating store.
    #[error("player {0} is unknown to the rating store")]
    ParticipantMissing(UserId),

    /// The content collaborator failed.
    #[error("content source failed: {0}")]
    Content(String),

    /// The persistence collaborator failed.
    #[error("storage failed: {0}")]
    Storage(String),
}
