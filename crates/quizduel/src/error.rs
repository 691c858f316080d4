//! Unified error type for the Quizduel server.

use quizduel_engine::EngineError;
use quizduel_protocol::ProtocolError;
use quizduel_transport::TransportError;

use crate::AuthError;

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attributes let `?` convert layer errors automatically, so
/// embedders deal with one error type.
#[derive(Debug, thiserror::Error)]
pub enum QuizduelError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An engine-level error (collaborators, session setup).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// An authentication failure.
    #[error(transparent)]
    Auth(#[from] AuthError),
}
