//! Core engine for Quizduel: matchmaking, duel sessions, and live
//! connections.
//!
//! One [`GameEngine`] runs per process. Transport hands it decoded
//! [`ClientAction`](quizduel_protocol::ClientAction)s; everything else
//! (queue pairing, private rooms, the session state machine with its round
//! gate and match clock, rating updates, persistence) happens in here,
//! behind three collaborator traits ([`QuizSource`], [`RatingStore`],
//! [`MatchStore`]).
//!
//! # Key types
//!
//! - [`GameEngine`] — the orchestrator; owns every lock and timer
//! - [`GameSession`] — the per-duel state machine (pure, synchronous)
//! - [`Matchmaker`] — FIFO queue + private rooms
//! - [`SessionDirectory`] — session ownership table with a user index
//! - [`ConnectionRegistry`] — one outbound event channel per online user
//! - [`memory`] — in-memory collaborators for tests and demos

mod config;
mod content;
mod directory;
mod engine;
mod error;
mod matchmaker;
pub mod memory;
mod registry;
mod session;

pub use config::{
    EngineConfig, MatchSettings, MAX_DURATION_SECS, MAX_ROUNDS, MIN_DURATION_SECS, MIN_ROUNDS,
};
pub use content::{MatchResult, MatchSetup, MatchStore, QuizItem, QuizSource, RatingStore};
pub use directory::{SessionDirectory, SessionHandle};
pub use engine::GameEngine;
pub use error::EngineError;
pub use matchmaker::{CancelCleanup, Matchmaker, PairedDuel, PrivateRoom, QueueEntry};
pub use registry::{ConnectionRegistry, EventSender, SendOutcome};
pub use session::{
    ClockTick, FinishCause, GameSession, PlayerProgress, Resolution, SessionStatus, SubmitResult,
};
