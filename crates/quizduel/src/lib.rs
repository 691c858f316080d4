//! # Quizduel
//!
//! Real-time two-player quiz duels over WebSockets: open-queue matchmaking,
//! private rooms, synchronized rounds with attempt limits, live progress for
//! both sides, and Elo-style rating updates.
//!
//! This meta crate ties the layers (transport → protocol → engine)
//! together behind [`QuizServer`]. A deployment supplies four collaborators:
//! an [`Authenticator`] plus the engine's
//! [`QuizSource`](quizduel_engine::QuizSource),
//! [`RatingStore`](quizduel_engine::RatingStore), and
//! [`MatchStore`](quizduel_engine::MatchStore).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizduel::prelude::*;
//! use quizduel_engine::memory::{MemoryMatchStore, MemoryQuizSource, MemoryRatingStore};
//!
//! struct DevAuth;
//!
//! impl Authenticator for DevAuth {
//!     async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
//!         token.parse().map(UserId).map_err(|_| AuthError("token must be a number".into()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QuizduelError> {
//!     let server = QuizServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build(
//!             DevAuth,
//!             MemoryQuizSource::new(),
//!             MemoryRatingStore::new(),
//!             MemoryMatchStore::new(),
//!         )
//!         .await?;
//!     server.run().await
//! }
//! ```

mod auth;
mod dispatcher;
mod error;
mod server;

pub use auth::{AuthError, Authenticator};
pub use error::QuizduelError;
pub use server::{QuizServer, QuizServerBuilder};

/// The usual imports for building a duel server.
pub mod prelude {
    pub use crate::{AuthError, Authenticator, QuizServer, QuizServerBuilder, QuizduelError};
    pub use quizduel_engine::{
        EngineConfig, GameEngine, MatchResult, MatchSetup, MatchStore, QuizItem, QuizSource,
        RatingStore,
    };
    pub use quizduel_protocol::{
        ClientAction, ServerEvent, SessionId, TaskId, TaskView, TopicId, UserId,
    };
    pub use quizduel_rating::Outcome;
}
