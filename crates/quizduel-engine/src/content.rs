//! Collaborator contracts: quiz content, ratings, and match persistence.
//!
//! The engine never talks to a database or a content catalog directly. It
//! consumes these three traits, which a deployment implements over whatever
//! backend it has. The methods return `impl Future + Send` explicitly so
//! engine tasks that call them stay spawnable.

use std::future::Future;

use serde::{Deserialize, Serialize};

use quizduel_protocol::{MatchId, TaskId, TaskView, TopicId, UserId};
use quizduel_rating::Outcome;

use crate::EngineError;

/// One quiz task, including the server-side answer.
///
/// Fetched once per session and never mutated afterwards. Only the
/// [`view`](QuizItem::view) projection is ever sent to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: TaskId,
    pub question: String,
    pub options: Vec<String>,
    pub kind: String,
    pub correct_answer: String,
}

impl QuizItem {
    /// The client-visible projection, with the answer stripped.
    pub fn view(&self) -> TaskView {
        TaskView {
            id: self.id,
            question: self.question.clone(),
            options: self.options.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// Everything known about a match when its record is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    pub player1: UserId,
    pub player2: UserId,
    pub rating1: i32,
    pub rating2: i32,
    /// Identities of the tasks served, for later analysis.
    pub task_ids: Vec<TaskId>,
}

/// The final state written when a match completes normally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score1: u32,
    pub score2: u32,
    pub rating1_after: i32,
    pub rating2_after: i32,
    pub outcome: Outcome,
}

/// Supplies quiz tasks for new sessions.
///
/// Implemented for `Arc<T>` as well, so an embedder can keep a handle to
/// the same collaborator the engine owns.
pub trait QuizSource: Send + Sync + 'static {
    /// Fetches up to `count` tasks, optionally restricted to a topic.
    ///
    /// Every returned item must have a non-empty `correct_answer`. Returning
    /// fewer items than requested is allowed; an empty batch means a session
    /// cannot start.
    fn fetch(
        &self,
        count: usize,
        topic: Option<TopicId>,
    ) -> impl Future<Output = Result<Vec<QuizItem>, EngineError>> + Send;
}

/// Reads and writes competitive ratings.
pub trait RatingStore: Send + Sync + 'static {
    /// The player's current rating, or `None` for a player the store has
    /// never seen.
    fn rating(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<i32>, EngineError>> + Send;

    /// Stores a player's new rating.
    fn set_rating(
        &self,
        user: UserId,
        rating: i32,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// Persists match records.
///
/// A record is created as "active" before the duel becomes visible to the
/// players, then finalized or cancelled exactly once.
pub trait MatchStore: Send + Sync + 'static {
    /// Creates an active match record and returns its identity.
    fn create(
        &self,
        setup: &MatchSetup,
    ) -> impl Future<Output = Result<MatchId, EngineError>> + Send;

    /// Finalizes a completed match with scores, post-ratings, and outcome.
    fn finalize(
        &self,
        id: MatchId,
        result: &MatchResult,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Marks a match cancelled with a reason; ratings stay untouched.
    fn cancel(
        &self,
        id: MatchId,
        reason: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

impl<T: QuizSource> QuizSource for std::sync::Arc<T> {
    fn fetch(
        &self,
        count: usize,
        topic: Option<TopicId>,
    ) -> impl Future<Output = Result<Vec<QuizItem>, EngineError>> + Send {
        self.as_ref().fetch(count, topic)
    }
}

impl<T: RatingStore> RatingStore for std::sync::Arc<T> {
    fn rating(&self, user: UserId) -> impl Future<Output = Result<Option<i32>, EngineError>> + Send {
        self.as_ref().rating(user)
    }

    fn set_rating(
        &self,
        user: UserId,
        rating: i32,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        self.as_ref().set_rating(user, rating)
    }
}

impl<T: MatchStore> MatchStore for std::sync::Arc<T> {
    fn create(&self, setup: &MatchSetup) -> impl Future<Output = Result<MatchId, EngineError>> + Send {
        self.as_ref().create(setup)
    }

    fn finalize(
        &self,
        id: MatchId,
        result: &MatchResult,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        self.as_ref().finalize(id, result)
    }

    fn cancel(&self, id: MatchId, reason: &str) -> impl Future<Output = Result<(), EngineError>> + Send {
        self.as_ref().cancel(id, reason)
    }
}
