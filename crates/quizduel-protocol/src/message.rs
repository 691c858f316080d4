//! Inbound actions and outbound events.
//!
//! Inbound frames carry an `action` tag, outbound frames a `type` tag; both
//! sides use snake_case tags so the wire format matches what web clients
//! send and expect. Unknown tags fail to decode, and the dispatcher drops
//! such frames without touching any state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{TaskView, TopicId, UserId};

// ---------------------------------------------------------------------------
// Inbound: ClientAction
// ---------------------------------------------------------------------------

/// Everything a client can ask the duel server to do.
///
/// `find_match` and `create_room` take the same optional settings; whatever
/// is omitted falls back to server defaults, and paired players get the more
/// restrictive combination of their requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    /// Enter the open matchmaking queue.
    FindMatch {
        topic_id: Option<TopicId>,
        task_count: Option<u32>,
        match_duration: Option<u64>,
    },

    /// Create a private room and receive its join code.
    CreateRoom {
        topic_id: Option<TopicId>,
        task_count: Option<u32>,
        match_duration: Option<u64>,
    },

    /// Join a private room by its 4-digit code.
    JoinRoom { code: String },

    /// Submit an answer for the current round.
    SubmitAnswer { answer: String },

    /// Leave the current game, forfeiting it.
    LeaveGame,

    /// Leave the matchmaking queue and close any hosted room.
    CancelSearch,
}

// ---------------------------------------------------------------------------
// Outbound: ServerEvent and its enums
// ---------------------------------------------------------------------------

/// Matchmaking status reported through the `status` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// The player is waiting in the open queue.
    Searching,
    /// The player is not queued and not in a game.
    Idle,
}

/// The phase a restored session is in, as reported by `game_restore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Countdown,
    Playing,
}

/// Why a session reached `game_finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The match clock ran out.
    TimeOver,
    /// Both players accepted every round.
    AllTasksCompleted,
    /// A player left or lost their connection; the other wins.
    PlayerLeft,
}

/// Everything the duel server can tell a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once after a fresh (non-reconnect) authentication.
    Welcome { user_id: UserId, rating: i32 },

    /// Matchmaking status change.
    Status { status: QueueStatus },

    /// A private room was created for this player.
    RoomCreated {
        room_code: String,
        topic_id: Option<TopicId>,
        task_count: u32,
        match_duration: u64,
    },

    /// One pre-game countdown tick (3, 2, 1).
    Countdown { value: u32 },

    /// The duel started; round 1 is live.
    GameStart {
        current_task: TaskView,
        task_number: u32,
        total_tasks: u32,
        timer: u64,
        attempts_left: u32,
    },

    /// Both players accepted the previous round; this is the next one.
    NextTask {
        current_task: TaskView,
        task_number: u32,
        total_tasks: u32,
        attempts_left: u32,
    },

    /// Once-per-second snapshot of the running match.
    MatchUpdate {
        timer: u64,
        current_task_index: u32,
        scores: HashMap<UserId, u32>,
        p1_done: bool,
        p2_done: bool,
    },

    /// Verdict for one submitted answer.
    AnswerResult {
        is_correct: bool,
        attempts_left: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        correct_answer: Option<String>,
    },

    /// The opponent accepted the current round.
    OpponentProgress {
        opponent_answered: bool,
        opponent_score: u32,
    },

    /// The attempt cap was reached; the round closes and the answer is shown.
    AttemptsExhausted { correct_answer: String },

    /// Full session snapshot replayed to a reconnecting player.
    GameRestore {
        status: GamePhase,
        timer: u64,
        scores: HashMap<UserId, u32>,
        current_task: TaskView,
        task_number: u32,
        total_tasks: u32,
        attempts_left: u32,
        opponent_index: u32,
        opponent_score: u32,
    },

    /// Terminal event for a completed duel.
    GameFinished {
        scores: HashMap<UserId, u32>,
        rating_changes: HashMap<UserId, i32>,
        winner_id: Option<UserId>,
        reason: FinishReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        disconnected_player_id: Option<UserId>,
    },

    /// Terminal event for a technically cancelled duel; ratings untouched.
    GameCancelled { reason: String },

    /// Something about the player's own request went wrong.
    Error { message: String },
}
