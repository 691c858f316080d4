//! The duel session state machine.
//!
//! `GameSession` is a plain mutable struct with synchronous methods; the
//! engine owns the per-session lock and the timers. Every mutation returns
//! the outbound events it produced as `(recipient, event)` pairs, so the
//! caller can release the lock before any network send happens.
//!
//! ```text
//! Countdown ──→ Playing ──→ Finished
//!     │                        ▲
//!     └────────────────────────┤   (forfeit / clock / rounds done)
//!                           Cancelled  (technical fault only)
//! ```
//!
//! Terminal states are absorbing: [`GameSession::resolve`] hands out the
//! session's outcome exactly once, which is what makes duplicate finish
//! requests (double disconnects, cancel racing the clock) harmless.

use std::collections::HashMap;

use quizduel_protocol::{GamePhase, MatchId, ServerEvent, SessionId, UserId};

use crate::content::QuizItem;

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Countdown,
    Playing,
    Finished,
    Cancelled,
}

impl SessionStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// One player's mutable state within a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerProgress {
    /// Index of the round the player is on. Under the round gate both
    /// players' indexes advance together.
    pub round: usize,
    /// Wrong answers spent on the current round.
    pub attempts: u32,
    /// Whether the current round is settled for this player (answered
    /// correctly or attempts exhausted).
    pub accepted: bool,
    /// Correctly answered rounds so far.
    pub score: u32,
}

/// Why a session is terminating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishCause {
    /// The match clock ran out.
    TimeOver,
    /// Both players accepted every round.
    AllTasksCompleted,
    /// This player left or disconnected; the opponent wins.
    Forfeit(UserId),
    /// An internal fault; the session cancels and ratings stay untouched.
    Technical(String),
}

/// The session's outcome, produced exactly once by [`GameSession::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub session_id: SessionId,
    pub match_id: MatchId,
    pub players: [UserId; 2],
    pub ratings_before: [i32; 2],
    pub scores: [u32; 2],
    pub cause: FinishCause,
}

/// What a submitted answer did to the session.
#[derive(Debug)]
pub enum SubmitResult {
    /// Not a participant, not playing, or no round to answer; dropped.
    Ignored,
    /// The player's round was already accepted; nothing changed and the
    /// caller should tell them so.
    Redundant,
    /// State advanced; deliver these events.
    Progress(Vec<(UserId, ServerEvent)>),
    /// State advanced and the final round closed for both players: deliver
    /// these events, then terminate with `all_tasks_completed`.
    RoundsExhausted(Vec<(UserId, ServerEvent)>),
}

/// One second of match-clock progress.
#[derive(Debug)]
pub enum ClockTick {
    /// Time remains; broadcast these updates.
    Update(Vec<(UserId, ServerEvent)>),
    /// The time budget hit zero; terminate with `time_over`.
    Expired,
    /// The session is no longer playing; the clock task should end.
    Stopped,
}

/// State of one live duel between two players.
pub struct GameSession {
    session_id: SessionId,
    match_id: MatchId,
    players: [UserId; 2],
    ratings: [i32; 2],
    items: Vec<QuizItem>,
    progress: [PlayerProgress; 2],
    status: SessionStatus,
    remaining_secs: u64,
    attempt_cap: u32,
}

impl GameSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        match_id: MatchId,
        players: [UserId; 2],
        ratings: [i32; 2],
        items: Vec<QuizItem>,
        duration_secs: u64,
        attempt_cap: u32,
    ) -> Self {
        debug_assert!(!items.is_empty(), "a session needs at least one task");
        Self {
            session_id,
            match_id,
            players,
            ratings,
            items,
            progress: [PlayerProgress::default(); 2],
            status: SessionStatus::Countdown,
            remaining_secs: duration_secs,
            attempt_cap,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn players(&self) -> [UserId; 2] {
        self.players
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Seat index (0 or 1) of a participant.
    pub fn seat_of(&self, user: UserId) -> Option<usize> {
        self.players.iter().position(|p| *p == user)
    }

    /// Transitions Countdown → Playing and returns the `game_start` events.
    ///
    /// Returns no events if the session left Countdown already (a forfeit
    /// during the countdown resolves the session first).
    pub fn begin_playing(&mut self) -> Vec<(UserId, ServerEvent)> {
        if self.status != SessionStatus::Countdown {
            return Vec::new();
        }
        self.status = SessionStatus::Playing;

        let start = ServerEvent::GameStart {
            current_task: self.items[0].view(),
            task_number: 1,
            total_tasks: self.items.len() as u32,
            timer: self.remaining_secs,
            attempts_left: self.attempt_cap,
        };
        self.players.iter().map(|p| (*p, start.clone())).collect()
    }

    /// Burns one second of the time budget.
    pub fn tick(&mut self) -> ClockTick {
        if self.status != SessionStatus::Playing {
            return ClockTick::Stopped;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            return ClockTick::Expired;
        }

        let update = ServerEvent::MatchUpdate {
            timer: self.remaining_secs,
            current_task_index: self.progress[0].round as u32,
            scores: self.scores_map(),
            p1_done: self.progress[0].accepted,
            p2_done: self.progress[1].accepted,
        };
        ClockTick::Update(self.players.iter().map(|p| (*p, update.clone())).collect())
    }

    /// Applies one submitted answer.
    pub fn submit(&mut self, user: UserId, answer: &str) -> SubmitResult {
        if self.status != SessionStatus::Playing {
            return SubmitResult::Ignored;
        }
        let Some(seat) = self.seat_of(user) else {
            return SubmitResult::Ignored;
        };
        let round = self.progress[seat].round;
        if round >= self.items.len() {
            return SubmitResult::Ignored;
        }
        if self.progress[seat].accepted {
            return SubmitResult::Redundant;
        }

        let item = &self.items[round];
        let is_correct = answers_match(answer, &item.correct_answer);
        let correct_answer = item.correct_answer.clone();
        let mut events = Vec::new();

        let progress = &mut self.progress[seat];
        if is_correct {
            progress.score += 1;
            progress.accepted = true;
            events.push((
                user,
                ServerEvent::AnswerResult {
                    is_correct: true,
                    attempts_left: self.attempt_cap - progress.attempts,
                    correct_answer: None,
                },
            ));
        } else {
            progress.attempts += 1;
            if progress.attempts >= self.attempt_cap {
                // The round closes without a score; the answer is revealed
                // to this player only.
                progress.accepted = true;
                events.push((
                    user,
                    ServerEvent::AnswerResult {
                        is_correct: false,
                        attempts_left: 0,
                        correct_answer: Some(correct_answer.clone()),
                    },
                ));
                events.push((user, ServerEvent::AttemptsExhausted { correct_answer }));
            } else {
                events.push((
                    user,
                    ServerEvent::AnswerResult {
                        is_correct: false,
                        attempts_left: self.attempt_cap - progress.attempts,
                        correct_answer: None,
                    },
                ));
            }
        }

        if self.progress[seat].accepted {
            let opponent = self.players[1 - seat];
            events.push((
                opponent,
                ServerEvent::OpponentProgress {
                    opponent_answered: true,
                    opponent_score: self.progress[seat].score,
                },
            ));

            if self.progress[0].accepted && self.progress[1].accepted {
                return self.advance_round(events);
            }
        }

        SubmitResult::Progress(events)
    }

    /// Both players accepted the current round: reset the gate and either
    /// serve the next task or report the list exhausted.
    fn advance_round(
        &mut self,
        mut events: Vec<(UserId, ServerEvent)>,
    ) -> SubmitResult {
        let next = self.progress[0].round + 1;
        if next >= self.items.len() {
            return SubmitResult::RoundsExhausted(events);
        }

        for progress in &mut self.progress {
            progress.round = next;
            progress.attempts = 0;
            progress.accepted = false;
        }

        let task = ServerEvent::NextTask {
            current_task: self.items[next].view(),
            task_number: next as u32 + 1,
            total_tasks: self.items.len() as u32,
            attempts_left: self.attempt_cap,
        };
        events.extend(self.players.iter().map(|p| (*p, task.clone())));
        SubmitResult::Progress(events)
    }

    /// Marks the session terminal and hands out its outcome.
    ///
    /// The first call wins; every later call (duplicate disconnect, cancel
    /// racing the clock) gets `None` and must do nothing.
    pub fn resolve(&mut self, cause: FinishCause) -> Option<Resolution> {
        if self.status.is_terminal() {
            return None;
        }
        self.status = match cause {
            FinishCause::Technical(_) => SessionStatus::Cancelled,
            _ => SessionStatus::Finished,
        };
        Some(Resolution {
            session_id: self.session_id,
            match_id: self.match_id,
            players: self.players,
            ratings_before: self.ratings,
            scores: [self.progress[0].score, self.progress[1].score],
            cause,
        })
    }

    /// The snapshot replayed to a participant who reconnects mid-session.
    pub fn snapshot(&self, user: UserId) -> Option<ServerEvent> {
        let seat = self.seat_of(user)?;
        let phase = match self.status {
            SessionStatus::Countdown => GamePhase::Countdown,
            SessionStatus::Playing => GamePhase::Playing,
            _ => return None,
        };
        let progress = &self.progress[seat];
        let round = progress.round.min(self.items.len() - 1);
        let opponent = &self.progress[1 - seat];

        Some(ServerEvent::GameRestore {
            status: phase,
            timer: self.remaining_secs,
            scores: self.scores_map(),
            current_task: self.items[round].view(),
            task_number: round as u32 + 1,
            total_tasks: self.items.len() as u32,
            attempts_left: self.attempt_cap - progress.attempts,
            opponent_index: opponent.round as u32,
            opponent_score: opponent.score,
        })
    }

    fn scores_map(&self) -> HashMap<UserId, u32> {
        HashMap::from([
            (self.players[0], self.progress[0].score),
            (self.players[1], self.progress[1].score),
        ])
    }
}

/// Compares a submitted answer against the stored one.
///
/// Both sides are trimmed, lowercased, and have comma decimal separators
/// normalized to dots, so "3,14 " matches "3.14".
fn answers_match(submitted: &str, correct: &str) -> bool {
    normalize_answer(submitted) == normalize_answer(correct)
}

fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase().replace(',', ".")
}
