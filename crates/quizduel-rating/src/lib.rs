//! Paired-comparison (Elo) rating updates for duel outcomes.
//!
//! This crate is deliberately pure: no state, no I/O, no clock. Given two
//! pre-match ratings and an outcome it produces both new ratings, so every
//! edge case (ties, forfeits, lopsided ratings) is testable in isolation.
//!
//! The update is the standard form: expected score
//! `E1 = 1 / (1 + 10^((R2−R1)/400))`, actual score `S ∈ {1, 0.5, 0}`, new
//! rating `round(R + K·(S−E))` with a fixed K. Forfeits map to S = 1/0
//! against the same expectation terms as a played-out result.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rating-update sensitivity. One win between equals moves both sides by
/// `K/2 = 16` points.
pub const K_FACTOR: f64 = 32.0;

/// The resolved outcome of a duel, from player 1's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Player1Win,
    Player2Win,
    Draw,
}

impl Outcome {
    /// Resolves an outcome from final scores.
    pub fn from_scores(score1: u32, score2: u32) -> Self {
        match score1.cmp(&score2) {
            std::cmp::Ordering::Greater => Self::Player1Win,
            std::cmp::Ordering::Less => Self::Player2Win,
            std::cmp::Ordering::Equal => Self::Draw,
        }
    }

    /// Actual scores `(S1, S2)` for the rating formula. `S2 = 1 − S1` always.
    pub fn scores(self) -> (f64, f64) {
        match self {
            Self::Player1Win => (1.0, 0.0),
            Self::Player2Win => (0.0, 1.0),
            Self::Draw => (0.5, 0.5),
        }
    }

    /// The label persisted in match records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player1Win => "player1_win",
            Self::Player2Win => "player2_win",
            Self::Draw => "draw",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One player's rating after the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingUpdate {
    /// The new rating.
    pub rating: i32,
    /// `rating − old rating`. Antisymmetric between the two players.
    pub delta: i32,
}

/// Expected score of player 1 against player 2.
///
/// A 400-point advantage is worth an expectation of about 0.91; equal
/// ratings give exactly 0.5.
pub fn expectation(rating1: i32, rating2: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(rating2 - rating1) / 400.0))
}

/// Computes both players' updated ratings for an outcome.
pub fn rate_pair(rating1: i32, rating2: i32, outcome: Outcome) -> (RatingUpdate, RatingUpdate) {
    let e1 = expectation(rating1, rating2);
    let e2 = 1.0 - e1;
    let (s1, s2) = outcome.scores();

    let new1 = (f64::from(rating1) + K_FACTOR * (s1 - e1)).round() as i32;
    let new2 = (f64::from(rating2) + K_FACTOR * (s2 - e2)).round() as i32;

    (
        RatingUpdate { rating: new1, delta: new1 - rating1 },
        RatingUpdate { rating: new2, delta: new2 - rating2 },
    )
}
