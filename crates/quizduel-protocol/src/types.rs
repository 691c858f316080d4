//! Identity newtypes and the client-visible view of a quiz task.

use serde::{Deserialize, Serialize};
use std::fmt;

use serde::de::{self, Deserializer, Visitor};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over `u64` so a user id can never be confused with a session or
/// task id. `#[serde(transparent)]` keeps the wire form a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

// `UserId` is used as a `HashMap` key in several `ServerEvent` variants.
// serde_json renders integer map keys as strings, and because `ServerEvent`
// is an internally tagged enum its content is buffered during
// deserialization — which drops serde_json's map-key integer coercion. The
// manual impl accepts either a bare number (the normal wire form) or a
// stringified number (a map key) so those events round-trip.
impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UserIdVisitor;

        impl<'de> Visitor<'de> for UserIdVisitor {
            type Value = UserId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a u64 or a string containing a u64")
            }

            fn visit_u64<E>(self, v: u64) -> Result<UserId, E> {
                Ok(UserId(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<UserId, E>
            where
                E: de::Error,
            {
                u64::try_from(v)
                    .map(UserId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E>(self, v: &str) -> Result<UserId, E>
            where
                E: de::Error,
            {
                v.parse::<u64>()
                    .map(UserId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(UserIdVisitor)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a live duel session.
///
/// Derived from the persisted match id, so the in-memory session and the
/// stored match record always agree on identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A unique identifier for a persisted match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// A unique identifier for a quiz task (one question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q-{}", self.0)
    }
}

/// A unique identifier for a topic used to filter matchmaking and content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub u32);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TaskView
// ---------------------------------------------------------------------------

/// The client-visible part of a quiz task.
///
/// This is the only task shape that is ever serialized to a client. The
/// stored correct answer stays server-side; it reaches a player only through
/// `answer_result`/`attempts_exhausted` once their round is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task identity, stable across `game_start`/`next_task`/`game_restore`.
    pub id: TaskId,
    /// The question text shown to both players.
    pub question: String,
    /// Answer options for choice-type tasks; empty for free-input tasks.
    pub options: Vec<String>,
    /// Task kind label as authored in the content catalog.
    #[serde(rename = "type")]
    pub kind: String,
}
