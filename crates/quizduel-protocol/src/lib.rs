//! Wire protocol for Quizduel.
//!
//! Everything that travels between a client and the duel server is defined
//! here: identity newtypes, the inbound [`ClientAction`] set, the outbound
//! [`ServerEvent`] set, and the [`Codec`] that turns them into bytes.
//!
//! Messages are decoded exactly once at the connection boundary; the rest of
//! the system only ever sees these typed values, never raw JSON.

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{ClientAction, FinishReason, GamePhase, QueueStatus, ServerEvent};
pub use types::{MatchId, SessionId, TaskId, TaskView, TopicId, UserId};
