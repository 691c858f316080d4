//! Session ownership table.
//!
//! The directory owns every live session and the user → session index used
//! for routing inbound actions and for reconnection. It is a plain struct;
//! the engine serializes access through one mutex and never holds that
//! mutex while touching a session's own lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use quizduel_protocol::{SessionId, UserId};

use crate::session::GameSession;

/// Shared handle to one live session: its state behind the per-session
/// lock, plus the clock task driving it.
pub struct SessionHandle {
    session_id: SessionId,
    /// The session state machine. Lock order: this lock is always the last
    /// one taken, and is released before any outbound send.
    pub state: Mutex<GameSession>,
    clock: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    pub fn new(session: GameSession) -> Arc<Self> {
        Arc::new(Self {
            session_id: session.session_id(),
            state: Mutex::new(session),
            clock: Mutex::new(None),
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Stores the clock task so termination can cancel it.
    pub async fn attach_clock(&self, task: JoinHandle<()>) {
        *self.clock.lock().await = Some(task);
    }

    /// Aborts the clock task, if one is still attached. A cancelled clock
    /// cannot resurrect the session: it re-checks status under the state
    /// lock before doing anything.
    pub async fn abort_clock(&self) {
        if let Some(task) = self.clock.lock().await.take() {
            task.abort();
        }
    }
}

/// All live sessions, keyed by id, with a user index on the side.
pub struct SessionDirectory {
    sessions: HashMap<SessionId, Arc<SessionHandle>>,
    by_user: HashMap<UserId, SessionId>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self { sessions: HashMap::new(), by_user: HashMap::new() }
    }

    /// Registers a session and maps both participants to it.
    pub fn insert(&mut self, handle: Arc<SessionHandle>, players: [UserId; 2]) {
        let id = handle.session_id();
        self.sessions.insert(id, handle);
        for player in players {
            self.by_user.insert(player, id);
        }
    }

    /// The session a user is currently in, if any.
    pub fn session_of(&self, user: UserId) -> Option<Arc<SessionHandle>> {
        let id = self.by_user.get(&user)?;
        self.sessions.get(id).cloned()
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(&id).cloned()
    }

    pub fn contains_user(&self, user: UserId) -> bool {
        self.by_user.contains_key(&user)
    }

    /// Removes a session and every user mapping that points at it.
    pub fn remove(&mut self, id: SessionId) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.remove(&id)?;
        self.by_user.retain(|_, mapped| *mapped != id);
        Some(handle)
    }

    /// Handles to every live session; used for shutdown.
    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::QuizItem;
    use quizduel_protocol::{MatchId, TaskId};

    fn handle(id: u64, p1: u64, p2: u64) -> Arc<SessionHandle> {
        let items = vec![QuizItem {
            id: TaskId(1),
            question: "q".into(),
            options: vec![],
            kind: "input".into(),
            correct_answer: "a".into(),
        }];
        SessionHandle::new(GameSession::new(
            SessionId(id),
            MatchId(id),
            [UserId(p1), UserId(p2)],
            [1000, 1000],
            items,
            60,
            3,
        ))
    }

    #[test]
    fn test_insert_maps_both_players_to_the_session() {
        let mut directory = SessionDirectory::new();
        directory.insert(handle(1, 10, 20), [UserId(10), UserId(20)]);

        assert!(directory.contains_user(UserId(10)));
        assert!(directory.contains_user(UserId(20)));
        assert!(!directory.contains_user(UserId(30)));
        assert_eq!(
            directory.session_of(UserId(10)).unwrap().session_id(),
            SessionId(1)
        );
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_remove_clears_session_and_user_index() {
        let mut directory = SessionDirectory::new();
        directory.insert(handle(1, 10, 20), [UserId(10), UserId(20)]);
        directory.insert(handle(2, 30, 40), [UserId(30), UserId(40)]);

        let removed = directory.remove(SessionId(1));
        assert!(removed.is_some());
        assert!(!directory.contains_user(UserId(10)));
        assert!(!directory.contains_user(UserId(20)));
        assert!(directory.contains_user(UserId(30)), "other sessions stay untouched");
        assert_eq!(directory.len(), 1);

        assert!(directory.remove(SessionId(1)).is_none(), "second remove is a no-op");
    }

    #[test]
    fn test_handles_lists_every_live_session() {
        let mut directory = SessionDirectory::new();
        assert!(directory.is_empty());
        directory.insert(handle(1, 10, 20), [UserId(10), UserId(20)]);
        directory.insert(handle(2, 30, 40), [UserId(30), UserId(40)]);
        assert_eq!(directory.handles().len(), 2);
    }
}
