//! Open-queue matchmaking and private rooms.
//!
//! The matchmaker is a plain synchronous struct; the engine serializes
//! access through one mutex. Pairing is FIFO: a new entry matches the
//! longest-waiting compatible entry, no rating bands.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use rand::Rng;

use quizduel_protocol::UserId;

use crate::MatchSettings;

/// A player waiting in the open queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub user_id: UserId,
    pub rating: i32,
    pub joined_at: Instant,
    pub settings: MatchSettings,
}

/// A private room waiting for its second player.
#[derive(Debug, Clone)]
pub struct PrivateRoom {
    pub host_id: UserId,
    pub settings: MatchSettings,
}

/// Two players ready to duel, with the settings their session will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedDuel {
    pub player1: UserId,
    pub player2: UserId,
    pub settings: MatchSettings,
}

/// What [`Matchmaker::cancel`] actually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelCleanup {
    pub removed_queue_entry: bool,
    pub removed_rooms: usize,
}

/// FIFO queue plus the live private-room table.
pub struct Matchmaker {
    queue: VecDeque<QueueEntry>,
    rooms: HashMap<String, PrivateRoom>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self { queue: VecDeque::new(), rooms: HashMap::new() }
    }

    /// Adds a player to the queue and immediately attempts pairing.
    ///
    /// A repeated enqueue replaces the player's previous entry. Returns the
    /// paired duel if a compatible opponent was waiting; the pair's settings
    /// are the more restrictive merge of both requests.
    pub fn enqueue(
        &mut self,
        user_id: UserId,
        rating: i32,
        settings: MatchSettings,
    ) -> Option<PairedDuel> {
        self.queue.retain(|entry| entry.user_id != user_id);

        if let Some(pos) = self
            .queue
            .iter()
            .position(|entry| settings.compatible(&entry.settings))
        {
            let opponent = self.queue.remove(pos).expect("position came from iter");
            tracing::info!(
                player1 = %user_id,
                player2 = %opponent.user_id,
                "queue pair found"
            );
            return Some(PairedDuel {
                player1: user_id,
                player2: opponent.user_id,
                settings: settings.merged(&opponent.settings),
            });
        }

        self.queue.push_back(QueueEntry {
            user_id,
            rating,
            joined_at: Instant::now(),
            settings,
        });
        None
    }

    /// Creates a private room and returns its 4-digit join code.
    ///
    /// Codes are unique among live rooms; collisions regenerate.
    pub fn create_room(&mut self, host_id: UserId, settings: MatchSettings) -> String {
        let mut rng = rand::rng();
        let code = loop {
            let candidate = rng.random_range(1000..=9999).to_string();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        self.rooms.insert(code.clone(), PrivateRoom { host_id, settings });
        tracing::info!(host = %host_id, code, "private room created");
        code
    }

    /// Fills a private room. The room is consumed on success.
    ///
    /// Returns `None` for an unknown code or a host trying to fill their
    /// own room; the caller reports that to the joiner only.
    pub fn join_room(&mut self, user_id: UserId, code: &str) -> Option<PairedDuel> {
        if self.rooms.get(code)?.host_id == user_id {
            return None;
        }
        let room = self.rooms.remove(code).expect("checked above");
        Some(PairedDuel {
            player1: room.host_id,
            player2: user_id,
            settings: room.settings,
        })
    }

    /// Removes the user's queue entry and any rooms they host. Idempotent.
    pub fn cancel(&mut self, user_id: UserId) -> CancelCleanup {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.user_id != user_id);
        let removed_queue_entry = self.queue.len() != before;

        let before = self.rooms.len();
        self.rooms.retain(|_, room| room.host_id != user_id);
        let removed_rooms = before - self.rooms.len();

        CancelCleanup { removed_queue_entry, removed_rooms }
    }

    /// Cleanup after a failed session start: both players' queue entries
    /// and hosted rooms go away.
    pub fn remove_participants(&mut self, a: UserId, b: UserId) {
        self.cancel(a);
        self.cancel(b);
    }

    /// Looks up a live room; test and diagnostics helper.
    pub fn room(&self, code: &str) -> Option<&PrivateRoom> {
        self.rooms.get(code)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new()
    }
}
