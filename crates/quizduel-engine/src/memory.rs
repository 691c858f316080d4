//! In-memory collaborator implementations.
//!
//! Reference backends for tests and the demo server. They keep everything in
//! plain maps behind std mutexes (no await happens while a lock is held) and
//! deterministically serve tasks in insertion order, which keeps tests
//! reproducible.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use quizduel_protocol::{MatchId, TopicId, UserId};

use crate::{EngineError, MatchResult, MatchSetup, MatchStore, QuizItem, QuizSource, RatingStore};

/// A [`QuizSource`] over a fixed list of tasks.
#[derive(Default)]
pub struct MemoryQuizSource {
    items: Vec<(Option<TopicId>, QuizItem)>,
}

impl MemoryQuizSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task, optionally tagged with the topic it belongs to.
    pub fn push(&mut self, topic: Option<TopicId>, item: QuizItem) {
        self.items.push((topic, item));
    }
}

impl QuizSource for MemoryQuizSource {
    async fn fetch(
        &self,
        count: usize,
        topic: Option<TopicId>,
    ) -> Result<Vec<QuizItem>, EngineError> {
        Ok(self
            .items
            .iter()
            .filter(|(item_topic, item)| {
                !item.correct_answer.is_empty()
                    && (topic.is_none() || *item_topic == topic)
            })
            .take(count)
            .map(|(_, item)| item.clone())
            .collect())
    }
}

/// A [`RatingStore`] over a plain map.
#[derive(Default)]
pub struct MemoryRatingStore {
    ratings: Mutex<HashMap<UserId, i32>>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a player's rating.
    pub fn seed(&self, user: UserId, rating: i32) {
        self.ratings.lock().expect("rating map poisoned").insert(user, rating);
    }

    /// Reads a rating synchronously; test helper.
    pub fn get(&self, user: UserId) -> Option<i32> {
        self.ratings.lock().expect("rating map poisoned").get(&user).copied()
    }
}

impl RatingStore for MemoryRatingStore {
    async fn rating(&self, user: UserId) -> Result<Option<i32>, EngineError> {
        Ok(self.get(user))
    }

    async fn set_rating(&self, user: UserId, rating: i32) -> Result<(), EngineError> {
        self.ratings.lock().expect("rating map poisoned").insert(user, rating);
        Ok(())
    }
}

/// One persisted match as the memory store sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMatch {
    pub setup: MatchSetup,
    pub result: Option<MatchResult>,
    pub cancel_reason: Option<String>,
    /// How many times `finalize` was called; exactly one for a well-behaved
    /// engine.
    pub finalize_calls: u32,
}

impl StoredMatch {
    /// `active`, `finished`, or `cancelled`.
    pub fn status(&self) -> &'static str {
        if self.cancel_reason.is_some() {
            "cancelled"
        } else if self.result.is_some() {
            "finished"
        } else {
            "active"
        }
    }
}

/// A [`MatchStore`] over a plain map, with call counting for tests.
pub struct MemoryMatchStore {
    next_id: AtomicU64,
    records: Mutex<HashMap<MatchId, StoredMatch>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), records: Mutex::default() }
    }

    /// Reads a stored record; test helper.
    pub fn record(&self, id: MatchId) -> Option<StoredMatch> {
        self.records.lock().expect("match map poisoned").get(&id).cloned()
    }

    /// Number of records ever created.
    pub fn len(&self) -> usize {
        self.records.lock().expect("match map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MatchStore for MemoryMatchStore {
    async fn create(&self, setup: &MatchSetup) -> Result<MatchId, EngineError> {
        let id = MatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.records.lock().expect("match map poisoned").insert(
            id,
            StoredMatch {
                setup: setup.clone(),
                result: None,
                cancel_reason: None,
                finalize_calls: 0,
            },
        );
        Ok(id)
    }

    async fn finalize(&self, id: MatchId, result: &MatchResult) -> Result<(), EngineError> {
        let mut records = self.records.lock().expect("match map poisoned");
        let record = records
            .get_mut(&id)
            .ok_or_else(|| EngineError::Storage(format!("unknown match {id}")))?;
        record.result = Some(result.clone());
        record.finalize_calls += 1;
        Ok(())
    }

    async fn cancel(&self, id: MatchId, reason: &str) -> Result<(), EngineError> {
        let mut records = self.records.lock().expect("match map poisoned");
        let record = records
            .get_mut(&id)
            .ok_or_else(|| EngineError::Storage(format!("unknown match {id}")))?;
        record.cancel_reason = Some(reason.to_string());
        Ok(())
    }
}
