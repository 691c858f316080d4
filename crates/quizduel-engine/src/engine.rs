//! The engine: routes actions, owns the locks, drives the timers.
//!
//! One `GameEngine` exists per process. It ties the registry, matchmaker,
//! and directory together and is the only place that calls the persistence
//! and content collaborators. Locking discipline: at most one of the
//! matchmaker / directory / per-session locks is held at a time, and every
//! lock is released before an outbound send.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use quizduel_protocol::{
    ClientAction, FinishReason, QueueStatus, ServerEvent, SessionId, UserId,
};
use quizduel_rating::{Outcome, rate_pair};

use crate::content::{MatchResult, MatchSetup, MatchStore, QuizSource, RatingStore};
use crate::directory::{SessionDirectory, SessionHandle};
use crate::matchmaker::{Matchmaker, PairedDuel};
use crate::registry::{ConnectionRegistry, EventSender, SendOutcome};
use crate::session::{ClockTick, FinishCause, GameSession, SubmitResult};
use crate::{EngineConfig, MatchSettings};

/// Cancellation reason recorded when the engine shuts down mid-duel.
const SHUTDOWN_REASON: &str = "server_shutdown";

/// The process-wide duel engine.
///
/// Generic over its collaborators the same way the server is generic over
/// its authenticator; a deployment picks concrete implementations once, at
/// construction.
pub struct GameEngine<Q, R, M> {
    registry: ConnectionRegistry,
    matchmaker: Mutex<Matchmaker>,
    directory: Mutex<SessionDirectory>,
    content: Q,
    ratings: R,
    matches: M,
    config: EngineConfig,
}

impl<Q, R, M> GameEngine<Q, R, M>
where
    Q: QuizSource,
    R: RatingStore,
    M: MatchStore,
{
    pub fn new(content: Q, ratings: R, matches: M, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            registry: ConnectionRegistry::new(),
            matchmaker: Mutex::new(Matchmaker::new()),
            directory: Mutex::new(SessionDirectory::new()),
            content,
            ratings,
            matches,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of live sessions; diagnostics helper.
    pub async fn live_sessions(&self) -> usize {
        self.directory.lock().await.len()
    }

    // -----------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------

    /// Registers a user's connection and greets them.
    ///
    /// A user with a live session gets that session's snapshot replayed
    /// instead of a fresh welcome; the countdown never restarts. Returns
    /// the registration epoch the handler must present on disconnect.
    pub async fn connect(self: &Arc<Self>, user: UserId, sender: EventSender) -> u64 {
        let epoch = self.registry.register(user, sender).await;

        let handle = { self.directory.lock().await.session_of(user) };
        let snapshot = match &handle {
            Some(handle) => handle.state.lock().await.snapshot(user),
            None => None,
        };

        if let Some(restore) = snapshot {
            tracing::info!(%user, "replaying live session to reconnected player");
            self.deliver(user, restore).await;
        } else {
            let rating = match self.ratings.rating(user).await {
                Ok(rating) => rating.unwrap_or(self.config.default_rating),
                Err(e) => {
                    tracing::warn!(%user, error = %e, "rating lookup failed, using default");
                    self.config.default_rating
                }
            };
            self.deliver(user, ServerEvent::Welcome { user_id: user, rating }).await;
        }
        epoch
    }

    /// Handles a connection loss reported by the user's handler.
    ///
    /// `epoch` is the value [`connect`](Self::connect) returned to that
    /// handler; a handler superseded by a reconnect is stale and must not
    /// disturb the newer connection.
    pub async fn disconnect(self: &Arc<Self>, user: UserId, epoch: Option<u64>) {
        if !self.registry.unregister(user, epoch).await {
            tracing::debug!(%user, "stale disconnect ignored");
            return;
        }
        self.handle_connection_loss(user).await;
    }

    /// Queue/room cleanup plus the forfeit path for a user whose
    /// connection is gone. The forfeit runs as its own task so this never
    /// blocks on I/O to the remaining player.
    fn handle_connection_loss(
        self: &Arc<Self>,
        user: UserId,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let this = Arc::clone(self);
        Box::pin(async move {
            { this.matchmaker.lock().await.cancel(user); }

            let handle = { this.directory.lock().await.session_of(user) };
            if let Some(handle) = handle {
                tracing::warn!(%user, session = %handle.session_id(), "player lost mid-duel, forfeiting");
                let engine = Arc::clone(&this);
                tokio::spawn(async move {
                    engine.finish_session(&handle, FinishCause::Forfeit(user)).await;
                });
            }
        })
    }

    // -----------------------------------------------------------------
    // Inbound actions
    // -----------------------------------------------------------------

    /// Routes one decoded client action.
    pub async fn handle_action(self: &Arc<Self>, user: UserId, action: ClientAction) {
        match action {
            ClientAction::FindMatch { topic_id, task_count, match_duration } => {
                let settings =
                    MatchSettings::from_request(&self.config, topic_id, task_count, match_duration);
                self.find_match(user, settings).await;
            }
            ClientAction::CreateRoom { topic_id, task_count, match_duration } => {
                let settings =
                    MatchSettings::from_request(&self.config, topic_id, task_count, match_duration);
                self.create_room(user, settings).await;
            }
            ClientAction::JoinRoom { code } => self.join_room(user, &code).await,
            ClientAction::SubmitAnswer { answer } => self.submit_answer(user, &answer).await,
            ClientAction::LeaveGame => self.leave_game(user).await,
            ClientAction::CancelSearch => self.cancel_search(user).await,
        }
    }

    async fn find_match(self: &Arc<Self>, user: UserId, settings: MatchSettings) {
        if self.directory.lock().await.contains_user(user) {
            tracing::debug!(%user, "find_match ignored, player already in a duel");
            return;
        }
        let rating = match self.ratings.rating(user).await {
            Ok(rating) => rating.unwrap_or(self.config.default_rating),
            Err(e) => {
                tracing::warn!(%user, error = %e, "rating store unavailable for matchmaking");
                self.deliver(user, error_event("matchmaking is unavailable, try again later"))
                    .await;
                return;
            }
        };

        let paired = { self.matchmaker.lock().await.enqueue(user, rating, settings) };
        self.deliver(user, ServerEvent::Status { status: QueueStatus::Searching }).await;
        if let Some(duel) = paired {
            self.start_session(duel).await;
        }
    }

    async fn create_room(self: &Arc<Self>, user: UserId, settings: MatchSettings) {
        if self.directory.lock().await.contains_user(user) {
            tracing::debug!(%user, "create_room ignored, player already in a duel");
            return;
        }
        let code = { self.matchmaker.lock().await.create_room(user, settings) };
        self.deliver(
            user,
            ServerEvent::RoomCreated {
                room_code: code,
                topic_id: settings.topic,
                task_count: settings.rounds,
                match_duration: settings.duration_secs,
            },
        )
        .await;
    }

    async fn join_room(self: &Arc<Self>, user: UserId, code: &str) {
        let duel = { self.matchmaker.lock().await.join_room(user, code) };
        match duel {
            Some(duel) => self.start_session(duel).await,
            None => {
                tracing::debug!(%user, code, "join for unknown room code");
                self.deliver(user, error_event("room not found")).await;
            }
        }
    }

    async fn submit_answer(self: &Arc<Self>, user: UserId, answer: &str) {
        let handle = { self.directory.lock().await.session_of(user) };
        let Some(handle) = handle else {
            tracing::debug!(%user, "answer submitted outside any duel, dropped");
            return;
        };

        let result = { handle.state.lock().await.submit(user, answer) };
        match result {
            SubmitResult::Ignored => {}
            SubmitResult::Redundant => {
                self.deliver(user, error_event("answer already accepted for this round")).await;
            }
            SubmitResult::Progress(events) => self.deliver_all(events).await,
            SubmitResult::RoundsExhausted(events) => {
                self.deliver_all(events).await;
                self.finish_session(&handle, FinishCause::AllTasksCompleted).await;
            }
        }
    }

    async fn leave_game(self: &Arc<Self>, user: UserId) {
        let handle = { self.directory.lock().await.session_of(user) };
        match handle {
            Some(handle) => {
                tracing::info!(%user, session = %handle.session_id(), "player left the duel");
                self.finish_session(&handle, FinishCause::Forfeit(user)).await;
            }
            None => tracing::debug!(%user, "leave_game outside any duel, dropped"),
        }
    }

    async fn cancel_search(self: &Arc<Self>, user: UserId) {
        let cleanup = { self.matchmaker.lock().await.cancel(user) };
        if cleanup.removed_rooms > 0 {
            tracing::info!(%user, rooms = cleanup.removed_rooms, "hosted rooms closed");
        }
        if cleanup.removed_queue_entry {
            self.deliver(user, ServerEvent::Status { status: QueueStatus::Idle }).await;
        }
    }

    // -----------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------

    /// Creates a duel session for a freshly paired duo.
    ///
    /// The match record is persisted as "active" before either player sees
    /// a countdown event; any collaborator failure here notifies both
    /// players and cleans their queue/room state instead of starting.
    async fn start_session(self: &Arc<Self>, duel: PairedDuel) {
        let PairedDuel { player1, player2, settings } = duel;

        {
            let directory = self.directory.lock().await;
            if directory.contains_user(player1) || directory.contains_user(player2) {
                drop(directory);
                self.abort_start(player1, player2, "a player is already in a duel").await;
                return;
            }
        }

        let items = match self.content.fetch(settings.rounds as usize, settings.topic).await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => {
                tracing::warn!(%player1, %player2, topic = ?settings.topic, "no eligible quiz tasks");
                self.abort_start(player1, player2, "not enough quiz tasks available").await;
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "content source failed");
                self.abort_start(player1, player2, "quiz content is unavailable").await;
                return;
            }
        };

        let ratings = [
            self.ratings.rating(player1).await,
            self.ratings.rating(player2).await,
        ];
        let mut resolved = [0i32; 2];
        for (i, (user, result)) in [player1, player2].into_iter().zip(&ratings).enumerate() {
            match result {
                Ok(Some(rating)) => resolved[i] = *rating,
                Ok(None) => {
                    tracing::warn!(%user, "paired player unknown to the rating store");
                    self.abort_start(player1, player2, "a player could not be found").await;
                    return;
                }
                Err(e) => {
                    tracing::error!(%user, error = %e, "rating store failed");
                    self.abort_start(player1, player2, "player data is unavailable").await;
                    return;
                }
            }
        }

        let setup = MatchSetup {
            player1,
            player2,
            rating1: resolved[0],
            rating2: resolved[1],
            task_ids: items.iter().map(|item| item.id).collect(),
        };
        let match_id = match self.matches.create(&setup).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "match record creation failed");
                self.abort_start(player1, player2, "the duel could not be started").await;
                return;
            }
        };

        let session = GameSession::new(
            SessionId(match_id.0),
            match_id,
            [player1, player2],
            resolved,
            items,
            settings.duration_secs,
            self.config.attempt_cap,
        );
        let handle = SessionHandle::new(session);

        // Authoritative one-session-per-user check, under the same lock as
        // the insert. The early check above is only a fast path; a player
        // sitting in the queue and hosting a room can be paired twice
        // concurrently, and exactly one of those pairings may win.
        let inserted = {
            let mut directory = self.directory.lock().await;
            if directory.contains_user(player1) || directory.contains_user(player2) {
                false
            } else {
                directory.insert(Arc::clone(&handle), [player1, player2]);
                true
            }
        };
        if !inserted {
            tracing::warn!(%player1, %player2, "pairing lost the session race");
            if let Err(e) = self.matches.cancel(match_id, "duplicate_session").await {
                tracing::error!(match_id = %match_id, error = %e, "cancel persistence failed");
            }
            self.abort_start(player1, player2, "a player is already in a duel").await;
            return;
        }
        tracing::info!(
            session = %handle.session_id(),
            %player1,
            %player2,
            rounds = settings.rounds,
            duration = settings.duration_secs,
            "duel session created"
        );

        let engine = Arc::clone(self);
        let clock_handle = Arc::clone(&handle);
        let clock = tokio::spawn(async move {
            engine.run_session(clock_handle).await;
        });
        handle.attach_clock(clock).await;
    }

    /// Failed-start path: tell both players, drop their queue entries and
    /// hosted rooms, leave no session behind.
    async fn abort_start(self: &Arc<Self>, player1: UserId, player2: UserId, message: &str) {
        for user in [player1, player2] {
            self.deliver(user, error_event(message)).await;
        }
        self.matchmaker.lock().await.remove_participants(player1, player2);
    }

    /// The session's clock task: countdown, then one tick per interval
    /// until the session expires or terminates through another path.
    async fn run_session(self: Arc<Self>, handle: Arc<SessionHandle>) {
        let players = { handle.state.lock().await.players() };

        let mut value = self.config.countdown_from;
        while value > 0 {
            self.broadcast(players, ServerEvent::Countdown { value }).await;
            tokio::time::sleep(self.config.countdown_interval).await;
            value -= 1;
        }

        let events = { handle.state.lock().await.begin_playing() };
        if events.is_empty() {
            // The session resolved during the countdown (forfeit); the
            // terminal path already notified everyone.
            return;
        }
        self.deliver_all(events).await;

        loop {
            tokio::time::sleep(self.config.clock_interval).await;
            let tick = { handle.state.lock().await.tick() };
            match tick {
                ClockTick::Update(events) => self.deliver_all(events).await,
                ClockTick::Expired => {
                    self.finish_session(&handle, FinishCause::TimeOver).await;
                    break;
                }
                ClockTick::Stopped => break,
            }
        }
    }

    /// Terminates a session. Safe to call any number of times from any
    /// path: only the call that actually resolves the session persists the
    /// outcome and broadcasts the terminal event.
    pub async fn finish_session(self: &Arc<Self>, handle: &Arc<SessionHandle>, cause: FinishCause) {
        let resolution = { handle.state.lock().await.resolve(cause) };
        let Some(res) = resolution else {
            return;
        };
        let [player1, player2] = res.players;

        match &res.cause {
            FinishCause::Technical(reason) => {
                if let Err(e) = self.matches.cancel(res.match_id, reason).await {
                    tracing::error!(match_id = %res.match_id, error = %e, "cancel persistence failed");
                }
                tracing::warn!(session = %res.session_id, %reason, "duel cancelled, ratings untouched");
                self.broadcast(res.players, ServerEvent::GameCancelled { reason: reason.clone() })
                    .await;
            }
            cause => {
                let outcome = match cause {
                    FinishCause::Forfeit(user) if *user == player1 => Outcome::Player2Win,
                    FinishCause::Forfeit(_) => Outcome::Player1Win,
                    _ => Outcome::from_scores(res.scores[0], res.scores[1]),
                };
                let (update1, update2) =
                    rate_pair(res.ratings_before[0], res.ratings_before[1], outcome);

                if let Err(e) = self.ratings.set_rating(player1, update1.rating).await {
                    tracing::error!(%player1, error = %e, "rating write failed");
                }
                if let Err(e) = self.ratings.set_rating(player2, update2.rating).await {
                    tracing::error!(%player2, error = %e, "rating write failed");
                }

                let result = MatchResult {
                    score1: res.scores[0],
                    score2: res.scores[1],
                    rating1_after: update1.rating,
                    rating2_after: update2.rating,
                    outcome,
                };
                if let Err(e) = self.matches.finalize(res.match_id, &result).await {
                    tracing::error!(match_id = %res.match_id, error = %e, "finalize persistence failed");
                }

                let winner_id = match outcome {
                    Outcome::Player1Win => Some(player1),
                    Outcome::Player2Win => Some(player2),
                    Outcome::Draw => None,
                };
                let (reason, disconnected_player_id) = match cause {
                    FinishCause::TimeOver => (FinishReason::TimeOver, None),
                    FinishCause::AllTasksCompleted => (FinishReason::AllTasksCompleted, None),
                    FinishCause::Forfeit(user) => (FinishReason::PlayerLeft, Some(*user)),
                    FinishCause::Technical(_) => unreachable!("handled above"),
                };

                tracing::info!(
                    session = %res.session_id,
                    ?winner_id,
                    score1 = res.scores[0],
                    score2 = res.scores[1],
                    "duel finished"
                );
                self.broadcast(
                    res.players,
                    ServerEvent::GameFinished {
                        scores: [(player1, res.scores[0]), (player2, res.scores[1])].into(),
                        rating_changes: [(player1, update1.delta), (player2, update2.delta)].into(),
                        winner_id,
                        reason,
                        disconnected_player_id,
                    },
                )
                .await;
            }
        }

        {
            self.directory.lock().await.remove(res.session_id);
        }
        handle.abort_clock().await;
    }

    /// Cancels a live session as a technical failure. No ratings move.
    pub async fn cancel_session(self: &Arc<Self>, session_id: SessionId, reason: &str) {
        let handle = { self.directory.lock().await.get(session_id) };
        if let Some(handle) = handle {
            self.finish_session(&handle, FinishCause::Technical(reason.to_string())).await;
        }
    }

    /// Tears the engine down: every live session resolves as a technical
    /// cancellation so no half-played duel ever touches a rating.
    pub async fn shutdown(self: &Arc<Self>) {
        let handles = { self.directory.lock().await.handles() };
        for handle in handles {
            self.finish_session(&handle, FinishCause::Technical(SHUTDOWN_REASON.into())).await;
        }
    }

    // -----------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------

    /// Best-effort send to one user. A dead connection runs the same path
    /// as an explicit disconnect, in the background.
    async fn deliver(self: &Arc<Self>, user: UserId, event: ServerEvent) {
        match self.registry.send(user, event).await {
            SendOutcome::Delivered | SendOutcome::Offline => {}
            SendOutcome::Dead => {
                tracing::debug!(%user, "outbound channel dead, treating as disconnect");
                let engine = Arc::clone(self);
                tokio::spawn(async move {
                    engine.handle_connection_loss(user).await;
                });
            }
        }
    }

    async fn deliver_all(self: &Arc<Self>, events: Vec<(UserId, ServerEvent)>) {
        for (user, event) in events {
            self.deliver(user, event).await;
        }
    }

    /// Delivers to both session participants, each leg independently.
    async fn broadcast(self: &Arc<Self>, players: [UserId; 2], event: ServerEvent) {
        for user in players {
            self.deliver(user, event.clone()).await;
        }
    }
}

fn error_event(message: &str) -> ServerEvent {
    ServerEvent::Error { message: message.to_string() }
}
