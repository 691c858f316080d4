//! End-to-end engine tests over plain event channels (no sockets).
//!
//! Each test wires a `GameEngine` to the in-memory collaborators, connects
//! two players through mpsc channels, and drives full duels. Tick intervals
//! are shrunk to milliseconds so a complete match fits in a test.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use quizduel_engine::memory::{MemoryMatchStore, MemoryQuizSource, MemoryRatingStore};
use quizduel_engine::{EngineConfig, GameEngine, QuizItem};
use quizduel_protocol::{
    ClientAction, FinishReason, GamePhase, QueueStatus, ServerEvent, SessionId, TaskId, UserId,
};

const A: UserId = UserId(1);
const B: UserId = UserId(2);

type TestEngine =
    GameEngine<Arc<MemoryQuizSource>, Arc<MemoryRatingStore>, Arc<MemoryMatchStore>>;

struct Harness {
    engine: Arc<TestEngine>,
    ratings: Arc<MemoryRatingStore>,
    matches: Arc<MemoryMatchStore>,
    rx_a: mpsc::UnboundedReceiver<ServerEvent>,
    rx_b: mpsc::UnboundedReceiver<ServerEvent>,
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        countdown_interval: Duration::from_millis(5),
        clock_interval: Duration::from_millis(20),
        ..EngineConfig::default()
    }
}

fn item(id: u64, answer: &str) -> QuizItem {
    QuizItem {
        id: TaskId(id),
        question: format!("question {id}"),
        options: vec![],
        kind: "input".into(),
        correct_answer: answer.into(),
    }
}

/// Tasks with answers "a1", "a2", ... "aN".
fn items(n: u64) -> Vec<QuizItem> {
    (1..=n).map(|i| item(i, &format!("a{i}"))).collect()
}

/// Builds an engine over the given tasks and connects players A and B.
async fn setup(task_list: Vec<QuizItem>) -> Harness {
    let mut source = MemoryQuizSource::new();
    for task in task_list {
        source.push(None, task);
    }
    let ratings = Arc::new(MemoryRatingStore::new());
    ratings.seed(A, 1000);
    ratings.seed(B, 1000);
    let matches = Arc::new(MemoryMatchStore::new());

    let engine = GameEngine::new(
        Arc::new(source),
        Arc::clone(&ratings),
        Arc::clone(&matches),
        fast_config(),
    );

    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    engine.connect(A, tx_a).await;
    engine.connect(B, tx_b).await;

    let mut harness = Harness { engine, ratings, matches, rx_a, rx_b };
    // Drain the welcome greetings so tests start from a clean stream.
    let welcome_a = next_event(&mut harness.rx_a).await;
    assert!(matches!(welcome_a, ServerEvent::Welcome { rating: 1000, .. }));
    let welcome_b = next_event(&mut harness.rx_b).await;
    assert!(matches!(welcome_b, ServerEvent::Welcome { rating: 1000, .. }));
    harness
}

/// Queues both players and waits until round 1 is live for both.
async fn start_open_duel(harness: &mut Harness) {
    find_match(&harness.engine, A).await;
    find_match(&harness.engine, B).await;
    wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::GameStart { .. })).await;
    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::GameStart { .. })).await;
}

async fn find_match(engine: &Arc<TestEngine>, user: UserId) {
    engine
        .handle_action(
            user,
            ClientAction::FindMatch { topic_id: None, task_count: None, match_duration: None },
        )
        .await;
}

async fn submit(engine: &Arc<TestEngine>, user: UserId, answer: &str) {
    engine
        .handle_action(user, ClientAction::SubmitAnswer { answer: answer.into() })
        .await;
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Reads events until one matches, skipping clock noise along the way.
async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<ServerEvent>,
    pred: impl Fn(&ServerEvent) -> bool,
) -> ServerEvent {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

// =========================================================================
// Matchmaking
// =========================================================================

#[tokio::test]
async fn test_find_match_pairs_and_counts_down() {
    let mut harness = setup(items(1)).await;
    find_match(&harness.engine, A).await;
    let status = next_event(&mut harness.rx_a).await;
    assert_eq!(status, ServerEvent::Status { status: QueueStatus::Searching });

    find_match(&harness.engine, B).await;

    // Countdown runs 3-2-1 for both players, then the game starts.
    for expected in [3u32, 2, 1] {
        let event = wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::Countdown { .. })).await;
        assert_eq!(event, ServerEvent::Countdown { value: expected });
    }
    let start = wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::GameStart { .. })).await;
    let ServerEvent::GameStart { task_number, total_tasks, timer, attempts_left, current_task } =
        start
    else {
        unreachable!()
    };
    assert_eq!(task_number, 1);
    assert_eq!(total_tasks, 1);
    assert_eq!(timer, 60);
    assert_eq!(attempts_left, 3);
    assert_eq!(current_task.id, TaskId(1));

    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::GameStart { .. })).await;
    assert_eq!(harness.engine.live_sessions().await, 1);
    assert_eq!(harness.matches.record(quizduel_protocol::MatchId(1)).unwrap().status(), "active");
}

#[tokio::test]
async fn test_cancel_search_goes_idle_and_is_idempotent() {
    let mut harness = setup(items(1)).await;
    find_match(&harness.engine, A).await;
    next_event(&mut harness.rx_a).await; // searching

    harness.engine.handle_action(A, ClientAction::CancelSearch).await;
    let status = next_event(&mut harness.rx_a).await;
    assert_eq!(status, ServerEvent::Status { status: QueueStatus::Idle });

    // Nothing left to cancel: no further status event, and B pairing later
    // finds an empty queue.
    harness.engine.handle_action(A, ClientAction::CancelSearch).await;
    find_match(&harness.engine, B).await;
    let status = next_event(&mut harness.rx_b).await;
    assert_eq!(status, ServerEvent::Status { status: QueueStatus::Searching });
    assert_eq!(harness.engine.live_sessions().await, 0);
}

#[tokio::test]
async fn test_insufficient_content_notifies_both_and_starts_nothing() {
    let mut harness = setup(Vec::new()).await;
    find_match(&harness.engine, A).await;
    find_match(&harness.engine, B).await;

    let err_a = wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::Error { .. })).await;
    assert_eq!(err_a, ServerEvent::Error { message: "not enough quiz tasks available".into() });
    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::Error { .. })).await;

    assert_eq!(harness.engine.live_sessions().await, 0);
    assert!(harness.matches.is_empty(), "no match record may exist for a failed start");
}

// =========================================================================
// Private rooms
// =========================================================================

#[tokio::test]
async fn test_join_room_with_wrong_code_errors_without_session() {
    let mut harness = setup(items(1)).await;
    harness
        .engine
        .handle_action(
            A,
            ClientAction::CreateRoom { topic_id: None, task_count: None, match_duration: None },
        )
        .await;
    let created = next_event(&mut harness.rx_a).await;
    let ServerEvent::RoomCreated { room_code, task_count, match_duration, .. } = created else {
        panic!("expected room_created, got {created:?}");
    };
    assert_eq!(task_count, 5);
    assert_eq!(match_duration, 60);

    // Any code other than the live one is unknown.
    let wrong_code = if room_code == "9999" { "1000" } else { "9999" };
    harness
        .engine
        .handle_action(B, ClientAction::JoinRoom { code: wrong_code.into() })
        .await;
    let err = next_event(&mut harness.rx_b).await;
    assert_eq!(err, ServerEvent::Error { message: "room not found".into() });
    assert_eq!(harness.engine.live_sessions().await, 0);
    assert!(harness.matches.is_empty());
}

#[tokio::test]
async fn test_join_room_with_right_code_starts_the_duel() {
    let mut harness = setup(items(3)).await;
    harness
        .engine
        .handle_action(
            A,
            ClientAction::CreateRoom { topic_id: None, task_count: Some(2), match_duration: None },
        )
        .await;
    let ServerEvent::RoomCreated { room_code, .. } = next_event(&mut harness.rx_a).await else {
        panic!("expected room_created");
    };

    harness.engine.handle_action(B, ClientAction::JoinRoom { code: room_code }).await;
    let start = wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::GameStart { .. })).await;
    let ServerEvent::GameStart { total_tasks, .. } = start else { unreachable!() };
    assert_eq!(total_tasks, 2, "room settings drive the session");
    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::GameStart { .. })).await;
}

// =========================================================================
// The canonical duel: 1000 vs 1000, one round
// =========================================================================

#[tokio::test]
async fn test_one_round_duel_correct_vs_exhausted() {
    let mut harness = setup(items(1)).await;
    start_open_duel(&mut harness).await;

    // A answers correctly, B burns all three attempts.
    submit(&harness.engine, A, "a1").await;
    let result = wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::AnswerResult { .. })).await;
    assert!(matches!(result, ServerEvent::AnswerResult { is_correct: true, .. }));
    let progress =
        wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::OpponentProgress { .. })).await;
    assert!(matches!(
        progress,
        ServerEvent::OpponentProgress { opponent_answered: true, opponent_score: 1 }
    ));

    submit(&harness.engine, B, "wrong one").await;
    submit(&harness.engine, B, "wrong two").await;
    submit(&harness.engine, B, "wrong three").await;
    let exhausted =
        wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::AttemptsExhausted { .. })).await;
    assert_eq!(exhausted, ServerEvent::AttemptsExhausted { correct_answer: "a1".into() });

    // Terminal event: A wins 1-0, ratings move ±16.
    let finished =
        wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::GameFinished { .. })).await;
    let ServerEvent::GameFinished { scores, rating_changes, winner_id, reason, disconnected_player_id } =
        finished
    else {
        unreachable!()
    };
    assert_eq!(scores[&A], 1);
    assert_eq!(scores[&B], 0);
    assert_eq!(rating_changes[&A], 16);
    assert_eq!(rating_changes[&B], -16);
    assert_eq!(winner_id, Some(A));
    assert_eq!(reason, FinishReason::AllTasksCompleted);
    assert_eq!(disconnected_player_id, None);
    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::GameFinished { .. })).await;

    // Collaterals: ratings written once, record finalized exactly once.
    assert_eq!(harness.ratings.get(A), Some(1016));
    assert_eq!(harness.ratings.get(B), Some(984));
    let record = harness.matches.record(quizduel_protocol::MatchId(1)).unwrap();
    assert_eq!(record.status(), "finished");
    assert_eq!(record.finalize_calls, 1);
    let result = record.result.unwrap();
    assert_eq!((result.score1, result.score2), (1, 0));
    assert_eq!(result.rating1_after, 1016);
    assert_eq!(harness.engine.live_sessions().await, 0);
}

#[tokio::test]
async fn test_round_gate_synchronizes_next_task_across_players() {
    let mut harness = setup(items(2)).await;
    start_open_duel(&mut harness).await;

    submit(&harness.engine, A, "a1").await;
    wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::AnswerResult { .. })).await;

    // A is done with round 1; a second submission is redundant.
    submit(&harness.engine, A, "a1").await;
    let rejection = wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::Error { .. })).await;
    assert_eq!(
        rejection,
        ServerEvent::Error { message: "answer already accepted for this round".into() }
    );

    // Only once B accepts does anyone see round 2.
    submit(&harness.engine, B, "a1").await;
    let next_a = wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::NextTask { .. })).await;
    let ServerEvent::NextTask { task_number, attempts_left, .. } = next_a else { unreachable!() };
    assert_eq!(task_number, 2);
    assert_eq!(attempts_left, 3, "attempt budget resets with the round");
    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::NextTask { .. })).await;
}

// =========================================================================
// Forfeits
// =========================================================================

#[tokio::test]
async fn test_disconnect_forfeits_to_the_remaining_player() {
    let mut harness = setup(items(5)).await;
    start_open_duel(&mut harness).await;

    // B is losing 0-1 but A disconnects: B still wins.
    submit(&harness.engine, A, "a1").await;
    harness.engine.disconnect(A, None).await;

    let finished =
        wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::GameFinished { .. })).await;
    let ServerEvent::GameFinished { winner_id, reason, disconnected_player_id, scores, .. } =
        finished
    else {
        unreachable!()
    };
    assert_eq!(winner_id, Some(B));
    assert_eq!(reason, FinishReason::PlayerLeft);
    assert_eq!(disconnected_player_id, Some(A));
    assert_eq!(scores[&A], 1, "scores report the state at forfeit time");

    assert_eq!(harness.ratings.get(B), Some(1016));
    assert_eq!(harness.ratings.get(A), Some(984));
    assert_eq!(harness.engine.live_sessions().await, 0);
}

#[tokio::test]
async fn test_duplicate_disconnect_finalizes_once() {
    let mut harness = setup(items(5)).await;
    start_open_duel(&mut harness).await;

    harness.engine.disconnect(A, None).await;
    harness.engine.disconnect(A, None).await;
    harness.engine.handle_action(A, ClientAction::LeaveGame).await;

    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::GameFinished { .. })).await;
    // Give any duplicate path a moment to (incorrectly) fire.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let record = harness.matches.record(quizduel_protocol::MatchId(1)).unwrap();
    assert_eq!(record.finalize_calls, 1, "exactly one persisted finalization");
    let mut finished_events = 0;
    while let Ok(event) = harness.rx_b.try_recv() {
        if matches!(event, ServerEvent::GameFinished { .. }) {
            finished_events += 1;
        }
    }
    assert_eq!(finished_events, 0, "exactly one game_finished per player");
}

#[tokio::test]
async fn test_leave_game_is_a_forfeit() {
    let mut harness = setup(items(5)).await;
    start_open_duel(&mut harness).await;

    harness.engine.handle_action(B, ClientAction::LeaveGame).await;
    let finished =
        wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::GameFinished { .. })).await;
    let ServerEvent::GameFinished { winner_id, disconnected_player_id, .. } = finished else {
        unreachable!()
    };
    assert_eq!(winner_id, Some(A));
    assert_eq!(disconnected_player_id, Some(B));
}

// =========================================================================
// Reconnection
// =========================================================================

#[tokio::test]
async fn test_reconnect_replays_session_snapshot() {
    let mut harness = setup(items(3)).await;
    start_open_duel(&mut harness).await;
    submit(&harness.engine, A, "a1").await;
    submit(&harness.engine, B, "a1").await; // both advance to round 2
    wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::NextTask { .. })).await;

    // A reconnects on a fresh channel: no welcome, no countdown restart,
    // just the live snapshot.
    let (tx, mut rx) = mpsc::unbounded_channel();
    harness.engine.connect(A, tx).await;
    let restored = next_event(&mut rx).await;
    let ServerEvent::GameRestore {
        status, task_number, total_tasks, opponent_score, scores, ..
    } = restored
    else {
        panic!("expected game_restore, got {restored:?}");
    };
    assert_eq!(status, GamePhase::Playing);
    assert_eq!(task_number, 2);
    assert_eq!(total_tasks, 3);
    assert_eq!(opponent_score, 1);
    assert_eq!(scores[&A], 1);

    // The replaced connection's channel drains whatever was buffered and
    // then closes, ending the old writer.
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while harness.rx_a.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "old channel must close after replacement");
}

#[tokio::test]
async fn test_fresh_connect_without_session_gets_welcome() {
    let harness = setup(items(1)).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    harness.engine.connect(UserId(42), tx).await;
    let welcome = next_event(&mut rx).await;
    assert_eq!(welcome, ServerEvent::Welcome { user_id: UserId(42), rating: 1000 });
}

// =========================================================================
// Technical cancellation and clock expiry
// =========================================================================

#[tokio::test]
async fn test_cancel_session_keeps_ratings_untouched() {
    let mut harness = setup(items(5)).await;
    start_open_duel(&mut harness).await;
    submit(&harness.engine, A, "a1").await;

    harness.engine.cancel_session(SessionId(1), "server_error").await;
    let cancelled =
        wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::GameCancelled { .. })).await;
    assert_eq!(cancelled, ServerEvent::GameCancelled { reason: "server_error".into() });
    wait_for(&mut harness.rx_b, |e| matches!(e, ServerEvent::GameCancelled { .. })).await;

    assert_eq!(harness.ratings.get(A), Some(1000), "cancellation must not move ratings");
    assert_eq!(harness.ratings.get(B), Some(1000));
    let record = harness.matches.record(quizduel_protocol::MatchId(1)).unwrap();
    assert_eq!(record.status(), "cancelled");
    assert_eq!(record.cancel_reason.as_deref(), Some("server_error"));
    assert_eq!(record.finalize_calls, 0);
    assert_eq!(harness.engine.live_sessions().await, 0);

    // Cancelling again finds no session; nothing changes.
    harness.engine.cancel_session(SessionId(1), "server_error").await;
    assert_eq!(harness.matches.record(quizduel_protocol::MatchId(1)).unwrap().finalize_calls, 0);
}

#[tokio::test]
async fn test_match_clock_expiry_ends_in_draw() {
    let mut harness = setup(items(5)).await;
    start_open_duel(&mut harness).await;

    // Nobody answers; 60 logical seconds elapse at test speed.
    let finished =
        wait_for(&mut harness.rx_a, |e| matches!(e, ServerEvent::GameFinished { .. })).await;
    let ServerEvent::GameFinished { reason, winner_id, rating_changes, .. } = finished else {
        unreachable!()
    };
    assert_eq!(reason, FinishReason::TimeOver);
    assert_eq!(winner_id, None, "0-0 at the clock is a draw");
    assert_eq!(rating_changes[&A], 0);
    assert_eq!(rating_changes[&B], 0);
}

#[tokio::test]
async fn test_find_match_during_duel_is_rejected() {
    let mut harness = setup(items(5)).await;
    start_open_duel(&mut harness).await;

    find_match(&harness.engine, A).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(harness.engine.live_sessions().await, 1, "no second session may appear");
    assert_eq!(harness.matches.len(), 1);
}
