//! A runnable duel server on in-memory collaborators.
//!
//! Connect with any WebSocket client:
//!
//! ```text
//! ws://127.0.0.1:8080/ws?token=<numeric user id>
//! {"action":"find_match"}
//! {"action":"submit_answer","answer":"4"}
//! ```
//!
//! Tokens are numeric user ids (development only); questions come from a
//! small built-in set. `RUST_LOG=quizduel_engine=debug` shows the engine's
//! decisions.

use quizduel::prelude::*;
use quizduel_engine::memory::{MemoryMatchStore, MemoryQuizSource, MemoryRatingStore};
use tracing_subscriber::EnvFilter;

/// Accepts any numeric token as the user id.
struct TokenAuth;

impl Authenticator for TokenAuth {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let id: u64 = token
            .parse()
            .map_err(|_| AuthError("token must be a number".into()))?;
        Ok(UserId(id))
    }
}

fn question_bank() -> MemoryQuizSource {
    let mut source = MemoryQuizSource::new();
    let questions: [(&str, &[&str], &str); 6] = [
        ("2 + 2 = ?", &[], "4"),
        ("7 × 8 = ?", &[], "56"),
        ("Half of 6.28, to two decimals?", &[], "3.14"),
        ("Capital of France?", &["Paris", "Lyon", "Marseille"], "Paris"),
        ("Largest planet in the solar system?", &["Mars", "Jupiter", "Saturn"], "Jupiter"),
        ("H2O is the formula of?", &[], "water"),
    ];
    for (i, (question, options, answer)) in questions.into_iter().enumerate() {
        let kind = if options.is_empty() { "input" } else { "choice" };
        source.push(
            None,
            QuizItem {
                id: TaskId(i as u64 + 1),
                question: question.to_string(),
                options: options.iter().map(|s| s.to_string()).collect(),
                kind: kind.to_string(),
                correct_answer: answer.to_string(),
            },
        );
    }
    source
}

#[tokio::main]
async fn main() -> Result<(), QuizduelError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr = std::env::var("QUIZDUEL_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let server = QuizServerBuilder::new()
        .bind(&addr)
        .build(
            TokenAuth,
            question_bank(),
            MemoryRatingStore::new(),
            MemoryMatchStore::new(),
        )
        .await?;
    let engine = server.engine();

    tracing::info!(addr, "duel server ready");
    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            // Resolve every live duel as a technical cancellation so no
            // half-played match touches a rating.
            tracing::info!("shutting down, cancelling live duels");
            engine.shutdown().await;
            Ok(())
        }
    }
}
