//! `QuizServer` builder and accept loop.
//!
//! The entry point for running a duel server. It ties the layers together:
//! transport → protocol → engine.

use std::sync::Arc;

use quizduel_engine::{EngineConfig, GameEngine, MatchStore, QuizSource, RatingStore};
use quizduel_protocol::JsonCodec;
use quizduel_transport::{Transport, WebSocketTransport};

use crate::QuizduelError;
use crate::auth::Authenticator;
use crate::dispatcher::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<Q, R, M, A> {
    pub(crate) engine: Arc<GameEngine<Q, R, M>>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a duel server.
///
/// # Example
///
/// ```rust,ignore
/// let server = QuizServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(my_auth, my_content, my_ratings, my_matches)
///     .await?;
/// server.run().await
/// ```
pub struct QuizServerBuilder {
    bind_addr: String,
    engine_config: EngineConfig,
}

impl QuizServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            engine_config: EngineConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the engine configuration (attempt cap, defaults, tick rates).
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Builds the server with the given authenticator and collaborators.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`, which is what the web
    /// client speaks.
    pub async fn build<Q, R, M, A>(
        self,
        auth: A,
        content: Q,
        ratings: R,
        matches: M,
    ) -> Result<QuizServer<Q, R, M, A>, QuizduelError>
    where
        Q: QuizSource,
        R: RatingStore,
        M: MatchStore,
        A: Authenticator,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let engine = GameEngine::new(content, ratings, matches, self.engine_config);
        let state = Arc::new(ServerState { engine, auth, codec: JsonCodec });
        Ok(QuizServer { transport, state })
    }
}

impl Default for QuizServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running duel server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuizServer<Q, R, M, A> {
    transport: WebSocketTransport,
    state: Arc<ServerState<Q, R, M, A>>,
}

impl<Q, R, M, A> QuizServer<Q, R, M, A>
where
    Q: QuizSource,
    R: RatingStore,
    M: MatchStore,
    A: Authenticator,
{
    /// Creates a new builder.
    pub fn builder() -> QuizServerBuilder {
        QuizServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the engine, e.g. for [`GameEngine::shutdown`] on exit.
    pub fn engine(&self) -> Arc<GameEngine<Q, R, M>> {
        Arc::clone(&self.state.engine)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a dispatcher task for each;
    /// runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), QuizduelError> {
        tracing::info!("Quizduel server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
