//! Per-connection dispatcher: authenticate, register, then route frames.
//!
//! Each accepted connection gets its own task running this handler:
//!
//!   1. Validate the URI token → `UserId`
//!   2. Register with the engine (welcome or live-session restore)
//!   3. Writer task pumps the user's event channel into the socket
//!   4. Read loop decodes one `ClientAction` per frame and routes it;
//!      malformed frames are dropped with a log, nothing else changes
//!
//! The engine hands out a registration epoch at connect time. The read loop
//! reports its disconnect with that epoch, so a handler that was superseded
//! by a reconnect cannot forfeit the player's new connection.

use std::sync::Arc;

use quizduel_engine::{MatchStore, QuizSource, RatingStore};
use quizduel_protocol::{ClientAction, Codec, ServerEvent};
use quizduel_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::QuizduelError;
use crate::auth::{AuthError, Authenticator};
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<Q, R, M, A>(
    conn: WebSocketConnection,
    state: Arc<ServerState<Q, R, M, A>>,
) -> Result<(), QuizduelError>
where
    Q: QuizSource,
    R: RatingStore,
    M: MatchStore,
    A: Authenticator,
{
    let conn_id = conn.id();

    let Some(token) = conn.token() else {
        tracing::debug!(%conn_id, "connection without token rejected");
        let _ = conn.close().await;
        return Err(AuthError("token required".into()).into());
    };

    let user = match state.auth.authenticate(token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "authentication failed");
            send_error(&conn, &state.codec, "unauthorized").await;
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    tracing::info!(%conn_id, %user, "player authenticated");

    let conn = Arc::new(conn);
    let (sender, mut outbound) = mpsc::unbounded_channel();
    let epoch = state.engine.connect(user, sender).await;

    // Writer: drains the registry's channel into the socket. Ends when the
    // channel closes (unregister or reconnect replacement) or the socket
    // rejects a send.
    let writer_conn = Arc::clone(&conn);
    let codec = state.codec;
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let bytes = match codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "outbound event encode failed");
                    continue;
                }
            };
            if writer_conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });

    // Reader: one decoded action per frame.
    loop {
        match conn.recv().await {
            Ok(Some(frame)) => match state.codec.decode::<ClientAction>(&frame) {
                Ok(action) => state.engine.handle_action(user, action).await,
                Err(e) => {
                    tracing::debug!(%user, error = %e, "malformed frame dropped");
                }
            },
            Ok(None) => {
                tracing::info!(%user, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%user, error = %e, "receive failed");
                break;
            }
        }
    }

    state.engine.disconnect(user, Some(epoch)).await;
    writer.abort();
    let _ = conn.close().await;
    Ok(())
}

/// Sends one `error` event directly, outside the registry (used before the
/// user is registered).
async fn send_error(conn: &WebSocketConnection, codec: &quizduel_protocol::JsonCodec, message: &str) {
    let event = ServerEvent::Error { message: message.to_string() };
    if let Ok(bytes) = codec.encode(&event) {
        let _ = conn.send(&bytes).await;
    }
}
