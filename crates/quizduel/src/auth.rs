//! Identity hook: token in, user id out.
//!
//! The duel server never validates credentials itself. Clients present a
//! token in the connection URI (`/ws?token=...`); the [`Authenticator`]
//! turns it into a [`UserId`] or rejects it, and everything downstream only
//! ever sees the id.

use std::future::Future;

use quizduel_protocol::UserId;

/// The token was missing, malformed, expired, or rejected.
#[derive(Debug, thiserror::Error)]
#[error("authentication failed: {0}")]
pub struct AuthError(pub String);

/// Validates a client's auth token and returns their identity.
///
/// The future is explicitly `Send` because connection handlers run on the
/// multi-threaded runtime.
///
/// # Example
///
/// ```rust
/// use quizduel::{AuthError, Authenticator};
/// use quizduel_protocol::UserId;
///
/// /// Accepts any numeric token as the user id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
///         let id: u64 = token
///             .parse()
///             .map_err(|_| AuthError("token must be a number".into()))?;
///         Ok(UserId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the player's identity.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserId, AuthError>> + Send;
}
