//! Identity-provider boundary.
//!
//! SYSTEM CONTEXT
//! ==============
//! The provider owns credentials, email verification, and bearer-token
//! minting. The console only consumes it: the session manager drives the
//! calls below and listens on `subscribe()` for sign-in/sign-out changes.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::AuthError;

/// The signed-in user as reported by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned user id.
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

/// Provider-neutral async trait for authentication. Enables mocking in tests.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password. On success the provider also
    /// publishes the identity on its subscription channel.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Create an account. Providers sign the new account in as a side effect.
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn send_email_verification(&self, identity: &Identity) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Sign out and publish `None`.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Return a bearer token for `identity`, refreshing it if near expiry.
    async fn fresh_token(&self, identity: &Identity) -> Result<String, AuthError>;

    /// Current identity plus every later change.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}
