//! Session lifecycle: identity changes in, bearer-token session out.
//!
//! DESIGN
//! ======
//! `SessionContext` is the single slot holding the current session. It is a
//! `watch` channel so components can both read the latest value and await
//! changes. Every publication that actually changes the slot bumps the
//! session epoch; components compare the epoch captured at request start with
//! the current one to decide whether a response still belongs to this session.
//!
//! `SessionManager` is the only writer. It listens to the identity provider
//! for the application lifetime and turns each change into a publication:
//! verified identity -> `{identity, token}`, anything else -> `None`.
//!
//! ERROR HANDLING
//! ==============
//! Operator-initiated flows (login, register, reset) never panic. Each one
//! sets the auth banner and returns the error so callers can also react.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ui::Notice;
use crate::error::{AuthError, ConsoleError, ErrorCode, RequestError, ValidationError};
use crate::net::identity::{Identity, IdentityProvider};

pub const UNVERIFIED_EMAIL_BANNER: &str = "Please verify your email before logging in.";
pub const INVALID_CREDENTIALS_BANNER: &str = "Error: Invalid credentials.";
pub const REGISTERED_BANNER: &str = "Account created! Please check your email.";
pub const RESET_EMAIL_REQUIRED_BANNER: &str = "Enter your email to reset password.";
pub const RESET_SENT_BANNER: &str = "Reset link sent to your email.";

// =============================================================================
// SESSION CONTEXT
// =============================================================================

/// An authenticated, email-verified user and the bearer token minted for them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub token: String,
}

#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    /// Bumped on every publication that changed the slot.
    pub epoch: u64,
}

/// Token plus the epoch it was issued under, captured at request start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTicket {
    pub token: String,
    pub epoch: u64,
}

#[derive(Clone)]
pub struct SessionContext {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Capture the current token for a request.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::NoSession` when nobody is signed in.
    pub fn ticket(&self) -> Result<SessionTicket, RequestError> {
        let snapshot = self.tx.borrow();
        snapshot
            .session
            .as_ref()
            .map(|s| SessionTicket { token: s.token.clone(), epoch: snapshot.epoch })
            .ok_or(RequestError::NoSession)
    }

    /// Whether a response issued under `ticket` may still be applied.
    #[must_use]
    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        let snapshot = self.tx.borrow();
        snapshot.session.is_some() && snapshot.epoch == ticket.epoch
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.tx.borrow().session.clone()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Wait up to `timeout` for a session to be published.
    pub async fn wait_for_session(&self, timeout: Duration) -> Option<Session> {
        let mut rx = self.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|s| s.session.is_some())).await {
            Ok(Ok(snapshot)) => snapshot.session.clone(),
            _ => None,
        }
    }

    /// Replace the session. Publishing `None` over `None` is a no-op and does
    /// not bump the epoch. Returns whether anything changed.
    pub(crate) fn publish(&self, session: Option<Session>) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.session.is_none() && session.is_none() {
                return false;
            }
            snapshot.session = session;
            snapshot.epoch += 1;
            true
        })
    }
}

// =============================================================================
// AUTH VIEW
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Login,
    Register,
    Forgot,
}

/// What the sign-in screen shows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuthView {
    pub mode: AuthMode,
    pub banner: Option<Notice>,
    pub busy: bool,
}

#[derive(Default)]
struct AuthState {
    view: AuthView,
    /// Email of a registration between account creation and sign-out.
    registering: Option<String>,
    /// Account created by the last `register`; its unverified sign-in event
    /// is torn down without the verification banner.
    registered_uid: Option<String>,
}

impl AuthState {
    /// Whether an unverified sign-in is the account `register` is creating or
    /// has just created.
    fn is_own_registration(&self, identity: &Identity) -> bool {
        let pending = self.registering.as_deref().is_some_and(|email| {
            identity
                .email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        });
        pending || self.registered_uid.as_deref() == Some(identity.uid.as_str())
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle to the identity listener. Dropping it stops the listener.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

#[derive(Clone)]
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    context: SessionContext,
    state: Arc<RwLock<AuthState>>,
}

impl SessionManager {
    pub fn new(identity: Arc<dyn IdentityProvider>, context: SessionContext) -> Self {
        Self { identity, context, state: Arc::new(RwLock::new(AuthState::default())) }
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn view(&self) -> AuthView {
        self.state.read().await.view.clone()
    }

    /// Switch the sign-in screen mode and clear the banner.
    pub async fn set_mode(&self, mode: AuthMode) {
        let mut state = self.state.write().await;
        state.view.mode = mode;
        state.view.banner = None;
    }

    async fn set_banner(&self, notice: Notice) {
        self.state.write().await.view.banner = Some(notice);
    }

    async fn set_busy(&self, busy: bool) {
        self.state.write().await.view.busy = busy;
    }

    /// Listen to the identity provider until the returned handle is dropped.
    /// The current identity is handled immediately.
    #[must_use]
    pub fn start(&self) -> Subscription {
        let mut rx = self.identity.subscribe();
        let manager = self.clone();
        let task = tokio::spawn(async move {
            loop {
                let current = rx.borrow_and_update().clone();
                manager.handle_identity_change(current).await;
                if rx.changed().await.is_err() {
                    debug!("identity channel closed");
                    break;
                }
            }
        });
        Subscription { task }
    }

    /// Turn one identity-provider state into a session publication.
    pub async fn handle_identity_change(&self, identity: Option<Identity>) {
        let Some(identity) = identity else {
            if self.context.publish(None) {
                info!("session cleared");
            }
            return;
        };

        if !identity.email_verified {
            let quiet = {
                let state = self.state.read().await;
                state.is_own_registration(&identity)
            };
            self.context.publish(None);
            if quiet {
                debug!(uid = %identity.uid, "ignoring sign-in of freshly registered account");
                return;
            }
            if let Err(e) = self.identity.sign_out().await {
                warn!(code = e.error_code(), error = %e, "sign-out of unverified identity failed");
            }
            self.set_banner(Notice::error(UNVERIFIED_EMAIL_BANNER))
                .await;
            info!(uid = %identity.uid, "rejected unverified identity");
            return;
        }

        match self.identity.fresh_token(&identity).await {
            Ok(token) => {
                let uid = identity.uid.clone();
                if self.context.publish(Some(Session { identity, token })) {
                    info!(%uid, epoch = self.context.epoch(), "session established");
                }
            }
            Err(e) => {
                warn!(uid = %identity.uid, code = e.error_code(), error = %e, "token fetch failed");
                self.context.publish(None);
                self.set_banner(Notice::error(format!("Error: {}", e.message())))
                    .await;
            }
        }
    }

    /// Sign in with email and password. The session itself is published by
    /// the identity listener once the provider reports the sign-in.
    ///
    /// # Errors
    ///
    /// Validation errors for blank input, `AuthError::InvalidCredentials` on a
    /// rejected pair, `AuthError::EmailNotVerified` for unconfirmed accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ConsoleError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingEmail.into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingPassword.into());
        }
        {
            let mut state = self.state.write().await;
            state.view.banner = None;
            state.view.busy = true;
            state.registered_uid = None;
        }
        let result = self.identity.sign_in(email, password).await;
        self.set_busy(false).await;

        let identity = match result {
            Ok(identity) => identity,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "sign-in failed");
                self.set_banner(Notice::error(INVALID_CREDENTIALS_BANNER))
                    .await;
                return Err(e.into());
            }
        };
        if !identity.email_verified {
            if let Err(e) = self.identity.sign_out().await {
                warn!(code = e.error_code(), error = %e, "sign-out of unverified identity failed");
            }
            self.context.publish(None);
            self.set_banner(Notice::error(UNVERIFIED_EMAIL_BANNER))
                .await;
            return Err(AuthError::EmailNotVerified.into());
        }
        Ok(identity)
    }

    /// Create an account, send the verification email, and sign straight back
    /// out. Never leaves an active session behind.
    ///
    /// # Errors
    ///
    /// Validation errors for blank input, `AuthError::Registration` otherwise.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ConsoleError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingEmail.into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingPassword.into());
        }
        {
            let mut state = self.state.write().await;
            state.view.banner = None;
            state.view.busy = true;
            state.registering = Some(email.to_owned());
            state.registered_uid = None;
        }

        let result = self.create_and_verify(email, password).await;
        if let Err(e) = self.identity.sign_out().await {
            warn!(code = e.error_code(), error = %e, "sign-out after registration failed");
        }
        self.context.publish(None);

        let mut state = self.state.write().await;
        state.registering = None;
        state.view.busy = false;
        match result {
            Ok(uid) => {
                info!(%uid, "account registered");
                state.registered_uid = Some(uid);
                state.view.mode = AuthMode::Login;
                state.view.banner = Some(Notice::success(REGISTERED_BANNER));
                Ok(())
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "registration failed");
                state.view.banner = Some(Notice::error(format!("Registration error: {}", e.message())));
                Err(e.into())
            }
        }
    }

    async fn create_and_verify(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let identity = self
            .identity
            .create_account(email, password)
            .await?;
        self.identity
            .send_email_verification(&identity)
            .await?;
        Ok(identity.uid)
    }

    /// Send a password-reset email.
    ///
    /// # Errors
    ///
    /// `ValidationError::MissingEmail` for a blank address (the provider is
    /// not called), `AuthError::PasswordReset` when the provider refuses.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ConsoleError> {
        let email = email.trim();
        if email.is_empty() {
            self.set_banner(Notice::error(RESET_EMAIL_REQUIRED_BANNER))
                .await;
            return Err(ValidationError::MissingEmail.into());
        }
        self.set_busy(true).await;
        let result = self.identity.send_password_reset(email).await;

        let mut state = self.state.write().await;
        state.view.busy = false;
        match result {
            Ok(()) => {
                info!("password reset email requested");
                state.view.mode = AuthMode::Login;
                state.view.banner = Some(Notice::success(RESET_SENT_BANNER));
                Ok(())
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "password reset failed");
                state.view.banner = Some(Notice::error(format!("Error: {}", e.message())));
                Err(e.into())
            }
        }
    }

    /// Sign out and clear the session immediately, without waiting for the
    /// provider's change event.
    pub async fn logout(&self) {
        if let Err(e) = self.identity.sign_out().await {
            warn!(code = e.error_code(), error = %e, "provider sign-out failed");
        }
        self.handle_identity_change(None).await;
    }
}
