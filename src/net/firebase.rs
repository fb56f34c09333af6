//! Firebase Auth REST implementation of [`IdentityProvider`].
//!
//! DESIGN
//! ======
//! The signed-in account (ID token, refresh token, expiry) lives only in
//! process memory. Identity changes are broadcast on a `watch` channel so the
//! session manager sees the latest state without polling.

#[cfg(test)]
#[path = "firebase_test.rs"]
mod firebase_test;

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use super::identity::{Identity, IdentityProvider};
use crate::config::{FirebaseConfig, HttpTimeouts};
use crate::error::AuthError;

/// ID tokens are refreshed once they are this close to expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

// =============================================================================
// FAILURES
// =============================================================================

/// Raw provider failure before it is mapped to an [`AuthError`] variant.
#[derive(Debug, PartialEq, Eq)]
enum ProviderFailure {
    /// Provider answered with an error code such as `INVALID_PASSWORD`.
    Rejected(String),
    Transport(String),
}

impl ProviderFailure {
    fn into_message(self) -> String {
        match self {
            Self::Rejected(m) | Self::Transport(m) => m,
        }
    }
}

/// Provider error codes that mean "wrong email or password".
fn is_credential_rejection(code: &str) -> bool {
    let code = code.split([' ', ':']).next().unwrap_or(code);
    matches!(
        code,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" | "USER_DISABLED"
    )
}

fn sign_in_error(failure: ProviderFailure) -> AuthError {
    match failure {
        ProviderFailure::Rejected(code) if is_credential_rejection(&code) => AuthError::InvalidCredentials,
        ProviderFailure::Rejected(code) => AuthError::Transport(code),
        ProviderFailure::Transport(m) => AuthError::Transport(m),
    }
}

fn parse_provider_error(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body).map_or_else(|_| body.trim().to_owned(), |e| e.error.message)
}

fn parse_expires_in(raw: Option<&str>) -> Duration {
    Duration::from_secs(
        raw.and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
    )
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    id_token: String,
    refresh_token: String,
    expires_at: Instant,
}

impl Account {
    fn token_is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now + TOKEN_REFRESH_MARGIN
    }
}

pub struct FirebaseIdentity {
    http: reqwest::Client,
    config: FirebaseConfig,
    account: Mutex<Option<Account>>,
    tx: watch::Sender<Option<Identity>>,
}

impl FirebaseIdentity {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: FirebaseConfig, timeouts: HttpTimeouts) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let (tx, _rx) = watch::channel(None);
        Ok(Self { http, config, account: Mutex::new(None), tx })
    }

    fn accounts_url(&self, action: &str) -> String {
        format!("{}/accounts:{action}?key={}", self.config.identity_url, self.config.api_key)
    }

    fn token_url(&self) -> String {
        format!("{}/token?key={}", self.config.token_url, self.config.api_key)
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: &impl Serialize) -> Result<T, ProviderFailure> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderFailure::Rejected(parse_provider_error(&text)));
        }
        serde_json::from_str(&text).map_err(|e| ProviderFailure::Transport(format!("unexpected response: {e}")))
    }

    async fn lookup(&self, id_token: &str) -> Result<LookupUser, ProviderFailure> {
        let response: LookupResponse = self
            .post(&self.accounts_url("lookup"), &serde_json::json!({ "idToken": id_token }))
            .await?;
        response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| ProviderFailure::Transport("lookup returned no user".to_owned()))
    }

    async fn store(&self, account: Account) {
        let identity = account.identity.clone();
        *self.account.lock().await = Some(account);
        self.tx.send_replace(Some(identity));
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = PasswordRequest { email, password, return_secure_token: true };
        let signed: SignInResponse = self
            .post(&self.accounts_url("signInWithPassword"), &body)
            .await
            .map_err(sign_in_error)?;
        let user = self
            .lookup(&signed.id_token)
            .await
            .map_err(sign_in_error)?;
        let identity = Identity {
            uid: user.local_id,
            email: user.email.or(signed.email),
            email_verified: user.email_verified,
        };
        info!(uid = %identity.uid, verified = identity.email_verified, "identity signed in");
        self.store(Account {
            identity: identity.clone(),
            id_token: signed.id_token,
            refresh_token: signed.refresh_token,
            expires_at: Instant::now() + parse_expires_in(signed.expires_in.as_deref()),
        })
        .await;
        Ok(identity)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = PasswordRequest { email, password, return_secure_token: true };
        let created: SignInResponse = self
            .post(&self.accounts_url("signUp"), &body)
            .await
            .map_err(|f| AuthError::Registration(f.into_message()))?;
        let identity = Identity {
            uid: created.local_id,
            email: created.email.or_else(|| Some(email.to_owned())),
            email_verified: false,
        };
        info!(uid = %identity.uid, "account created");
        self.store(Account {
            identity: identity.clone(),
            id_token: created.id_token,
            refresh_token: created.refresh_token,
            expires_at: Instant::now() + parse_expires_in(created.expires_in.as_deref()),
        })
        .await;
        Ok(identity)
    }

    async fn send_email_verification(&self, identity: &Identity) -> Result<(), AuthError> {
        let id_token = {
            let guard = self.account.lock().await;
            match guard.as_ref() {
                Some(account) if account.identity.uid == identity.uid => account.id_token.clone(),
                _ => return Err(AuthError::Registration("account is not signed in".to_owned())),
            }
        };
        let body = OobRequest { request_type: "VERIFY_EMAIL", id_token: Some(&id_token), email: None };
        let _: serde_json::Value = self
            .post(&self.accounts_url("sendOobCode"), &body)
            .await
            .map_err(|f| AuthError::Registration(f.into_message()))?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let body = OobRequest { request_type: "PASSWORD_RESET", id_token: None, email: Some(email) };
        let _: serde_json::Value = self
            .post(&self.accounts_url("sendOobCode"), &body)
            .await
            .map_err(|f| AuthError::PasswordReset(f.into_message()))?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.account.lock().await.take();
        self.tx.send_replace(None);
        debug!("identity signed out");
        Ok(())
    }

    async fn fresh_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let mut guard = self.account.lock().await;
        let Some(account) = guard.as_mut().filter(|a| a.identity.uid == identity.uid) else {
            return Err(AuthError::Token("identity is not signed in".to_owned()));
        };
        if account.token_is_fresh(Instant::now()) {
            return Ok(account.id_token.clone());
        }

        let body = serde_json::json!({ "grant_type": "refresh_token", "refresh_token": account.refresh_token });
        let refreshed: RefreshResponse = self
            .post(&self.token_url(), &body)
            .await
            .map_err(|f| AuthError::Token(f.into_message()))?;
        account.id_token = refreshed.id_token;
        account.refresh_token = refreshed.refresh_token;
        account.expires_at = Instant::now() + parse_expires_in(refreshed.expires_in.as_deref());
        debug!(uid = %identity.uid, "id token refreshed");
        Ok(account.id_token.clone())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}
