//! In-memory doubles for the backend and identity provider.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};

use super::Confirm;
use super::session::{Session, SessionContext};
use crate::error::{AuthError, RequestError};
use crate::net::api::BackendApi;
use crate::net::identity::{Identity, IdentityProvider};
use crate::net::types::{
    AdminLogEntry, AdminStats, ExportFormat, Finding, FindingStatus, HUMINT_SOURCE_ID, ManualEntry, NewSource, RecordId,
    RiskLevel, Source,
};

// =========================================================================
// Fixtures
// =========================================================================

#[must_use]
pub fn finding(id: &str, risk_level: RiskLevel, status: FindingStatus) -> Finding {
    Finding {
        id: RecordId::from(id),
        title: format!("finding {id}"),
        content: "<p>body</p>".into(),
        url: format!("https://example.com/{id}"),
        risk_level,
        status,
        sentiment: 0.0,
        published_date: None,
        source_id: None,
    }
}

#[must_use]
pub fn source(id: &str, name: &str, url: &str) -> Source {
    Source {
        id: RecordId::from(id),
        name: name.into(),
        url: url.into(),
        category: "news".into(),
        kind: crate::net::types::SourceKind::Rss,
    }
}

#[must_use]
pub fn verified(uid: &str) -> Identity {
    Identity { uid: uid.into(), email: Some(format!("{uid}@example.com")), email_verified: true }
}

/// A context with a session already published under `token`.
#[must_use]
pub fn signed_in_context(token: &str) -> SessionContext {
    let context = SessionContext::new();
    context.publish(Some(Session { identity: verified("analyst"), token: token.into() }));
    context
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =========================================================================
// Confirm doubles
// =========================================================================

pub struct Accept;

impl Confirm for Accept {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

pub struct Reject;

impl Confirm for Reject {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Records every prompt and answers with a fixed choice.
pub struct RecordingConfirm {
    answer: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingConfirm {
    #[must_use]
    pub fn new(answer: bool) -> Self {
        Self { answer, prompts: Mutex::new(Vec::new()) }
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Confirm for RecordingConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        self.answer
    }
}

// =========================================================================
// MockBackend
// =========================================================================

#[derive(Default)]
pub struct MockBackendState {
    pub findings: Vec<Finding>,
    pub sources: Vec<Source>,
    pub logs: Vec<AdminLogEntry>,
    pub stats: AdminStats,
    pub report: Vec<u8>,
    /// `"METHOD /path"` for every call, in order.
    pub calls: Vec<String>,
    /// Bearer token of every call, in order.
    pub tokens: Vec<String>,
    /// Operations (as in `calls`, without ids) that answer with a 500.
    pub failing: HashSet<&'static str>,
    pub fail_detail: Option<String>,
    /// Operations whose next call waits for the paired sender before
    /// answering. The call is recorded and applied before the wait.
    pub gates: HashMap<&'static str, oneshot::Receiver<()>>,
    next_id: u64,
}

#[derive(Default)]
pub struct MockBackend {
    pub state: Mutex<MockBackendState>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn with_findings(findings: Vec<Finding>) -> Arc<Self> {
        let backend = Self::default();
        backend.state.lock().unwrap().findings = findings;
        Arc::new(backend)
    }

    pub fn fail(&self, op: &'static str, detail: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.failing.insert(op);
        state.fail_detail = detail.map(ToOwned::to_owned);
    }

    pub fn recover(&self, op: &'static str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    /// Hold the next call of `op` until the returned sender fires.
    #[must_use]
    pub fn gate(&self, op: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().gates.insert(op, rx);
        tx
    }

    /// Hold the next findings listing until the returned sender fires.
    #[must_use]
    pub fn gate_list(&self) -> oneshot::Sender<()> {
        self.gate("GET /findings")
    }

    async fn hold(&self, op: &str) {
        let gate = self.state.lock().unwrap().gates.remove(op);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    #[must_use]
    pub fn count(&self, call: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == call)
            .count()
    }

    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    fn record(&self, state: &mut MockBackendState, token: &str, call: String, op: &'static str) -> Result<(), RequestError> {
        state.calls.push(call);
        state.tokens.push(token.to_owned());
        if state.failing.contains(op) {
            return Err(RequestError::Status { status: 500, detail: state.fail_detail.clone() });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BackendApi for MockBackend {
    async fn list_findings(&self, token: &str) -> Result<Vec<Finding>, RequestError> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.calls.push("GET /findings".into());
            state.tokens.push(token.to_owned());
            state.gates.remove("GET /findings")
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let state = self.state.lock().unwrap();
        if state.failing.contains("GET /findings") {
            return Err(RequestError::Status { status: 500, detail: state.fail_detail.clone() });
        }
        Ok(state.findings.clone())
    }

    async fn create_manual_finding(&self, token: &str, entry: &ManualEntry) -> Result<(), RequestError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, token, "POST /findings/manual".into(), "POST /findings/manual")?;
        state.next_id += 1;
        let id = format!("m{}", state.next_id);
        state.findings.push(Finding {
            id: RecordId::from(id),
            title: entry.title.clone(),
            content: entry.content.clone(),
            url: entry.url.clone().unwrap_or_default(),
            risk_level: entry.risk_level,
            status: FindingStatus::New,
            sentiment: 0.0,
            published_date: None,
            source_id: Some(HUMINT_SOURCE_ID.into()),
        });
        Ok(())
    }

    async fn update_finding_status(&self, token: &str, id: &RecordId, status: FindingStatus) -> Result<(), RequestError> {
        let result = {
            let mut state = self.state.lock().unwrap();
            self.record(&mut state, token, format!("PATCH /findings/{id} {status}"), "PATCH /findings")
                .and_then(|()| match state.findings.iter_mut().find(|f| &f.id == id) {
                    Some(f) => {
                        f.status = status;
                        Ok(())
                    }
                    None => Err(RequestError::Status { status: 404, detail: Some("Finding not found".into()) }),
                })
        };
        self.hold("PATCH /findings").await;
        result
    }

    async fn delete_finding(&self, token: &str, id: &RecordId) -> Result<(), RequestError> {
        let result = {
            let mut state = self.state.lock().unwrap();
            self.record(&mut state, token, format!("DELETE /findings/{id}"), "DELETE /findings")
                .map(|()| state.findings.retain(|f| &f.id != id))
        };
        self.hold("DELETE /findings").await;
        result
    }

    async fn simulate_social_scan(&self, token: &str) -> Result<(), RequestError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, token, "POST /simulate/social".into(), "POST /simulate/social")?;
        state.next_id += 1;
        let id = format!("s{}", state.next_id);
        state
            .findings
            .push(finding(&id, RiskLevel::High, FindingStatus::New));
        Ok(())
    }

    async fn list_sources(&self, token: &str) -> Result<Vec<Source>, RequestError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, token, "GET /sources".into(), "GET /sources")?;
        Ok(state.sources.clone())
    }

    async fn create_source(&self, token: &str, new: &NewSource) -> Result<(), RequestError> {
        let result = {
            let mut state = self.state.lock().unwrap();
            self.record(&mut state, token, "POST /sources".into(), "POST /sources")
                .map(|()| {
                    state.next_id += 1;
                    let id = state.next_id;
                    state.sources.push(Source {
                        id: RecordId::from(id),
                        name: new.name.clone(),
                        url: new.url.clone(),
                        category: new.category.clone(),
                        kind: new.kind,
                    });
                })
        };
        self.hold("POST /sources").await;
        result
    }

    async fn delete_source(&self, token: &str, id: &RecordId) -> Result<(), RequestError> {
        let result = {
            let mut state = self.state.lock().unwrap();
            self.record(&mut state, token, format!("DELETE /sources/{id}"), "DELETE /sources")
                .map(|()| state.sources.retain(|s| &s.id != id))
        };
        self.hold("DELETE /sources").await;
        result
    }

    async fn export_report(&self, token: &str, format: ExportFormat) -> Result<Vec<u8>, RequestError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, token, format!("GET /export/{}", format.extension()), "GET /export")?;
        Ok(state.report.clone())
    }

    async fn admin_logs(&self, token: &str) -> Result<Vec<AdminLogEntry>, RequestError> {
        let result = {
            let mut state = self.state.lock().unwrap();
            self.record(&mut state, token, "GET /admin/logs".into(), "GET /admin/logs")
                .map(|()| state.logs.clone())
        };
        self.hold("GET /admin/logs").await;
        result
    }

    async fn admin_stats(&self, token: &str) -> Result<AdminStats, RequestError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, token, "GET /admin/stats".into(), "GET /admin/stats")?;
        Ok(state.stats.clone())
    }
}

// =========================================================================
// MockIdentity
// =========================================================================

struct MockAccount {
    uid: String,
    password: String,
    verified: bool,
}

#[derive(Default)]
pub struct MockIdentityState {
    accounts: HashMap<String, MockAccount>,
    pub calls: Vec<String>,
    pub fail_token: bool,
    pub fail_verification: bool,
    tokens_issued: u64,
}

pub struct MockIdentity {
    tx: watch::Sender<Option<Identity>>,
    pub state: Mutex<MockIdentityState>,
}

impl MockIdentity {
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(None);
        Arc::new(Self { tx, state: Mutex::new(MockIdentityState::default()) })
    }

    pub fn add_account(&self, email: &str, password: &str, verified: bool) {
        let uid = format!("uid-{email}");
        self.state.lock().unwrap().accounts.insert(
            email.to_owned(),
            MockAccount { uid, password: password.to_owned(), verified },
        );
    }

    /// Push an identity change as if it came from the provider.
    pub fn emit(&self, identity: Option<Identity>) {
        self.tx.send_replace(identity);
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("sign_in {email}"));
            match state.accounts.get(email) {
                Some(acct) if acct.password == password => Identity {
                    uid: acct.uid.clone(),
                    email: Some(email.to_owned()),
                    email_verified: acct.verified,
                },
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        self.tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("create_account {email}"));
            if state.accounts.contains_key(email) {
                return Err(AuthError::Registration("EMAIL_EXISTS".into()));
            }
            let uid = format!("uid-{email}");
            state.accounts.insert(
                email.to_owned(),
                MockAccount { uid: uid.clone(), password: password.to_owned(), verified: false },
            );
            Identity { uid, email: Some(email.to_owned()), email_verified: false }
        };
        self.tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn send_email_verification(&self, identity: &Identity) -> Result<(), AuthError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("send_email_verification {}", identity.uid));
        if state.fail_verification {
            return Err(AuthError::Registration("TOO_MANY_ATTEMPTS_TRY_LATER".into()));
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("send_password_reset {email}"));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state.lock().unwrap().calls.push("sign_out".into());
        self.tx.send_replace(None);
        Ok(())
    }

    async fn fresh_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_token {
            return Err(AuthError::Token("TOKEN_EXPIRED".into()));
        }
        state.tokens_issued += 1;
        Ok(format!("token-{}-{}", identity.uid, state.tokens_issued))
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}
