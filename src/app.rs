//! Console wiring: one session context, every component, and the cascade
//! from session changes to data loads.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Console::start` spawns two tasks: the identity listener owned by the
//! session manager, and a watcher on the session context. The watcher loads
//! findings and sources when a session appears and clears all dependent state
//! when it goes away. A session with a new epoch always gets the clear first,
//! even when the sign-out in between was never observed on its own.
//!
//! ERROR HANDLING
//! ==============
//! The action wrappers here are the user-action boundary. They never return
//! errors: each failure is logged, stored as the current alert, and reported
//! as `None`.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ConsoleError, ErrorCode};
use crate::net::api::BackendApi;
use crate::net::identity::IdentityProvider;
use crate::net::types::{ExportFormat, FindingStatus, NewSource, RecordId};
use crate::state::admin::AdminPanel;
use crate::state::export::ReportExporter;
use crate::state::findings::FindingsStore;
use crate::state::manual::ManualEntryIntake;
use crate::state::session::{SessionContext, SessionManager, Subscription};
use crate::state::sources::SourceRegistry;
use crate::state::ui::{Notice, NoticeSlot};
use crate::state::{Confirm, Outcome};

pub const MANUAL_ENTRY_SAVED: &str = "Human entry registered.";
pub const SOCIAL_SCAN_DONE: &str = "Social Media Scan Completed.";
pub const STATUS_UPDATE_FAILED: &str = "Error updating status";
pub const SOURCE_ADD_FAILED: &str = "Error adding source";
pub const SOURCE_DELETE_FAILED: &str = "Error deleting source";
pub const ADMIN_LOAD_FAILED: &str = "Error loading admin data";
pub const DOWNLOAD_FAILED: &str = "Download error";

// =============================================================================
// HANDLE
// =============================================================================

/// Keeps the console's background tasks alive. Dropping it stops them.
pub struct ConsoleHandle {
    subscription: Option<Subscription>,
    watcher: JoinHandle<()>,
}

impl ConsoleHandle {
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for ConsoleHandle {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.watcher.abort();
    }
}

// =============================================================================
// CONSOLE
// =============================================================================

#[derive(Clone)]
pub struct Console {
    pub session: SessionManager,
    pub findings: FindingsStore,
    pub sources: SourceRegistry,
    pub manual: ManualEntryIntake,
    pub admin: AdminPanel,
    pub exporter: ReportExporter,
    context: SessionContext,
    alert: NoticeSlot,
}

impl Console {
    pub fn new(api: Arc<dyn BackendApi>, identity: Arc<dyn IdentityProvider>, download_dir: PathBuf) -> Self {
        let context = SessionContext::new();
        Self {
            session: SessionManager::new(identity, context.clone()),
            findings: FindingsStore::new(api.clone(), context.clone()),
            sources: SourceRegistry::new(api.clone(), context.clone()),
            manual: ManualEntryIntake::new(),
            admin: AdminPanel::new(api.clone(), context.clone()),
            exporter: ReportExporter::new(api, context.clone(), download_dir),
            context,
            alert: NoticeSlot::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Start listening for identity changes and cascading session changes.
    #[must_use]
    pub fn start(&self) -> ConsoleHandle {
        let subscription = self.session.start();
        let console = self.clone();
        let mut rx = self.context.subscribe();
        let watcher = tokio::spawn(async move {
            // Epoch of the last session the watcher loaded data for.
            let mut loaded: Option<u64> = None;
            loop {
                let (epoch, signed_in) = {
                    let snapshot = rx.borrow_and_update();
                    (snapshot.epoch, snapshot.session.is_some())
                };
                // A sign-out and sign-in can coalesce into one observed value.
                if signed_in && loaded.is_some_and(|e| e != epoch) {
                    console.on_session_change(false).await;
                }
                console.on_session_change(signed_in).await;
                loaded = signed_in.then_some(epoch);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        ConsoleHandle { subscription: Some(subscription), watcher }
    }

    /// Load the primary collections when a session appears; clear every
    /// dependent component when it goes away.
    pub async fn on_session_change(&self, signed_in: bool) {
        if signed_in {
            debug!("session available, loading findings and sources");
            let (findings, sources) = tokio::join!(self.findings.refresh(), self.sources.list());
            if let Err(e) = findings {
                warn!(code = e.error_code(), error = %e, "initial findings load failed");
            }
            if let Err(e) = sources {
                warn!(code = e.error_code(), error = %e, "initial sources load failed");
            }
        } else {
            self.findings.clear().await;
            self.sources.clear().await;
            self.admin.clear().await;
            self.manual.reset().await;
        }
    }

    // =========================================================================
    // ALERTS
    // =========================================================================

    pub async fn alert(&self) -> Option<Notice> {
        self.alert.peek().await
    }

    pub async fn take_alert(&self) -> Option<Notice> {
        self.alert.take().await
    }

    async fn fail(&self, action: &'static str, err: &ConsoleError, text: String) {
        warn!(action, code = err.error_code(), error = %err, "action failed");
        self.alert.set(Notice::error(text)).await;
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    pub async fn triage(&self, id: &RecordId, status: FindingStatus) -> Option<Outcome> {
        match self.findings.set_status(id, status).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.fail("triage", &e, STATUS_UPDATE_FAILED.to_owned())
                    .await;
                None
            }
        }
    }

    pub async fn delete_finding(&self, id: &RecordId, confirm: &dyn Confirm) -> Option<Outcome> {
        match self.findings.delete(id, confirm).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                let detail = match &e {
                    ConsoleError::Request(req) => req.detail().unwrap_or("Server Error").to_owned(),
                    other => other.user_message(),
                };
                self.fail("delete_finding", &e, format!("Error deleting: {detail}"))
                    .await;
                None
            }
        }
    }

    pub async fn submit_manual(&self) -> Option<Outcome> {
        match self.manual.submit(&self.findings).await {
            Ok(outcome) => {
                if outcome == Outcome::Applied {
                    self.alert
                        .set(Notice::success(MANUAL_ENTRY_SAVED))
                        .await;
                }
                Some(outcome)
            }
            Err(e) => {
                let text = format!("Error: {}", e.user_message());
                self.fail("submit_manual", &e, text).await;
                None
            }
        }
    }

    pub async fn social_scan(&self) -> Option<Outcome> {
        match self.findings.trigger_social_scan().await {
            Ok(outcome) => {
                if outcome == Outcome::Applied {
                    self.alert
                        .set(Notice::success(SOCIAL_SCAN_DONE))
                        .await;
                }
                Some(outcome)
            }
            Err(e) => {
                let text = format!("Scan error: {}", e.user_message());
                self.fail("social_scan", &e, text).await;
                None
            }
        }
    }

    pub async fn add_source(&self, source: NewSource) -> Option<Outcome> {
        match self.sources.add(source).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.fail("add_source", &e, SOURCE_ADD_FAILED.to_owned())
                    .await;
                None
            }
        }
    }

    pub async fn remove_source(&self, id: &RecordId, confirm: &dyn Confirm) -> Option<Outcome> {
        match self.sources.remove(id, confirm).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.fail("remove_source", &e, SOURCE_DELETE_FAILED.to_owned())
                    .await;
                None
            }
        }
    }

    pub async fn open_admin(&self) -> Option<Outcome> {
        match self.admin.open().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.fail("open_admin", &ConsoleError::from(e), ADMIN_LOAD_FAILED.to_owned())
                    .await;
                None
            }
        }
    }

    pub async fn export(&self, format: ExportFormat) -> Option<PathBuf> {
        match self.exporter.export(format).await {
            Ok(path) => Some(path),
            Err(e) => {
                self.fail("export", &e, DOWNLOAD_FAILED.to_owned())
                    .await;
                None
            }
        }
    }
}
