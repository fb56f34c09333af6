//! Admin telemetry panel: audit log and aggregate stats.
//!
//! DESIGN
//! ======
//! Nothing is fetched until the panel is opened. A load issues both requests
//! concurrently and applies each half on its own; a failed half keeps
//! whatever that section showed before.

#[cfg(test)]
#[path = "admin_test.rs"]
mod admin_test;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::Outcome;
use super::session::SessionContext;
use crate::error::{ErrorCode, RequestError};
use crate::net::api::BackendApi;
use crate::net::types::{AdminLogEntry, AdminStats};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AdminSnapshot {
    pub open: bool,
    pub loading: bool,
    pub logs: Vec<AdminLogEntry>,
    pub stats: AdminStats,
}

#[derive(Default)]
struct AdminState {
    view: AdminSnapshot,
    generation: u64,
}

#[derive(Clone)]
pub struct AdminPanel {
    api: Arc<dyn BackendApi>,
    session: SessionContext,
    state: Arc<RwLock<AdminState>>,
}

impl AdminPanel {
    pub fn new(api: Arc<dyn BackendApi>, session: SessionContext) -> Self {
        Self { api, session, state: Arc::new(RwLock::new(AdminState::default())) }
    }

    pub async fn snapshot(&self) -> AdminSnapshot {
        self.state.read().await.view.clone()
    }

    /// Show the panel and load its contents.
    ///
    /// # Errors
    ///
    /// See [`AdminPanel::load`].
    pub async fn open(&self) -> Result<Outcome, RequestError> {
        self.state.write().await.view.open = true;
        self.load().await
    }

    /// Hide the panel. A load still in flight completes and applies.
    pub async fn close(&self) {
        self.state.write().await.view.open = false;
    }

    /// Re-fetch, but only while the panel is open.
    ///
    /// # Errors
    ///
    /// See [`AdminPanel::load`].
    pub async fn refresh(&self) -> Result<Outcome, RequestError> {
        if !self.state.read().await.view.open {
            return Ok(Outcome::Unchanged);
        }
        self.load().await
    }

    /// Fetch logs and stats concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error when there is no session, or when both halves failed
    /// (the logs error is returned). One failing half alone is only logged.
    pub async fn load(&self) -> Result<Outcome, RequestError> {
        let ticket = self.session.ticket()?;
        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.view.loading = true;
            state.generation
        };

        let (logs, stats) = tokio::join!(self.api.admin_logs(&ticket.token), self.api.admin_stats(&ticket.token));

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(generation, "discarding superseded admin response");
            return Ok(Outcome::Discarded);
        }
        state.view.loading = false;
        if !self.session.is_current(&ticket) {
            debug!(epoch = ticket.epoch, "discarding admin response from previous session");
            return Ok(Outcome::Discarded);
        }

        let logs_err = match logs {
            Ok(logs) => {
                debug!(count = logs.len(), "admin logs loaded");
                state.view.logs = logs;
                None
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "admin logs fetch failed");
                Some(e)
            }
        };
        let stats_failed = match stats {
            Ok(stats) => {
                state.view.stats = stats;
                false
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "admin stats fetch failed");
                true
            }
        };
        match logs_err {
            Some(e) if stats_failed => Err(e),
            _ => Ok(Outcome::Applied),
        }
    }

    /// Forget everything and close.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.view = AdminSnapshot::default();
        state.generation += 1;
    }
}
