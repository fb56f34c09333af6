//! Findings cache: fetch, order, triage, delete.
//!
//! DESIGN
//! ======
//! The cached list is only ever replaced wholesale by the newest successful
//! fetch, or mutated entry-by-entry after the backend confirmed a change.
//! Status updates mutate the one entry in place and do not re-fetch.
//!
//! Ordering is a stable sort: untriaged (`new`) findings first, then risk
//! descending. Ties keep the order the backend sent.

#[cfg(test)]
#[path = "findings_test.rs"]
mod findings_test;

use std::cmp::Reverse;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::session::{SessionContext, SessionTicket};
use super::{Confirm, DELETE_FINDING_PROMPT, Outcome};
use crate::error::{ConsoleError, ErrorCode, RequestError, ValidationError};
use crate::net::api::BackendApi;
use crate::net::types::{Finding, FindingStatus, ManualEntry, RecordId};

/// Stable in-place sort: `new` before everything else, then risk descending.
pub fn sort_findings(items: &mut [Finding]) {
    items.sort_by_key(|f| (f.status != FindingStatus::New, Reverse(f.risk_level.rank())));
}

#[derive(Default)]
struct FindingsState {
    items: Vec<Finding>,
    loading: bool,
    scanning: bool,
    generation: u64,
}

/// Read-only copy of the store for rendering.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FindingsSnapshot {
    pub items: Vec<Finding>,
    pub loading: bool,
    pub scanning: bool,
}

impl FindingsSnapshot {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.loading || self.scanning
    }
}

#[derive(Clone)]
pub struct FindingsStore {
    api: Arc<dyn BackendApi>,
    session: SessionContext,
    state: Arc<RwLock<FindingsState>>,
}

impl FindingsStore {
    pub fn new(api: Arc<dyn BackendApi>, session: SessionContext) -> Self {
        Self { api, session, state: Arc::new(RwLock::new(FindingsState::default())) }
    }

    pub async fn snapshot(&self) -> FindingsSnapshot {
        let state = self.state.read().await;
        FindingsSnapshot { items: state.items.clone(), loading: state.loading, scanning: state.scanning }
    }

    pub async fn get(&self, id: &RecordId) -> Option<Finding> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|f| &f.id == id)
            .cloned()
    }

    pub async fn is_busy(&self) -> bool {
        let state = self.state.read().await;
        state.loading || state.scanning
    }

    /// Whether the triage action for `status` is enabled for finding `id`.
    pub async fn can_apply(&self, id: &RecordId, status: FindingStatus) -> bool {
        self.get(id)
            .await
            .is_some_and(|f| f.can_apply(status))
    }

    /// Fetch the full collection and replace the cache with it, sorted.
    ///
    /// # Errors
    ///
    /// Returns the request error when there is no session or the fetch fails.
    /// The previous list is kept in either case.
    pub async fn refresh(&self) -> Result<Outcome, RequestError> {
        let ticket = self.session.ticket()?;
        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.loading = true;
            state.generation
        };

        let result = self.api.list_findings(&ticket.token).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(generation, current = state.generation, "discarding superseded findings response");
            return Ok(Outcome::Discarded);
        }
        state.loading = false;
        if !self.session.is_current(&ticket) {
            debug!(epoch = ticket.epoch, "discarding findings response from previous session");
            return Ok(Outcome::Discarded);
        }
        match result {
            Ok(mut items) => {
                sort_findings(&mut items);
                debug!(count = items.len(), "findings refreshed");
                state.items = items;
                Ok(Outcome::Applied)
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "findings refresh failed");
                Err(e)
            }
        }
    }

    /// Mark a finding `discarded` or `escalated`.
    ///
    /// # Errors
    ///
    /// Validation errors for a non-triage status or an id not in the cache;
    /// request errors from the PATCH. Local state is untouched on error.
    pub async fn set_status(&self, id: &RecordId, status: FindingStatus) -> Result<Outcome, ConsoleError> {
        if !status.is_triage() {
            return Err(ValidationError::UnsupportedStatus(status.to_string()).into());
        }
        let current = self.get(id).await.map(|f| f.status);
        let Some(current) = current else {
            return Err(ValidationError::UnknownFinding(id.to_string()).into());
        };
        if current == status {
            return Ok(Outcome::Unchanged);
        }

        let ticket = self.session.ticket()?;
        self.api
            .update_finding_status(&ticket.token, id, status)
            .await?;
        if !self.session.is_current(&ticket) {
            return Ok(Outcome::Discarded);
        }

        let mut state = self.state.write().await;
        if let Some(finding) = state.items.iter_mut().find(|f| &f.id == id) {
            finding.status = status;
        }
        info!(%id, %status, "finding status updated");
        Ok(Outcome::Applied)
    }

    /// Permanently delete a finding after the operator confirms.
    ///
    /// # Errors
    ///
    /// Returns the request error; the entry stays in the cache.
    pub async fn delete(&self, id: &RecordId, confirm: &dyn Confirm) -> Result<Outcome, ConsoleError> {
        if !confirm.confirm(DELETE_FINDING_PROMPT) {
            return Ok(Outcome::Declined);
        }
        let ticket = self.session.ticket()?;
        self.api.delete_finding(&ticket.token, id).await?;
        if !self.session.is_current(&ticket) {
            return Ok(Outcome::Discarded);
        }

        self.state
            .write()
            .await
            .items
            .retain(|f| &f.id != id);
        info!(%id, "finding deleted");
        Ok(Outcome::Applied)
    }

    /// POST a human-authored finding, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns the POST's error. A failed re-fetch afterwards is only logged.
    pub async fn create_manual(&self, entry: &ManualEntry) -> Result<Outcome, ConsoleError> {
        let ticket = self.session.ticket()?;
        self.api
            .create_manual_finding(&ticket.token, entry)
            .await?;
        info!(title = %entry.title, risk = %entry.risk_level, "manual finding created");
        Ok(self.refresh_after_mutation(&ticket).await)
    }

    /// Ask the backend to run a simulated social-media scan, then re-fetch.
    /// The store reports busy for the whole call.
    ///
    /// # Errors
    ///
    /// Returns the scan request's error. A failed re-fetch is only logged.
    pub async fn trigger_social_scan(&self) -> Result<Outcome, ConsoleError> {
        let ticket = self.session.ticket()?;
        self.state.write().await.scanning = true;

        let result = match self.api.simulate_social_scan(&ticket.token).await {
            Ok(()) => {
                info!("social scan completed");
                Ok(self.refresh_after_mutation(&ticket).await)
            }
            Err(e) => Err(e.into()),
        };

        self.state.write().await.scanning = false;
        result
    }

    async fn refresh_after_mutation(&self, ticket: &SessionTicket) -> Outcome {
        if !self.session.is_current(ticket) {
            return Outcome::Discarded;
        }
        if let Err(e) = self.refresh().await {
            warn!(code = e.error_code(), error = %e, "refresh after mutation failed");
        }
        Outcome::Applied
    }

    /// Drop the cache and invalidate any fetch still in flight.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.items.clear();
        state.loading = false;
        state.generation += 1;
    }
}
