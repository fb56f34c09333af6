//! Source definitions: list, add, remove.
//!
//! Mutations never touch the local list directly. Every successful add or
//! remove is followed by a full re-fetch.

#[cfg(test)]
#[path = "sources_test.rs"]
mod sources_test;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::session::{SessionContext, SessionTicket};
use super::{Confirm, DELETE_SOURCE_PROMPT, Outcome};
use crate::error::{ConsoleError, ErrorCode, RequestError, ValidationError};
use crate::net::api::BackendApi;
use crate::net::types::{NewSource, RecordId, Source};

#[derive(Default)]
struct SourcesState {
    items: Vec<Source>,
    loading: bool,
    generation: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SourcesSnapshot {
    pub items: Vec<Source>,
    pub loading: bool,
}

#[derive(Clone)]
pub struct SourceRegistry {
    api: Arc<dyn BackendApi>,
    session: SessionContext,
    state: Arc<RwLock<SourcesState>>,
}

impl SourceRegistry {
    pub fn new(api: Arc<dyn BackendApi>, session: SessionContext) -> Self {
        Self { api, session, state: Arc::new(RwLock::new(SourcesState::default())) }
    }

    pub async fn snapshot(&self) -> SourcesSnapshot {
        let state = self.state.read().await;
        SourcesSnapshot { items: state.items.clone(), loading: state.loading }
    }

    /// Fetch all sources and replace the local list.
    ///
    /// # Errors
    ///
    /// Returns the request error; the previous list is kept.
    pub async fn list(&self) -> Result<Outcome, RequestError> {
        let ticket = self.session.ticket()?;
        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.loading = true;
            state.generation
        };

        let result = self.api.list_sources(&ticket.token).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(generation, "discarding superseded sources response");
            return Ok(Outcome::Discarded);
        }
        state.loading = false;
        if !self.session.is_current(&ticket) {
            debug!(epoch = ticket.epoch, "discarding sources response from previous session");
            return Ok(Outcome::Discarded);
        }
        match result {
            Ok(items) => {
                debug!(count = items.len(), "sources listed");
                state.items = items;
                Ok(Outcome::Applied)
            }
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "sources list failed");
                Err(e)
            }
        }
    }

    /// Register a new source, then re-fetch.
    ///
    /// # Errors
    ///
    /// `ValidationError::MissingField` for a blank name or URL (nothing is
    /// sent), otherwise the POST's request error.
    pub async fn add(&self, source: NewSource) -> Result<Outcome, ConsoleError> {
        let source = NewSource { name: source.name.trim().to_owned(), url: source.url.trim().to_owned(), ..source };
        if source.name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        if source.url.is_empty() {
            return Err(ValidationError::MissingField("url").into());
        }

        let ticket = self.session.ticket()?;
        self.api.create_source(&ticket.token, &source).await?;
        info!(name = %source.name, url = %source.url, "source added");
        Ok(self.list_after_mutation(&ticket).await)
    }

    /// Delete a source after the operator confirms, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns the DELETE's request error.
    pub async fn remove(&self, id: &RecordId, confirm: &dyn Confirm) -> Result<Outcome, ConsoleError> {
        if !confirm.confirm(DELETE_SOURCE_PROMPT) {
            return Ok(Outcome::Declined);
        }
        let ticket = self.session.ticket()?;
        self.api.delete_source(&ticket.token, id).await?;
        info!(%id, "source removed");
        Ok(self.list_after_mutation(&ticket).await)
    }

    async fn list_after_mutation(&self, ticket: &SessionTicket) -> Outcome {
        if !self.session.is_current(ticket) {
            return Outcome::Discarded;
        }
        if let Err(e) = self.list().await {
            warn!(code = e.error_code(), error = %e, "sources re-fetch failed");
        }
        Outcome::Applied
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.items.clear();
        state.loading = false;
        state.generation += 1;
    }
}
