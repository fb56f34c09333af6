//! Human-authored finding intake (the HUMINT form).

#[cfg(test)]
#[path = "manual_test.rs"]
mod manual_test;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::Outcome;
use super::findings::FindingsStore;
use crate::error::{ConsoleError, ValidationError};
use crate::net::types::ManualEntry;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IntakeView {
    pub form: ManualEntry,
    pub open: bool,
    pub submitting: bool,
}

#[derive(Clone, Default)]
pub struct ManualEntryIntake {
    state: Arc<RwLock<IntakeView>>,
}

impl ManualEntryIntake {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn view(&self) -> IntakeView {
        self.state.read().await.clone()
    }

    pub async fn open(&self) {
        self.state.write().await.open = true;
    }

    /// Hide the form. Field contents are kept for the next open.
    pub async fn close(&self) {
        self.state.write().await.open = false;
    }

    /// Edit the form in place.
    pub async fn edit(&self, f: impl FnOnce(&mut ManualEntry) + Send) {
        f(&mut self.state.write().await.form);
    }

    /// Empty the form and close it.
    pub async fn reset(&self) {
        *self.state.write().await = IntakeView::default();
    }

    /// Validate the form and hand it to the findings store. On success the
    /// form is cleared and closed.
    ///
    /// # Errors
    ///
    /// `ValidationError::MissingField` for a blank title or content, otherwise
    /// whatever the POST returned. The form is left as typed on error.
    pub async fn submit(&self, findings: &FindingsStore) -> Result<Outcome, ConsoleError> {
        let entry = {
            let mut state = self.state.write().await;
            let form = &state.form;
            if form.title.trim().is_empty() {
                return Err(ValidationError::MissingField("title").into());
            }
            if form.content.trim().is_empty() {
                return Err(ValidationError::MissingField("content").into());
            }
            let entry = ManualEntry {
                title: form.title.trim().to_owned(),
                content: form.content.trim().to_owned(),
                risk_level: form.risk_level,
                url: form
                    .url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(ToOwned::to_owned),
            };
            state.submitting = true;
            entry
        };

        let result = findings.create_manual(&entry).await;

        let mut state = self.state.write().await;
        state.submitting = false;
        if matches!(result, Ok(Outcome::Applied)) {
            state.form = ManualEntry::default();
            state.open = false;
        }
        result
    }
}
