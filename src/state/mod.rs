//! Client-side console state.
//!
//! DESIGN
//! ======
//! Each component is a cheap `Clone` handle over `Arc<RwLock<_>>` state plus
//! the shared `SessionContext`. Locks are taken, mutated, and released between
//! awaits; none is held across a network call.
//!
//! Two fences keep late responses out of current state:
//! - every collection carries a generation counter, bumped when a fetch starts
//!   and when the collection is cleared, so only the newest fetch applies;
//! - every request captures a `SessionTicket`, and a response whose session
//!   epoch is no longer current is dropped as `Outcome::Discarded`.

use serde::Serialize;

pub mod admin;
pub mod export;
pub mod findings;
pub mod manual;
pub mod session;
pub mod sources;
pub mod ui;

#[cfg(test)]
pub mod test_helpers;

pub const DELETE_FINDING_PROMPT: &str =
    "Are you sure you want to PERMANENTLY DELETE this target? This action cannot be undone.";
pub const DELETE_SOURCE_PROMPT: &str = "Delete source?";

/// What a state operation did to local state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The response was applied.
    Applied,
    /// Nothing needed to change; no request was sent.
    Unchanged,
    /// The operator declined the confirmation prompt; no request was sent.
    Declined,
    /// The response arrived after the session or collection moved on.
    Discarded,
}

/// Confirmation gate for destructive actions.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}
