//! Outbound collaborators: the SENTINEL backend and the identity provider.

pub mod api;
pub mod firebase;
pub mod identity;
pub mod types;
