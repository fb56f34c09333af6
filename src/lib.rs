//! SENTINEL analyst console.
//!
//! SYSTEM CONTEXT
//! ==============
//! Client-side session and findings-triage layer for the SENTINEL dashboard.
//! An identity provider authenticates the operator; the SENTINEL backend owns
//! findings, sources, audit logs, and report rendering. This crate keeps the
//! operator's view of those entities consistent with the backend while the
//! session changes underneath it.
//!
//! LAYOUT
//! ======
//! - `net`: typed clients for the backend REST API and the identity provider
//! - `state`: session context plus one component per collection
//! - `app`: wiring, session cascade, and the user-action boundary

pub mod app;
pub mod config;
pub mod error;
pub mod net;
pub mod state;
