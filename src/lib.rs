//! Form autofill for citizen-service portals.
//!
//! A payload of field values reaches the receiving page through a query
//! string, a URL fragment, a short-lived mailbox, or an interactive prompt.
//! Each site profile maps payload fields to selector fallback lists; the
//! orchestrator writes the values, fires the events page scripts listen
//! for, reports the outcome, and can lock submission until reviewed.

pub mod api;
pub mod autofill;
pub mod automation;
pub mod config;
pub mod dom;
pub mod error;
pub mod messaging;
pub mod models;
pub mod payload;
pub mod selector;
