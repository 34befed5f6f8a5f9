//! Client for the external automation service and a bounded status poller.

pub mod client;
pub mod poller;

pub use client::{
    AutomationBackend, AutomationError, HttpAutomationClient, StartResponse, TaskState, TaskStatus,
};
pub use poller::{poll_until_complete, PollOutcome, PollPolicy};
