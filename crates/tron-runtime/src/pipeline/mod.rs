//! Execution pipeline — persistence helpers for inline event writes during agent execution.

pub mod persistence;
