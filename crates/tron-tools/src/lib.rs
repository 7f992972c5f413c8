//! # tron-tools
//!
//! The `TronTool` trait and the tool registry for the Tron agent.
//!
//! This crate defines the invocation/result contract that every tool must
//! satisfy — name, category, JSON schema, execution — plus the dependency
//! injection traits (filesystem, process execution, HTTP, subagent spawning,
//! browser automation, notifications, message bus, event store queries) that
//! concrete tool implementations use to reach external services. The runtime
//! crate supplies the concrete tools and their DI implementations; this crate
//! only carries the interfaces and the in-memory registry that holds them.
//!
//! - **UI**: `AskUserQuestion` — the one tool implementation that ships here,
//!   since it is pure (no external dependency, no filesystem/network access).

#![deny(unsafe_code)]

pub mod errors;
pub mod registry;
pub mod traits;
pub mod ui;

pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use traits::{ToolContext, TronTool};
