//! # tron-rpc
//!
//! JSON-RPC 2.0 protocol layer, method registry, and handlers.
//!
//! Implements the full RPC surface that clients connect to:
//! - Session: create, get, list, fork, delete, archive
//! - Agent: prompt, abort, getState
//! - Model: list, switch
//! - Context: snapshot, compaction
//! - Events: history, sync, append
//! - Settings: get, update
//! - Skills, tasks/projects/areas, tree navigation
//! - Plus thin adapters for browser, canvas, device, sandbox, transcription,
//!   and worktree RPC surfaces whose concrete engines live outside this crate.
//!
//! All `RpcEventType` variants are a Rust enum matching the wire format exactly.

#![deny(unsafe_code)]

pub mod adapters;
pub mod client;
pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;

pub use client::{Client, ClientError, ReconnectPolicy};
pub use context::{AgentDeps, RpcContext};
pub use errors::RpcError;
pub use registry::{MethodHandler, MethodRegistry};
pub use types::{RpcErrorBody, RpcRequest, RpcResponse};
