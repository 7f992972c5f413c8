//! RPC dependency-injection context.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tron_events::{ConnectionPool, EventStore};
use tron_llm::ProviderHealthTracker;
use tron_llm::provider::ProviderFactory;
use tron_runtime::orchestrator::orchestrator::Orchestrator;
use tron_runtime::orchestrator::session_manager::SessionManager;
use tron_runtime::orchestrator::subagent_manager::SubagentManager;
use tron_skills::registry::SkillRegistry;
use tron_tools::registry::ToolRegistry;

/// Dependencies needed to create and run agents.
///
/// `None` fields fall back to a degraded mode the handlers surface as
/// `RpcError::NotAvailable` rather than a hard failure — the turn orchestrator
/// itself never needs to know whether these were configured.
pub struct AgentDeps {
    /// Factory that creates a fresh LLM provider per request (reads current model + auth).
    pub provider_factory: Arc<dyn ProviderFactory>,
    /// Factory that creates a fresh tool registry per agent.
    pub tool_factory: Arc<dyn Fn() -> ToolRegistry + Send + Sync>,
}

/// Shared context passed to every RPC handler.
pub struct RpcContext {
    /// Multi-session orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// Session lifecycle manager.
    pub session_manager: Arc<SessionManager>,
    /// Event store for direct event queries.
    pub event_store: Arc<EventStore>,
    /// Skill registry (read/write).
    pub skill_registry: Arc<RwLock<SkillRegistry>>,
    /// Connection pool for task tables (same DB as events).
    pub task_pool: Option<ConnectionPool>,
    /// Path to settings JSON file.
    pub settings_path: PathBuf,
    /// Agent execution dependencies (None = prompt handler returns error).
    pub agent_deps: Option<AgentDeps>,
    /// When the server started (for uptime calculation).
    pub server_start_time: Instant,
    /// Subagent manager for spawning subsessions (None = `SpawnSubagent` unavailable).
    pub subagent_manager: Option<Arc<SubagentManager>>,
    /// Provider health tracker for rolling-window error rate monitoring.
    pub health_tracker: Arc<ProviderHealthTracker>,
}
