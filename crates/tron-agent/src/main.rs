//! # tron-agent
//!
//! Tron agent server binary — wires together all crates and starts the
//! HTTP/WebSocket server.

#![deny(unsafe_code)]

mod provider_factory;
mod providers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use tron_events::{ConnectionConfig, EventStore};
use tron_llm::provider::ProviderFactory;
use tron_rpc::context::{AgentDeps, RpcContext};
use tron_rpc::registry::MethodRegistry;
use tron_runtime::orchestrator::orchestrator::Orchestrator;
use tron_runtime::orchestrator::session_manager::SessionManager;
use tron_runtime::orchestrator::subagent_manager::SubagentManager;
use tron_server::config::ServerConfig;
use tron_server::server::TronServer;
use tron_server::websocket::event_bridge::EventBridge;
use tron_skills::registry::SkillRegistry;
use tron_tools::registry::ToolRegistry;

/// Tron agent server.
#[derive(Parser, Debug)]
#[command(name = "tron-agent", about = "Tron agent server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "9847")]
    port: u16,

    /// Path to the `SQLite` database (events + tasks in one file).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Maximum concurrent sessions (overrides settings if specified).
    #[arg(long)]
    max_sessions: Option<usize>,
}

impl Cli {
    fn default_db_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home)
            .join(".tron")
            .join("database")
            .join("beta-rs.db")
    }
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Resolve the auth file path (`~/.tron/auth.json`).
fn auth_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tron").join("auth.json")
}

/// Configuration for tool registry creation.
///
/// Captures shared resources (event store, task pool, APNS service) so the
/// tool factory closure can create real provider implementations.
struct ToolRegistryConfig {
    event_store: Arc<tron_events::EventStore>,
    task_pool: tron_events::ConnectionPool,
    apns_service: Option<Arc<tron_server::platform::apns::ApnsService>>,
}

/// Create a populated tool registry with built-in tools.
///
/// Called once per agent run to create a fresh registry.
fn create_tool_registry(config: &ToolRegistryConfig) -> ToolRegistry {
    let _ = &config.event_store;
    let _ = &config.task_pool;
    let _ = &config.apns_service;

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(
        tron_tools::ui::ask_user::AskUserQuestionTool::new(),
    ));

    tracing::debug!(tool_count = registry.len(), tools = ?registry.names(), "tool registry created");
    registry
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Database (events + tasks share one SQLite file) — set up before logging
    // so that tracing events are persisted from the start.
    let db_path = args.db_path.unwrap_or_else(Cli::default_db_path);
    ensure_parent_dir(&db_path)?;
    let db_str = db_path.to_string_lossy();
    let pool = tron_events::new_file(&db_str, &ConnectionConfig::default())
        .context("Failed to open database")?;
    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let _ = tron_events::run_migrations(&conn).context("Failed to run event migrations")?;
        tron_tasks::migrations::run_migrations(&conn)
            .context("Failed to run task migrations")?;
    }

    // Load settings early (needed for log level before logging init)
    let settings_path = tron_settings::loader::settings_path();
    let settings = tron_settings::loader::load_settings_from_path(&settings_path)
        .unwrap_or_default();

    // Initialize logging with SQLite persistence (dedicated connection, separate from pool).
    // Must set WAL + busy_timeout to match pool connections — without busy_timeout,
    // concurrent writes from the pool cause immediate SQLITE_BUSY errors.
    let log_conn = rusqlite::Connection::open(&db_path)
        .context("Failed to open logging DB connection")?;
    log_conn
        .execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
        .context("Failed to set logging connection pragmas")?;
    let log_handle = tron_logging::init_subscriber_with_sqlite(
        settings.logging.db_log_level.as_filter_str(),
        log_conn,
    );
    let flush_task = tron_logging::spawn_flush_task(log_handle.clone());
    let task_pool = pool.clone();
    let event_store = Arc::new(EventStore::new(pool));

    // Core services
    let max_sessions = args
        .max_sessions
        .unwrap_or(settings.server.max_concurrent_sessions);
    let session_manager = Arc::new(SessionManager::new(event_store.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        session_manager.clone(),
        max_sessions,
    ));
    let skill_registry = Arc::new(RwLock::new(SkillRegistry::new()));

    // APNS service (optional — only if config exists at ~/.tron/mods/apns/)
    let apns_service: Option<Arc<tron_server::platform::apns::ApnsService>> =
        tron_server::platform::apns::load_apns_config().and_then(|apns_config| {
            match tron_server::platform::apns::ApnsService::new(apns_config) {
                Ok(svc) => {
                    tracing::info!("APNS service initialized — push notifications enabled");
                    Some(Arc::new(svc))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "APNS init failed — push notifications disabled");
                    None
                }
            }
        });
    if apns_service.is_none() {
        tracing::info!("No APNS config — push notifications disabled");
    }

    // Tool registry config (shared resources for per-session tool factories)
    let tool_config = Arc::new(ToolRegistryConfig {
        event_store: event_store.clone(),
        task_pool: task_pool.clone(),
        apns_service: apns_service.clone(),
    });

    // Agent dependencies (provider factory + tool factory)
    // The factory creates a fresh provider per request by detecting the provider
    // type from the model ID and loading auth from disk. This means model switches
    // take effect immediately — no server restart needed.
    let provider_factory: Arc<dyn ProviderFactory> =
        Arc::new(provider_factory::DefaultProviderFactory::new(&settings));

    // Verify auth is available for the default model at startup.
    let startup_auth_ok = provider_factory
        .create_for_model(&settings.server.default_model)
        .await
        .is_ok();

    let (agent_deps, shared_subagent_manager) = if startup_auth_ok {
        tracing::info!(
            provider = settings.server.default_provider.as_str(),
            model = settings.server.default_model.as_str(),
            "agent execution enabled"
        );

        // Create SubagentManager (tool_factory set below via OnceCell)
        let subagent_manager = Arc::new(SubagentManager::new(
            session_manager.clone(),
            event_store.clone(),
            orchestrator.broadcast().clone(),
            provider_factory.clone(),
            None,
            None,
        ));

        // Build tool factory (fresh registry per session/subsession)
        let config = tool_config.clone();
        let tool_factory: Arc<dyn Fn() -> ToolRegistry + Send + Sync> =
            Arc::new(move || create_tool_registry(&config));

        // Break circular dep: SubagentManager needs tool_factory to spawn children
        subagent_manager.set_tool_factory(tool_factory.clone());

        (
            Some(AgentDeps {
                provider_factory,
                tool_factory,
            }),
            Some(subagent_manager) as Option<Arc<SubagentManager>>,
        )
    } else {
        tracing::warn!("no auth found — agent execution disabled (sign in via the app, or set ANTHROPIC_API_KEY / OPENAI_API_KEY / GOOGLE_API_KEY)");
        (None, None)
    };

    // RPC context
    let rpc_context = RpcContext {
        orchestrator: orchestrator.clone(),
        session_manager,
        event_store,
        skill_registry,
        task_pool: Some(task_pool),
        settings_path,
        agent_deps,
        server_start_time: std::time::Instant::now(),
        subagent_manager: shared_subagent_manager,
        health_tracker: Arc::new(tron_llm::ProviderHealthTracker::new()),
    };

    // Method registry
    let mut registry = MethodRegistry::new();
    tron_rpc::handlers::register_all(&mut registry);
    let method_count = registry.methods().len();

    // Server config
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };

    // Build and start server
    let metrics_handle = tron_server::metrics::install_recorder();
    let server = TronServer::new(config, registry, rpc_context, metrics_handle);

    // APNS: notify registered devices when a turn or subagent completes.
    if let Some(apns) = apns_service.clone() {
        let mut events = orchestrator.subscribe();
        let pool = task_pool.clone();
        let cancel = server.shutdown().token();
        drop(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.recv() => {
                        let Ok(event) = event else { break };
                        let notification = match &event {
                            tron_core::events::TronEvent::SubagentCompleted { subagent_session_id, .. } => {
                                Some(tron_tools::traits::Notification {
                                    title: "Subagent complete".into(),
                                    body: format!("Subagent {subagent_session_id} finished"),
                                    priority: "normal".into(),
                                    badge: None,
                                    data: Some(serde_json::json!({ "sessionId": subagent_session_id })),
                                    sheet_content: None,
                                })
                            }
                            tron_core::events::TronEvent::TurnEnd { base, .. } => {
                                Some(tron_tools::traits::Notification {
                                    title: "Turn complete".into(),
                                    body: "Your agent finished its turn".into(),
                                    priority: "normal".into(),
                                    badge: None,
                                    data: Some(serde_json::json!({ "sessionId": base.session_id })),
                                    sheet_content: None,
                                })
                            }
                            _ => None,
                        };
                        if let Some(notification) = notification {
                            let delegate = providers::apns_delegate::ApnsNotifyDelegate::new(apns.clone(), pool.clone());
                            if let Err(e) = tron_tools::traits::NotifyDelegate::send_notification(&delegate, &notification).await {
                                tracing::warn!(error = %e, "APNS notification delivery failed");
                            }
                        }
                    }
                }
            }
        }));
    }

    // Event bridge: orchestrator events → WebSocket clients
    let bridge = EventBridge::new(
        orchestrator.subscribe(),
        server.broadcast().clone(),
        server.shutdown().token(),
    );
    let _bridge_handle = tokio::spawn(bridge.run());

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        "Tron agent listening on http://{addr} ({method_count} RPC methods registered)"
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let _ = handle.await;

    // Flush remaining logs to SQLite and stop the periodic flush task
    flush_task.abort();
    log_handle.flush();

    tracing::info!("Shutdown complete");
    Ok(())
}
