//! Hook execution engine.
//!
//! Orchestrates hook execution with priority ordering, blocking/background
//! mode support, fail-open error handling, and background task tracking.
//!
//! # Execution Model
//!
//! Hooks are evaluated in priority order (highest first). For blocking hooks:
//! - A `Block` action stops the chain immediately.
//! - A `Modify` action collects modifications and continues.
//! - A `Continue` action continues to the next hook.
//!
//! Background hooks are fire-and-forget: spawned as tasks and tracked for
//! eventual draining.
//!
//! # Fail-Open
//!
//! Hook errors never crash the agent. They are logged and treated as `Continue`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use super::background::BackgroundTracker;
use super::handler::HookHandler;
use super::registry::HookRegistry;
use super::types::{HookAction, HookContext, HookExecutionMode, HookResult, HookType};

/// Hook execution engine.
///
/// Owns the [`HookRegistry`] and [`BackgroundTracker`]. Provides the main
/// `execute()` method that runs all registered hooks for a given context.
pub struct HookEngine {
    registry: HookRegistry,
    background: BackgroundTracker,
}

impl HookEngine {
    /// Create a new engine with the given registry.
    #[must_use]
    pub fn new(registry: HookRegistry) -> Self {
        Self {
            registry,
            background: BackgroundTracker::new(),
        }
    }

    /// Execute all registered hooks for the given context.
    ///
    /// Blocking hooks run sequentially in priority order.
    /// Background hooks are spawned and tracked.
    ///
    /// Returns the aggregated result. If any blocking hook returns `Block`,
    /// execution stops and the block result is returned. Modifications from
    /// all `Modify` results are merged.
    #[instrument(skip_all, fields(hook_type = %context.hook_type()))]
    pub async fn execute(&self, context: &HookContext) -> HookResult {
        let hook_type = context.hook_type();
        let handlers = self.registry.get_handlers(hook_type);

        if handlers.is_empty() {
            return HookResult::continue_();
        }

        let start = Instant::now();

        // Separate blocking and background handlers
        let (blocking, background): (Vec<_>, Vec<_>) = handlers
            .into_iter()
            .partition(|h| Self::effective_mode(h, hook_type) == HookExecutionMode::Blocking);

        // Execute blocking hooks sequentially
        let result = self.execute_blocking(&blocking, context).await;

        // Spawn background hooks
        if !background.is_empty() {
            self.spawn_background(background, context);
        }

        let duration_ms = start.elapsed().as_millis();
        debug!(
            hook_type = %hook_type,
            duration_ms = duration_ms,
            blocked = result.is_blocked(),
            "Hook execution complete"
        );

        result
    }

    /// Execute blocking hooks sequentially.
    async fn execute_blocking(
        &self,
        handlers: &[Arc<dyn HookHandler>],
        context: &HookContext,
    ) -> HookResult {
        let mut merged_modifications: Option<serde_json::Value> = None;
        let mut messages: Vec<String> = Vec::new();

        for handler in handlers {
            // Check filter
            if !handler.should_handle(context) {
                debug!(name = %handler.name(), "Hook skipped by filter");
                continue;
            }

            // Execute with optional timeout
            let result = self
                .execute_single_handler(handler.as_ref(), context)
                .await;

            match result.action {
                HookAction::Block => {
                    debug!(
                        name = %handler.name(),
                        reason = result.reason.as_deref().unwrap_or("(none)"),
                        "Hook blocked execution"
                    );
                    return result;
                }
                HookAction::Modify => {
                    if let Some(mods) = &result.modifications {
                        merged_modifications = Some(merge_json(
                            merged_modifications.as_ref(),
                            mods,
                        ));
                    }
                    if let Some(msg) = &result.message {
                        messages.push(msg.clone());
                    }
                }
                HookAction::Continue => {
                    if let Some(msg) = &result.message {
                        messages.push(msg.clone());
                    }
                }
            }
        }

        // Build aggregated result
        if merged_modifications.is_some() || !messages.is_empty() {
            HookResult {
                action: if merged_modifications.is_some() {
                    HookAction::Modify
                } else {
                    HookAction::Continue
                },
                reason: None,
                message: if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("\n"))
                },
                modifications: merged_modifications,
            }
        } else {
            HookResult::continue_()
        }
    }

    /// Execute a single handler, applying timeout and fail-open.
    async fn execute_single_handler(
        &self,
        handler: &dyn HookHandler,
        context: &HookContext,
    ) -> HookResult {
        let timeout_ms = handler.timeout_ms().unwrap_or(30_000);

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            handler.handle(context),
        )
        .await;

        match result {
            Ok(Ok(hook_result)) => hook_result,
            Ok(Err(e)) => {
                warn!(
                    name = %handler.name(),
                    error = %e,
                    "Hook handler error (fail-open)"
                );
                HookResult::continue_()
            }
            Err(_) => {
                warn!(
                    name = %handler.name(),
                    timeout_ms = timeout_ms,
                    "Hook handler timed out (fail-open)"
                );
                HookResult::continue_()
            }
        }
    }

    /// Spawn background hooks as tracked tasks.
    fn spawn_background(
        &self,
        handlers: Vec<Arc<dyn HookHandler>>,
        context: &HookContext,
    ) {
        for handler in handlers {
            if !handler.should_handle(context) {
                continue;
            }

            let ctx = context.clone();
            let name = handler.name().to_string();

            self.background.spawn(async move {
                match handler.handle(&ctx).await {
                    Ok(result) => {
                        debug!(name = %name, action = ?result.action, "Background hook completed");
                    }
                    Err(e) => {
                        warn!(name = %name, error = %e, "Background hook error");
                    }
                }
            });
        }
    }

    /// Determine the effective execution mode for a handler.
    ///
    /// Forced-blocking hook types always run in blocking mode regardless
    /// of the handler's declared mode.
    fn effective_mode(handler: &Arc<dyn HookHandler>, hook_type: HookType) -> HookExecutionMode {
        if hook_type.is_forced_blocking() {
            HookExecutionMode::Blocking
        } else {
            handler.execution_mode()
        }
    }

    /// Wait for all pending background hooks to complete.
    pub async fn wait_for_background(&self) {
        self.background.drain_all().await;
    }

    /// Wait for background hooks with a timeout.
    ///
    /// Returns `true` if all completed within the timeout.
    pub async fn wait_for_background_with_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> bool {
        self.background.drain_with_timeout(timeout).await
    }

    /// Get the number of pending background hooks.
    #[must_use]
    pub fn pending_background_count(&self) -> usize {
        self.background.pending_count()
    }

    /// Get a reference to the hook registry.
    #[must_use]
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Get a mutable reference to the hook registry.
    pub fn registry_mut(&mut self) -> &mut HookRegistry {
        &mut self.registry
    }
}

impl std::fmt::Debug for HookEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookEngine")
            .field("registry", &self.registry)
            .field("background", &self.background)
            .finish()
    }
}

/// Shallow-merge two JSON objects. `b` fields override `a` fields.
fn merge_json(
    a: Option<&serde_json::Value>,
    b: &serde_json::Value,
) -> serde_json::Value {
    match (a, b) {
        (Some(serde_json::Value::Object(base)), serde_json::Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let _ = merged.insert(key.clone(), value.clone());
            }
            serde_json::Value::Object(merged)
        }
        _ => b.clone(),
    }
}
