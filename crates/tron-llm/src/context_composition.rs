//! # Context Composition
//!
//! Composes [`Context`] fields into ordered text parts for system prompt assembly.
//! All providers use this to build their system prompt from the same context object,
//! ensuring consistent ordering across Anthropic, `OpenAI`, and Google.
//!
//! Two modes:
//! - [`compose_context_parts`] — flat list in canonical order
//! - [`compose_context_parts_grouped`] — split into stable (1h cache TTL) and
//!   volatile (5m cache TTL) groups for Anthropic prompt caching

use tron_core::messages::Context;

/// Compose context fields into an ordered array of text parts.
///
/// Canonical ordering:
/// 1. `system_prompt`
/// 2. `rules_content` (with `"# Project Rules\n\n"` header)
/// 3. `memory_content`
/// 4. `dynamic_rules_context` (with `"# Active Rules\n\n"` header)
/// 5. `skill_context`
/// 6. `subagent_results_context`
/// 7. `task_context` (wrapped in `<task-context>` tags)
/// 8. `working_directory` (appended as `"Current working directory: <path>"`)
pub fn compose_context_parts(context: &Context) -> Vec<String> {
    let mut parts = Vec::new();

    if let Some(ref sp) = context.system_prompt {
        if !sp.is_empty() {
            parts.push(sp.clone());
        }
    }

    if let Some(ref rules) = context.rules_content {
        if !rules.is_empty() {
            parts.push(format!("# Project Rules\n\n{rules}"));
        }
    }

    if let Some(ref memory) = context.memory_content {
        if !memory.is_empty() {
            parts.push(memory.clone());
        }
    }

    if let Some(ref dynamic) = context.dynamic_rules_context {
        if !dynamic.is_empty() {
            parts.push(format!("# Active Rules\n\n{dynamic}"));
        }
    }

    if let Some(ref skills) = context.skill_context {
        if !skills.is_empty() {
            parts.push(skills.clone());
        }
    }

    if let Some(ref subagent) = context.subagent_results_context {
        if !subagent.is_empty() {
            parts.push(subagent.clone());
        }
    }

    if let Some(ref tasks) = context.task_context {
        if !tasks.is_empty() {
            parts.push(format!("<task-context>\n{tasks}\n</task-context>"));
        }
    }

    if let Some(ref wd) = context.working_directory {
        if !wd.is_empty() {
            parts.push(format!("Current working directory: {wd}"));
        }
    }

    parts
}

/// Context parts split by cache stability.
///
/// Used by Anthropic OAuth to assign different cache TTLs:
/// - Stable parts change rarely → 1h TTL
/// - Volatile parts change per turn → 5m TTL (default ephemeral)
#[derive(Clone, Debug, Default)]
pub struct GroupedContextParts {
    /// Parts that change rarely (system prompt, rules, memory).
    pub stable: Vec<String>,
    /// Parts that change frequently (dynamic rules, skills, subagent results, tasks).
    pub volatile: Vec<String>,
}

/// Compose context fields split into stable and volatile groups.
///
/// **Stable** (1h cache TTL): `system_prompt`, `rules_content`, `memory_content`
/// **Volatile** (5m cache TTL): `dynamic_rules_context`, `skill_context`,
/// `subagent_results_context`, `task_context`
pub fn compose_context_parts_grouped(context: &Context) -> GroupedContextParts {
    let mut stable = Vec::new();
    let mut volatile = Vec::new();

    // Stable parts
    if let Some(ref sp) = context.system_prompt {
        if !sp.is_empty() {
            stable.push(sp.clone());
        }
    }

    if let Some(ref rules) = context.rules_content {
        if !rules.is_empty() {
            stable.push(format!("# Project Rules\n\n{rules}"));
        }
    }

    if let Some(ref memory) = context.memory_content {
        if !memory.is_empty() {
            stable.push(memory.clone());
        }
    }

    if let Some(ref wd) = context.working_directory {
        if !wd.is_empty() {
            stable.push(format!("Current working directory: {wd}"));
        }
    }

    // Volatile parts
    if let Some(ref dynamic) = context.dynamic_rules_context {
        if !dynamic.is_empty() {
            volatile.push(format!("# Active Rules\n\n{dynamic}"));
        }
    }

    if let Some(ref skills) = context.skill_context {
        if !skills.is_empty() {
            volatile.push(skills.clone());
        }
    }

    if let Some(ref subagent) = context.subagent_results_context {
        if !subagent.is_empty() {
            volatile.push(subagent.clone());
        }
    }

    if let Some(ref tasks) = context.task_context {
        if !tasks.is_empty() {
            volatile.push(format!("<task-context>\n{tasks}\n</task-context>"));
        }
    }

    GroupedContextParts { stable, volatile }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
