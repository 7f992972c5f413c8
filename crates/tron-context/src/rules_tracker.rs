//! Rules tracker for session-level rules management.
//!
//! [`RulesTracker`] manages tracking of rules files loaded for a session's
//! context. Rules are loaded once at session start and are immutable for the
//! session lifetime.
//!
//! ## Static rules
//!
//! Loaded from a `rules.loaded` event. Provides file list for context snapshot
//! responses. Supports event-sourced reconstruction for session resume/fork.
//!
//! ## Dynamic rules activation
//!
//! After discovery, a [`RulesIndex`] is set on the tracker. As the agent
//! touches file paths (via `PostToolUse` hook), scoped rules activate when
//! touched paths fall under their `scope_dir`. Global rules are always
//! injected; scoped rules only appear after activation.
//!
//! Content is cached until new activations occur. At compaction boundaries,
//! `clear_dynamic_state()` resets activation state but preserves the index.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules_discovery::DiscoveredRulesFile;
use crate::rules_index::RulesIndex;
use crate::types::RulesLevel;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Information about a tracked rules file (from `rules.loaded` event).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedRulesFile {
    /// Absolute path to the file.
    pub path: String,
    /// Path relative to working directory.
    pub relative_path: String,
    /// Level in the hierarchy.
    pub level: RulesLevel,
    /// Depth from project root (-1 for global, 0 for project root).
    pub depth: i32,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// File info from a `rules.loaded` event payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesFileInfo {
    /// Absolute path.
    pub path: String,
    /// Relative path.
    pub relative_path: String,
    /// Rule level.
    pub level: RulesLevel,
    /// Depth from project root.
    pub depth: i32,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Generic event structure for reconstruction.
#[derive(Clone, Debug)]
pub struct RulesTrackingEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g. `"rules.loaded"`).
    pub event_type: String,
    /// Event payload as JSON.
    pub payload: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// RulesTracker
// ─────────────────────────────────────────────────────────────────────────────

/// Session-level rules state manager.
///
/// Tracks statically loaded rules (from events) and dynamically activated
/// scoped rules (from file path touches). Provides content building for
/// context injection.
#[derive(Clone, Debug)]
pub struct RulesTracker {
    // Static rules state
    files: Vec<TrackedRulesFile>,
    merged_tokens: u32,
    loaded_event_id: Option<String>,
    merged_content: Option<String>,

    // Dynamic rules state
    rules_index: Option<RulesIndex>,
    touched_paths: HashSet<String>,
    /// Activated scoped rules in activation order (insertion order preserved).
    /// Each entry is `(relative_path, rule)`.
    activated_scoped_rules: Vec<(String, DiscoveredRulesFile)>,
    activated_keys: HashSet<String>,
    dynamic_content: Option<String>,
    dynamic_content_dirty: bool,
}

impl RulesTracker {
    /// Create a new empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            merged_tokens: 0,
            loaded_event_id: None,
            merged_content: None,
            rules_index: None,
            touched_paths: HashSet::new(),
            activated_scoped_rules: Vec::new(),
            activated_keys: HashSet::new(),
            dynamic_content: None,
            dynamic_content_dirty: true,
        }
    }

    // ── Static rules ─────────────────────────────────────────────────────

    /// Record that rules files have been loaded.
    ///
    /// Called once per session from a `rules.loaded` event.
    pub fn set_rules(
        &mut self,
        files: Vec<RulesFileInfo>,
        merged_tokens: u32,
        event_id: String,
        merged_content: Option<String>,
    ) {
        self.files = files
            .into_iter()
            .map(|f| TrackedRulesFile {
                path: f.path,
                relative_path: f.relative_path,
                level: f.level,
                depth: f.depth,
                size_bytes: f.size_bytes,
            })
            .collect();
        self.merged_tokens = merged_tokens;
        self.loaded_event_id = Some(event_id);
        self.merged_content = merged_content;
    }

    /// Get all loaded rules files.
    #[must_use]
    pub fn get_rules_files(&self) -> &[TrackedRulesFile] {
        &self.files
    }

    /// Get the total number of rules files.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    /// Get estimated token count for merged rules content.
    #[must_use]
    pub fn merged_tokens(&self) -> u32 {
        self.merged_tokens
    }

    /// Get the event ID of the `rules.loaded` event.
    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        self.loaded_event_id.as_deref()
    }

    /// Get cached merged content (if available).
    #[must_use]
    pub fn merged_content(&self) -> Option<&str> {
        self.merged_content.as_deref()
    }

    /// Check if any rules are loaded (static or dynamic).
    #[must_use]
    pub fn has_rules(&self) -> bool {
        !self.files.is_empty()
            || self
                .rules_index
                .as_ref()
                .is_some_and(|idx| idx.total_count() > 0)
    }

    /// Get the number of files at each level.
    #[must_use]
    pub fn counts_by_level(&self) -> LevelCounts {
        let mut counts = LevelCounts::default();
        for file in &self.files {
            match file.level {
                RulesLevel::Global => counts.global += 1,
                RulesLevel::Project => counts.project += 1,
                RulesLevel::Directory => counts.directory += 1,
            }
        }
        counts
    }

    // ── Dynamic rules activation ─────────────────────────────────────────

    /// Set the rules index for dynamic path-scoped matching.
    ///
    /// Called after discovery + indexing at session start.
    pub fn set_rules_index(&mut self, index: RulesIndex) {
        self.rules_index = Some(index);
        self.dynamic_content_dirty = true;
    }

    /// Get a reference to the rules index (if set).
    #[must_use]
    pub fn rules_index(&self) -> Option<&RulesIndex> {
        self.rules_index.as_ref()
    }

    /// Record that a file path was touched by the agent.
    ///
    /// Checks scoped rules for activation. Returns `true` if new scoped
    /// rules were activated.
    pub fn touch_path(&mut self, relative_path: &str) -> bool {
        !self.touch_path_activations(relative_path).is_empty()
    }

    /// Record that a file path was touched, returning the newly activated rules.
    ///
    /// Same matching logic as [`Self::touch_path`], but returns the actual
    /// rule files that were newly activated rather than just a flag.
    pub fn touch_path_activations(&mut self, relative_path: &str) -> Vec<DiscoveredRulesFile> {
        let Some(index) = &self.rules_index else {
            return Vec::new();
        };

        let _ = self.touched_paths.insert(relative_path.to_owned());

        let matched = index.match_path(relative_path);
        let mut newly_activated = Vec::new();

        for rule in matched {
            if !self.activated_keys.contains(&rule.relative_path) {
                let _ = self.activated_keys
                    .insert(rule.relative_path.clone());
                self.activated_scoped_rules
                    .push((rule.relative_path.clone(), rule.clone()));
                newly_activated.push(rule.clone());
            }
        }

        if !newly_activated.is_empty() {
            self.dynamic_content_dirty = true;
        }

        newly_activated
    }

    /// Build the merged dynamic rules content string.
    ///
    /// Includes global rules (always) and activated scoped rules.
    /// Returns `None` if no index is set or no rules to include.
    ///
    /// Content is cached until new activations occur.
    #[must_use]
    pub fn build_dynamic_rules_content(&mut self) -> Option<&str> {
        let index = self.rules_index.as_ref()?;

        let global_rules = index.get_global_rules();
        let activated_count = self.activated_scoped_rules.len();

        if global_rules.is_empty() && activated_count == 0 {
            return None;
        }

        if !self.dynamic_content_dirty {
            return self.dynamic_content.as_deref();
        }

        let mut sections = Vec::new();

        // Global rules first, sorted by relative_path for determinism
        let mut sorted_globals: Vec<_> = global_rules;
        sorted_globals.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        for rule in &sorted_globals {
            sections.push(format!(
                "<!-- Rule: {} -->\n{}",
                rule.relative_path,
                rule.content.trim()
            ));
        }

        // Scoped rules in activation order
        for (_, rule) in &self.activated_scoped_rules {
            sections.push(format!(
                "<!-- Rule: {} (activated) -->\n{}",
                rule.relative_path,
                rule.content.trim()
            ));
        }

        self.dynamic_content = Some(sections.join("\n\n"));
        self.dynamic_content_dirty = false;

        self.dynamic_content.as_deref()
    }

    /// Get all activated scoped rules.
    #[must_use]
    pub fn activated_rules(&self) -> Vec<&DiscoveredRulesFile> {
        self.activated_scoped_rules
            .iter()
            .map(|(_, rule)| rule)
            .collect()
    }

    /// Get global rules from the index (if set).
    #[must_use]
    pub fn global_rules_from_index(&self) -> Vec<&DiscoveredRulesFile> {
        self.rules_index
            .as_ref()
            .map(|idx| idx.get_global_rules())
            .unwrap_or_default()
    }

    /// Get the set of all touched file paths.
    #[must_use]
    pub fn touched_paths(&self) -> &HashSet<String> {
        &self.touched_paths
    }

    /// Get count of activated scoped rules.
    #[must_use]
    pub fn activated_scoped_rules_count(&self) -> usize {
        self.activated_scoped_rules.len()
    }

    /// Pre-activate a rule by its relative path (for session reconstruction).
    ///
    /// Looks up the rule in the index and activates it without a file path
    /// touch. Returns `true` if the rule was newly activated.
    pub fn pre_activate(&mut self, rule_relative_path: &str) -> bool {
        let Some(index) = &self.rules_index else {
            return false;
        };
        let Some(rule) = index.find_by_relative_path(rule_relative_path).cloned() else {
            return false;
        };
        if self.activated_keys.insert(rule.relative_path.clone()) {
            self.activated_scoped_rules
                .push((rule.relative_path.clone(), rule));
            self.dynamic_content_dirty = true;
            true
        } else {
            false
        }
    }

    /// Clear dynamic activation state (for compaction boundary).
    ///
    /// Resets touched paths and activated rules but preserves the index.
    pub fn clear_dynamic_state(&mut self) {
        self.touched_paths.clear();
        self.activated_scoped_rules.clear();
        self.activated_keys.clear();
        self.dynamic_content = None;
        self.dynamic_content_dirty = true;
    }

    // ── Event sourcing ───────────────────────────────────────────────────

    /// Reconstruct rules state from event history.
    ///
    /// Scans for `rules.loaded` events and extracts their payload.
    /// Rules are loaded once per session and are immutable, so we just
    /// look for the most recent `rules.loaded` event.
    #[must_use]
    pub fn from_events(events: &[RulesTrackingEvent]) -> Self {
        let mut tracker = Self::new();

        for event in events {
            if event.event_type == "rules.loaded" {
                if let Ok(files) =
                    serde_json::from_value::<Vec<RulesFileInfo>>(
                        event.payload.get("files").cloned().unwrap_or_default(),
                    )
                {
                    let merged_tokens = event
                        .payload
                        .get("mergedTokens")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(0);

                    #[allow(clippy::cast_possible_truncation)]
                    tracker.set_rules(
                        files,
                        merged_tokens as u32,
                        event.id.clone(),
                        None,
                    );
                }
            }
        }

        tracker
    }
}

impl Default for RulesTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts of rules files by level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    /// Global-level rules.
    pub global: usize,
    /// Project-level rules.
    pub project: usize,
    /// Directory-level rules.
    pub directory: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
