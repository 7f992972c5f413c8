//! Skill reference extraction and context injection.
//!
//! Extracts `@skill-name` references from user prompts, builds XML context
//! blocks for skill injection, and processes prompts for the LLM.

use std::sync::LazyLock;

use regex::Regex;

use crate::registry::SkillRegistry;
use crate::types::{SkillInjectionResult, SkillInfo, SkillMetadata, SkillReference};

static SKILL_REF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z][a-zA-Z0-9_-]*)").unwrap());

static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

/// Extract `@skill-name` references from a user prompt.
///
/// Respects code blocks (triple backticks) and inline code (single backticks).
/// Email addresses like `user@example.com` are not matched (word char before `@`
/// disqualifies it).
pub fn extract_skill_references(prompt: &str) -> Vec<SkillReference> {
    let pattern = &*SKILL_REF_PATTERN;
    let mut references = Vec::new();
    let mut in_code_block = false;
    let mut global_offset = 0;

    for line in prompt.split('\n') {
        let trimmed = line.trim();

        // Track code blocks
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            global_offset += line.len() + 1; // +1 for newline
            continue;
        }

        if !in_code_block {
            for cap in pattern.captures_iter(line) {
                let full_match = cap.get(0).unwrap();
                let name = cap.get(1).unwrap().as_str();

                // Reject if preceded by a word character (catches email: user@example)
                if full_match.start() > 0 {
                    let prev_char = line.as_bytes()[full_match.start() - 1];
                    if prev_char.is_ascii_alphanumeric() || prev_char == b'_' {
                        continue;
                    }
                    // Reject if preceded by backtick
                    if prev_char == b'`' {
                        continue;
                    }
                }

                // Check if inside inline code (count backticks before match)
                let prefix = &line[..full_match.start()];
                let backtick_count = prefix.chars().filter(|&c| c == '`').count();
                if backtick_count % 2 != 0 {
                    continue; // Inside inline code
                }

                let abs_start = global_offset + full_match.start();
                let abs_end = global_offset + full_match.end();

                references.push(SkillReference {
                    original: full_match.as_str().to_string(),
                    name: name.to_string(),
                    start: abs_start,
                    end: abs_end,
                });
            }
        }

        global_offset += line.len() + 1; // +1 for newline
    }

    references
}

/// Remove `@skill-name` references from a prompt.
///
/// Collects the kept ranges between references in a single forward pass.
/// Resulting multiple spaces are collapsed.
pub fn remove_skill_references(prompt: &str, references: &[SkillReference]) -> String {
    if references.is_empty() {
        return prompt.to_string();
    }

    // Sort by position ascending to collect kept ranges in one pass
    let mut sorted_refs: Vec<&SkillReference> = references.iter().collect();
    sorted_refs.sort_by_key(|r| r.start);

    let mut result = String::with_capacity(prompt.len());
    let mut cursor = 0;

    for reference in &sorted_refs {
        if reference.start > cursor && reference.end <= prompt.len() {
            result.push_str(&prompt[cursor..reference.start]);
        }
        cursor = reference.end;
    }
    if cursor < prompt.len() {
        result.push_str(&prompt[cursor..]);
    }

    MULTI_SPACE.replace_all(&result, " ").trim().to_string()
}

/// Build a `<skills>` XML context block from skill metadata.
///
/// Returns an empty string if no skills are provided.
pub fn build_skill_context(skills: &[&SkillMetadata]) -> String {
    use std::fmt::Write;

    if skills.is_empty() {
        return String::new();
    }

    let mut xml = String::from("<skills>\n");

    for skill in skills {
        let escaped_name = escape_xml(&skill.name);
        let _ = writeln!(xml, "<skill name=\"{escaped_name}\">");

        // Add tool preferences if present
        let prefs = build_tool_preferences(skill);
        if !prefs.is_empty() {
            xml.push_str(&prefs);
            xml.push('\n');
        }

        xml.push_str(&skill.content);
        xml.push_str("\n</skill>\n\n");
    }

    xml.push_str("</skills>");
    xml
}

/// Process a user prompt for skill references.
///
/// Extracts `@skill-name` references, looks them up in the registry,
/// removes references from the prompt, and builds a `<skills>` XML block.
pub fn process_prompt_for_skills(prompt: &str, registry: &SkillRegistry) -> SkillInjectionResult {
    let references = extract_skill_references(prompt);

    if references.is_empty() {
        return SkillInjectionResult {
            original_prompt: prompt.to_string(),
            cleaned_prompt: prompt.to_string(),
            injected_skills: Vec::new(),
            not_found_skills: Vec::new(),
            skill_context: String::new(),
        };
    }

    // Deduplicate names
    let mut seen = std::collections::HashSet::new();
    let unique_names: Vec<&str> = references
        .iter()
        .filter_map(|r| {
            if seen.insert(r.name.as_str()) {
                Some(r.name.as_str())
            } else {
                None
            }
        })
        .collect();

    let (found, not_found) = registry.get_many(&unique_names);

    let cleaned = remove_skill_references(prompt, &references);
    let context = build_skill_context(&found);

    SkillInjectionResult {
        original_prompt: prompt.to_string(),
        cleaned_prompt: cleaned,
        injected_skills: found.iter().map(|s| SkillInfo::from(*s)).collect(),
        not_found_skills: not_found,
        skill_context: context,
    }
}

/// Build a message with skill context prepended.
///
/// Returns the original prompt unchanged if no skill context is present.
pub fn build_message_with_skill_context(prompt: &str, skill_context: &str) -> String {
    if skill_context.is_empty() {
        return prompt.to_string();
    }
    format!("{skill_context}\n\n{prompt}")
}

/// Build tool preference/restriction XML blocks for a skill.
fn build_tool_preferences(skill: &SkillMetadata) -> String {
    let fm = &skill.frontmatter;

    if let Some(allowed) = &fm.allowed_tools {
        if !allowed.is_empty() {
            let tools = allowed.join(", ");
            return format!(
                "<skill-tool-preferences>This skill works best with: {tools}. Prefer these tools.</skill-tool-preferences>"
            );
        }
    }

    if let Some(denied) = &fm.denied_tools {
        if !denied.is_empty() {
            let tools = denied.join(", ");
            return format!(
                "<skill-tool-restrictions>This skill must NOT use: {tools}. These tools are restricted.</skill-tool-restrictions>"
            );
        }
    }

    String::new()
}

/// Escape XML special characters.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
