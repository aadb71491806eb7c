//! Subagent dispatches and the transcripts they leave behind.
//!
//! A `Task` tool call records a [`SubagentEvent`] straight away. Once the
//! tool result names the agent (`agentId: <hex>`) and the agent's own
//! transcript appears under `<project>/<session>/subagents/`, the resolver
//! replays that transcript into a [`SubagentDetail`] and attaches it.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::entry::{parse_entry, Entry, SystemEntry, ToolUse, SKILL_TOOL};
use super::grouping::Role;
use super::pricing::{resolve_model, PricingTable, TokenCounts};
use super::session_parser::SessionParser;

/// Model recorded when a dispatch does not request one
pub const INHERIT_MODEL: &str = "inherit";

const SUBAGENTS_DIR: &str = "subagents";
const AGENT_FILE_PREFIX: &str = "agent-";

/// Metrics recovered from a subagent's own transcript
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubagentDetail {
    pub agent_id: String,
    /// Skill short names in invocation order
    pub skills_invoked: Vec<String>,
    pub tool_counts: BTreeMap<String, u64>,
    pub tokens: TokenCounts,
    pub duration_ms: u64,
    /// Zero until [`SubagentDetail::fill_cost`] runs
    pub cost: f64,
}

impl SubagentDetail {
    /// Price the detail at `model` unless a non-zero cost is already stored.
    ///
    /// A stored cost of exactly zero counts as not yet computed.
    pub fn fill_cost(&mut self, model: &str, pricing: &PricingTable) {
        if self.cost == 0.0 {
            self.cost = self.tokens.cost(resolve_model(model), pricing);
        }
    }

    /// Tool counts sorted by count (descending), then name, at most `limit` entries
    pub fn top_tools(&self, limit: usize) -> Vec<(String, u64)> {
        let mut tools: Vec<(String, u64)> = self
            .tool_counts
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        tools.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tools.truncate(limit);
        tools
    }
}

/// A dispatch of delegated work to a subagent
#[derive(Debug, Clone, PartialEq)]
pub struct SubagentEvent {
    pub timestamp: String,
    pub description: String,
    pub subagent_type: String,
    /// Requested model, or [`INHERIT_MODEL`]
    pub model: String,
    /// Id of the dispatching tool call
    pub tool_use_id: String,
    pub detail: Option<SubagentDetail>,
    pub role: Option<Role>,
}

impl SubagentEvent {
    pub fn from_dispatch(tool_use: &ToolUse, timestamp: &str) -> Self {
        let input = tool_use.task_input();
        Self {
            timestamp: timestamp.to_string(),
            description: input.description,
            subagent_type: input.subagent_type,
            model: input
                .model
                .filter(|model| !model.is_empty())
                .unwrap_or_else(|| INHERIT_MODEL.to_string()),
            tool_use_id: tool_use.id.clone(),
            detail: None,
            role: None,
        }
    }

    pub fn attach_detail(&mut self, detail: SubagentDetail) {
        tracing::debug!(
            agent_id = %detail.agent_id,
            description = %self.description,
            "attached subagent transcript"
        );
        self.detail = Some(detail);
    }

    /// Total tokens from the resolved transcript, zero while unresolved
    pub fn total_tokens(&self) -> u64 {
        self.detail.as_ref().map(|d| d.tokens.total()).unwrap_or(0)
    }

    pub fn cost(&self) -> f64 {
        self.detail.as_ref().map(|d| d.cost).unwrap_or(0.0)
    }
}

fn agent_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"agentId: ([0-9a-fA-F]+)").ok()).as_ref()
}

/// Pull the subagent id out of a Task tool result
pub fn extract_agent_id(text: &str) -> Option<String> {
    agent_id_regex()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Replay a subagent transcript, summing everything flatly
pub fn parse_subagent_transcript(path: &Path) -> Result<SubagentDetail> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read subagent transcript {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let mut detail = SubagentDetail {
        agent_id: stem.strip_prefix(AGENT_FILE_PREFIX).unwrap_or(stem).to_string(),
        ..Default::default()
    };

    for entry in content.lines().filter_map(parse_entry) {
        match entry {
            Entry::Assistant(assistant) => {
                detail.tokens.add(&assistant.message.token_counts());
                for tool_use in assistant.message.tool_uses() {
                    *detail.tool_counts.entry(tool_use.name.clone()).or_insert(0) += 1;
                    if tool_use.name == SKILL_TOOL {
                        detail
                            .skills_invoked
                            .push(tool_use.skill_input().short_name().to_string());
                    }
                }
            }
            Entry::System(SystemEntry::TurnDuration(turn)) => {
                detail.duration_ms = detail.duration_ms.saturating_add(turn.duration_ms);
            }
            _ => {}
        }
    }

    Ok(detail)
}

/// `<project_dir>/<session_id>/subagents/agent-<agent_id>.jsonl`, if it exists
pub fn find_subagent_file(project_dir: &Path, session_id: &str, agent_id: &str) -> Option<PathBuf> {
    let path = project_dir
        .join(session_id)
        .join(SUBAGENTS_DIR)
        .join(format!("{AGENT_FILE_PREFIX}{agent_id}.jsonl"));
    path.is_file().then_some(path)
}

/// Attaches transcript details to the subagents of one session
#[derive(Debug, Clone)]
pub struct SubagentResolver {
    project_dir: PathBuf,
    session_id: String,
}

impl SubagentResolver {
    pub fn new(project_dir: PathBuf, session_id: String) -> Self {
        Self {
            project_dir,
            session_id,
        }
    }

    /// Resolver for the session stored at `session_path` (`<project_dir>/<session_id>.jsonl`)
    pub fn for_session(session_path: &Path) -> Option<Self> {
        let project_dir = session_path.parent()?.to_path_buf();
        let session_id = session_path.file_stem()?.to_str()?.to_string();
        Some(Self::new(project_dir, session_id))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Attach details to every subagent whose transcript has become available,
    /// then price any detail still at zero cost. Returns how many details were attached.
    pub fn resolve(&self, parser: &mut SessionParser, pricing: &PricingTable) -> usize {
        let (subagents, agent_ids) = parser.subagents_and_agent_ids();
        let mut attached = 0;

        for subagent in subagents.iter_mut() {
            if subagent.detail.is_none() {
                let Some(agent_id) = agent_ids.get(&subagent.tool_use_id) else {
                    continue;
                };
                let Some(path) = find_subagent_file(&self.project_dir, &self.session_id, agent_id)
                else {
                    continue;
                };
                match parse_subagent_transcript(&path) {
                    Ok(detail) => {
                        subagent.attach_detail(detail);
                        attached += 1;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable subagent transcript");
                        continue;
                    }
                }
            }

            if let Some(detail) = subagent.detail.as_mut() {
                detail.fill_cost(&subagent.model, pricing);
            }
        }

        attached
    }
}
