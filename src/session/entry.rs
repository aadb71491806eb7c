//! Typed view of one session log line.
//!
//! Claude Code writes one JSON object per line, discriminated by `type`
//! (and for `system` entries by `subtype`). Every field the dashboard reads
//! is defaulted so a partial shape still decodes; anything that fails to
//! decode at all is dropped by [`parse_entry`].

use serde::Deserialize;
use serde_json::Value;

use super::pricing::TokenCounts;

/// Tool that loads a named skill into the conversation
pub const SKILL_TOOL: &str = "Skill";
/// Tool that dispatches work to a subagent
pub const TASK_TOOL: &str = "Task";

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Entry {
    #[serde(rename = "assistant")]
    Assistant(AssistantEntry),
    #[serde(rename = "user")]
    User(UserEntry),
    #[serde(rename = "system")]
    System(SystemEntry),
    #[serde(rename = "progress")]
    Progress(ProgressEntry),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssistantEntry {
    #[serde(default)]
    pub message: Message,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserEntry {
    #[serde(default, rename = "isMeta")]
    pub is_meta: Option<bool>,
    #[serde(default)]
    pub message: Message,
    #[serde(default)]
    pub timestamp: String,
}

impl UserEntry {
    pub fn is_meta(&self) -> bool {
        self.is_meta.unwrap_or(false)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// `message.content` is plain text for typed prompts and a block list otherwise
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse(ToolUse),
    #[serde(rename = "tool_result")]
    ToolResult(ToolResult),
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolUse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

/// Input of a `Skill` tool call
#[derive(Debug, Default, Deserialize)]
pub struct SkillInput {
    #[serde(default)]
    pub skill: String,
    #[serde(default)]
    pub args: String,
}

impl SkillInput {
    /// Skill name without its plugin namespace ("superpowers:brainstorming" -> "brainstorming")
    pub fn short_name(&self) -> &str {
        self.skill
            .rsplit_once(':')
            .map(|(_, name)| name)
            .unwrap_or(&self.skill)
    }
}

/// Input of a `Task` tool call
#[derive(Debug, Default, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subagent_type: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl ToolUse {
    pub fn skill_input(&self) -> SkillInput {
        serde_json::from_value(self.input.clone()).unwrap_or_default()
    }

    pub fn task_input(&self) -> TaskInput {
        serde_json::from_value(self.input.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub tool_use_id: String,
    #[serde(default)]
    pub content: Option<ToolResultContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Parts(Vec<ToolResultPart>),
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolResultPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl ToolResult {
    /// Result text, with list fragments joined by newlines
    pub fn text(&self) -> String {
        match &self.content {
            Some(ToolResultContent::Text(text)) => text.clone(),
            Some(ToolResultContent::Parts(parts)) => parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl From<&Usage> for TokenCounts {
    fn from(usage: &Usage) -> Self {
        TokenCounts {
            input: usage.input_tokens,
            output: usage.output_tokens,
            cache_read: usage.cache_read_input_tokens,
            cache_write: usage.cache_creation_input_tokens,
        }
    }
}

impl Message {
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            Some(MessageContent::Blocks(blocks)) => blocks,
            _ => &[],
        }
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.blocks().iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.blocks().iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    pub fn token_counts(&self) -> TokenCounts {
        self.usage.as_ref().map(TokenCounts::from).unwrap_or_default()
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "subtype")]
pub enum SystemEntry {
    #[serde(rename = "compact_boundary")]
    CompactBoundary(CompactBoundary),
    #[serde(rename = "microcompact_boundary")]
    MicrocompactBoundary(MicrocompactBoundary),
    #[serde(rename = "local_command")]
    LocalCommand(LocalCommand),
    #[serde(rename = "turn_duration")]
    TurnDuration(TurnDuration),
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CompactMetadata {
    #[serde(default, rename = "preTokens")]
    pub pre_tokens: u64,
    #[serde(default)]
    pub trigger: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompactBoundary {
    #[serde(default, rename = "compactMetadata")]
    pub metadata: CompactMetadata,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MicrocompactBoundary {
    #[serde(default, rename = "microcompactMetadata")]
    pub metadata: CompactMetadata,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalCommand {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

impl LocalCommand {
    pub fn is_clear(&self) -> bool {
        self.content.contains("<command-name>/clear</command-name>")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TurnDuration {
    #[serde(default, rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressEntry {
    #[serde(default)]
    pub data: Option<ProgressData>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressData {
    #[serde(rename = "hook_progress")]
    HookProgress(HookProgress),
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
pub struct HookProgress {
    #[serde(default, rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(default, rename = "hookType")]
    pub hook_type: String,
}

/// Decode one log line. Blank, truncated or unrecognizable lines yield `None`.
pub fn parse_entry(line: &str) -> Option<Entry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<Entry>(line) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::trace!(error = %e, "skipping undecodable session line");
            None
        }
    }
}
