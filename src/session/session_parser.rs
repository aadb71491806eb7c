use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::entry::{
    parse_entry, AssistantEntry, Entry, ProgressData, ProgressEntry, SystemEntry, ToolUse,
    UserEntry, SKILL_TOOL, TASK_TOOL,
};
use super::grouping::classify_role;
use super::pricing::{TokenCounts, DEFAULT_MODEL};
use super::subagent::{extract_agent_id, SubagentEvent};

/// One confirmed skill invocation and everything attributed to it while active
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillEvent {
    pub skill_name: String,
    pub args: String,
    pub timestamp: String,
    pub tokens: TokenCounts,
    /// Models seen while active, in first-seen order
    pub models: Vec<String>,
    pub duration_ms: u64,
}

impl SkillEvent {
    fn record_model(&mut self, model: &str) {
        if !model.is_empty() && !self.models.iter().any(|m| m == model) {
            self.models.push(model.to_string());
        }
    }

    /// Model the skill is priced at: the first one seen
    pub fn primary_model(&self) -> &str {
        self.models
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// A contiguous span of work with no active skill
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverheadSegment {
    pub timestamp: String,
    pub tokens: TokenCounts,
    pub duration_ms: u64,
    pub tool_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionKind {
    Compaction,
    Microcompaction,
    Clear,
}

impl CompactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompactionKind::Compaction => "compaction",
            CompactionKind::Microcompaction => "microcompaction",
            CompactionKind::Clear => "clear",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompactionEvent {
    pub timestamp: String,
    pub pre_tokens: u64,
    pub trigger: String,
    pub kind: CompactionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEvent {
    pub event: String,
    pub hook_type: String,
    pub timestamp: String,
}

/// Skill tool call waiting for the meta user turn that confirms it
#[derive(Debug, Clone)]
struct PendingSkill {
    skill_name: String,
    args: String,
    timestamp: String,
    tool_use_id: String,
    tokens: TokenCounts,
    model: String,
}

impl PendingSkill {
    fn from_tool_use(tool_use: &ToolUse, timestamp: &str, tokens: TokenCounts, model: &str) -> Self {
        let input = tool_use.skill_input();
        Self {
            skill_name: input.short_name().to_string(),
            args: input.args.clone(),
            timestamp: timestamp.to_string(),
            tool_use_id: tool_use.id.clone(),
            tokens,
            model: model.to_string(),
        }
    }

    fn into_event(self) -> SkillEvent {
        let mut event = SkillEvent {
            skill_name: self.skill_name,
            args: self.args,
            timestamp: self.timestamp,
            tokens: self.tokens,
            ..Default::default()
        };
        event.record_model(&self.model);
        event
    }
}

/// Incremental reducer over one session's log lines.
///
/// Feed lines in file order with [`SessionParser::process_line`]; the parser
/// tracks which skill is active, routes token usage to that skill or to
/// overhead, and records compactions, subagent dispatches and hook activity.
/// Lines that fail to decode are ignored.
#[derive(Debug, Clone)]
pub struct SessionParser {
    skill_events: Vec<SkillEvent>,
    active_skill: Option<String>,
    used_skills: BTreeSet<String>,
    overhead_tokens: TokenCounts,
    overhead_duration_ms: u64,
    overhead_segments: Vec<OverheadSegment>,
    current_overhead: Option<OverheadSegment>,
    tool_counts: BTreeMap<String, u64>,
    model_usage: BTreeMap<String, TokenCounts>,
    compactions: Vec<CompactionEvent>,
    subagents: Vec<SubagentEvent>,
    last_context_tokens: u64,
    agent_id_map: HashMap<String, String>,
    pending_skill: Option<PendingSkill>,
    session_count: u32,
    hook_events: Vec<HookEvent>,
}

impl Default for SessionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionParser {
    pub fn new() -> Self {
        Self {
            skill_events: Vec::new(),
            active_skill: None,
            used_skills: BTreeSet::new(),
            overhead_tokens: TokenCounts::default(),
            overhead_duration_ms: 0,
            overhead_segments: Vec::new(),
            current_overhead: None,
            tool_counts: BTreeMap::new(),
            model_usage: BTreeMap::new(),
            compactions: Vec::new(),
            subagents: Vec::new(),
            last_context_tokens: 0,
            agent_id_map: HashMap::new(),
            pending_skill: None,
            session_count: 1,
            hook_events: Vec::new(),
        }
    }

    /// Decode and apply one raw log line
    pub fn process_line(&mut self, line: &str) {
        if let Some(entry) = parse_entry(line) {
            self.process_entry(entry);
        }
    }

    pub fn process_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.process_line(line.as_ref());
        }
    }

    pub fn process_entry(&mut self, entry: Entry) {
        match entry {
            Entry::Assistant(assistant) => self.process_assistant(&assistant),
            Entry::User(user) => self.process_user(&user),
            Entry::System(system) => self.process_system(system),
            Entry::Progress(progress) => self.process_progress(progress),
            Entry::Unknown => {}
        }
    }

    fn process_assistant(&mut self, entry: &AssistantEntry) {
        let message = &entry.message;
        let tokens = message.token_counts();
        let model = message.model();

        if !model.is_empty() && tokens.has_usage() {
            self.model_usage
                .entry(model.to_string())
                .or_default()
                .add(&tokens);
        }

        let context = tokens.context_size();
        if context > 0 {
            self.last_context_tokens = context;
        }

        let mut tool_count = 0;
        let mut staged = false;
        for tool_use in message.tool_uses() {
            tool_count += 1;
            *self.tool_counts.entry(tool_use.name.clone()).or_insert(0) += 1;

            match tool_use.name.as_str() {
                SKILL_TOOL if !staged => {
                    let pending =
                        PendingSkill::from_tool_use(tool_use, &entry.timestamp, tokens, model);
                    tracing::debug!(
                        skill = %pending.skill_name,
                        tool_use_id = %pending.tool_use_id,
                        "staged skill invocation"
                    );
                    self.pending_skill = Some(pending);
                    staged = true;
                }
                TASK_TOOL => {
                    self.subagents
                        .push(SubagentEvent::from_dispatch(tool_use, &entry.timestamp));
                }
                _ => {}
            }
        }

        // the staged skill carries this turn's usage once confirmed
        if staged {
            return;
        }

        if self.active_skill.is_none() && (tool_count > 0 || tokens.has_usage()) {
            self.open_overhead(&entry.timestamp).tool_count += tool_count;
        }

        match self.active_event_mut() {
            Some(event) => {
                event.tokens.add(&tokens);
                event.record_model(model);
            }
            None => {
                self.overhead_tokens.add(&tokens);
                if let Some(segment) = self.current_overhead.as_mut() {
                    segment.tokens.add(&tokens);
                }
            }
        }
    }

    fn process_user(&mut self, entry: &UserEntry) {
        for result in entry.message.tool_results() {
            if let Some(agent_id) = extract_agent_id(&result.text()) {
                self.agent_id_map
                    .insert(result.tool_use_id.clone(), agent_id);
            }
        }

        if entry.is_meta() {
            if let Some(pending) = self.pending_skill.take() {
                self.confirm_skill(pending);
            }
        }
    }

    fn confirm_skill(&mut self, pending: PendingSkill) {
        if let Some(segment) = self.current_overhead.take() {
            self.overhead_segments.push(segment);
        }
        if let Some(previous) = self.active_skill.take() {
            self.used_skills.insert(previous);
        }

        tracing::debug!(skill = %pending.skill_name, "skill confirmed");
        self.active_skill = Some(pending.skill_name.clone());
        self.skill_events.push(pending.into_event());
    }

    fn process_system(&mut self, entry: SystemEntry) {
        match entry {
            SystemEntry::CompactBoundary(boundary) => self.compactions.push(CompactionEvent {
                timestamp: boundary.timestamp,
                pre_tokens: boundary.metadata.pre_tokens,
                trigger: boundary.metadata.trigger,
                kind: CompactionKind::Compaction,
            }),
            SystemEntry::MicrocompactBoundary(boundary) => {
                self.compactions.push(CompactionEvent {
                    timestamp: boundary.timestamp,
                    pre_tokens: boundary.metadata.pre_tokens,
                    trigger: boundary.metadata.trigger,
                    kind: CompactionKind::Microcompaction,
                })
            }
            SystemEntry::LocalCommand(command) if command.is_clear() => {
                self.compactions.push(CompactionEvent {
                    timestamp: command.timestamp,
                    pre_tokens: 0,
                    trigger: "manual".to_string(),
                    kind: CompactionKind::Clear,
                })
            }
            SystemEntry::TurnDuration(turn) => match self.active_event_mut() {
                Some(event) => {
                    event.duration_ms = event.duration_ms.saturating_add(turn.duration_ms);
                }
                None => {
                    self.overhead_duration_ms =
                        self.overhead_duration_ms.saturating_add(turn.duration_ms);
                    let segment = self.open_overhead(&turn.timestamp);
                    segment.duration_ms = segment.duration_ms.saturating_add(turn.duration_ms);
                }
            },
            SystemEntry::LocalCommand(_) | SystemEntry::Other => {}
        }
    }

    fn process_progress(&mut self, entry: ProgressEntry) {
        if let Some(ProgressData::HookProgress(hook)) = entry.data {
            self.hook_events.push(HookEvent {
                event: hook.hook_event_name,
                hook_type: hook.hook_type,
                timestamp: entry.timestamp,
            });
        }
    }

    fn open_overhead(&mut self, timestamp: &str) -> &mut OverheadSegment {
        self.current_overhead.get_or_insert_with(|| OverheadSegment {
            timestamp: timestamp.to_string(),
            ..Default::default()
        })
    }

    fn active_event_mut(&mut self) -> Option<&mut SkillEvent> {
        if self.active_skill.is_some() {
            self.skill_events.last_mut()
        } else {
            None
        }
    }

    /// The SkillEvent currently receiving usage, if a skill is active
    pub fn active_event(&self) -> Option<&SkillEvent> {
        self.active_skill.as_ref().and(self.skill_events.last())
    }

    /// Count a newer session file of the same project being replayed into this parser
    pub fn begin_new_session(&mut self) {
        self.session_count += 1;
        tracing::info!(session_count = self.session_count, "new session started");
    }

    /// Classify every subagent dispatch into a role
    pub fn assign_roles(&mut self) {
        for subagent in &mut self.subagents {
            subagent.role = Some(classify_role(&subagent.description, &subagent.subagent_type));
        }
    }

    /// Subagents for in-place enrichment, alongside the correlation map that locates them
    pub(crate) fn subagents_and_agent_ids(
        &mut self,
    ) -> (&mut [SubagentEvent], &HashMap<String, String>) {
        (&mut self.subagents, &self.agent_id_map)
    }

    pub fn skill_events(&self) -> &[SkillEvent] {
        &self.skill_events
    }

    pub fn active_skill(&self) -> Option<&str> {
        self.active_skill.as_deref()
    }

    pub fn used_skills(&self) -> &BTreeSet<String> {
        &self.used_skills
    }

    pub fn overhead_tokens(&self) -> TokenCounts {
        self.overhead_tokens
    }

    pub fn overhead_duration_ms(&self) -> u64 {
        self.overhead_duration_ms
    }

    /// Finalized overhead segments, oldest first
    pub fn overhead_segments(&self) -> &[OverheadSegment] {
        &self.overhead_segments
    }

    /// The overhead segment still accumulating, if any
    pub fn current_overhead(&self) -> Option<&OverheadSegment> {
        self.current_overhead.as_ref()
    }

    pub fn tool_counts(&self) -> &BTreeMap<String, u64> {
        &self.tool_counts
    }

    pub fn model_usage(&self) -> &BTreeMap<String, TokenCounts> {
        &self.model_usage
    }

    pub fn compactions(&self) -> &[CompactionEvent] {
        &self.compactions
    }

    pub fn subagents(&self) -> &[SubagentEvent] {
        &self.subagents
    }

    pub fn last_context_tokens(&self) -> u64 {
        self.last_context_tokens
    }

    pub fn agent_id_map(&self) -> &HashMap<String, String> {
        &self.agent_id_map
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn hook_events(&self) -> &[HookEvent] {
        &self.hook_events
    }

    #[cfg(test)]
    fn clear_active_skill(&mut self) {
        self.active_skill = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::grouping::Role;
    use serde_json::json;

    /// The three-line sequence Claude Code writes when a skill is invoked
    fn skill_invocation(skill: &str, args: &str, timestamp: &str, tool_use_id: &str) -> Vec<String> {
        vec![
            json!({
                "type": "assistant",
                "message": {
                    "model": "claude-opus-4-6",
                    "content": [{"type": "tool_use", "id": tool_use_id, "name": "Skill", "input": {"skill": format!("superpowers:{skill}"), "args": args}}],
                    "usage": {"input_tokens": 100, "output_tokens": 50, "cache_read_input_tokens": 200, "cache_creation_input_tokens": 0}
                },
                "timestamp": timestamp
            })
            .to_string(),
            json!({
                "type": "user",
                "message": {"role": "user", "content": [{"type": "tool_result", "tool_use_id": tool_use_id, "content": format!("Launching skill: superpowers:{skill}")}]},
                "toolUseResult": {"success": true, "commandName": format!("superpowers:{skill}")},
                "timestamp": timestamp
            })
            .to_string(),
            json!({
                "type": "user",
                "isMeta": true,
                "message": {"role": "user", "content": [{"type": "text", "text": format!("# {skill}\n\nSkill content...")}]},
                "timestamp": timestamp,
                "sourceToolUseID": tool_use_id
            })
            .to_string(),
        ]
    }

    fn invoke(parser: &mut SessionParser, skill: &str, tool_use_id: &str) {
        parser.process_lines(skill_invocation(
            skill,
            "",
            "2026-02-06T22:16:50.558Z",
            tool_use_id,
        ));
    }

    fn assistant_turn(tools: &[(&str, &str)], usage: [u64; 4], timestamp: &str) -> String {
        let content: Vec<_> = tools
            .iter()
            .map(|(id, name)| json!({"type": "tool_use", "id": id, "name": name, "input": {}}))
            .collect();
        json!({
            "type": "assistant",
            "message": {
                "model": "claude-opus-4-6",
                "content": content,
                "usage": {
                    "input_tokens": usage[0],
                    "output_tokens": usage[1],
                    "cache_read_input_tokens": usage[2],
                    "cache_creation_input_tokens": usage[3]
                }
            },
            "timestamp": timestamp
        })
        .to_string()
    }

    fn text_turn(usage: [u64; 4], timestamp: &str) -> String {
        json!({
            "type": "assistant",
            "message": {
                "model": "claude-opus-4-6",
                "content": [{"type": "text", "text": "response"}],
                "usage": {
                    "input_tokens": usage[0],
                    "output_tokens": usage[1],
                    "cache_read_input_tokens": usage[2],
                    "cache_creation_input_tokens": usage[3]
                }
            },
            "timestamp": timestamp
        })
        .to_string()
    }

    fn turn_duration(ms: u64, timestamp: &str) -> String {
        json!({"type": "system", "subtype": "turn_duration", "durationMs": ms, "timestamp": timestamp})
            .to_string()
    }

    #[test]
    fn test_detects_skill_invocation() {
        let mut parser = SessionParser::new();
        parser.process_lines(skill_invocation(
            "brainstorming",
            "test idea",
            "2026-02-06T22:16:50.558Z",
            "toolu_abc",
        ));

        assert_eq!(parser.skill_events().len(), 1);
        let event = &parser.skill_events()[0];
        assert_eq!(event.skill_name, "brainstorming");
        assert_eq!(event.args, "test idea");
        assert_eq!(event.models, vec!["claude-opus-4-6".to_string()]);
        assert!(event.start_time().is_some());
        assert_eq!(parser.active_skill(), Some("brainstorming"));
    }

    #[test]
    fn test_transitions_active_to_used() {
        let mut parser = SessionParser::new();
        invoke(&mut parser, "brainstorming", "t1");
        invoke(&mut parser, "writing-plans", "t2");

        assert_eq!(parser.active_skill(), Some("writing-plans"));
        assert!(parser.used_skills().contains("brainstorming"));
        assert_eq!(
            parser.active_event().map(|e| e.skill_name.as_str()),
            Some("writing-plans")
        );
    }

    #[test]
    fn test_accumulates_tokens_on_active_skill() {
        let mut parser = SessionParser::new();
        invoke(&mut parser, "brainstorming", "t1");
        parser.process_line(&text_turn([500, 200, 100, 50], "2026-02-06T22:20:00.000Z"));

        let event = &parser.skill_events()[0];
        assert_eq!(event.tokens.input, 600);
        assert_eq!(event.tokens.output, 250);
        assert_eq!(event.tokens.cache_read, 300);
        assert_eq!(event.tokens.cache_write, 50);
    }

    #[test]
    fn test_token_conservation_between_overhead_and_skill() {
        let mut parser = SessionParser::new();
        parser.process_line(&text_turn([10_000, 0, 0, 0], "2026-02-06T22:00:00.000Z"));
        invoke(&mut parser, "brainstorming", "t1");
        parser.process_line(&text_turn([500, 0, 0, 0], "2026-02-06T22:20:00.000Z"));

        assert_eq!(parser.overhead_tokens().input, 10_000);
        assert_eq!(parser.skill_events()[0].tokens.input, 600);

        let segment_input: u64 = parser.overhead_segments().iter().map(|s| s.tokens.input).sum();
        assert_eq!(segment_input, 10_000);
    }

    #[test]
    fn test_ignores_non_skill_lines() {
        let mut parser = SessionParser::new();
        parser.process_line(
            &json!({"type": "progress", "data": {"type": "hook_progress"}, "timestamp": "2026-02-06T22:00:00.000Z"})
                .to_string(),
        );
        parser.process_line("not json at all");
        parser.process_line("");
        assert!(parser.skill_events().is_empty());
        assert_eq!(parser.active_skill(), None);
    }

    #[test]
    fn test_tracks_tool_counts() {
        let mut parser = SessionParser::new();
        invoke(&mut parser, "brainstorming", "t1");
        parser.process_line(&assistant_turn(
            &[("t2", "Read")],
            [10, 5, 0, 0],
            "2026-02-06T22:20:00.000Z",
        ));

        assert_eq!(parser.tool_counts()["Skill"], 1);
        assert_eq!(parser.tool_counts()["Read"], 1);
    }

    #[test]
    fn test_detects_compactions() {
        let mut parser = SessionParser::new();
        parser.process_line(
            &json!({
                "type": "system",
                "subtype": "compact_boundary",
                "compactMetadata": {"preTokens": 169162, "trigger": "auto"},
                "timestamp": "2026-02-07T08:14:37.918Z"
            })
            .to_string(),
        );
        parser.process_line(
            &json!({
                "type": "system",
                "subtype": "microcompact_boundary",
                "microcompactMetadata": {"preTokens": 50000, "trigger": "auto"},
                "timestamp": "2026-02-07T09:00:00.000Z"
            })
            .to_string(),
        );

        let compactions = parser.compactions();
        assert_eq!(compactions.len(), 2);
        assert_eq!(compactions[0].kind, CompactionKind::Compaction);
        assert_eq!(compactions[0].pre_tokens, 169162);
        assert_eq!(compactions[0].trigger, "auto");
        assert_eq!(compactions[1].kind, CompactionKind::Microcompaction);
        assert_eq!(compactions[1].pre_tokens, 50000);
    }

    #[test]
    fn test_clear_command_is_a_compaction() {
        let mut parser = SessionParser::new();
        parser.process_line(
            &json!({
                "type": "system",
                "subtype": "local_command",
                "content": "<command-name>/clear</command-name>\n            <command-message>clear</command-message>\n            <command-args></command-args>",
                "timestamp": "2026-02-07T12:00:00.000Z"
            })
            .to_string(),
        );
        parser.process_line(
            &json!({
                "type": "system",
                "subtype": "local_command",
                "content": "<command-name>/model</command-name>\n            <command-message>model</command-message>",
                "timestamp": "2026-02-07T12:01:00.000Z"
            })
            .to_string(),
        );

        assert_eq!(parser.compactions().len(), 1);
        let clear = &parser.compactions()[0];
        assert_eq!(clear.kind, CompactionKind::Clear);
        assert_eq!(clear.kind.as_str(), "clear");
        assert_eq!(clear.pre_tokens, 0);
        assert_eq!(clear.timestamp, "2026-02-07T12:00:00.000Z");
    }

    #[test]
    fn test_tracks_subagent_dispatch() {
        let mut parser = SessionParser::new();
        parser.process_line(
            &json!({
                "type": "assistant",
                "message": {
                    "model": "claude-opus-4-6",
                    "content": [{"type": "tool_use", "id": "t1", "name": "Task", "input": {
                        "description": "Implement config module",
                        "subagent_type": "general-purpose",
                        "model": "sonnet",
                        "prompt": "Implement the config module..."
                    }}],
                    "usage": {"input_tokens": 10, "output_tokens": 5, "cache_read_input_tokens": 0, "cache_creation_input_tokens": 0}
                },
                "timestamp": "2026-02-07T06:00:00.000Z"
            })
            .to_string(),
        );

        let subagents = parser.subagents();
        assert_eq!(subagents.len(), 1);
        assert_eq!(subagents[0].description, "Implement config module");
        assert_eq!(subagents[0].model, "sonnet");
        assert_eq!(subagents[0].subagent_type, "general-purpose");
        assert_eq!(subagents[0].tool_use_id, "t1");
        assert!(subagents[0].role.is_none());
        assert!(subagents[0].detail.is_none());
    }

    #[test]
    fn test_accumulates_turn_duration_on_active_skill() {
        let mut parser = SessionParser::new();
        invoke(&mut parser, "brainstorming", "t1");
        parser.process_line(&turn_duration(30_000, "2026-02-06T22:20:00.000Z"));
        parser.process_line(&turn_duration(45_000, "2026-02-06T22:25:00.000Z"));

        assert_eq!(parser.skill_events()[0].duration_ms, 75_000);
        assert_eq!(parser.overhead_duration_ms(), 0);
    }

    #[test]
    fn test_turn_duration_before_skill_goes_to_overhead() {
        let mut parser = SessionParser::new();
        parser.process_line(&turn_duration(10_000, "2026-02-06T22:00:00.000Z"));
        invoke(&mut parser, "brainstorming", "t1");

        assert_eq!(parser.skill_events()[0].duration_ms, 0);
        assert_eq!(parser.overhead_duration_ms(), 10_000);
        assert_eq!(parser.overhead_segments().len(), 1);
        assert_eq!(parser.overhead_segments()[0].duration_ms, 10_000);
    }

    #[test]
    fn test_tracks_last_context_tokens() {
        let mut parser = SessionParser::new();
        invoke(&mut parser, "brainstorming", "t1");
        assert_eq!(parser.last_context_tokens(), 300);

        parser.process_line(&text_turn([5000, 200, 45_000, 0], "2026-02-06T22:20:00.000Z"));
        assert_eq!(parser.last_context_tokens(), 50_000);

        // zero-input turns leave the snapshot alone
        parser.process_line(&text_turn([0, 10, 0, 0], "2026-02-06T22:21:00.000Z"));
        assert_eq!(parser.last_context_tokens(), 50_000);
    }

    #[test]
    fn test_overhead_segment_before_first_skill() {
        let mut parser = SessionParser::new();
        parser.process_line(&assistant_turn(
            &[("t0a", "Read"), ("t0b", "Grep")],
            [300, 100, 50, 10],
            "2026-02-06T22:00:00.000Z",
        ));
        parser.process_line(&assistant_turn(
            &[("t0c", "Bash")],
            [200, 80, 30, 5],
            "2026-02-06T22:01:00.000Z",
        ));
        invoke(&mut parser, "brainstorming", "t1");

        assert_eq!(parser.overhead_segments().len(), 1);
        let segment = &parser.overhead_segments()[0];
        assert_eq!(segment.tokens.input, 500);
        assert_eq!(segment.tokens.output, 180);
        assert_eq!(segment.tokens.cache_read, 80);
        assert_eq!(segment.tokens.cache_write, 15);
        assert_eq!(segment.tool_count, 3);
        assert_eq!(segment.timestamp, "2026-02-06T22:00:00.000Z");

        assert_eq!(parser.overhead_tokens().input, 500);
        assert_eq!(parser.overhead_tokens().output, 180);
        assert!(parser.current_overhead().is_none());
    }

    #[test]
    fn test_overhead_segment_is_not_reopened_after_confirmation() {
        let mut parser = SessionParser::new();
        parser.process_line(&assistant_turn(
            &[("t0", "Read")],
            [300, 0, 0, 0],
            "2026-02-06T22:00:00.000Z",
        ));
        invoke(&mut parser, "brainstorming", "t1");
        parser.process_line(&assistant_turn(
            &[("t2", "Read")],
            [500, 200, 0, 0],
            "2026-02-06T22:20:00.000Z",
        ));

        assert_eq!(parser.overhead_segments().len(), 1);
        assert_eq!(parser.overhead_segments()[0].tokens.input, 300);
        assert!(parser.current_overhead().is_none());
        assert_eq!(parser.overhead_tokens().input, 300);
    }

    #[test]
    fn test_overhead_segment_between_skills() {
        let mut parser = SessionParser::new();
        parser.process_lines(skill_invocation(
            "brainstorming",
            "",
            "2026-02-06T22:00:00.000Z",
            "t1",
        ));
        parser.clear_active_skill();

        parser.process_line(&assistant_turn(
            &[("t2a", "Edit")],
            [400, 150, 0, 0],
            "2026-02-06T22:15:00.000Z",
        ));
        assert!(parser.current_overhead().is_some());

        parser.process_lines(skill_invocation(
            "writing-plans",
            "",
            "2026-02-06T22:30:00.000Z",
            "t3",
        ));

        assert_eq!(parser.overhead_segments().len(), 1);
        let segment = &parser.overhead_segments()[0];
        assert_eq!(segment.tokens.input, 400);
        assert_eq!(segment.tokens.output, 150);
        assert_eq!(segment.tool_count, 1);
        assert_eq!(segment.timestamp, "2026-02-06T22:15:00.000Z");
    }

    #[test]
    fn test_no_overhead_segment_while_skill_active() {
        let mut parser = SessionParser::new();
        invoke(&mut parser, "brainstorming", "t1");
        parser.process_line(&assistant_turn(
            &[("t2", "Read")],
            [500, 200, 0, 0],
            "2026-02-06T22:20:00.000Z",
        ));

        assert!(parser.overhead_segments().is_empty());
        assert!(parser.current_overhead().is_none());
    }

    #[test]
    fn test_unconfirmed_skill_is_dropped() {
        let mut parser = SessionParser::new();
        let lines = skill_invocation("brainstorming", "", "2026-02-06T22:00:00.000Z", "t1");
        // tool_use and tool_result, but never the meta turn
        parser.process_lines(&lines[..2]);

        assert!(parser.skill_events().is_empty());
        assert_eq!(parser.active_skill(), None);
        // the staged turn was still counted
        assert_eq!(parser.tool_counts()["Skill"], 1);
        assert_eq!(parser.last_context_tokens(), 300);
    }

    #[test]
    fn test_at_most_one_active_skill() {
        let mut parser = SessionParser::new();
        for (i, skill) in ["brainstorming", "writing-plans", "brainstorming", "executing-plans"]
            .iter()
            .enumerate()
        {
            invoke(&mut parser, skill, &format!("t{i}"));
            let active = parser.active_event().unwrap();
            assert_eq!(active.skill_name, *skill);
            assert!(std::ptr::eq(active, parser.skill_events().last().unwrap()));
        }
        assert_eq!(parser.skill_events().len(), 4);
        assert!(parser.used_skills().contains("brainstorming"));
        assert!(parser.used_skills().contains("writing-plans"));
        assert!(!parser.used_skills().contains("executing-plans"));
    }

    #[test]
    fn test_session_count_starts_at_one() {
        let mut parser = SessionParser::new();
        assert_eq!(parser.session_count(), 1);
        parser.begin_new_session();
        assert_eq!(parser.session_count(), 2);
    }

    #[test]
    fn test_extracts_agent_id_from_tool_result() {
        let mut parser = SessionParser::new();
        parser.process_line(
            &json!({
                "type": "user",
                "message": {
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": "toolu_task1",
                        "content": "agentId: a82030d (for resuming to continue this agent's work if needed)\nTask completed successfully."
                    }]
                },
                "timestamp": "2026-02-07T10:05:00.000Z"
            })
            .to_string(),
        );
        parser.process_line(
            &json!({
                "type": "user",
                "message": {
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": "toolu_task2",
                        "content": [
                            {"type": "text", "text": "Task result: success."},
                            {"type": "text", "text": "agentId: b93141e (for resuming)"}
                        ]
                    }]
                },
                "timestamp": "2026-02-07T10:10:00.000Z"
            })
            .to_string(),
        );

        let map = parser.agent_id_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["toolu_task1"], "a82030d");
        assert_eq!(map["toolu_task2"], "b93141e");
    }

    #[test]
    fn test_hook_events() {
        let mut parser = SessionParser::new();
        parser.process_line(
            &json!({
                "type": "progress",
                "data": {"type": "hook_progress", "hookEventName": "PreToolUse", "hookType": "pre_tool_use"},
                "timestamp": "2026-02-07T12:00:00.000Z"
            })
            .to_string(),
        );
        parser.process_line(
            &json!({
                "type": "progress",
                "data": {"type": "tool_progress", "toolName": "Bash"},
                "timestamp": "2026-02-07T12:00:01.000Z"
            })
            .to_string(),
        );

        assert_eq!(
            parser.hook_events(),
            &[HookEvent {
                event: "PreToolUse".into(),
                hook_type: "pre_tool_use".into(),
                timestamp: "2026-02-07T12:00:00.000Z".into(),
            }]
        );
    }

    #[test]
    fn test_oversized_usage_is_clamped() {
        let mut parser = SessionParser::new();
        let line = json!({
            "type": "assistant",
            "message": {"usage": {"input_tokens": u64::MAX, "output_tokens": 1}}
        });
        parser.process_line(&line.to_string());
        parser.process_line(&line.to_string());
        parser.process_line(
            &json!({"type": "system", "subtype": "turn_duration", "durationMs": u64::MAX}).to_string(),
        );
        parser.process_line(
            &json!({"type": "system", "subtype": "turn_duration", "durationMs": 10}).to_string(),
        );

        assert_eq!(parser.overhead_tokens().input, u64::MAX);
        assert_eq!(parser.overhead_tokens().output, 2);
        assert_eq!(parser.overhead_duration_ms(), u64::MAX);
    }

    #[test]
    fn test_model_usage_and_primary_model() {
        let mut parser = SessionParser::new();
        invoke(&mut parser, "brainstorming", "t1");
        parser.process_line(
            &json!({
                "type": "assistant",
                "message": {
                    "model": "claude-haiku-4-5-20251001",
                    "content": [],
                    "usage": {"input_tokens": 40, "output_tokens": 4}
                },
                "timestamp": "2026-02-06T22:20:00.000Z"
            })
            .to_string(),
        );

        let event = &parser.skill_events()[0];
        assert_eq!(
            event.models,
            vec![
                "claude-opus-4-6".to_string(),
                "claude-haiku-4-5-20251001".to_string()
            ]
        );
        assert_eq!(event.primary_model(), "claude-opus-4-6");
        assert_eq!(parser.model_usage()["claude-opus-4-6"].input, 100);
        assert_eq!(parser.model_usage()["claude-haiku-4-5-20251001"].input, 40);
        assert_eq!(SkillEvent::default().primary_model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_assign_roles() {
        let mut parser = SessionParser::new();
        parser.process_line(
            &json!({
                "type": "assistant",
                "message": {
                    "content": [
                        {"type": "tool_use", "id": "a", "name": "Task", "input": {"description": "Implement Task 1: Fix bug", "subagent_type": "general-purpose"}},
                        {"type": "tool_use", "id": "b", "name": "Task", "input": {"description": "Survey the repo", "subagent_type": "Explore"}}
                    ]
                },
                "timestamp": "2026-02-07T06:00:00.000Z"
            })
            .to_string(),
        );
        parser.assign_roles();

        let roles: Vec<_> = parser.subagents().iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![Some(Role::Implementer), Some(Role::Explorer)]);
        assert_eq!(parser.subagents()[0].model, "inherit");
    }
}
