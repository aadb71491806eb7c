//! Subagent role classification and task grouping.
//!
//! Subagent-driven development dispatches an implementer, a spec reviewer
//! and a code reviewer per numbered plan task. The only link between them
//! is free text, so grouping works off the dispatch description.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::subagent::SubagentEvent;

/// What a subagent was dispatched to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Implementer,
    SpecReviewer,
    CodeReviewer,
    Explorer,
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Implementer => "implementer",
            Role::SpecReviewer => "spec-reviewer",
            Role::CodeReviewer => "code-reviewer",
            Role::Explorer => "explorer",
            Role::Other => "other",
        }
    }

    /// Short label used in task group rows
    pub fn label(&self) -> &'static str {
        match self {
            Role::Implementer => "implement",
            Role::SpecReviewer => "spec-review",
            Role::CodeReviewer => "quality",
            Role::Explorer => "explore",
            Role::Other => "agent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles every task is expected to pass through, in order
pub const EXPECTED_ROLES: [Role; 3] = [Role::Implementer, Role::SpecReviewer, Role::CodeReviewer];

/// Predicate over (lowercased description, declared subagent type)
type RoleRule = (fn(&str, &str) -> bool, Role);

fn is_implementer(description: &str, _subagent_type: &str) -> bool {
    description.starts_with("implement task")
}

fn is_spec_reviewer(description: &str, _subagent_type: &str) -> bool {
    description.contains("spec compliance")
}

fn is_code_reviewer(description: &str, subagent_type: &str) -> bool {
    subagent_type.contains("code-reviewer") || description.contains("code review")
}

fn is_explorer(_description: &str, subagent_type: &str) -> bool {
    subagent_type == "Explore"
}

/// Evaluated top to bottom, first match wins
const ROLE_RULES: [RoleRule; 4] = [
    (is_implementer, Role::Implementer),
    (is_spec_reviewer, Role::SpecReviewer),
    (is_code_reviewer, Role::CodeReviewer),
    (is_explorer, Role::Explorer),
];

/// Classify a subagent's role from its description and declared type
pub fn classify_role(description: &str, subagent_type: &str) -> Role {
    let description = description.to_lowercase();
    ROLE_RULES
        .iter()
        .find(|(matches, _)| matches(&description, subagent_type))
        .map(|(_, role)| *role)
        .unwrap_or(Role::Other)
}

fn task_number_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i:task) (\d+)").ok()).as_ref()
}

fn task_label_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i:task) \d+:(.*)").ok()).as_ref()
}

/// Extract the plan task number from a description ("Implement Task 3: ..." -> 3)
pub fn extract_task_number(description: &str) -> Option<u32> {
    task_number_regex()?
        .captures(description)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Human label for a task group: the text after "Task N:", or the whole description
pub fn extract_task_label(description: &str) -> String {
    task_label_regex()
        .and_then(|re| re.captures(description))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|label| !label.is_empty())
        .unwrap_or(description)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubagentStatus {
    Complete,
    Running,
    /// Placeholder for an expected role that has not been dispatched yet
    Pending,
}

impl SubagentStatus {
    pub fn from_total_tokens(total_tokens: u64) -> Self {
        if total_tokens > 0 {
            SubagentStatus::Complete
        } else {
            SubagentStatus::Running
        }
    }
}

/// Flattened subagent fields the grouping and timeline work from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubagentRecord {
    pub timestamp: String,
    pub description: String,
    pub subagent_type: String,
    pub model: String,
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub skills_invoked: Vec<String>,
    pub tool_counts: Vec<(String, u64)>,
}

impl From<&SubagentEvent> for SubagentRecord {
    fn from(event: &SubagentEvent) -> Self {
        let mut record = SubagentRecord {
            timestamp: event.timestamp.clone(),
            description: event.description.clone(),
            subagent_type: event.subagent_type.clone(),
            model: event.model.clone(),
            ..Default::default()
        };

        if let Some(detail) = &event.detail {
            record.total_tokens = detail.tokens.total();
            record.input_tokens = detail.tokens.input;
            record.output_tokens = detail.tokens.output;
            record.cost = detail.cost;
            record.skills_invoked = detail.skills_invoked.clone();
            record.tool_counts = detail.top_tools(usize::MAX);
        }

        record
    }
}

/// A subagent record annotated with its role and status
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedSubagent {
    pub record: SubagentRecord,
    pub role: Role,
    pub status: SubagentStatus,
}

impl GroupedSubagent {
    pub fn classify(record: SubagentRecord) -> Self {
        let role = classify_role(&record.description, &record.subagent_type);
        let status = SubagentStatus::from_total_tokens(record.total_tokens);
        Self {
            record,
            role,
            status,
        }
    }
}

/// One displayed row of a task group; `member` is `None` for a pending placeholder
#[derive(Debug, Clone, Copy)]
pub struct TaskRow<'a> {
    pub role: Role,
    pub member: Option<&'a GroupedSubagent>,
}

impl TaskRow<'_> {
    pub fn status(&self) -> SubagentStatus {
        self.member
            .map(|m| m.status)
            .unwrap_or(SubagentStatus::Pending)
    }

    pub fn total_tokens(&self) -> u64 {
        self.member.map(|m| m.record.total_tokens).unwrap_or(0)
    }

    pub fn cost(&self) -> f64 {
        self.member.map(|m| m.record.cost).unwrap_or(0.0)
    }
}

/// Subagents believed to be working the same numbered task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    pub task_number: u32,
    pub label: String,
    pub members: Vec<GroupedSubagent>,
}

impl TaskGroup {
    /// Sum of member costs, computed on every call
    pub fn total_cost(&self) -> f64 {
        self.members.iter().map(|m| m.record.cost).sum()
    }

    /// Members in arrival order, followed by placeholders for expected roles not seen yet
    pub fn rows(&self) -> Vec<TaskRow<'_>> {
        let mut rows: Vec<TaskRow<'_>> = self
            .members
            .iter()
            .map(|member| TaskRow {
                role: member.role,
                member: Some(member),
            })
            .collect();

        for role in EXPECTED_ROLES {
            if !self.members.iter().any(|m| m.role == role) {
                rows.push(TaskRow { role, member: None });
            }
        }

        rows
    }
}

/// Output of [`build_task_groups`]
#[derive(Debug, Clone, Default)]
pub struct TaskGrouping {
    /// Keyed (and so ordered) by task number
    pub groups: BTreeMap<u32, TaskGroup>,
    /// Subagents with no task number, in arrival order
    pub ungrouped: Vec<GroupedSubagent>,
}

/// Group subagent records by the task number in their description
pub fn build_task_groups<I>(records: I) -> TaskGrouping
where
    I: IntoIterator<Item = SubagentRecord>,
{
    let mut grouping = TaskGrouping::default();

    for record in records {
        let task_number = extract_task_number(&record.description);
        let grouped = GroupedSubagent::classify(record);

        match task_number {
            Some(number) => {
                grouping
                    .groups
                    .entry(number)
                    .or_insert_with(|| TaskGroup {
                        task_number: number,
                        label: extract_task_label(&grouped.record.description),
                        members: Vec::new(),
                    })
                    .members
                    .push(grouped);
            }
            None => grouping.ungrouped.push(grouped),
        }
    }

    grouping
}
