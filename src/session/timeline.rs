//! Renderer-facing view of a parsed session.
//!
//! Everything here is rebuilt from the parser on every refresh; nothing is
//! cached across ticks.

use super::grouping::{build_task_groups, GroupedSubagent, SubagentRecord, TaskGroup};
use super::pricing::{model_display_name, resolve_model, PricingTable, TokenCounts, DEFAULT_MODEL};
use super::session_parser::{CompactionEvent, CompactionKind, OverheadSegment, SessionParser};

#[derive(Debug, Clone, PartialEq)]
pub struct SkillRow {
    /// 1-based position among skill rows
    pub index: usize,
    pub skill_name: String,
    pub args: String,
    pub timestamp: String,
    pub total_tokens: u64,
    pub cost: f64,
    pub duration_ms: u64,
    pub is_active: bool,
    /// Subagent task groups dispatched while this skill ran
    pub task_groups: Vec<TaskGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverheadRow {
    pub timestamp: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub duration_ms: u64,
    pub tool_count: u64,
    /// Still accumulating: no skill has been confirmed since it opened
    pub in_progress: bool,
}

impl OverheadRow {
    fn from_segment(segment: &OverheadSegment, pricing: &PricingTable, in_progress: bool) -> Self {
        Self {
            timestamp: segment.timestamp.clone(),
            input_tokens: segment.tokens.input,
            output_tokens: segment.tokens.output,
            cost: segment.tokens.cost(DEFAULT_MODEL, pricing),
            duration_ms: segment.duration_ms,
            tool_count: segment.tool_count,
            in_progress,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// `tools(N)`, or empty when no tools ran
    pub fn tool_summary(&self) -> String {
        if self.tool_count > 0 {
            format!("tools({})", self.tool_count)
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    Skill(SkillRow),
    Overhead(OverheadRow),
    Subagent(GroupedSubagent),
    Compaction(CompactionEvent),
}

impl TimelineEntry {
    pub fn timestamp(&self) -> &str {
        match self {
            TimelineEntry::Skill(row) => &row.timestamp,
            TimelineEntry::Overhead(row) => &row.timestamp,
            TimelineEntry::Subagent(subagent) => &subagent.record.timestamp,
            TimelineEntry::Compaction(compaction) => &compaction.timestamp,
        }
    }

    pub fn cost(&self) -> f64 {
        match self {
            TimelineEntry::Skill(row) => row.cost,
            TimelineEntry::Overhead(row) => row.cost,
            TimelineEntry::Subagent(subagent) => subagent.record.cost,
            TimelineEntry::Compaction(_) => 0.0,
        }
    }
}

/// Chronological workflow rows for the WORKFLOW panel
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    /// Task groups with no skill row to hang off
    pub unattached_groups: Vec<TaskGroup>,
}

impl Timeline {
    pub fn build(parser: &SessionParser, pricing: &PricingTable) -> Self {
        let mut entries = Vec::new();
        let last_index = parser.skill_events().len().saturating_sub(1);
        let active = parser.active_skill();

        for (i, event) in parser.skill_events().iter().enumerate() {
            entries.push(TimelineEntry::Skill(SkillRow {
                index: 0,
                skill_name: event.skill_name.clone(),
                args: event.args.clone(),
                timestamp: event.timestamp.clone(),
                total_tokens: event.tokens.total(),
                cost: event.tokens.cost(event.primary_model(), pricing),
                duration_ms: event.duration_ms,
                is_active: i == last_index && active == Some(event.skill_name.as_str()),
                task_groups: Vec::new(),
            }));
        }

        for segment in parser.overhead_segments() {
            entries.push(TimelineEntry::Overhead(OverheadRow::from_segment(
                segment, pricing, false,
            )));
        }
        if let Some(segment) = parser.current_overhead() {
            entries.push(TimelineEntry::Overhead(OverheadRow::from_segment(
                segment, pricing, true,
            )));
        }

        let grouping = build_task_groups(parser.subagents().iter().map(SubagentRecord::from));
        let groups: Vec<TaskGroup> = grouping.groups.into_values().collect();

        let last_skill = entries.iter_mut().rev().find_map(|entry| match entry {
            TimelineEntry::Skill(row) => Some(row),
            _ => None,
        });
        let unattached_groups = match last_skill {
            Some(row) => {
                row.task_groups = groups;
                Vec::new()
            }
            None => groups,
        };

        entries.extend(grouping.ungrouped.into_iter().map(TimelineEntry::Subagent));
        entries.extend(
            parser
                .compactions()
                .iter()
                .cloned()
                .map(TimelineEntry::Compaction),
        );

        // stable, so same-timestamp rows keep skill/overhead/subagent/compaction order
        entries.sort_by(|a, b| a.timestamp().cmp(b.timestamp()));

        let mut index = 0;
        for entry in &mut entries {
            if let TimelineEntry::Skill(row) = entry {
                index += 1;
                row.index = index;
            }
        }

        Self {
            entries,
            unattached_groups,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.unattached_groups.is_empty()
    }

    /// Largest single-row cost, the scale for cost bars
    pub fn max_cost(&self) -> f64 {
        self.entries
            .iter()
            .map(TimelineEntry::cost)
            .fold(0.0, f64::max)
    }

    pub fn skill_rows(&self) -> impl Iterator<Item = &SkillRow> {
        self.entries.iter().filter_map(|entry| match entry {
            TimelineEntry::Skill(row) => Some(row),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillCost {
    pub name: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelStat {
    /// Short display name ("opus")
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

/// Aggregates shown in the STATS panel and header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Skill costs plus overhead cost
    pub total_cost: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    /// Sorted by cost, highest first
    pub per_skill: Vec<SkillCost>,
    /// Sorted by count, highest first
    pub tool_counts: Vec<(String, u64)>,
    pub subagent_count: usize,
    /// Sum of resolved subagent transcript costs
    pub subagent_cost: f64,
    pub compaction_count: usize,
    pub clear_count: usize,
    pub context_tokens: u64,
    pub session_count: u32,
    pub skill_count: usize,
    /// Sorted by cost, highest first
    pub model_stats: Vec<ModelStat>,
}

impl SessionStats {
    pub fn collect(parser: &SessionParser, timeline: &Timeline, pricing: &PricingTable) -> Self {
        let overhead = parser.overhead_tokens();
        let mut tokens = overhead;
        for event in parser.skill_events() {
            tokens.add(&event.tokens);
        }

        let overhead_cost = overhead.cost(DEFAULT_MODEL, pricing);

        let mut per_skill: Vec<SkillCost> = Vec::new();
        for row in timeline.skill_rows() {
            match per_skill.iter_mut().find(|s| s.name == row.skill_name) {
                Some(existing) => existing.cost += row.cost,
                None => per_skill.push(SkillCost {
                    name: row.skill_name.clone(),
                    cost: row.cost,
                }),
            }
        }
        let skill_cost: f64 = per_skill.iter().map(|s| s.cost).sum();
        per_skill.sort_by(|a, b| b.cost.total_cmp(&a.cost));

        let mut tool_counts: Vec<(String, u64)> = parser
            .tool_counts()
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        tool_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut model_stats: Vec<ModelStat> = parser
            .model_usage()
            .iter()
            .map(|(model, usage)| model_stat(model, usage, pricing))
            .collect();
        model_stats.sort_by(|a, b| b.cost.total_cmp(&a.cost));

        let clear_count = parser
            .compactions()
            .iter()
            .filter(|c| c.kind == CompactionKind::Clear)
            .count();

        Self {
            total_cost: skill_cost + overhead_cost,
            input_tokens: tokens.input,
            output_tokens: tokens.output,
            cache_read_tokens: tokens.cache_read,
            per_skill,
            tool_counts,
            subagent_count: parser.subagents().len(),
            subagent_cost: parser.subagents().iter().map(|s| s.cost()).sum(),
            compaction_count: parser.compactions().len() - clear_count,
            clear_count,
            context_tokens: parser.last_context_tokens(),
            session_count: parser.session_count(),
            skill_count: parser.skill_events().len(),
            model_stats,
        }
    }
}

fn model_stat(model: &str, usage: &TokenCounts, pricing: &PricingTable) -> ModelStat {
    ModelStat {
        model: model_display_name(model).to_string(),
        input_tokens: usage.input,
        output_tokens: usage.output,
        cost: usage.cost(resolve_model(model), pricing),
    }
}
