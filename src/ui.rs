use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::Widget,
    Frame,
};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    app::{App, StatusType},
    features::{
        hooks::HookEntry,
        skills::{SkillRegistry, SkillState},
    },
    session::{
        grouping::{GroupedSubagent, TaskRow},
        subagent::INHERIT_MODEL,
        session_parser::{CompactionEvent, HookEvent},
        timeline::{OverheadRow, SkillRow},
        CompactionKind, SessionStats, SubagentStatus, TaskGroup, Timeline, TimelineEntry,
    },
    shared::theme::{ModernIcons, ModernTheme},
    widgets::{
        cost_bar, format_cache_ratio, format_cost, format_duration_minutes, format_thousands,
        format_tokens, index_marker, pad_right, parse_time, status_icon, truncate_args, truncate_text,
        PanelCard,
    },
};

const TIMELINE_BAR_WIDTH: usize = 14;
const SKILL_BAR_WIDTH: usize = 10;
const NAME_WIDTH: usize = 24;
const CONTEXT_WINDOW_TOKENS: u64 = 200_000;
const STATS_TOOL_ROWS: usize = 8;
const SUBAGENT_TOOL_COUNT: usize = 5;
const SKILL_DESCRIPTION_WIDTH: usize = 30;

/// Draw the whole dashboard
pub fn draw(f: &mut Frame, app: &mut App) {
    let theme = app.theme.clone();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Panels
            Constraint::Length(1), // Key hints
        ])
        .split(f.size());

    draw_header(f, chunks[0], app, &theme);
    draw_panels(f, chunks[1], app, &theme);
    draw_footer(f, chunks[2], app, &theme);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App, theme: &ModernTheme) {
    let session = app
        .session_id()
        .map(|id| id.chars().take(6).collect::<String>())
        .unwrap_or_else(|| "none".to_string());

    let mut spans = vec![
        Span::styled(
            "SUPERDASH",
            Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" │ ", theme.border_style()),
        Span::styled("session: ", theme.secondary_text_style()),
        Span::styled(session, theme.metric_style()),
        Span::raw("  "),
        Span::styled(format_cost(app.stats.total_cost), theme.metric_style()),
    ];

    if let Some(event) = app.parser.active_event() {
        spans.push(Span::styled(" │ ", theme.border_style()));
        spans.push(Span::styled(
            format!("{} {}", ModernIcons::ACTIVE, event.skill_name),
            theme.success_style(),
        ));
        if let Some(start) = event.start_time() {
            let elapsed = (Utc::now() - start).num_milliseconds().max(0) as u64;
            spans.push(Span::styled(
                format!("  {}", format_duration_minutes(elapsed)),
                theme.secondary_text_style(),
            ));
        }
    }

    if let Some(ref status) = app.status_message {
        let style = match status.message_type {
            StatusType::Info => theme.info_style(),
            StatusType::Success => theme.success_style(),
            StatusType::Warning => theme.warning_style(),
            StatusType::Error => theme.danger_style(),
        };
        spans.push(Span::styled(" │ ", theme.border_style()));
        spans.push(Span::styled(status.text.clone(), style));
    }

    PanelCard::new(Text::from(Line::from(spans)), theme).render(area, f.buffer_mut());
}

fn draw_panels(f: &mut Frame, area: Rect, app: &mut App, theme: &ModernTheme) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(36), // SKILLS + HOOKS
            Constraint::Min(40),    // WORKFLOW
            Constraint::Length(44), // STATS
        ])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(columns[0]);

    let skills = skill_lines(
        &app.registry,
        app.parser.active_skill(),
        app.parser.used_skills(),
        theme,
    );
    PanelCard::new(Text::from(skills), theme)
        .title("SKILLS")
        .render(left[0], f.buffer_mut());

    let hooks = hook_lines(&app.hooks, app.parser.hook_events(), theme);
    PanelCard::new(Text::from(hooks), theme)
        .title("HOOKS")
        .render(left[1], f.buffer_mut());

    let workflow = workflow_lines(&app.timeline, theme);
    let visible = columns[1].height.saturating_sub(2) as usize;
    let max_scroll = workflow.len().saturating_sub(visible) as u16;
    app.workflow_scroll = app.workflow_scroll.min(max_scroll);
    PanelCard::new(Text::from(workflow), theme)
        .title("WORKFLOW")
        .focused(true)
        .scroll(app.workflow_scroll)
        .render(columns[1], f.buffer_mut());

    let stats = stats_lines(&app.stats, theme);
    PanelCard::new(Text::from(stats), theme)
        .title("STATS")
        .render(columns[2], f.buffer_mut());
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App, theme: &ModernTheme) {
    let key = |k: &'static str| {
        Span::styled(
            k,
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
    };
    let line = Line::from(vec![
        Span::raw(" "),
        key("q"),
        Span::styled(" quit  ", theme.secondary_text_style()),
        key("t"),
        Span::styled(
            format!(" theme ({})  ", app.config.theme_display()),
            theme.secondary_text_style(),
        ),
        key("j/k"),
        Span::styled(" scroll  ", theme.secondary_text_style()),
        key("r"),
        Span::styled(" refresh  ", theme.secondary_text_style()),
        Span::styled(
            format!("polling every {}ms", app.config.poll_interval_ms),
            theme.dimmed_style(),
        ),
    ]);
    f.render_widget(ratatui::widgets::Paragraph::new(line), area);
}

/// SKILLS panel: registry skills plus any used skill the registry does not know
pub fn skill_lines(
    registry: &SkillRegistry,
    active: Option<&str>,
    used: &BTreeSet<String>,
    theme: &ModernTheme,
) -> Vec<Line<'static>> {
    let mut names: BTreeSet<&str> = registry.names().collect();
    names.extend(used.iter().map(String::as_str));
    names.extend(active);

    if names.is_empty() {
        return vec![Line::from(Span::styled(
            "  No skills found",
            theme.dimmed_style(),
        ))];
    }

    let mut lines = Vec::new();
    for name in names {
        let state = SkillState::of(name, active, used);
        let style = match state {
            SkillState::Active => theme.selected_style(),
            SkillState::Used => Style::default()
                .fg(theme.text_primary)
                .add_modifier(Modifier::BOLD),
            SkillState::Available => theme.dimmed_style(),
        };
        lines.push(Line::from(Span::styled(
            format!("  {} {name}", state.marker()),
            style,
        )));

        if state == SkillState::Active {
            if let Some(meta) = registry.get(name).filter(|m| !m.description.is_empty()) {
                lines.push(Line::from(Span::styled(
                    format!("     {}", truncate_text(&meta.description, SKILL_DESCRIPTION_WIDTH)),
                    theme.secondary_text_style(),
                )));
            }
        }
    }
    lines
}

/// HOOKS panel: configured hooks, then per-event fire counts for this session
pub fn hook_lines(hooks: &[HookEntry], fired: &[HookEvent], theme: &ModernTheme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if hooks.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No hooks configured",
            theme.dimmed_style(),
        )));
    }
    for hook in hooks {
        let mut header = format!("  {} {}", ModernIcons::HOOK, hook.event);
        if !hook.matcher.is_empty() {
            header.push_str(&format!(" ({})", hook.matcher));
        }
        lines.push(Line::from(Span::styled(header, theme.header_style())));
        lines.push(Line::from(Span::styled(
            format!("    {hook}"),
            theme.secondary_text_style(),
        )));
    }

    if let Some(last) = fired.last() {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for event in fired {
            *counts.entry(event.event.as_str()).or_default() += 1;
        }

        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("  Fired: ", theme.secondary_text_style()),
            Span::styled(fired.len().to_string(), theme.metric_style()),
        ]));
        for (event, count) in counts {
            lines.push(Line::from(Span::styled(
                format!("    {} ×{count}", pad_right(event, 18)),
                theme.secondary_text_style(),
            )));
        }
        let mut last_line = format!("  Last: {} {}", parse_time(&last.timestamp), last.event);
        if !last.hook_type.is_empty() {
            last_line.push_str(&format!(" [{}]", last.hook_type));
        }
        lines.push(Line::from(Span::styled(last_line, theme.dimmed_style())));
    }
    lines
}

/// WORKFLOW panel: every timeline row, joined by `▼` separators
pub fn workflow_lines(timeline: &Timeline, theme: &ModernTheme) -> Vec<Line<'static>> {
    if timeline.is_empty() {
        return vec![Line::from(Span::styled(
            "  No skills invoked yet.",
            theme.secondary_text_style(),
        ))];
    }

    let max_cost = timeline.max_cost();
    let mut blocks: Vec<Vec<Line<'static>>> = timeline
        .entries
        .iter()
        .map(|entry| match entry {
            TimelineEntry::Skill(row) => skill_row_lines(row, max_cost, theme),
            TimelineEntry::Overhead(row) => overhead_lines(row, theme),
            TimelineEntry::Subagent(subagent) => subagent_lines(subagent, theme),
            TimelineEntry::Compaction(event) => vec![compaction_line(event, theme)],
        })
        .collect();

    if !timeline.unattached_groups.is_empty() {
        blocks.push(task_group_block(&timeline.unattached_groups, theme));
    }

    let mut lines = Vec::new();
    for (i, block) in blocks.into_iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(Span::styled(
                format!("   {}", ModernIcons::ARROW_DOWN),
                theme.dimmed_style(),
            )));
        }
        lines.extend(block);
    }
    lines
}

fn time_prefix(timestamp: &str) -> String {
    if timestamp.is_empty() {
        String::new()
    } else {
        format!("{}  ", parse_time(timestamp))
    }
}

fn rail(theme: &ModernTheme) -> Span<'static> {
    Span::styled("   ┃  ", theme.border_focused_style())
}

fn skill_row_lines(row: &SkillRow, max_cost: f64, theme: &ModernTheme) -> Vec<Line<'static>> {
    let name_style = if row.is_active {
        theme.selected_style()
    } else {
        theme.header_style()
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(time_prefix(&row.timestamp), theme.secondary_text_style()),
        Span::styled(format!("{} ", index_marker(row.index)), theme.metric_style()),
        Span::styled(pad_right(&row.skill_name, NAME_WIDTH), name_style),
        Span::styled(
            format!(" {:>6} tok  ", format_tokens(row.total_tokens)),
            theme.secondary_text_style(),
        ),
        Span::styled(format_cost(row.cost), theme.metric_style()),
    ])];

    let args = truncate_args(&row.args);
    if !args.is_empty() {
        lines.push(Line::from(vec![
            rail(theme),
            Span::styled(args, theme.secondary_text_style()),
        ]));
    }

    let mut footer = vec![
        rail(theme),
        Span::styled(
            cost_bar(row.cost, max_cost, TIMELINE_BAR_WIDTH),
            theme.progress_style_for_percentage(percent_of(row.cost, max_cost)),
        ),
        Span::styled(
            format!("  {}", format_duration_minutes(row.duration_ms)),
            theme.secondary_text_style(),
        ),
    ];
    if row.is_active {
        footer.push(Span::styled(
            format!(" {}", ModernIcons::ACTIVE),
            theme.success_style(),
        ));
    }
    lines.push(Line::from(footer));

    if !row.task_groups.is_empty() {
        lines.extend(task_group_block(&row.task_groups, theme));
    }
    lines
}

fn percent_of(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max * 100.0
    } else {
        0.0
    }
}

fn overhead_lines(row: &OverheadRow, theme: &ModernTheme) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(time_prefix(&row.timestamp), theme.secondary_text_style()),
        Span::styled("   ── no skill ──        ", theme.dimmed_style()),
        Span::styled(
            format!("{:>6} tok  ", format_tokens(row.total_tokens())),
            theme.secondary_text_style(),
        ),
        Span::styled(format_cost(row.cost), theme.metric_style()),
    ])];

    let tools = row.tool_summary();
    if !tools.is_empty() {
        lines.push(Line::from(vec![
            rail(theme),
            Span::styled(tools, theme.secondary_text_style()),
        ]));
    }

    let mut footer = vec![
        rail(theme),
        Span::styled(
            format_duration_minutes(row.duration_ms),
            theme.secondary_text_style(),
        ),
    ];
    if row.in_progress {
        footer.push(Span::styled(
            format!(" {}", ModernIcons::ACTIVE),
            theme.success_style(),
        ));
    }
    lines.push(Line::from(footer));
    lines
}

fn subagent_lines(subagent: &GroupedSubagent, theme: &ModernTheme) -> Vec<Line<'static>> {
    let record = &subagent.record;
    let mut kind = record.subagent_type.clone();
    if !record.model.is_empty() && record.model != INHERIT_MODEL {
        kind.push_str(&format!("/{}", record.model));
    }

    let mut details = vec![if record.skills_invoked.is_empty() {
        "(no skills)".to_string()
    } else {
        record.skills_invoked.join(", ")
    }];
    if !record.tool_counts.is_empty() {
        let tools: Vec<String> = record
            .tool_counts
            .iter()
            .take(SUBAGENT_TOOL_COUNT)
            .map(|(name, count)| format!("{name}({count})"))
            .collect();
        details.push(tools.join(" "));
    }
    if record.total_tokens > 0 {
        details.push(format!(
            "{} in / {} out",
            format_tokens(record.input_tokens),
            format_tokens(record.output_tokens)
        ));
    }

    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", ModernIcons::SUBAGENT), theme.info_style()),
        Span::styled(pad_right(&record.description, NAME_WIDTH), theme.header_style()),
        Span::styled(
            format!(" {:>6} tok  ", format_tokens(record.total_tokens)),
            theme.secondary_text_style(),
        ),
        Span::styled(format_cost(record.cost), theme.metric_style()),
        Span::styled(
            format!("  {}", status_icon(subagent.status)),
            status_style(subagent.status, theme),
        ),
        Span::styled(format!("  [{kind}]"), theme.dimmed_style()),
    ])];

    let last = details.len() - 1;
    for (i, detail) in details.into_iter().enumerate() {
        let connector = if i == last { "└" } else { "├" };
        lines.push(Line::from(Span::styled(
            format!("  {connector} {detail}"),
            theme.secondary_text_style(),
        )));
    }
    lines
}

fn compaction_line(event: &CompactionEvent, theme: &ModernTheme) -> Line<'static> {
    let label = event.kind.as_str().to_uppercase();
    let mut spans = vec![
        Span::styled(time_prefix(&event.timestamp), theme.secondary_text_style()),
        Span::styled(format!("   ── {label} ──"), theme.warning_style()),
    ];
    if event.kind != CompactionKind::Clear {
        spans.push(Span::styled(
            format!("  {} tok", format_thousands(event.pre_tokens)),
            theme.secondary_text_style(),
        ));
    }
    if !event.trigger.is_empty() {
        spans.push(Span::styled(
            format!(" ({})", event.trigger),
            theme.dimmed_style(),
        ));
    }
    Line::from(spans)
}

fn task_group_block(groups: &[TaskGroup], theme: &ModernTheme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let branch = if i + 1 == groups.len() { "┗━" } else { "┣━" };
        lines.push(Line::from(vec![
            Span::styled(format!("   {branch} "), theme.border_focused_style()),
            Span::styled(
                format!(
                    "Task {}: {} ",
                    group.task_number,
                    pad_right(&group.label, 20)
                ),
                theme.header_style(),
            ),
            Span::styled(format_cost(group.total_cost()), theme.metric_style()),
        ]));

        let rows = group.rows();
        for (j, row) in rows.iter().enumerate() {
            let connector = if j + 1 == rows.len() { "└" } else { "├" };
            lines.push(task_row_line(row, connector, theme));
        }
    }
    lines
}

fn task_row_line(row: &TaskRow<'_>, connector: &str, theme: &ModernTheme) -> Line<'static> {
    let status = row.status();
    let (tokens, cost) = match status {
        SubagentStatus::Complete => (
            format!("{:>6} tok", format_tokens(row.total_tokens())),
            format_cost(row.cost()),
        ),
        SubagentStatus::Running => (
            if row.total_tokens() > 0 {
                format!("{:>6}    ", format_tokens(row.total_tokens()))
            } else {
                " ".repeat(10)
            },
            if row.cost() > 0.0 {
                format_cost(row.cost())
            } else {
                String::new()
            },
        ),
        SubagentStatus::Pending => (" ".repeat(10), String::new()),
    };

    Line::from(vec![
        rail(theme),
        Span::styled(format!("  {connector} "), theme.border_focused_style()),
        Span::styled(
            format!("{} ", pad_right(row.role.label(), 12)),
            theme.secondary_text_style(),
        ),
        Span::styled(format!("{tokens}  "), theme.secondary_text_style()),
        Span::styled(pad_right(&cost, 6), theme.metric_style()),
        Span::styled(
            format!("  {}", status_icon(status)),
            status_style(status, theme),
        ),
    ])
}

fn status_style(status: SubagentStatus, theme: &ModernTheme) -> Style {
    match status {
        SubagentStatus::Complete => theme.success_style(),
        SubagentStatus::Running => theme.warning_style(),
        SubagentStatus::Pending => theme.dimmed_style(),
    }
}

fn divider(theme: &ModernTheme) -> Line<'static> {
    Line::from(Span::styled(format!("  {}", "─".repeat(38)), theme.border_style()))
}

fn label_value(label: &str, value: String, theme: &ModernTheme) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {}", pad_right(label, 15)), theme.secondary_text_style()),
        Span::styled(value, theme.metric_style()),
    ])
}

/// STATS panel: totals, per-skill bars, models, tools, subagents, context
pub fn stats_lines(stats: &SessionStats, theme: &ModernTheme) -> Vec<Line<'static>> {
    let total_input = stats.input_tokens + stats.cache_read_tokens;
    let mut lines = vec![
        label_value("This session:", format_cost(stats.total_cost), theme),
        label_value("Tokens in:", format_thousands(stats.input_tokens), theme),
        Line::from(Span::styled(
            format!(
                "    ({} cached)",
                format_cache_ratio(stats.cache_read_tokens, total_input)
            ),
            theme.secondary_text_style(),
        )),
        label_value("Tokens out:", format_thousands(stats.output_tokens), theme),
    ];

    if !stats.per_skill.is_empty() {
        lines.push(divider(theme));
        lines.push(Line::from(Span::styled("  Per skill:", theme.header_style())));
        let max_cost = stats.per_skill.iter().map(|s| s.cost).fold(0.0, f64::max);
        for skill in &stats.per_skill {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {} ", pad_right(&skill.name, 18)),
                    theme.secondary_text_style(),
                ),
                Span::styled(format!("{}  ", format_cost(skill.cost)), theme.metric_style()),
                Span::styled(
                    cost_bar(skill.cost, max_cost, SKILL_BAR_WIDTH),
                    theme.info_style(),
                ),
            ]));
        }
    }

    if !stats.model_stats.is_empty() {
        lines.push(divider(theme));
        lines.push(Line::from(Span::styled("  Models:", theme.header_style())));
        for model in &stats.model_stats {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {} ", pad_right(&model.model, 8)),
                    theme.secondary_text_style(),
                ),
                Span::styled(
                    format!(
                        "{} in / {} out  ",
                        format_tokens(model.input_tokens),
                        format_tokens(model.output_tokens)
                    ),
                    theme.secondary_text_style(),
                ),
                Span::styled(format_cost(model.cost), theme.metric_style()),
            ]));
        }
    }

    if !stats.tool_counts.is_empty() {
        lines.push(divider(theme));
        lines.push(Line::from(Span::styled("  Tools:", theme.header_style())));
        for (name, count) in stats.tool_counts.iter().take(STATS_TOOL_ROWS) {
            lines.push(Line::from(vec![
                Span::styled(format!("  {} ", pad_right(name, 18)), theme.secondary_text_style()),
                Span::styled(count.to_string(), theme.metric_style()),
            ]));
        }
    }

    lines.push(divider(theme));
    let mut subagents = stats.subagent_count.to_string();
    if stats.subagent_cost > 0.0 {
        subagents.push_str(&format!("  ({})", format_cost(stats.subagent_cost)));
    }
    lines.push(label_value("Subagents:", subagents, theme));
    lines.push(label_value(
        "Compactions:",
        stats.compaction_count.to_string(),
        theme,
    ));
    if stats.clear_count > 0 {
        lines.push(label_value("Clears:", stats.clear_count.to_string(), theme));
    }

    let context_pct = stats.context_tokens as f64 / CONTEXT_WINDOW_TOKENS as f64 * 100.0;
    lines.push(Line::from(vec![
        Span::styled(format!("  {}", pad_right("Context:", 15)), theme.secondary_text_style()),
        Span::styled(
            format!("{} ({:.0}%)", format_tokens(stats.context_tokens), context_pct),
            theme.progress_style_for_percentage(context_pct),
        ),
    ]));
    lines.push(label_value("Sessions:", stats.session_count.to_string(), theme));
    lines.push(label_value("Skills run:", stats.skill_count.to_string(), theme));
    lines
}
