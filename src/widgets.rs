use chrono::{DateTime, Utc};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::Text,
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::session::SubagentStatus;
use crate::shared::theme::{ModernIcons, ModernTheme, ProgressChars};

/// Placeholder shown when a timestamp does not parse
pub const UNKNOWN_TIME: &str = "??:??:??";

/// Arguments longer than this are cut and suffixed with `...`
pub const ARGS_DISPLAY_LIMIT: usize = 30;

/// Bordered panel holding pre-built text, scrolled by whole lines
pub struct PanelCard<'a> {
    title: Option<&'a str>,
    content: Text<'a>,
    theme: &'a ModernTheme,
    focused: bool,
    scroll: u16,
}

impl<'a> PanelCard<'a> {
    pub fn new(content: Text<'a>, theme: &'a ModernTheme) -> Self {
        Self {
            title: None,
            content,
            theme,
            focused: false,
            scroll: 0,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn scroll(mut self, scroll: u16) -> Self {
        self.scroll = scroll;
        self
    }
}

impl<'a> Widget for PanelCard<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            self.theme.border_focused_style()
        } else {
            self.theme.border_style()
        };

        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style);

        if let Some(title) = self.title {
            block = block.title(title);
        }

        let inner = block.inner(area);
        block.render(area, buf);

        // No wrapping: timeline rows rely on fixed columns
        Paragraph::new(self.content)
            .scroll((self.scroll, 0))
            .render(inner, buf);
    }
}

/// 500, 12.8k, 1.2M
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Whole minutes: `<1m`, `29m`, `2h 0m`
pub fn format_duration_minutes(duration_ms: u64) -> String {
    let seconds = duration_ms / 1000;
    if seconds < 60 {
        return "<1m".to_string();
    }
    let minutes = seconds / 60;
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

/// Integer with `,` thousands separators
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_cost(cost: f64) -> String {
    format!("${cost:.2}")
}

/// Bar of `width` cells filled in proportion to `cost / max_cost`
pub fn cost_bar(cost: f64, max_cost: f64, width: usize) -> String {
    let filled = if max_cost > 0.0 {
        (((cost / max_cost) * width as f64) as usize).min(width)
    } else {
        0
    };
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat(ProgressChars::FILLED).take(filled));
    bar.extend(std::iter::repeat(ProgressChars::EMPTY).take(width - filled));
    bar
}

/// UTC `HH:MM:SS` of an RFC 3339 timestamp
pub fn parse_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc).format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| UNKNOWN_TIME.to_string())
}

/// Share of input served from cache, as a whole percentage
pub fn format_cache_ratio(cache_read: u64, total_input: u64) -> String {
    if total_input == 0 {
        return "0%".to_string();
    }
    format!("{}%", u128::from(cache_read) * 100 / u128::from(total_input))
}

/// Quoted arguments, cut to [`ARGS_DISPLAY_LIMIT`] graphemes
pub fn truncate_args(args: &str) -> String {
    if args.is_empty() {
        return String::new();
    }
    format!("\"{}\"", truncate_text(args, ARGS_DISPLAY_LIMIT))
}

/// Cut `text` to `limit` graphemes, marking the cut with `...`
pub fn truncate_text(text: &str, limit: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() > limit {
        format!("{}...", graphemes[..limit].concat())
    } else {
        text.to_string()
    }
}

/// Left-align `text` in `width` terminal columns
pub fn pad_right(text: &str, width: usize) -> String {
    let len = text.width();
    if len >= width {
        text.to_string()
    } else {
        format!("{text}{}", " ".repeat(width - len))
    }
}

/// Circled digit for the first ten skills, `(n)` afterwards
pub fn index_marker(index: usize) -> String {
    const CIRCLED: [&str; 10] = ["①", "②", "③", "④", "⑤", "⑥", "⑦", "⑧", "⑨", "⑩"];
    match index {
        1..=10 => CIRCLED[index - 1].to_string(),
        _ => format!("({index})"),
    }
}

pub fn status_icon(status: SubagentStatus) -> &'static str {
    match status {
        SubagentStatus::Complete => ModernIcons::COMPLETED,
        SubagentStatus::Running => ModernIcons::ACTIVE,
        SubagentStatus::Pending => ModernIcons::PENDING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::text::Line;

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(500), "500");
        assert_eq!(format_tokens(12_847), "12.8k");
        assert_eq!(format_tokens(1_200_000), "1.2M");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration_minutes(45_000), "<1m");
        assert_eq!(format_duration_minutes(1_740_000), "29m");
        assert_eq!(format_duration_minutes(7_200_000), "2h 0m");
        assert_eq!(format_duration_minutes(0), "<1m");
    }

    #[test]
    fn test_cost_bar() {
        assert_eq!(cost_bar(0.5, 1.0, 10), "█████░░░░░");
        assert_eq!(cost_bar(1.0, 1.0, 4), "████");
        assert_eq!(cost_bar(3.0, 0.0, 4), "░░░░");
        assert_eq!(cost_bar(0.0, 1.0, 14).chars().count(), 14);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("not a time"), UNKNOWN_TIME);
        assert_eq!(parse_time(""), UNKNOWN_TIME);
        assert_eq!(parse_time("2026-02-10T10:00:00Z"), "10:00:00");
        assert_eq!(parse_time("2026-02-10T10:00:00.123+02:00"), "08:00:00");
    }

    #[test]
    fn test_truncate_args() {
        assert_eq!(truncate_args(""), "");
        assert_eq!(truncate_args("short"), "\"short\"");
        let long = "a".repeat(31);
        assert_eq!(truncate_args(&long), format!("\"{}...\"", "a".repeat(30)));
        assert_eq!(truncate_args(&"é".repeat(30)), format!("\"{}\"", "é".repeat(30)));
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(167_000), "167,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_panel_card_renders_title_and_content() {
        let theme = ModernTheme::terminal();
        let area = Rect::new(0, 0, 20, 4);
        let mut buf = Buffer::empty(area);
        PanelCard::new(Text::from(vec![Line::from("one"), Line::from("two")]), &theme)
            .title("STATS")
            .scroll(1)
            .render(area, &mut buf);

        let row = |y: u16| -> String {
            (0..area.width)
                .map(|x| buf.get(x, y).symbol.clone())
                .collect()
        };
        assert!(row(0).contains("STATS"));
        assert!(row(1).contains("two"));
        assert!(!row(1).contains("one"));
    }
}
