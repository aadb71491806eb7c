use ratatui::style::{Color, Modifier, Style};

use super::config::ThemeMode;

/// Color palette for the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct ModernTheme {
    pub primary: Color,
    pub accent: Color,

    // Status colors
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
    pub info: Color,

    pub background: Color,

    // Text colors
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_disabled: Color,

    pub selected: Color,
    pub border: Color,
    pub border_focused: Color,
}

impl Default for ModernTheme {
    fn default() -> Self {
        Self::terminal()
    }
}

impl ModernTheme {
    pub fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Terminal => Self::terminal(),
            ThemeMode::Mainframe => Self::mainframe(),
        }
    }

    /// Plain white on black
    pub fn terminal() -> Self {
        Self {
            primary: Color::Rgb(255, 255, 255),
            accent: Color::Rgb(255, 255, 255),

            success: Color::Rgb(34, 197, 94),  // Green-500
            warning: Color::Rgb(251, 191, 36), // Amber-400
            danger: Color::Rgb(239, 68, 68),   // Red-500
            info: Color::Rgb(156, 163, 175),   // Gray-400

            background: Color::Rgb(0, 0, 0),

            text_primary: Color::Rgb(255, 255, 255),
            text_secondary: Color::Rgb(156, 163, 175),
            text_disabled: Color::Rgb(90, 90, 90),

            selected: Color::Rgb(255, 255, 255),
            border: Color::Rgb(51, 51, 51), // #333333
            border_focused: Color::Rgb(255, 255, 255),
        }
    }

    /// Green phosphor
    pub fn mainframe() -> Self {
        Self {
            primary: Color::Rgb(51, 255, 51), // #33ff33
            accent: Color::Rgb(51, 255, 51),

            success: Color::Rgb(51, 255, 51),
            warning: Color::Rgb(204, 255, 51),
            danger: Color::Rgb(255, 80, 80),
            info: Color::Rgb(26, 122, 26), // #1a7a1a

            background: Color::Rgb(0, 0, 0),

            text_primary: Color::Rgb(51, 255, 51),
            text_secondary: Color::Rgb(26, 122, 26),
            text_disabled: Color::Rgb(15, 70, 15),

            selected: Color::Rgb(51, 255, 51),
            border: Color::Rgb(10, 31, 10), // #0a1f0a
            border_focused: Color::Rgb(51, 255, 51),
        }
    }
}

/// Symbols used across panels
pub struct ModernIcons;

impl ModernIcons {
    pub const ACTIVE: &'static str = "●"; // Solid circle
    pub const PENDING: &'static str = "○"; // Hollow circle
    pub const COMPLETED: &'static str = "✓"; // Check mark
    pub const HOOK: &'static str = "⚡"; // Lightning bolt
    pub const SUBAGENT: &'static str = "▶"; // Play button
    pub const ARROW_DOWN: &'static str = "▼"; // Down arrow
}

/// Cost bar characters
pub struct ProgressChars;

impl ProgressChars {
    pub const FILLED: char = '█'; // Full block
    pub const EMPTY: char = '░'; // Light shade
}

/// Pre-defined styles for common UI elements
impl ModernTheme {
    /// Style for headers and titles
    pub fn header_style(&self) -> Style {
        Style::default()
            .fg(self.text_primary)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for secondary text
    pub fn secondary_text_style(&self) -> Style {
        Style::default().fg(self.text_secondary)
    }

    pub fn success_style(&self) -> Style {
        Style::default()
            .fg(self.success)
            .add_modifier(Modifier::BOLD)
    }

    pub fn warning_style(&self) -> Style {
        Style::default()
            .fg(self.warning)
            .add_modifier(Modifier::BOLD)
    }

    pub fn danger_style(&self) -> Style {
        Style::default()
            .fg(self.danger)
            .add_modifier(Modifier::BOLD)
    }

    pub fn info_style(&self) -> Style {
        Style::default().fg(self.info)
    }

    /// Style for the active skill
    pub fn selected_style(&self) -> Style {
        Style::default()
            .fg(self.background)
            .bg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn border_focused_style(&self) -> Style {
        Style::default()
            .fg(self.border_focused)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for numbers and metrics
    pub fn metric_style(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for dimmed/disabled elements
    pub fn dimmed_style(&self) -> Style {
        Style::default().fg(self.text_disabled)
    }

    /// Context window fill: green, amber past 70%, red past 90%
    pub fn progress_style_for_percentage(&self, percentage: f64) -> Style {
        if percentage >= 90.0 {
            self.danger_style()
        } else if percentage >= 70.0 {
            self.warning_style()
        } else {
            self.success_style()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_terminal() {
        assert_eq!(ModernTheme::default(), ModernTheme::terminal());
        assert_eq!(
            ModernTheme::for_mode(ThemeMode::Mainframe),
            ModernTheme::mainframe()
        );
    }

    #[test]
    fn test_theme_borders() {
        assert_eq!(ModernTheme::terminal().border, Color::Rgb(0x33, 0x33, 0x33));
        assert_eq!(ModernTheme::mainframe().border, Color::Rgb(0x0a, 0x1f, 0x0a));
        assert_eq!(
            ModernTheme::mainframe().text_primary,
            Color::Rgb(0x33, 0xff, 0x33)
        );
    }

    #[test]
    fn test_progress_style_for_percentage() {
        let theme = ModernTheme::terminal();
        assert_eq!(theme.progress_style_for_percentage(50.0).fg, Some(theme.success));
        assert_eq!(theme.progress_style_for_percentage(80.0).fg, Some(theme.warning));
        assert_eq!(theme.progress_style_for_percentage(95.0).fg, Some(theme.danger));
    }

    #[test]
    fn test_selected_style_is_reversed() {
        let theme = ModernTheme::mainframe();
        let style = theme.selected_style();
        assert_eq!(style.fg, Some(theme.background));
        assert_eq!(style.bg, Some(theme.selected));
        assert!(style.add_modifier.contains(Modifier::BOLD));
    }
}
