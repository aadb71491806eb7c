//! Smoke tests for the display helpers shared by the panels

#[cfg(test)]
mod tests {
    use crate::{session::SubagentStatus, shared::theme::*, widgets::*};

    #[test]
    fn test_index_marker_basic() {
        assert_eq!(index_marker(1), "①");
        assert_eq!(index_marker(10), "⑩");
        assert_eq!(index_marker(11), "(11)");
    }

    #[test]
    fn test_status_icon_basic() {
        assert_eq!(status_icon(SubagentStatus::Complete), ModernIcons::COMPLETED);
        assert_eq!(status_icon(SubagentStatus::Running), ModernIcons::ACTIVE);
        assert_eq!(status_icon(SubagentStatus::Pending), ModernIcons::PENDING);
    }

    #[test]
    fn test_cache_ratio_basic() {
        assert_eq!(format_cache_ratio(0, 0), "0%");
        assert_eq!(format_cache_ratio(900, 1_000), "90%");
        assert_eq!(format_cache_ratio(1, 3), "33%");
        assert_eq!(format_cache_ratio(u64::MAX, u64::MAX), "100%");
    }

    #[test]
    fn test_pad_right_basic() {
        assert_eq!(pad_right("ab", 4), "ab  ");
        assert_eq!(pad_right("abcdef", 4), "abcdef");
        assert_eq!(format_cost(0.3), "$0.30");
    }

    #[test]
    fn test_theme_creation() {
        let theme = ModernTheme::mainframe();
        let _ = theme.header_style();
    }
}
