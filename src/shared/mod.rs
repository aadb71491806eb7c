/// Shared modules used across the application
pub mod config;
pub mod logging;
pub mod theme;

// Re-export commonly used items
pub use config::Config;
pub use theme::ModernTheme;
