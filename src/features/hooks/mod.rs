//! Hooks module - configured Claude Code hooks from user settings and plugins

pub mod data;

pub use data::{load_all_hooks, HookEntry};
