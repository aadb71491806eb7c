//! Readers for plugin metadata shown alongside the session view.

pub mod hooks;
pub mod skills;
