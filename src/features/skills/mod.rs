//! Skills module - the catalogue of installed superpowers skills
//!
//! This module provides:
//! - Discovery of the newest installed plugin version
//! - SKILL.md front matter parsing
//! - Active/used/available state for the SKILLS panel

pub mod registry;

pub use registry::{find_skills_dir, SkillRegistry, SkillState};
