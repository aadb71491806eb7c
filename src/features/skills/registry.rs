use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Front matter of a SKILL.md file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SkillMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// How a skill appears in the SKILLS panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillState {
    Active,
    Used,
    Available,
}

impl SkillState {
    pub fn of(name: &str, active: Option<&str>, used: &BTreeSet<String>) -> Self {
        if active == Some(name) {
            SkillState::Active
        } else if used.contains(name) {
            SkillState::Used
        } else {
            SkillState::Available
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            SkillState::Active => ">>",
            SkillState::Used => "* ",
            SkillState::Available => "  ",
        }
    }
}

/// Skills found under a plugin's `skills/` directory, keyed by name
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, SkillMeta>,
}

impl SkillRegistry {
    /// Load `<skills_dir>/*/SKILL.md`. A missing directory yields an empty registry.
    pub fn load(skills_dir: &Path) -> Result<Self> {
        let mut registry = Self::default();
        if !skills_dir.is_dir() {
            return Ok(registry);
        }

        let entries = fs::read_dir(skills_dir)
            .with_context(|| format!("Failed to read skills dir {}", skills_dir.display()))?;

        for entry in entries {
            let skill_file = entry?.path().join("SKILL.md");
            if !skill_file.is_file() {
                continue;
            }
            match parse_skill_file(&skill_file) {
                Ok(Some(meta)) => {
                    registry.skills.insert(meta.name.clone(), meta);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %skill_file.display(), error = %e, "skipping skill");
                }
            }
        }

        tracing::debug!(count = registry.skills.len(), "loaded skill registry");
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&SkillMeta> {
        self.skills.get(name)
    }

    /// Skill names in alphabetical order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

fn parse_skill_file(path: &Path) -> Result<Option<SkillMeta>> {
    let text = fs::read_to_string(path)?;
    let Some(front_matter) = front_matter(&text) else {
        return Ok(None);
    };
    let meta: SkillMeta = serde_yaml::from_str(front_matter)
        .with_context(|| format!("Invalid front matter in {}", path.display()))?;
    Ok(Some(meta))
}

/// Text between the opening `---` and the next `---`
fn front_matter(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("---")?;
    let end = rest.find("---")?;
    Some(rest[..end].trim())
}

/// Plugin install root of the official superpowers plugin
pub fn default_plugin_root(claude_dir: &Path) -> PathBuf {
    claude_dir
        .join("plugins")
        .join("cache")
        .join("claude-plugins-official")
        .join("superpowers")
}

/// `skills/` directory of the newest installed version under `plugin_root`
pub fn find_skills_dir(plugin_root: &Path) -> Option<PathBuf> {
    let mut versions: Vec<PathBuf> = fs::read_dir(plugin_root)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    versions.sort_by(|a, b| b.cmp(a));

    versions
        .into_iter()
        .map(|version| version.join("skills"))
        .find(|skills| skills.is_dir())
}
