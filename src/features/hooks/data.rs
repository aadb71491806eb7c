use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Source label for hooks from the user's own settings.json
pub const USER_CONFIG_SOURCE: &str = "user config";

/// One configured hook command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEntry {
    pub event: String,
    pub matcher: String,
    /// File name of the command, without its directory
    pub command: String,
    pub source: String,
}

impl std::fmt::Display for HookEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} → {}", self.source, self.command)
    }
}

/// Shape shared by settings.json and plugin hooks.json
#[derive(Debug, Default, Deserialize)]
pub struct HooksFile {
    #[serde(default)]
    pub hooks: BTreeMap<String, Vec<HookMatcher>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HookMatcher {
    #[serde(default)]
    pub matcher: String,
    #[serde(default)]
    pub hooks: Vec<HookCommand>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HookCommand {
    #[serde(default)]
    pub command: String,
}

/// Flatten an event → matcher → command tree into rows
pub fn parse_hooks_config(
    hooks: &BTreeMap<String, Vec<HookMatcher>>,
    source: &str,
) -> Vec<HookEntry> {
    let mut entries = Vec::new();
    for (event, matchers) in hooks {
        for matcher in matchers {
            for hook in &matcher.hooks {
                entries.push(HookEntry {
                    event: event.clone(),
                    matcher: matcher.matcher.clone(),
                    command: command_file_name(&hook.command),
                    source: source.to_string(),
                });
            }
        }
    }
    entries
}

fn command_file_name(command: &str) -> String {
    Path::new(command)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(command)
        .to_string()
}

/// Read the `hooks` table of one JSON file
pub fn load_hooks_file(path: &Path, source: &str) -> Result<Vec<HookEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: HooksFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(parse_hooks_config(&file.hooks, source))
}

/// Hooks from the user's settings.json followed by each plugin's `hooks/hooks.json`.
///
/// Missing or unreadable files contribute nothing.
pub fn load_all_hooks(settings_path: &Path, plugin_dirs: &[PathBuf]) -> Vec<HookEntry> {
    let mut all = Vec::new();

    if settings_path.is_file() {
        match load_hooks_file(settings_path, USER_CONFIG_SOURCE) {
            Ok(hooks) => all.extend(hooks),
            Err(e) => tracing::warn!(error = %e, "skipping user hooks"),
        }
    }

    for plugin_dir in plugin_dirs {
        let hooks_file = plugin_dir.join("hooks").join("hooks.json");
        if !hooks_file.is_file() {
            continue;
        }
        match load_hooks_file(&hooks_file, &plugin_source(plugin_dir)) {
            Ok(hooks) => all.extend(hooks),
            Err(e) => tracing::warn!(error = %e, "skipping plugin hooks"),
        }
    }

    all
}

/// Plugin name for a versioned plugin root (`.../superpowers/4.2.0` -> `superpowers`)
fn plugin_source(plugin_dir: &Path) -> String {
    plugin_dir
        .parent()
        .and_then(|parent| parent.file_name())
        .or_else(|| plugin_dir.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}
