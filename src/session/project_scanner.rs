use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One session log file inside a project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub path: PathBuf,
    pub last_modified: SystemTime,
}

/// A project directory under `~/.claude/projects` and its sessions, oldest first
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub sessions: Vec<Session>,
}

impl Project {
    pub fn most_recent_session(&self) -> Option<&Session> {
        self.sessions.last()
    }

    pub fn last_modified(&self) -> SystemTime {
        self.most_recent_session()
            .map(|s| s.last_modified)
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    pub fn session_paths(&self) -> Vec<PathBuf> {
        self.sessions.iter().map(|s| s.path.clone()).collect()
    }
}

/// Locates session logs for a working directory
pub struct ProjectScanner {
    projects_dir: PathBuf,
}

impl ProjectScanner {
    pub fn new(projects_dir: PathBuf) -> Self {
        Self { projects_dir }
    }

    /// Scanner rooted at `<claude_dir>/projects`
    pub fn for_claude_dir(claude_dir: &Path) -> Self {
        Self::new(claude_dir.join("projects"))
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Every project with at least one session, most recently active first
    pub fn scan_projects(&self) -> Result<Vec<Project>> {
        if !self.projects_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        let entries = fs::read_dir(&self.projects_dir)
            .with_context(|| format!("Failed to read {}", self.projects_dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let sessions = scan_sessions(&path)?;
            if sessions.is_empty() {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            projects.push(Project {
                name,
                sessions,
            });
        }

        projects.sort_by_key(|p| std::cmp::Reverse(p.last_modified()));
        Ok(projects)
    }

    /// Session files of the project whose working directory is `project_cwd`, oldest first
    pub fn project_sessions(&self, project_cwd: &Path) -> Result<Vec<PathBuf>> {
        find_project_sessions(&self.projects_dir, project_cwd)
    }

    /// Session files of whichever project was written to most recently
    pub fn latest_project_sessions(&self) -> Result<Vec<PathBuf>> {
        find_latest_project_sessions(&self.projects_dir)
    }

    /// Sessions for `project_cwd`, falling back to the most recently active project
    pub fn discover(&self, project_cwd: &Path) -> Result<Vec<PathBuf>> {
        let sessions = self.project_sessions(project_cwd)?;
        if !sessions.is_empty() {
            return Ok(sessions);
        }

        tracing::debug!(
            cwd = %project_cwd.display(),
            "no sessions for working directory, using most recent project"
        );
        self.latest_project_sessions()
    }
}

pub fn default_claude_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude"))
}

/// Claude Code's directory name for a working directory: every character other
/// than an ASCII letter, digit or `-` becomes `-`
pub fn project_dir_name(project_cwd: &Path) -> String {
    project_cwd
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

pub fn find_project_sessions(base_dir: &Path, project_cwd: &Path) -> Result<Vec<PathBuf>> {
    let project_dir = base_dir.join(project_dir_name(project_cwd));
    if !project_dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(scan_sessions(&project_dir)?
        .into_iter()
        .map(|s| s.path)
        .collect())
}

pub fn find_latest_project_sessions(base_dir: &Path) -> Result<Vec<PathBuf>> {
    let projects = ProjectScanner::new(base_dir.to_path_buf()).scan_projects()?;
    let Some(project) = projects.first() else {
        return Ok(Vec::new());
    };
    tracing::debug!(
        project = %project.name,
        session = project.most_recent_session().map(|s| s.id.as_str()).unwrap_or_default(),
        "most recently active project"
    );
    Ok(project.session_paths())
}

pub fn session_id_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

/// `*.jsonl` files directly inside `project_dir`, oldest first
fn scan_sessions(project_dir: &Path) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();
    let entries = fs::read_dir(project_dir)
        .with_context(|| format!("Failed to read {}", project_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
            continue;
        }
        let last_modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        sessions.push(Session {
            id: session_id_from_path(&path),
            path,
            last_modified,
        });
    }

    sessions.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(sessions)
}
