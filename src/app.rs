use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::features::hooks::{load_all_hooks, HookEntry};
use crate::features::skills::{registry::default_plugin_root, find_skills_dir, SkillRegistry};
use crate::session::{
    replay_file, session_id_from_path, PricingTable, ProjectScanner, SessionParser,
    SessionStats, SessionTail, SubagentResolver, Timeline,
};
use crate::shared::{Config, ModernTheme};
use crate::ui;

/// How long a status message stays in the header
const STATUS_MAX_AGE: Duration = Duration::from_secs(3);

/// Startup options gathered from the command line
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Working directory of the project whose sessions are shown
    pub project_cwd: PathBuf,
    /// Root of the Claude data directory (`~/.claude`)
    pub claude_dir: PathBuf,
    /// Explicit config file, instead of the XDG location
    pub config_path: Option<PathBuf>,
}

/// Status message for user feedback
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub timestamp: Instant,
    pub message_type: StatusType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusType {
    Info,
    Success,
    Warning,
    Error,
}

/// Main application state
pub struct App {
    /// Flag to indicate if the app should quit
    pub should_quit: bool,
    pub config: Config,
    pub theme: ModernTheme,
    /// Parsed state of every session file loaded so far
    pub parser: SessionParser,
    pricing: PricingTable,
    scanner: ProjectScanner,
    project_cwd: PathBuf,
    /// One tail per replayed session file; the last one is the session being followed
    tails: Vec<SessionTail>,
    /// One per loaded session file
    resolvers: Vec<SubagentResolver>,
    pub registry: SkillRegistry,
    pub hooks: Vec<HookEntry>,
    pub timeline: Timeline,
    pub stats: SessionStats,
    /// First visible WORKFLOW line
    pub workflow_scroll: u16,
    pub status_message: Option<StatusMessage>,
    /// Flag to indicate if UI needs redraw
    needs_redraw: bool,
}

impl App {
    /// Load config and plugin metadata, then replay the project's sessions
    pub fn new(options: AppOptions) -> Result<Self> {
        let config = match &options.config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        let theme = ModernTheme::for_mode(config.theme_mode);
        let pricing = config.pricing_table();

        let skills_dir = find_skills_dir(&default_plugin_root(&options.claude_dir));
        let registry = match &skills_dir {
            Some(dir) => SkillRegistry::load(dir).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not load skill registry");
                SkillRegistry::default()
            }),
            None => SkillRegistry::default(),
        };
        if registry.is_empty() {
            tracing::warn!(claude_dir = %options.claude_dir.display(), "no superpowers skills found");
        }

        // plugin root is the version directory above skills/
        let plugin_dirs: Vec<PathBuf> = skills_dir
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .into_iter()
            .collect();
        let hooks = load_all_hooks(&options.claude_dir.join("settings.json"), &plugin_dirs);

        let mut app = Self {
            should_quit: false,
            config,
            theme,
            parser: SessionParser::new(),
            pricing,
            scanner: ProjectScanner::for_claude_dir(&options.claude_dir),
            project_cwd: options.project_cwd,
            tails: Vec::new(),
            resolvers: Vec::new(),
            registry,
            hooks,
            timeline: Timeline::default(),
            stats: SessionStats::default(),
            workflow_scroll: 0,
            status_message: None,
            needs_redraw: true,
        };

        app.load_sessions()?;
        app.refresh_view();
        Ok(app)
    }

    /// Replay every session of the project, oldest first
    fn load_sessions(&mut self) -> Result<()> {
        let sessions = self.scanner.discover(&self.project_cwd)?;
        if sessions.is_empty() {
            self.show_status("No sessions found", StatusType::Warning);
            return Ok(());
        }

        for path in &sessions {
            match replay_file(path, &mut self.parser) {
                Ok(tail) => {
                    if !self.tails.is_empty() {
                        self.parser.begin_new_session();
                    }
                    self.track_session(tail);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping session"),
            }
        }

        tracing::info!(
            dir = %self.scanner.projects_dir().display(),
            sessions = sessions.len(),
            skills = self.parser.skill_events().len(),
            registry = self.registry.len(),
            "loaded project sessions"
        );
        Ok(())
    }

    fn track_session(&mut self, tail: SessionTail) {
        if let Some(resolver) = SubagentResolver::for_session(tail.path()) {
            let known = self
                .resolvers
                .iter()
                .any(|r| r.session_id() == resolver.session_id());
            if !known {
                self.resolvers.push(resolver);
            }
        }
        self.tails.push(tail);
    }

    /// One poll tick: switch to a newer session file if one appeared, otherwise
    /// read what was appended to the current one. Returns whether anything changed.
    ///
    /// A file that was already replayed and becomes the newest again (a resumed
    /// session) continues from its saved offset instead of being replayed twice.
    pub fn poll(&mut self) -> Result<bool> {
        let sessions = self.scanner.discover(&self.project_cwd)?;

        if let Some(latest) = sessions.last() {
            let current = self.tails.last().map(SessionTail::path);
            if current != Some(latest.as_path()) {
                match self.tails.iter().position(|t| t.path() == latest.as_path()) {
                    Some(index) => {
                        let mut tail = self.tails.remove(index);
                        let read = tail.poll(&mut self.parser);
                        self.tails.push(tail);
                        let count = read?;
                        tracing::info!(path = %latest.display(), lines = count, "resumed session");
                    }
                    None => {
                        let tail = replay_file(latest, &mut self.parser)
                            .with_context(|| format!("Failed to replay {}", latest.display()))?;
                        if !self.tails.is_empty() {
                            self.parser.begin_new_session();
                        }
                        tracing::info!(path = %latest.display(), "switched to new session");
                        self.track_session(tail);
                    }
                }
                return Ok(true);
            }
        }

        match self.tails.last_mut() {
            Some(tail) => {
                let count = tail.poll(&mut self.parser)?;
                if count > 0 {
                    tracing::debug!(lines = count, offset = tail.offset(), "read appended lines");
                }
                Ok(count > 0)
            }
            None => Ok(false),
        }
    }

    /// Resolve subagent transcripts and rebuild the panel view model
    pub fn refresh_view(&mut self) {
        let attached: usize = self
            .resolvers
            .iter()
            .map(|resolver| resolver.resolve(&mut self.parser, &self.pricing))
            .sum();
        if attached > 0 {
            tracing::debug!(attached, "attached subagent details");
        }
        self.parser.assign_roles();

        self.timeline = Timeline::build(&self.parser, &self.pricing);
        self.stats = SessionStats::collect(&self.parser, &self.timeline, &self.pricing);
        self.needs_redraw = true;
    }

    /// Id of the session being tailed
    pub fn session_id(&self) -> Option<String> {
        self.tails
            .last()
            .map(|tail| session_id_from_path(tail.path()))
    }

    fn tick(&mut self) {
        match self.poll() {
            Ok(true) => self.refresh_view(),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "poll failed");
                self.show_status(&format!("Poll failed: {e}"), StatusType::Error);
            }
        }
    }

    /// Run the main application loop
    pub async fn run(&mut self) -> Result<()> {
        if !IsTty::is_tty(&io::stdout()) {
            eprintln!("This application requires a TTY terminal to run.");
            return Ok(());
        }

        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        // Cleanup terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let mut keys = spawn_key_reader();
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while !self.should_quit {
            self.update_status_message(STATUS_MAX_AGE);

            if self.needs_redraw {
                terminal.draw(|f| ui::draw(f, self))?;
                self.needs_redraw = false;
            }

            tokio::select! {
                _ = ticker.tick() => self.tick(),
                key = keys.recv() => match key {
                    Some(key) => self.handle_key_event(key),
                    None => self.should_quit = true,
                },
            }
        }

        Ok(())
    }

    /// Handle keyboard input
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('t') => self.toggle_theme(),
            KeyCode::Char('j') | KeyCode::Down => {
                self.workflow_scroll = self.workflow_scroll.saturating_add(1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.workflow_scroll = self.workflow_scroll.saturating_sub(1);
            }
            KeyCode::Char('r') => {
                self.tick();
                self.refresh_view();
                self.show_status("Refreshed", StatusType::Info);
            }
            _ => return,
        }
        self.needs_redraw = true;
    }

    fn toggle_theme(&mut self) {
        self.config.toggle_theme();
        self.theme = ModernTheme::for_mode(self.config.theme_mode);

        match self.config.save() {
            Ok(()) => {
                let text = format!("Theme: {}", self.config.theme_display());
                self.show_status(&text, StatusType::Success);
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not save config");
                self.show_status("Theme changed (not saved)", StatusType::Warning);
            }
        }
    }

    /// Show a status message to the user
    pub fn show_status(&mut self, text: &str, status_type: StatusType) {
        self.status_message = Some(StatusMessage {
            text: text.to_string(),
            timestamp: Instant::now(),
            message_type: status_type,
        });
        self.needs_redraw = true;
    }

    /// Clear status message if it's older than the specified duration
    pub fn update_status_message(&mut self, max_age: Duration) {
        if let Some(ref msg) = self.status_message {
            if msg.timestamp.elapsed() > max_age {
                self.status_message = None;
                self.needs_redraw = true;
            }
        }
    }
}

/// Forward key presses from a blocking reader thread
fn spawn_key_reader() -> mpsc::UnboundedReceiver<KeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if tx.send(key).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "terminal input failed");
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use serde_json::json;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        claude_dir: PathBuf,
        project_dir: PathBuf,
        cwd: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let claude_dir = dir.path().join(".claude");
        let cwd = PathBuf::from("/Users/al/myproject");
        let project_dir = claude_dir.join("projects").join("-Users-al-myproject");
        fs::create_dir_all(&project_dir).unwrap();
        Fixture {
            claude_dir,
            project_dir,
            cwd,
            _dir: dir,
        }
    }

    fn append(path: &Path, lines: &[serde_json::Value]) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    fn skill_lines(ts: &str, skill: &str) -> Vec<serde_json::Value> {
        vec![
            json!({
                "type": "assistant",
                "timestamp": ts,
                "message": {
                    "model": "claude-opus-4-6",
                    "content": [{"type": "tool_use", "id": format!("tu-{ts}"), "name": "Skill", "input": {"skill": skill}}],
                    "usage": {"input_tokens": 100, "output_tokens": 50}
                }
            }),
            json!({"type": "user", "timestamp": ts, "isMeta": true, "message": {"content": "Base directory for this skill"}}),
        ]
    }

    fn app_for(fx: &Fixture) -> App {
        App::new(AppOptions {
            project_cwd: fx.cwd.clone(),
            claude_dir: fx.claude_dir.clone(),
            config_path: Some(fx.claude_dir.join("superdash.json")),
        })
        .unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_startup_without_sessions() {
        let fx = fixture();
        let app = app_for(&fx);
        assert!(app.session_id().is_none());
        assert!(app.timeline.is_empty());
        assert_eq!(
            app.status_message.as_ref().map(|m| m.message_type),
            Some(StatusType::Warning)
        );
    }

    #[test]
    fn test_startup_replays_and_polls_appended_lines() {
        let fx = fixture();
        let session = fx.project_dir.join("abc123def.jsonl");
        append(&session, &skill_lines("2026-02-10T10:00:00Z", "superpowers:brainstorming"));

        let mut app = app_for(&fx);
        assert_eq!(app.session_id().as_deref(), Some("abc123def"));
        assert_eq!(app.parser.active_skill(), Some("brainstorming"));
        assert_eq!(app.stats.session_count, 1);

        assert!(!app.poll().unwrap());

        append(&session, &skill_lines("2026-02-10T10:10:00Z", "superpowers:writing-plans"));
        assert!(app.poll().unwrap());
        app.refresh_view();
        assert_eq!(app.parser.active_skill(), Some("writing-plans"));
        assert_eq!(app.timeline.skill_rows().count(), 2);
    }

    #[test]
    fn test_new_session_file_starts_new_session() {
        let fx = fixture();
        let first = fx.project_dir.join("first.jsonl");
        append(&first, &skill_lines("2026-02-10T10:00:00Z", "superpowers:brainstorming"));

        let mut app = app_for(&fx);
        assert_eq!(app.parser.session_count(), 1);

        let second = fx.project_dir.join("second.jsonl");
        append(&second, &skill_lines("2026-02-10T12:00:00Z", "superpowers:executing-plans"));
        let later = std::time::SystemTime::now() + Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&second)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(app.poll().unwrap());
        app.refresh_view();
        assert_eq!(app.session_id().as_deref(), Some("second"));
        assert_eq!(app.parser.session_count(), 2);
        assert_eq!(app.stats.skill_count, 2);
        assert!(app.parser.used_skills().contains("brainstorming"));
    }

    #[test]
    fn test_resumed_session_is_not_replayed_twice() {
        let fx = fixture();
        let touch = |path: &Path, secs: u64| {
            fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(std::time::SystemTime::now() + Duration::from_secs(secs))
                .unwrap();
        };

        let old = fx.project_dir.join("old.jsonl");
        append(&old, &skill_lines("2026-02-10T10:00:00Z", "superpowers:brainstorming"));
        touch(&old, 0);
        let newer = fx.project_dir.join("newer.jsonl");
        append(&newer, &skill_lines("2026-02-10T12:00:00Z", "superpowers:writing-plans"));
        touch(&newer, 60);

        let mut app = app_for(&fx);
        assert_eq!(app.session_id().as_deref(), Some("newer"));
        assert_eq!(app.parser.skill_events().len(), 2);

        append(&old, &skill_lines("2026-02-10T13:00:00Z", "superpowers:executing-plans"));
        touch(&old, 120);

        assert!(app.poll().unwrap());
        app.refresh_view();
        assert_eq!(app.session_id().as_deref(), Some("old"));
        assert_eq!(app.parser.session_count(), 2);
        assert_eq!(app.parser.skill_events().len(), 3);
        assert_eq!(app.parser.active_skill(), Some("executing-plans"));
    }

    #[test]
    fn test_key_handling() {
        let fx = fixture();
        let mut app = app_for(&fx);

        app.handle_key_event(key(KeyCode::Char('k')));
        assert_eq!(app.workflow_scroll, 0);
        app.handle_key_event(key(KeyCode::Char('j')));
        app.handle_key_event(key(KeyCode::Char('j')));
        assert_eq!(app.workflow_scroll, 2);

        app.handle_key_event(key(KeyCode::Char('t')));
        assert_eq!(app.theme, ModernTheme::mainframe());
        let saved = Config::load_from(&fx.claude_dir.join("superdash.json")).unwrap();
        assert_eq!(saved.theme_display(), "mainframe");

        assert!(!app.should_quit);
        app.handle_key_event(key(KeyCode::Esc));
        assert!(app.should_quit);
    }
}
