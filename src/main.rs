use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

mod app;
mod features;
mod session;
mod shared;
mod ui;
mod widgets;

#[cfg(test)]
mod widgets_tests;

#[derive(Parser, Debug)]
#[command(
    name = "superdash",
    version,
    about = "Live dashboard for superpowers skills, subagents and compactions"
)]
struct Cli {
    /// Project working directory whose sessions are shown (default: current directory)
    #[arg(long)]
    project: Option<PathBuf>,
    /// Claude data directory (default: ~/.claude)
    #[arg(long)]
    claude_dir: Option<PathBuf>,
    /// Config file (default: $XDG_CONFIG_HOME/superdash/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_options(self) -> Result<app::AppOptions> {
        let project_cwd = match self.project {
            Some(path) => path,
            None => std::env::current_dir().context("Could not read current directory")?,
        };
        let claude_dir = match self.claude_dir {
            Some(path) => path,
            None => session::default_claude_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?,
        };
        Ok(app::AppOptions {
            project_cwd,
            claude_dir,
            config_path: self.config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = shared::logging::init_logging() {
        eprintln!("Warning: logging disabled: {e}");
    }

    let mut app = app::App::new(cli.into_options()?)?;

    // Run the TUI
    app.run().await?;

    Ok(())
}
