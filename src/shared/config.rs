use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::pricing::{default_pricing, ModelPricing, PricingTable};

/// Smallest accepted poll interval
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Theme options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Terminal,
    Mainframe,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Terminal => ThemeMode::Mainframe,
            ThemeMode::Mainframe => ThemeMode::Terminal,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Session poll interval in milliseconds (minimum 100, default 500)
    pub poll_interval_ms: u64,
    /// Theme mode selection
    pub theme_mode: ThemeMode,
    /// Per-model rate overrides, merged over the built-in table
    pub pricing: BTreeMap<String, ModelPricing>,
    /// Where the config was loaded from; saves go back there
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            theme_mode: ThemeMode::default(),
            pricing: BTreeMap::new(),
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`. A missing or unparsable file yields the
    /// default configuration, which is written back.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            match serde_json::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                    Self::default_saved_to(path)
                }
            }
        } else {
            Self::default_saved_to(path)
        };

        config.path = Some(path.to_path_buf());
        config.poll_interval_ms = config.poll_interval_ms.max(MIN_POLL_INTERVAL_MS);
        Ok(config)
    }

    fn default_saved_to(path: &Path) -> Self {
        let default_config = Config::default();
        if let Err(e) = default_config.save_to(path) {
            tracing::debug!(error = %e, "could not write default config");
        }
        default_config
    }

    /// Save configuration to the file it was loaded from (or the default location)
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => self.save_to(&Self::config_path()?),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;

        // Use XDG config directory standard or fallback to ~/.config
        let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else {
            home_dir.join(".config")
        };

        Ok(config_dir.join("superdash").join("config.json"))
    }

    /// Built-in rates with the user's overrides applied
    pub fn pricing_table(&self) -> PricingTable {
        let mut table = default_pricing();
        for (model, rates) in &self.pricing {
            table.insert(model.clone(), *rates);
        }
        table
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn toggle_theme(&mut self) {
        self.theme_mode = self.theme_mode.toggled();
    }

    pub fn theme_display(&self) -> &str {
        match self.theme_mode {
            ThemeMode::Terminal => "terminal",
            ThemeMode::Mainframe => "mainframe",
        }
    }
}
