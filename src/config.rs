use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::screens::{MIN_WIDTH_VAR, PADDING_VAR};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_min_width")]
    pub min_width: u16,
    #[serde(default = "default_padding")]
    pub padding: u16,
    #[serde(default = "default_rounds")]
    pub default_rounds: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_min_width() -> u16 {
    50
}
fn default_padding() -> u16 {
    1
}
fn default_rounds() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("memotui")
        .join("memotui.log")
        .to_string_lossy()
        .to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            min_width: default_min_width(),
            padding: default_padding(),
            default_rounds: default_rounds(),
            log_level: default_log_level(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// Load from the user config directory, writing the defaults there on
    /// first launch.
    pub fn load() -> Result<Self> {
        Self::load_or_init(&Self::config_path())
    }

    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Config::default();
        if let Err(err) = config.save_to(path) {
            tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "could not write default config");
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memotui")
            .join("config.toml")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Make the layout settings visible to screens through the variable store.
    pub fn publish(&self, ctx: &mut Context) {
        let vars = ctx.variables_mut();
        for (name, value) in [(MIN_WIDTH_VAR, self.min_width), (PADDING_VAR, self.padding)] {
            if vars.add(name, i64::from(value)) {
                continue;
            }
            if let Err(err) = vars.set(name, i64::from(value)) {
                tracing::warn!(variable = name, error = %err, "replacing variable of another type");
                vars.remove(name);
                vars.add(name, i64::from(value));
            }
        }
    }
}
