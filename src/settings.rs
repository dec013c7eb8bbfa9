use crate::overlay::placement::{LayoutMetrics, ScreenMetrics};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// When enabled the application initialises the logger at debug level.
    /// Defaults to `false` when the field is missing in the settings file.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file receiving log output in addition to stderr.
    #[serde(default)]
    pub log_file: Option<String>,
    /// Where the overlay state record lives. If `None`, the file is kept
    /// next to the executable.
    #[serde(default)]
    pub state_file: Option<String>,
    /// Opponents are named "<prefix> N".
    #[serde(default = "default_name_prefix")]
    pub opponent_name_prefix: String,
    /// Surface dimensions in density-independent units.
    #[serde(default)]
    pub layout: LayoutMetrics,
    /// Screen reported by the headless host.
    #[serde(default)]
    pub screen: ScreenMetrics,
}

fn default_name_prefix() -> String {
    "Opponent".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_file: None,
            state_file: None,
            opponent_name_prefix: default_name_prefix(),
            layout: LayoutMetrics::default(),
            screen: ScreenMetrics::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn state_file_path(&self) -> Option<PathBuf> {
        self.state_file
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    /// The configured prefix, or the default when it is blank.
    pub fn name_prefix(&self) -> &str {
        let prefix = self.opponent_name_prefix.trim();
        if prefix.is_empty() {
            "Opponent"
        } else {
            prefix
        }
    }
}
