use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable that overrides the stored API token, so the
/// secret never has to live in the config file at all.
pub const TOKEN_ENV_VAR: &str = "TICKETFLOW_TOKEN";

#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    pub api: ApiConfig,
    pub export: ExportConfig,
    pub extract: ExtractConfig,
    /// Static dictionary from `customField_<id>` columns to display labels.
    /// Maintained independently of any one run's data; stale entries are
    /// expected and harmless.
    #[serde(default)]
    pub field_labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    /// Optional `ownerTeam ne '<team>'` predicate appended to every filter.
    #[serde(default)]
    pub team_exclusion: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExportConfig {
    pub destination: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_actions_file_name")]
    pub actions_file_name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExtractConfig {
    /// Used when `run` is invoked without --start-date.
    pub default_start_date: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_file_name() -> String {
    "tickets.csv".to_string()
}

fn default_actions_file_name() -> String {
    "actions.csv".to_string()
}

fn default_page_size() -> usize {
    1000
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!("{}", crate::errors::TicketFlowError::ConfigNotFound);
        }

        let config_str = std::fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let mut settings = Self::from_toml_str(&config_str)?;
        settings.apply_token_override(std::env::var(TOKEN_ENV_VAR).ok());

        Ok(settings)
    }

    /// Replaces the stored token with the TICKETFLOW_TOKEN value, when one
    /// is set and non-blank. Split out from `load` so the precedence rule
    /// is testable without touching process env.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token {
            let token = token.trim();
            if !token.is_empty() {
                self.api.token = token.to_string();
            }
        }
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(config_str).map_err(|e| {
            anyhow::anyhow!("{}", crate::errors::TicketFlowError::ConfigInvalid(e.to_string()))
        })?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, config_str)
            .context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&config_path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&config_path, perms)?;
        }

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".ticketflow"))
    }
}
