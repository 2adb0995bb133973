use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Environment variables checked for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub export_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            export_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Applies `architect config set <key> <value>`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "model" => self.model = value.to_string(),
            "endpoint" => self.endpoint = value.trim_end_matches('/').to_string(),
            "api-key" => {
                self.api_key = (!value.is_empty()).then(|| value.to_string());
            }
            "export-dir" => {
                self.export_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            other => return Err(anyhow!("Unknown config key: {}", other)),
        }
        Ok(())
    }

    /// Where exports are written: the configured directory or the current one.
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Which source would supply the API key right now, for display.
    pub fn key_source(&self) -> Option<&'static str> {
        API_KEY_ENV_VARS
            .iter()
            .copied()
            .find(|var| env_key(var).is_some())
            .or_else(|| self.api_key.as_ref().map(|_| "config file"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("vision-architect").join("config.json"))
    }
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

/// Resolves the API key at call time: environment first, then `fallback`.
pub fn resolve_api_key(fallback: Option<&str>) -> Option<String> {
    resolve_api_key_from(&API_KEY_ENV_VARS, fallback)
}

/// Like [`resolve_api_key`], checking only `vars`.
pub fn resolve_api_key_from(vars: &[&str], fallback: Option<&str>) -> Option<String> {
    vars.iter()
        .find_map(|var| env_key(var))
        .or_else(|| {
            fallback
                .filter(|k| !k.trim().is_empty())
                .map(|k| k.to_string())
        })
}
