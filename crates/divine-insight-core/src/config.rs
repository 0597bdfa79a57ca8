use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};
use tracing::debug;

use crate::annotations::PersistencePolicy;
use crate::panel::NavigationPolicy;
use crate::provider::Provider;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "gemma3:latest";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Provider,
    pub default_model: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: String,
    pub request_timeout_secs: u64,
    pub annotations_path: Option<PathBuf>,
    pub persistence: PersistencePolicy,
    pub navigation: NavigationPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            default_model: None,
            claude_api_key: None,
            openai_api_key: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            request_timeout_secs: 60,
            annotations_path: None,
            persistence: PersistencePolicy::default(),
            navigation: NavigationPolicy::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Environment variables win over keys stored in the config file
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        let from_env = provider
            .api_key_env()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.trim().is_empty());

        from_env.or_else(|| match provider {
            Provider::Ollama => None,
            Provider::Claude => self.claude_api_key.clone(),
            Provider::OpenAI => self.openai_api_key.clone(),
        })
    }

    pub fn model(&self) -> String {
        if let Some(model) = &self.default_model {
            return model.clone();
        }
        match self.provider {
            Provider::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
            Provider::Claude => crate::ai::ClaudeClient::list_models().into_iter().next().unwrap_or_default(),
            Provider::OpenAI => crate::ai::OpenAIClient::list_models().into_iter().next().unwrap_or_default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("divine-insight").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.navigation, NavigationPolicy::KeepOpen);
        assert_eq!(config.persistence, PersistencePolicy::BestEffort);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"provider":"claude","navigation":"close","persistence":"fail_closed"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider, Provider::Claude);
        assert_eq!(config.navigation, NavigationPolicy::Close);
        assert_eq!(config.persistence, PersistencePolicy::FailClosed);
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.model(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            default_model: Some("llama3.2:latest".to_string()),
            request_timeout_secs: 5,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.model(), "llama3.2:latest");
        assert_eq!(loaded.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_ollama_needs_no_key() {
        assert_eq!(Config::default().api_key(Provider::Ollama), None);
    }
}
