use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::llm::LlmConfig;
use crate::services::repository::RemoteConfig;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub prompts: PromptsConfig,

    pub llm: LlmConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PromptsConfig {
    /// Template file. The copy embedded in the binary is used when unset.
    pub path: Option<String>,

    /// Re-read the template file on every resolution (development mode).
    #[serde(default)]
    pub live_reload: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_folder")]
    pub data_folder: String,

    /// Remote session table. Without it, sessions stay on this device.
    pub remote: Option<RemoteConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_folder: default_data_folder(),
            remote: None,
        }
    }
}

fn default_data_folder() -> String {
    "data".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(CONFIG_FILE, content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.storage.data_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml(
            r#"
llm:
  provider: openai
  openai:
    model: gpt-4.1
"#,
        )
        .unwrap();

        assert_eq!(config.storage.data_folder, "data");
        assert!(config.storage.remote.is_none());
        assert!(config.prompts.path.is_none());
        assert!(!config.prompts.live_reload);
        assert_eq!(config.llm.max_tokens, 4000);
        assert_eq!(config.llm.temperature, 1.0);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(
            r#"
prompts:
  path: prompts.yaml
  live_reload: true
llm:
  provider: ollama
  temperature: 0.7
  ollama:
    base_url: http://localhost:11434/
    model: llama3
storage:
  data_folder: /tmp/story
  remote:
    url: https://example.supabase.co
    api_key: anon
    access_token: token
    user_id: 5f0c
"#,
        )
        .unwrap();

        assert!(config.prompts.live_reload);
        assert_eq!(config.llm.provider, "ollama");
        let remote = config.storage.remote.unwrap();
        assert_eq!(remote.table, "story");
        assert_eq!(remote.user_id.as_deref(), Some("5f0c"));
    }

    #[test]
    fn test_load_missing_file_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let err = Config::load_from(dir.path().join("config.yml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
        Ok(())
    }
}
