use crate::core::config::Config;
use crate::services::llm::{GeminiConfig, OpenAIConfig};
use anyhow::Result;
use inquire::{Password, PasswordDisplayMode, Text};

/// Identity used for sessions kept on this device.
pub const LOCAL_USER: &str = "local";

/// Which credential the configured provider still lacks, as `(provider, env var)`.
pub fn missing_credential(config: &Config) -> Option<(&'static str, &'static str)> {
    let has = |key: Option<&str>, env: &str| {
        key.is_some_and(|k| !k.trim().is_empty())
            || std::env::var(env).is_ok_and(|k| !k.trim().is_empty())
    };
    match config.llm.provider.as_str() {
        "openai" => {
            let key = config.llm.openai.as_ref().and_then(|c| c.api_key.as_deref());
            (!has(key, "OPENAI_API_KEY")).then_some(("OpenAI", "OPENAI_API_KEY"))
        }
        "gemini" => {
            let key = config.llm.gemini.as_ref().and_then(|c| c.api_key.as_deref());
            (!has(key, "GEMINI_API_KEY")).then_some(("Gemini", "GEMINI_API_KEY"))
        }
        _ => None,
    }
}

/// Owner of the session records: the configured remote user, or this device.
pub fn session_user(config: &Config) -> String {
    config
        .storage
        .remote
        .as_ref()
        .and_then(|r| r.user_id.clone())
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| LOCAL_USER.to_string())
}

/// Asks for whatever the config is missing and saves it.
pub async fn run_setup(config: &mut Config) -> Result<()> {
    let mut needs_save = false;

    if let Some((provider, env_var)) = missing_credential(config) {
        println!("{} API key is not configured (you can also set {}).", provider, env_var);
        let key = Password::new(&format!("{} API key:", provider))
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()?;
        let key = Some(key.trim().to_string());
        match config.llm.provider.as_str() {
            "gemini" => {
                config
                    .llm
                    .gemini
                    .get_or_insert_with(GeminiConfig::default)
                    .api_key = key
            }
            _ => {
                config
                    .llm
                    .openai
                    .get_or_insert_with(OpenAIConfig::default)
                    .api_key = key
            }
        }
        needs_save = true;
    }

    if let Some(remote) = config.storage.remote.as_mut() {
        if remote.user_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            let user_id = Text::new("User id for saved stories:").prompt()?;
            remote.user_id = Some(user_id.trim().to_string());
            needs_save = true;
        }
    }

    if needs_save {
        config.save()?;
        println!("Configuration saved.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_and_identity() {
        let mut config = Config::from_yaml(
            r#"
llm:
  provider: ollama
  ollama:
    base_url: http://localhost:11434
    model: qwen3
"#,
        )
        .unwrap();
        assert_eq!(missing_credential(&config), None);
        assert_eq!(session_user(&config), LOCAL_USER);

        config.llm.provider = "gemini".to_string();
        config.llm.gemini = Some(GeminiConfig {
            api_key: Some("key".to_string()),
            ..GeminiConfig::default()
        });
        assert_eq!(missing_credential(&config), None);

        config.storage.remote = Some(crate::services::repository::RemoteConfig {
            url: "https://example.supabase.co".to_string(),
            api_key: "anon".to_string(),
            access_token: None,
            user_id: Some("u-1".to_string()),
            table: "story".to_string(),
        });
        assert_eq!(session_user(&config), "u-1");
    }
}
