use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub prefix: String,
    pub discord_token: String,
    pub database_url: String,
    pub pulse_interval_secs: u64,
    pub message_cache_size: usize,
    /// Command triggers to load, in load order. `None` loads every built-in.
    pub plugins: Option<Vec<String>>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_base: String,
    pub openai_instructions_path: Option<String>,
    pub openai_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            prefix: required("DISCORD_BOT_PREFIX")?,
            discord_token: required("DISCORD_BOT_TOKEN")?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "./data.sqlite3".to_string()),
            pulse_interval_secs: env::var("PULSE_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            message_cache_size: env::var("MESSAGE_CACHE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            plugins: env::var("DISCORD_BOT_PLUGINS").ok().map(|list| parse_list(&list)),
            openai_api_key: optional("DISCORD_BOT_OPENAI_API_KEY"),
            openai_model: env::var("DISCORD_BOT_OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_api_base: env::var("DISCORD_BOT_OPENAI_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_instructions_path: optional("DISCORD_BOT_OPENAI_INSTRUCTIONS_PATH"),
            openai_timeout_secs: env::var("DISCORD_BOT_OPENAI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
        })
    }

    /// Minimal configuration for unit tests.
    #[cfg(test)]
    pub fn for_tests(prefix: &str) -> Self {
        Config {
            prefix: prefix.to_string(),
            discord_token: "test_token".to_string(),
            database_url: ":memory:".to_string(),
            pulse_interval_secs: 30,
            message_cache_size: 100,
            plugins: None,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_api_base: "https://api.openai.com/v1".to_string(),
            openai_instructions_path: None,
            openai_timeout_secs: 120,
        }
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    optional(name).ok_or_else(|| anyhow::anyhow!("{} must be set", name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("prefix", &self.prefix)
            .field("discord_token", &"[REDACTED]")
            .field("database_url", &self.database_url)
            .field("pulse_interval_secs", &self.pulse_interval_secs)
            .field("message_cache_size", &self.message_cache_size)
            .field("plugins", &self.plugins)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_model", &self.openai_model)
            .field("openai_api_base", &self.openai_api_base)
            .field("openai_instructions_path", &self.openai_instructions_path)
            .field("openai_timeout_secs", &self.openai_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Missing required vars
        env::remove_var("DISCORD_BOT_PREFIX");
        env::remove_var("DISCORD_BOT_TOKEN");
        let err = Config::build().unwrap_err();
        assert_eq!(err.to_string(), "DISCORD_BOT_PREFIX must be set");

        env::set_var("DISCORD_BOT_PREFIX", "!");
        env::set_var("DISCORD_BOT_TOKEN", "");
        let err = Config::build().unwrap_err();
        assert_eq!(err.to_string(), "DISCORD_BOT_TOKEN must be set");

        // 2. Defaults
        env::set_var("DISCORD_BOT_TOKEN", "test_token");
        env::set_var("DISCORD_BOT_PLUGINS", "Roll, help,,reminder");
        let config = Config::build().unwrap();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.pulse_interval_secs, 30);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(
            config.plugins,
            Some(vec![
                "roll".to_string(),
                "help".to_string(),
                "reminder".to_string()
            ])
        );

        // 3. Debug redaction
        env::set_var("DISCORD_BOT_OPENAI_API_KEY", "secret_api_key");
        let config_redacted = Config::build().unwrap();
        let debug_output = format!("{:?}", config_redacted);
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("secret_api_key"));
        assert!(debug_output.contains("[REDACTED]"));

        // Cleanup
        env::remove_var("DISCORD_BOT_PREFIX");
        env::remove_var("DISCORD_BOT_TOKEN");
        env::remove_var("DISCORD_BOT_PLUGINS");
        env::remove_var("DISCORD_BOT_OPENAI_API_KEY");
    }
}
