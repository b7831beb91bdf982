use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub pixeldrain: PixeldrainConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Application identity from my.telegram.org.
    pub api_id: i64,
    /// Application secret paired with `api_id`.
    pub api_hash: String,
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PixeldrainConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-upload timeout. Unset leaves the transfer unbounded; large files
    /// on slow links can legitimately take minutes.
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,
    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    /// Debounce window: a batch fires this long after the last attachment.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Max size of a single inbound attachment.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Evict unconsumed album offers after this many seconds.
    /// Unset keeps them until consumed.
    #[serde(default)]
    pub pending_ttl_secs: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_file_size_mb: default_max_file_size_mb(),
            pending_ttl_secs: None,
        }
    }
}

fn default_base_url() -> String {
    "https://pixeldrain.com".to_string()
}

fn default_list_timeout_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    3500
}

fn default_max_file_size_mb() -> u64 {
    20
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.telegram.api_hash = resolve_env_ref(config.telegram.api_hash)?;
        config.telegram.bot_token = resolve_env_ref(config.telegram.bot_token)?;
        config.pixeldrain.api_key = resolve_env_ref(config.pixeldrain.api_key)?;
        Ok(config)
    }
}

/// Resolve an `env:NAME` secret reference against the process environment.
/// Plain values pass through untouched.
fn resolve_env_ref(value: String) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(name) => std::env::var(name)
            .map_err(|_| anyhow::anyhow!("environment variable {} is not set", name)),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [telegram]
        api_id = 12345
        api_hash = "abc"
        bot_token = "123:token"

        [pixeldrain]
        api_key = "key"
    "#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.telegram.api_id, 12345);
        assert_eq!(config.pixeldrain.base_url, "https://pixeldrain.com");
        assert_eq!(config.pixeldrain.upload_timeout_secs, None);
        assert_eq!(config.pixeldrain.list_timeout_secs, 30);
        assert_eq!(config.batch.debounce_ms, 3500);
        assert_eq!(config.batch.max_file_size_mb, 20);
        assert_eq!(config.batch.pending_ttl_secs, None);
    }

    #[test]
    fn missing_required_setting_is_rejected() {
        let without_key = r#"
            [telegram]
            api_id = 12345
            api_hash = "abc"
            bot_token = "123:token"

            [pixeldrain]
        "#;
        let result: Result<AppConfig, _> = toml::from_str(without_key);
        assert!(result.is_err());

        let without_telegram = r#"
            [pixeldrain]
            api_key = "key"
        "#;
        let result: Result<AppConfig, _> = toml::from_str(without_telegram);
        assert!(result.is_err());
    }

    #[test]
    fn env_ref_resolves_from_environment() {
        std::env::set_var("PIXELFERRY_TEST_SECRET", "resolved");
        assert_eq!(
            resolve_env_ref("env:PIXELFERRY_TEST_SECRET".to_string()).unwrap(),
            "resolved"
        );
        assert_eq!(resolve_env_ref("plain".to_string()).unwrap(), "plain");
    }

    #[test]
    fn unset_env_ref_is_an_error() {
        let err = resolve_env_ref("env:PIXELFERRY_TEST_UNSET_VAR".to_string()).unwrap_err();
        assert!(err.to_string().contains("PIXELFERRY_TEST_UNSET_VAR"));
    }

    #[test]
    fn batch_section_overrides_defaults() {
        let toml = format!("{}\n[batch]\ndebounce_ms = 500\npending_ttl_secs = 600\n", MINIMAL);
        let config: AppConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.batch.debounce_ms, 500);
        assert_eq!(config.batch.pending_ttl_secs, Some(600));
        assert_eq!(config.batch.max_file_size_mb, 20);
    }
}
