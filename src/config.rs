//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, webhook URL) are referenced by env-var name in the
//! config and resolved at startup via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the purchase marker when no path is configured.
const MARKER_FILE_NAME: &str = "lhbot-bought.lock";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub lighthouse: LighthouseConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub poll_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
    /// Where the "already purchased" marker lives.
    pub marker_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            heartbeat_interval_secs: 3600,
            marker_path: None,
        }
    }
}

impl AgentConfig {
    /// Configured marker path, else `$HOME/lhbot-bought.lock`, else the
    /// working directory.
    pub fn marker_path(&self) -> PathBuf {
        if let Some(path) = &self.marker_path {
            return path.clone();
        }
        match std::env::var_os("HOME").filter(|h| !h.is_empty()) {
            Some(home) => Path::new(&home).join(MARKER_FILE_NAME),
            None => {
                info!("No home directory, keeping purchase marker in working directory");
                PathBuf::from(MARKER_FILE_NAME)
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LighthouseConfig {
    pub endpoint: String,
    pub region: String,
    /// Bundles to watch, in priority order.
    pub bundle_ids: Vec<String>,
    /// Image for the purchased instance (default is Debian 12).
    pub blueprint_id: String,
    pub period_months: u32,
    pub renew_flag: String,
    pub auto_voucher: bool,
    pub timeout_secs: u64,
    pub secret_id_env: String,
    pub secret_key_env: String,
    pub root_password_env: String,
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self {
            endpoint: "lighthouse.tencentcloudapi.com".into(),
            region: "ap-hongkong".into(),
            bundle_ids: vec![
                "bundle_rs_nmc_lin_med1_02".into(),
                "bundle_rs_nmc_lin_med2_01".into(),
            ],
            blueprint_id: "lhbp-mxml4cnq".into(),
            period_months: 1,
            renew_flag: "NOTIFY_AND_AUTO_RENEW".into(),
            auto_voucher: true,
            timeout_secs: 10,
            secret_id_env: "CLIENT_ID".into(),
            secret_key_env: "CLIENT_SECRET".into(),
            root_password_env: "ROOT_PASSWORD".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WebhookConfig {
    pub url_env: String,
    pub chat_id_env: String,
    pub mention_env: String,
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url_env: "WEBHOOK".into(),
            chat_id_env: "CHAT_ID".into(),
            mention_env: "MENTIONED_USERID".into(),
            timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise use built-in defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolve an environment variable name to its value.
    /// Empty values count as unset.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        match std::env::var(env_name) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => anyhow::bail!("Environment variable not set: {env_name}"),
        }
    }

    fn optional_env(env_name: &str) -> Option<String> {
        Self::resolve_env(env_name).ok()
    }

    /// Resolve every secret the agent needs. Missing required values are
    /// fatal.
    pub fn secrets(&self) -> Result<Secrets> {
        Ok(Secrets {
            secret_id: SecretString::new(Self::resolve_env(&self.lighthouse.secret_id_env)?),
            secret_key: SecretString::new(Self::resolve_env(&self.lighthouse.secret_key_env)?),
            root_password: Self::optional_env(&self.lighthouse.root_password_env)
                .map(SecretString::new),
            webhook_url: SecretString::new(Self::resolve_env(&self.webhook.url_env)?),
            chat_id: Self::resolve_env(&self.webhook.chat_id_env)?,
            mention: Self::optional_env(&self.webhook.mention_env),
        })
    }
}

/// Values resolved from the environment.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub secret_id: SecretString,
    pub secret_key: SecretString,
    pub root_password: Option<SecretString>,
    pub webhook_url: SecretString,
    pub chat_id: String,
    /// User to mention on availability alerts; `@all` when unset.
    pub mention: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.poll_interval_secs, 30);
        assert_eq!(cfg.agent.heartbeat_interval_secs, 3600);
        assert_eq!(cfg.lighthouse.region, "ap-hongkong");
        assert_eq!(cfg.lighthouse.bundle_ids.len(), 2);
        assert_eq!(cfg.webhook.url_env, "WEBHOOK");
    }

    #[test]
    fn test_parse_partial_file() {
        let cfg = AppConfig::parse(
            r#"
            [agent]
            poll_interval_secs = 10
            marker_path = "/var/lib/lhbot/bought.lock"

            [lighthouse]
            region = "ap-singapore"
            bundle_ids = ["bundle_a"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.agent.poll_interval_secs, 10);
        assert_eq!(cfg.agent.heartbeat_interval_secs, 3600);
        assert_eq!(
            cfg.agent.marker_path(),
            PathBuf::from("/var/lib/lhbot/bought.lock")
        );
        assert_eq!(cfg.lighthouse.region, "ap-singapore");
        assert_eq!(cfg.lighthouse.bundle_ids, vec!["bundle_a".to_string()]);
        assert_eq!(cfg.lighthouse.endpoint, "lighthouse.tencentcloudapi.com");
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        assert!(AppConfig::parse("[agent]\npoll_interval_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = AppConfig::load_or_default("/tmp/lhbot_no_such_config_987.toml").unwrap();
        assert_eq!(cfg.agent.poll_interval_secs, 30);
    }

    #[test]
    fn test_secrets_from_env() {
        // Unique variable names so parallel tests don't interfere.
        let mut cfg = AppConfig::default();
        cfg.lighthouse.secret_id_env = "LHBOT_TEST_SECRETS_ID".into();
        cfg.lighthouse.secret_key_env = "LHBOT_TEST_SECRETS_KEY".into();
        cfg.lighthouse.root_password_env = "LHBOT_TEST_SECRETS_PW".into();
        cfg.webhook.url_env = "LHBOT_TEST_SECRETS_URL".into();
        cfg.webhook.chat_id_env = "LHBOT_TEST_SECRETS_CHAT".into();
        cfg.webhook.mention_env = "LHBOT_TEST_SECRETS_MENTION".into();

        std::env::set_var("LHBOT_TEST_SECRETS_ID", "AKID");
        std::env::set_var("LHBOT_TEST_SECRETS_KEY", "key");
        std::env::set_var("LHBOT_TEST_SECRETS_URL", "https://hook.example.com/x");
        std::env::set_var("LHBOT_TEST_SECRETS_CHAT", "chat-1");
        std::env::set_var("LHBOT_TEST_SECRETS_MENTION", "");

        let secrets = cfg.secrets().unwrap();
        assert_eq!(secrets.secret_id.expose_secret(), "AKID");
        assert_eq!(secrets.chat_id, "chat-1");
        assert!(secrets.root_password.is_none());
        assert!(secrets.mention.is_none());
    }

    #[test]
    fn test_missing_required_secret_is_error() {
        let mut cfg = AppConfig::default();
        cfg.lighthouse.secret_id_env = "LHBOT_TEST_MISSING_ID_VAR".into();
        let err = cfg.secrets().unwrap_err();
        assert!(err.to_string().contains("LHBOT_TEST_MISSING_ID_VAR"));
    }
}
