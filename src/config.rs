// src/config.rs
//! Runtime configuration: `config/monitor.toml` plus env overrides.
//!
//! Lookup order for the file:
//! 1) $MONITOR_CONFIG_PATH (must exist)
//! 2) config/monitor.toml (optional; built-in defaults otherwise)
//!
//! Env overrides applied afterwards: FEED_ENDPOINT, FEED_CACHE_TTL_SECS,
//! FEED_HTTP_TIMEOUT_SECS.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";

pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";
pub const ENV_FEED_ENDPOINT: &str = "FEED_ENDPOINT";
pub const ENV_CACHE_TTL_SECS: &str = "FEED_CACHE_TTL_SECS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "FEED_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub profile: AuthorProfile,
}

/// Query window and cache policy for the arXiv feed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub endpoint: String,
    pub search_query: String,
    pub start: u32,
    pub max_results: u32,
    pub sort_by: String,
    pub sort_order: String,
    pub cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// Human label for the monitored category, shown next to the count.
    pub category_label: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://export.arxiv.org/api/query".to_string(),
            search_query: "cat:q-fin.*".to_string(),
            start: 0,
            max_results: 20,
            sort_by: "submittedDate".to_string(),
            sort_order: "descending".to_string(),
            cache_ttl_secs: 3600,
            http_timeout_secs: 30,
            user_agent: concat!("quant-alpha-monitor/", env!("CARGO_PKG_VERSION")).to_string(),
            category_label: "q-fin (Quantitative Finance)".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Static sidebar content.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthorProfile {
    pub name: String,
    pub role: String,
    pub focus: Vec<String>,
    pub note: String,
    pub avatar_url: Option<String>,
    pub data_source: String,
}

impl Default for AuthorProfile {
    fn default() -> Self {
        Self {
            name: "Your Name".to_string(),
            role: "Quantitative Researcher".to_string(),
            focus: vec![
                "Momentum strategies".to_string(),
                "Econometric models".to_string(),
                "Algorithmic trading".to_string(),
            ],
            note: "Automated data collection and market monitoring demo.".to_string(),
            avatar_url: None,
            data_source: "arXiv API".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing monitor config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// File lookup (see module docs) followed by env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
            if pb.exists() {
                Self::load_from(&pb)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_nonempty(ENV_FEED_ENDPOINT) {
            self.feed.endpoint = v;
        }
        if let Some(v) = env_nonempty(ENV_CACHE_TTL_SECS) {
            self.feed.cache_ttl_secs = v
                .parse()
                .with_context(|| format!("{ENV_CACHE_TTL_SECS}={v} is not a number"))?;
        }
        if let Some(v) = env_nonempty(ENV_HTTP_TIMEOUT_SECS) {
            self.feed.http_timeout_secs = v
                .parse()
                .with_context(|| format!("{ENV_HTTP_TIMEOUT_SECS}={v} is not a number"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.feed.max_results == 0 {
            bail!("feed.max_results must be at least 1");
        }
        if self.feed.cache_ttl_secs == 0 {
            bail!("feed.cache_ttl_secs must be at least 1");
        }
        if self.feed.endpoint.trim().is_empty() {
            bail!("feed.endpoint must not be empty");
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_env() {
        for k in [
            ENV_CONFIG_PATH,
            ENV_FEED_ENDPOINT,
            ENV_CACHE_TTL_SECS,
            ENV_HTTP_TIMEOUT_SECS,
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
[feed]
max_results = 5

[profile]
name = "J. Doe"
focus = ["Carry"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.feed.max_results, 5);
        assert_eq!(cfg.feed.search_query, "cat:q-fin.*");
        assert_eq!(cfg.feed.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.profile.name, "J. Doe");
        assert_eq!(cfg.profile.focus, vec!["Carry".to_string()]);
        assert_eq!(cfg.profile.data_source, "arXiv API");
    }

    #[test]
    fn zero_ttl_or_count_is_rejected() {
        assert!(AppConfig::from_toml_str("[feed]\ncache_ttl_secs = 0").is_err());
        assert!(AppConfig::from_toml_str("[feed]\nmax_results = 0").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_path_then_overrides() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        clear_env();

        // No file in CWD -> built-in defaults
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg, AppConfig::default());

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[feed]\ncache_ttl_secs = 120\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(AppConfig::load_default().unwrap().feed.cache_ttl_secs, 120);

        env::set_var(ENV_CACHE_TTL_SECS, "60");
        env::set_var(ENV_FEED_ENDPOINT, "http://127.0.0.1:9/api/query");
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.feed.cache_ttl_secs, 60);
        assert_eq!(cfg.feed.endpoint, "http://127.0.0.1:9/api/query");

        env::set_var(ENV_CACHE_TTL_SECS, "soon");
        assert!(AppConfig::load_default().is_err());

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(AppConfig::load_default().is_err());

        clear_env();
        env::set_current_dir(&old).unwrap();
    }
}
