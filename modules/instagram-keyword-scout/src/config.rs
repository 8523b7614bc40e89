use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::job::INSTAGRAM_SEARCH_SCRAPER;

pub const DEFAULT_LOCAL_STORAGE_DIR: &str = "./storage";

/// Scout configuration loaded from environment variables.
/// Run parameters (keyword, limits, proxy) come from the run input instead.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    // Apify
    pub apify_token: String,
    pub apify_base_url: String,
    pub actor_id: String,

    // Platform storage (set by the platform when running as an actor)
    pub default_dataset_id: Option<String>,
    pub default_key_value_store_id: Option<String>,

    // Local storage
    pub local_storage_dir: PathBuf,

    // Remote job
    pub run_timeout: Option<Duration>,
}

impl ScoutConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let apify_token = std::env::var("APIFY_TOKEN")
            .or_else(|_| std::env::var("APIFY_API_TOKEN"))
            .context("APIFY_TOKEN (or APIFY_API_TOKEN) must be set")?;

        let run_timeout = match std::env::var("SCOUT_RUN_TIMEOUT_SECS") {
            Ok(raw) => Some(Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("SCOUT_RUN_TIMEOUT_SECS is not a number: {raw}"))?,
            )),
            Err(_) => None,
        };

        let config = Self {
            apify_token,
            apify_base_url: std::env::var("APIFY_API_BASE_URL")
                .unwrap_or_else(|_| apify_client::DEFAULT_BASE_URL.to_string()),
            actor_id: std::env::var("SCOUT_ACTOR_ID")
                .unwrap_or_else(|_| INSTAGRAM_SEARCH_SCRAPER.to_string()),
            default_dataset_id: non_empty_var("ACTOR_DEFAULT_DATASET_ID"),
            default_key_value_store_id: non_empty_var("ACTOR_DEFAULT_KEY_VALUE_STORE_ID"),
            local_storage_dir: std::env::var("APIFY_LOCAL_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOCAL_STORAGE_DIR)),
            run_timeout,
        };

        config.log_keys();
        Ok(config)
    }

    /// Both platform storage ids are present, i.e. we run as an actor.
    pub fn on_platform(&self) -> bool {
        self.default_dataset_id.is_some() && self.default_key_value_store_id.is_some()
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  APIFY_TOKEN: {}", preview(&self.apify_token));
        tracing::info!("  APIFY_API_BASE_URL: {}", self.apify_base_url);
        tracing::info!("  SCOUT_ACTOR_ID: {}", self.actor_id);
        tracing::info!(
            "  ACTOR_DEFAULT_DATASET_ID: {}",
            self.default_dataset_id.as_deref().unwrap_or("<not set>")
        );
        tracing::info!(
            "  ACTOR_DEFAULT_KEY_VALUE_STORE_ID: {}",
            self.default_key_value_store_id.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  APIFY_LOCAL_STORAGE_DIR: {}", self.local_storage_dir.display());
        match self.run_timeout {
            Some(t) => tracing::info!("  SCOUT_RUN_TIMEOUT_SECS: {}", t.as_secs()),
            None => tracing::info!("  SCOUT_RUN_TIMEOUT_SECS: <not set>"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn preview(val: &str) -> String {
    let n = val.chars().take(5).map(char::len_utf8).sum::<usize>();
    format!("{}...({} chars)", &val[..n], val.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_only_prefix() {
        assert_eq!(preview("apify_api_secret"), "apify...(16 chars)");
        assert_eq!(preview("abc"), "abc...(3 chars)");
    }

    #[test]
    fn platform_needs_both_store_ids() {
        let mut config = ScoutConfig {
            apify_token: "t".into(),
            apify_base_url: apify_client::DEFAULT_BASE_URL.into(),
            actor_id: INSTAGRAM_SEARCH_SCRAPER.into(),
            default_dataset_id: Some("ds".into()),
            default_key_value_store_id: None,
            local_storage_dir: PathBuf::from(DEFAULT_LOCAL_STORAGE_DIR),
            run_timeout: None,
        };
        assert!(!config.on_platform());
        config.default_key_value_store_id = Some("kvs".into());
        assert!(config.on_platform());
    }
}
