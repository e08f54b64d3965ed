//! Application configuration.
//!
//! Values come from built-in defaults, then an optional TOML file named by
//! `THREADIST_CONFIG`, then environment variables. A `.env` file is honoured
//! outside of tests.

use crate::ConfigError;
use serde::Deserialize;
use std::path::Path;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://threadist.db?mode=rwc";
pub const DEFAULT_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";
/// Upper bound on the stories shown in the Hot section.
pub const MAX_HOT_LIMIT: usize = 15;

/// Sizes and limits used when assembling the home feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub hot_limit: usize,
    pub section_size: usize,
    /// Below this many native matches a category section is backfilled.
    pub section_min_native: usize,
    pub min_subreddit_sections: usize,
    pub max_subreddit_sections: usize,
    pub recommended_limit: usize,
    pub page_size: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            hot_limit: 15,
            section_size: 6,
            section_min_native: 4,
            min_subreddit_sections: 4,
            max_subreddit_sections: 6,
            recommended_limit: 20,
            page_size: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: Url,
    pub database_url: String,
    pub default_voice_id: String,
    pub request_timeout_secs: u64,
    pub feed: FeedSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api_base_url: Option<String>,
    database_url: Option<String>,
    default_voice_id: Option<String>,
    request_timeout_secs: Option<u64>,
    feed: Option<FeedSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default base URL is valid"),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            default_voice_id: DEFAULT_VOICE_ID.to_string(),
            request_timeout_secs: 30,
            feed: FeedSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let mut config = match std::env::var("THREADIST_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        let mut config = Self::default();

        if let Some(base) = file.api_base_url {
            config.api_base_url = parse_base_url(&base)?;
        }
        if let Some(database_url) = file.database_url {
            config.database_url = database_url;
        }
        if let Some(voice) = file.default_voice_id {
            config.default_voice_id = voice;
        }
        if let Some(timeout) = file.request_timeout_secs {
            config.request_timeout_secs = timeout;
        }
        if let Some(feed) = file.feed {
            config.feed = feed;
        }
        Ok(config)
    }

    /// Applies `THREADIST_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup("THREADIST_API_URL") {
            self.api_base_url = parse_base_url(&base)?;
        }
        if let Some(database_url) = lookup("THREADIST_DATABASE_URL") {
            self.database_url = database_url;
        }
        if let Some(voice) = lookup("THREADIST_VOICE_ID") {
            self.default_voice_id = voice;
        }
        if let Some(timeout) = lookup("THREADIST_REQUEST_TIMEOUT") {
            self.request_timeout_secs =
                timeout
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "THREADIST_REQUEST_TIMEOUT".to_string(),
                        value: timeout.clone(),
                    })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let feed = &self.feed;
        if feed.section_size == 0 || feed.page_size == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "section_size and page_size must be positive".to_string(),
            });
        }
        if feed.hot_limit > MAX_HOT_LIMIT {
            return Err(ConfigError::ValidationFailed {
                reason: format!("hot_limit cannot exceed {}", MAX_HOT_LIMIT),
            });
        }
        if feed.section_min_native > feed.section_size {
            return Err(ConfigError::ValidationFailed {
                reason: "section_min_native cannot exceed section_size".to_string(),
            });
        }
        if feed.min_subreddit_sections > feed.max_subreddit_sections {
            return Err(ConfigError::ValidationFailed {
                reason: "min_subreddit_sections cannot exceed max_subreddit_sections".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|_| ConfigError::InvalidValue {
        field: "api_base_url".to_string(),
        value: value.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue {
            field: "api_base_url".to_string(),
            value: value.to_string(),
        });
    }
    Ok(url)
}
