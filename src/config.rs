//! Configuration loader and validator for the celebrity check bot.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::UNIVERSAL_CATEGORY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    #[serde(default)]
    pub matching: Matching,
    pub synonyms: Synonyms,
    #[serde(default)]
    pub mirror: Option<Mirror>,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    pub poll_interval_ms: u64,
    pub max_backoff_seconds: u64,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    pub admin_id: i64,
}

/// Fuzzy matching knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Matching {
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u32,
}

impl Default for Matching {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            max_candidates: default_max_candidates(),
        }
    }
}

/// Canonical key -> accepted aliases, for categories and regions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Synonyms {
    pub categories: BTreeMap<String, Vec<String>>,
    pub regions: BTreeMap<String, Vec<String>>,
}

/// Spreadsheet mirror target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mirror {
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    pub access_token: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_max_connections() -> u32 {
    10
}

fn default_threshold() -> f64 {
    0.8
}

fn default_max_candidates() -> u32 {
    5
}

fn default_sheet_name() -> String {
    "celebrities".to_string()
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    parse(&content)
}

/// Parse and validate a YAML document.
pub fn parse(content: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("app.database_url must be non-empty"));
    }
    if cfg.app.max_connections == 0 {
        return Err(ConfigError::Invalid("app.max_connections must be > 0"));
    }
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    if cfg.telegram.admin_id == 0 {
        return Err(ConfigError::Invalid("telegram.admin_id must be set"));
    }

    let t = cfg.matching.similarity_threshold;
    if !(t > 0.0 && t <= 1.0) {
        return Err(ConfigError::Invalid(
            "matching.similarity_threshold must be in (0, 1]",
        ));
    }
    if cfg.matching.max_candidates == 0 {
        return Err(ConfigError::Invalid("matching.max_candidates must be > 0"));
    }

    if cfg.synonyms.regions.is_empty() {
        return Err(ConfigError::Invalid("synonyms.regions must list at least one region"));
    }
    if cfg
        .synonyms
        .categories
        .keys()
        .chain(cfg.synonyms.regions.keys())
        .any(|k| k.trim().is_empty())
    {
        return Err(ConfigError::Invalid("synonyms keys must be non-empty"));
    }
    if cfg.synonyms.regions.contains_key(UNIVERSAL_CATEGORY) {
        return Err(ConfigError::Invalid("synonyms.regions must not define 'all'"));
    }

    if let Some(mirror) = &cfg.mirror {
        if mirror.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::Invalid("mirror.spreadsheet_id must be non-empty"));
        }
        if mirror.sheet_name.trim().is_empty() {
            return Err(ConfigError::Invalid("mirror.sheet_name must be non-empty"));
        }
        if mirror.access_token.trim().is_empty() {
            return Err(ConfigError::Invalid("mirror.access_token must be non-empty"));
        }
    }

    Ok(())
}

/// Returns an example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  database_url: "sqlite://./data/celebcheck.db"
  max_connections: 10
  poll_interval_ms: 500
  max_backoff_seconds: 300

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  admin_id: 123456789

matching:
  similarity_threshold: 0.8
  max_candidates: 5

synonyms:
  categories:
    beauty: ["beauty", "cosmetics", "красота", "косметика"]
    health: ["health", "здоровье"]
    finance: ["finance", "финансы"]
  regions:
    italy: ["italy", "it", "италия"]
    germany: ["germany", "de", "германия"]
    spain: ["spain", "es", "испания"]

mirror:
  spreadsheet_id: "SPREADSHEET_ID"
  sheet_name: "celebrities"
  access_token: "GOOGLE_OAUTH_ACCESS_TOKEN"
"#
}
