use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dotfolder holding all per-project state (databases, plans, snapshots).
pub const STATE_DIR: &str = ".smolcode";

/// Top-level config (smolcode.toml + SMOLCODE_* env overrides).
///
/// Threaded explicitly through every constructor; no store reads paths or
/// API keys from the environment on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmolcodeConfig {
    /// Conversation database path.
    #[serde(default = "default_history_db")]
    pub history_db: PathBuf,
    /// Memory database path.
    #[serde(default = "default_memory_db")]
    pub memory_db: PathBuf,
    /// Directory holding one JSON file per plan.
    #[serde(default = "default_plans_dir")]
    pub plans_dir: PathBuf,
    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard cap on model output tokens per request.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Filename prefix for history snapshots written across reloads.
    #[serde(default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,
}

impl Default for SmolcodeConfig {
    fn default() -> Self {
        Self {
            history_db: default_history_db(),
            memory_db: default_memory_db(),
            plans_dir: default_plans_dir(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            snapshot_prefix: default_snapshot_prefix(),
        }
    }
}

impl SmolcodeConfig {
    /// Load config from a TOML file with SMOLCODE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ./.smolcode/smolcode.toml
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(|| format!("{STATE_DIR}/smolcode.toml"));

        let config: SmolcodeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SMOLCODE_"))
            .extract()
            .map_err(|e| ConfigError(e.to_string()))?;

        Ok(config)
    }
}

#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

fn default_history_db() -> PathBuf {
    PathBuf::from(STATE_DIR).join("history.db")
}
fn default_memory_db() -> PathBuf {
    PathBuf::from(STATE_DIR).join("memory.db")
}
fn default_plans_dir() -> PathBuf {
    PathBuf::from(STATE_DIR).join("plans")
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_snapshot_prefix() -> String {
    format!("{STATE_DIR}/reload")
}
