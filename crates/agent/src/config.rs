//! Agent configuration

use anyhow::{Context, Result};
use maintenance_engine::store::DEFAULT_SNAPSHOTS_TO_KEEP;
use maintenance_engine::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "MAINTENANCE_AGENT_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "maintenance-agent.toml";

/// What one invocation of the agent does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Score,
    Train,
    TrainAndScore,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Score => "score",
            AgentMode::Train => "train",
            AgentMode::TrainAndScore => "train_and_score",
        }
    }

    pub fn trains(&self) -> bool {
        matches!(self, AgentMode::Train | AgentMode::TrainAndScore)
    }

    pub fn scores(&self) -> bool {
        matches!(self, AgentMode::Score | AgentMode::TrainAndScore)
    }
}

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name attached to every structured log event
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Directory exported by the inventory database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_mode")]
    pub mode: AgentMode,

    /// Write the Prometheus text exposition here after the run
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,

    /// Write maintenance recommendations here after scoring
    #[serde(default)]
    pub recommendations_path: Option<PathBuf>,

    #[serde(default = "default_snapshots_to_keep")]
    pub snapshots_to_keep: usize,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "maintenance-agent".to_string())
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_mode() -> AgentMode {
    AgentMode::TrainAndScore
}

fn default_snapshots_to_keep() -> usize {
    DEFAULT_SNAPSHOTS_TO_KEEP
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path), environment())
    }

    /// Layer `env` over the optional TOML file at `path`
    pub fn load_from(path: &Path, env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;
        agent.engine.validate().context("Invalid engine configuration")?;
        Ok(agent)
    }
}

/// `MAINTENANCE__ENGINE__RANDOM_SEED=7` sets `engine.random_seed`
fn environment() -> config::Environment {
    config::Environment::with_prefix("MAINTENANCE")
        .separator("__")
        .try_parsing(true)
}
