use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::transparency::{TemplateType, DEFAULT_REQUIRED_TEMPLATES};

const DATA_DIR_NAME: &str = ".frontier_ledger";

/// Default data directory for the ledger stores and `config.toml`.
///
/// Candidates are tried in order: `~/.frontier_ledger`, then a
/// `.frontier_ledger` next to the working directory when there is no home
/// directory or it is not writable. The first candidate that can be created
/// wins.
pub fn ledger_data_dir() -> PathBuf {
    let candidates = [
        dirs::home_dir().map(|home| home.join(DATA_DIR_NAME)),
        Some(PathBuf::from(DATA_DIR_NAME)),
    ];
    for dir in candidates.into_iter().flatten() {
        match fs::create_dir_all(&dir) {
            Ok(()) => return dir,
            Err(e) => warn!(dir = %dir.display(), error = %e, "data directory unavailable, trying next candidate"),
        }
    }
    PathBuf::from(DATA_DIR_NAME)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8100,
        }
    }
}

/// Deployment-gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Templates every deployment must have verified before it clears.
    ///
    /// An explicitly empty list is honored: the gate then blocks on
    /// unresolved concerns alone. `load` logs a warning when that is
    /// configured, since it is almost always a misconfiguration.
    #[serde(default = "default_required_templates")]
    pub required_templates: Vec<TemplateType>,
}

fn default_required_templates() -> Vec<TemplateType> {
    DEFAULT_REQUIRED_TEMPLATES.to_vec()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            required_templates: default_required_templates(),
        }
    }
}

impl Config {
    pub fn config_path(data_dir: &std::path::Path) -> PathBuf {
        data_dir.join("config.toml")
    }

    /// Load the config from the data dir, writing the defaults on first run.
    pub fn load(data_dir: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path(data_dir);

        if !path.exists() {
            let config = Config::default();
            config.save(data_dir)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        if config.gate.required_templates.is_empty() {
            warn!("gate.required_templates is empty: deployments will clear with zero verified templates");
        }
        Ok(config)
    }

    pub fn save(&self, data_dir: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(data_dir)?;
        let toml = toml::to_string_pretty(self)?;
        fs::write(Self::config_path(data_dir), toml)?;
        Ok(())
    }
}
