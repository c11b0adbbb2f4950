//! Configuration loading and data directory resolution.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// The hosted optimizer service. Free-tier hosting suspends it between uses,
/// which is why the client carries a cold-start retry message.
pub const DEFAULT_API_BASE: &str = "https://lumberlogic-backend.onrender.com";

const ENV_API_BASE: &str = "CUT_PLANNER_API_BASE";
const ENV_DATA_DIR: &str = "CUT_PLANNER_DATA_DIR";

/// Optional settings file under the user's config directory.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    api_base: Option<String>,
    data_dir: Option<PathBuf>,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the optimizer service (no trailing slash).
    pub api_base: String,
    /// Directory holding the draft and credential files.
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolves configuration with the priority order: command-line
    /// argument, then environment variable, then config file, then compiled
    /// default.
    pub fn resolve(cli_api_base: Option<&str>) -> Result<Self> {
        let file = load_file_config()?;
        Self::resolve_with(
            cli_api_base,
            std::env::var(ENV_API_BASE).ok(),
            std::env::var(ENV_DATA_DIR).ok().map(PathBuf::from),
            file,
        )
    }

    fn resolve_with(
        cli_api_base: Option<&str>,
        env_api_base: Option<String>,
        env_data_dir: Option<PathBuf>,
        file: FileConfig,
    ) -> Result<Self> {
        let api_base = cli_api_base
            .map(str::to_string)
            .or(env_api_base)
            .or(file.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = api_base.trim_end_matches('/').to_string();
        if api_base.is_empty() {
            return Err(Error::Config("API base URL is empty".to_string()));
        }

        let data_dir = env_data_dir
            .or(file.data_dir)
            .or_else(default_data_dir)
            .ok_or_else(|| Error::Config("could not determine a data directory".to_string()))?;

        Ok(Self { api_base, data_dir })
    }

    /// Creates the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// The in-progress problem, persisted between CLI invocations.
    pub fn draft_path(&self) -> PathBuf {
        self.data_dir.join("draft.json")
    }

    /// The single-slot token pair.
    pub fn credential_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }
}

/// Reads `config.toml` from the user's config directory. A missing file is
/// fine; a malformed one is an error the user should see.
fn load_file_config() -> Result<FileConfig> {
    let Some(path) = dirs::config_dir().map(|d| d.join("cut_planner").join("config.toml")) else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cut_planner"))
}
