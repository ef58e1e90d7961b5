//! Locating the Foundry VTT data directory.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DATA_PATH_ENV: &str = "FOUNDRY_DATA_PATH";
/// Configuration file of the Foundry VTT command-line tool.
pub const FVTT_CONFIG_FILE: &str = ".fvttrc.yml";

static DATA_PATH_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?im)^\s*datapath:[ \t]*"?([^"\r\n]*?)"?[ \t\r]*$"#).unwrap());

/// Where to look for the data directory, highest priority first: an explicit
/// path, the environment, the Foundry CLI configuration and finally the
/// platform's default install location.
#[derive(Debug, Clone, Default)]
pub struct DataPathResolver {
    env: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    local_data_dir: Option<PathBuf>,
}

impl DataPathResolver {
    pub fn new(env: Option<PathBuf>, config_dir: Option<PathBuf>, local_data_dir: Option<PathBuf>) -> Self {
        Self { env, config_dir, local_data_dir }
    }

    pub fn from_environment() -> Self {
        let dirs = directories::BaseDirs::new();
        Self {
            env: std::env::var_os(DATA_PATH_ENV).filter(|v| !v.is_empty()).map(PathBuf::from),
            config_dir: dirs.as_ref().map(|d| d.config_dir().to_path_buf()),
            local_data_dir: dirs.as_ref().map(|d| d.data_local_dir().to_path_buf()),
        }
    }

    /// The data directory to use. An explicit path is returned as given;
    /// the environment and CLI configuration are only used when they point at
    /// an existing directory. The platform default is returned even when it
    /// does not exist.
    pub fn resolve(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = self.env.as_ref().filter(|p| p.is_dir()) {
            tracing::debug!(path = %path.display(), "Using data path from {DATA_PATH_ENV}");
            return Some(path.clone());
        }
        if let Some(path) = self.fvtt_config_data_path() {
            tracing::debug!(path = %path.display(), "Using data path from {FVTT_CONFIG_FILE}");
            return Some(path);
        }
        let fallback = self.local_data_dir.as_ref().map(|dir| dir.join("FoundryVTT").join("Data"));
        if let Some(path) = &fallback {
            tracing::debug!(path = %path.display(), "Using default data path");
        }
        fallback
    }

    fn fvtt_config_data_path(&self) -> Option<PathBuf> {
        let file = self.config_dir.as_ref()?.join(FVTT_CONFIG_FILE);
        let contents = std::fs::read_to_string(&file).ok()?;
        let data = parse_data_path(&contents)?.join("Data");
        data.is_dir().then_some(data)
    }
}

/// The `dataPath` entry of a Foundry CLI configuration file.
pub fn parse_data_path(contents: &str) -> Option<PathBuf> {
    DATA_PATH_ENTRY
        .captures(contents)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
