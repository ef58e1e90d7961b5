//! Layered configuration.
//!
//! Values come from, lowest priority first: built-in defaults, an optional
//! TOML/YAML/JSON file, and `GRIMOIRE_`-prefixed environment variables using
//! `__` to separate sections (`GRIMOIRE_COMPENDIUM__WORKERS=8`).

mod data_path;
pub mod error;

pub use crate::data_path::{DATA_PATH_ENV, DataPathResolver, FVTT_CONFIG_FILE, parse_data_path};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use grimoire_bridge::{BridgeOptions, DEFAULT_PROGRAM_ARGS, DEFAULT_SCRIPT, DEFAULT_TIMEOUT};
use grimoire_library::{
    BuildOptions, DEFAULT_CACHE_PATH, DEFAULT_COLLISION_LOG, DEFAULT_PRIORITIES, DEFAULT_WORKERS, Priorities,
    discover_sources,
};
use grimoire_packs::{DEFAULT_TARGET_SYSTEMS, TargetSystems};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "GRIMOIRE_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub compendium: CompendiumConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompendiumConfig {
    /// Foundry data directory; located automatically when unset.
    pub data_path: Option<PathBuf>,
    /// Source directories to build from, bypassing discovery.
    pub sources: Vec<PathBuf>,
    /// Restrict discovery to one module or system.
    pub only: Option<String>,
    pub cache_path: PathBuf,
    pub collision_log: Option<PathBuf>,
    pub workers: usize,
    pub target_systems: Vec<String>,
    pub priorities: Vec<String>,
}
impl Default for CompendiumConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            sources: Vec::new(),
            only: None,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            collision_log: Some(PathBuf::from(DEFAULT_COLLISION_LOG)),
            workers: DEFAULT_WORKERS,
            target_systems: DEFAULT_TARGET_SYSTEMS.iter().map(ToString::to_string).collect(),
            priorities: DEFAULT_PRIORITIES.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub program: Option<PathBuf>,
    pub program_args: Vec<String>,
    pub script: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub verbose: bool,
}
impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: None,
            program_args: DEFAULT_PROGRAM_ARGS.iter().map(ToString::to_string).collect(),
            script: PathBuf::from(DEFAULT_SCRIPT),
            working_dir: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            verbose: false,
        }
    }
}

impl Config {
    /// Defaults, then `file` (if given), then the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compendium.workers == 0 {
            exn::bail!(ErrorKind::Validation("compendium.workers", "at least one worker is required"));
        }
        if self.compendium.priorities.is_empty() {
            exn::bail!(ErrorKind::Validation("compendium.priorities", "at least one prefix is required"));
        }
        if self.bridge.timeout_secs == 0 {
            exn::bail!(ErrorKind::Validation("bridge.timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn build_options(&self) -> BuildOptions {
        let compendium = &self.compendium;
        BuildOptions::default()
            .with_cache_path(&compendium.cache_path)
            .with_collision_log(compendium.collision_log.clone())
            .with_workers(compendium.workers)
            .with_targets(TargetSystems::new(compendium.target_systems.iter().cloned()))
            .with_priorities(Priorities::new(compendium.priorities.iter().cloned()))
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        let bridge = &self.bridge;
        let mut options = BridgeOptions::default()
            .with_program_args(bridge.program_args.iter().cloned())
            .with_script(&bridge.script)
            .with_timeout(Duration::from_secs(bridge.timeout_secs))
            .with_verbose(bridge.verbose);
        if let Some(program) = &bridge.program {
            options = options.with_program(program);
        }
        if let Some(dir) = &bridge.working_dir {
            options = options.with_working_dir(dir);
        }
        options
    }

    /// Source directories to build from, using the platform environment to
    /// locate the data directory.
    pub fn sources(&self) -> Result<Vec<PathBuf>> {
        self.sources_with(&DataPathResolver::from_environment())
    }

    pub fn sources_with(&self, resolver: &DataPathResolver) -> Result<Vec<PathBuf>> {
        let compendium = &self.compendium;
        if !compendium.sources.is_empty() {
            return Ok(compendium.sources.clone());
        }
        let Some(data_path) = resolver.resolve(compendium.data_path.as_deref()) else {
            exn::bail!(ErrorKind::NoDataPath);
        };
        if !data_path.is_dir() {
            exn::bail!(ErrorKind::DataPath(data_path));
        }
        tracing::info!(path = %data_path.display(), "Using Foundry data path");
        Ok(discover_sources(&data_path, compendium.only.as_deref()))
    }
}
