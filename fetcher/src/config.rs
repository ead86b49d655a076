/// Configuration for the ABI exporter
/// Layers built-in defaults, a TOML config file, environment variables and CLI flags

use move_abi::{RenameError, RenameMode, RenameTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = ".sui-abi.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid network: {0}. Allowed values: mainnet, testnet, devnet")]
    InvalidNetwork(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Rename(#[from] RenameError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://fullnode.mainnet.sui.io",
            Network::Testnet => "https://fullnode.testnet.sui.io",
            Network::Devnet => "https://fullnode.devnet.sui.io",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Devnet => write!(f, "devnet"),
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            _ => Err(ConfigError::InvalidNetwork(s.to_string())),
        }
    }
}

/// Contents of `~/.sui-abi.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub network: Option<String>,
    pub rpc_url: Option<String>,
    pub max_attempts: Option<u32>,
    pub backoff_base_secs: Option<u64>,
    pub backoff_max_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub rename_mode: Option<String>,
    /// Extra spelling rules layered over the built-in rename table.
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// An explicit path must exist; the default home-directory file is optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                debug!("Loading config file from {:?}", path);
                Self::load(&path).map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(CONFIG_FILE_NAME);
        p
    })
}

/// Values given on the command line. They win over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub network: Option<String>,
    pub rpc_url: Option<String>,
    pub max_attempts: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub rename_mode: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub network: Network,
    pub rpc_url: String,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub request_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub rename_mode: RenameMode,
    pub renames: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        let network = Network::default();
        Settings {
            network,
            rpc_url: network.default_rpc_url().to_string(),
            max_attempts: 3,
            backoff_base_secs: 2,
            backoff_max_secs: 60,
            request_timeout_secs: 30,
            output_dir: PathBuf::from("test"),
            rename_mode: RenameMode::default(),
            renames: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment and the discovered config file.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let file = ConfigFile::discover(config_path)?;
        Self::resolve(file, |key| env::var(key).ok(), overrides)
    }

    /// defaults < config file < environment < command line
    pub fn resolve<E>(
        file: Option<ConfigFile>,
        env_lookup: E,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let mut settings = Settings::default();

        let network = layered(overrides.network.clone(), env_lookup("SUI_NETWORK"), file.network);
        let rpc_url = layered(overrides.rpc_url.clone(), env_lookup("SUI_RPC_URL"), file.rpc_url);

        if let Some((net, _)) = &network {
            settings.network = net.parse()?;
            settings.rpc_url = settings.network.default_rpc_url().to_string();
        }

        // An endpoint replaces the network default only when set at the same or a higher layer.
        if let Some((url, url_layer)) = rpc_url {
            match &network {
                Some((_, net_layer)) if url_layer < *net_layer => {
                    debug!(
                        "Ignoring rpc_url from {:?}, network was chosen at {:?}",
                        url_layer, net_layer
                    );
                }
                _ => settings.rpc_url = url,
            }
        }

        if let Some(attempts) = pick(overrides.max_attempts, &env_lookup, "SUI_ABI_MAX_ATTEMPTS", file.max_attempts)? {
            settings.max_attempts = attempts;
        }
        if let Some(base) = pick(None, &env_lookup, "SUI_ABI_BACKOFF_BASE_SECS", file.backoff_base_secs)? {
            settings.backoff_base_secs = base;
        }
        if let Some(max) = pick(None, &env_lookup, "SUI_ABI_BACKOFF_MAX_SECS", file.backoff_max_secs)? {
            settings.backoff_max_secs = max;
        }
        if let Some(timeout) = pick(None, &env_lookup, "SUI_ABI_TIMEOUT_SECS", file.request_timeout_secs)? {
            settings.request_timeout_secs = timeout;
        }

        if let Some(dir) = overrides
            .output_dir
            .clone()
            .or_else(|| env_lookup("SUI_ABI_OUTPUT_DIR").map(PathBuf::from))
            .or(file.output_dir)
        {
            settings.output_dir = dir;
        }

        if let Some(mode) = overrides
            .rename_mode
            .clone()
            .or_else(|| env_lookup("SUI_ABI_RENAME_MODE"))
            .or(file.rename_mode)
        {
            settings.rename_mode = mode.parse()?;
        }

        settings.renames = file.renames;
        settings.validate()?;

        info!(
            "Configuration loaded: network={}, endpoint={}, max_attempts={}, output_dir={:?}, rename_mode={}",
            settings.network, settings.rpc_url, settings.max_attempts, settings.output_dir, settings.rename_mode
        );

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("RPC endpoint must not be empty".to_string()));
        }
        if self.max_attempts < 1 {
            return Err(ConfigError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs < 1 || self.request_timeout_secs > 300 {
            return Err(ConfigError::InvalidConfig(
                "Request timeout must be between 1 and 300 seconds".to_string(),
            ));
        }
        if self.backoff_max_secs < self.backoff_base_secs {
            return Err(ConfigError::InvalidConfig(format!(
                "backoff_max_secs ({}) is below backoff_base_secs ({})",
                self.backoff_max_secs, self.backoff_base_secs
            )));
        }
        Ok(())
    }

    /// Freeze the rename table for this run.
    pub fn rename_table(&self) -> Result<RenameTable, ConfigError> {
        Ok(RenameTable::with_overrides(
            self.rename_mode,
            self.renames.clone(),
        )?)
    }
}

/// Where a setting came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Layer {
    File,
    Env,
    Flag,
}

fn layered(
    flag: Option<String>,
    env: Option<String>,
    from_file: Option<String>,
) -> Option<(String, Layer)> {
    flag.map(|v| (v, Layer::Flag))
        .or_else(|| env.map(|v| (v, Layer::Env)))
        .or_else(|| from_file.map(|v| (v, Layer::File)))
}

fn pick<T, E>(
    flag: Option<T>,
    env_lookup: &E,
    key: &str,
    from_file: Option<T>,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    E: Fn(&str) -> Option<String>,
{
    if flag.is_some() {
        return Ok(flag);
    }
    if let Some(raw) = env_lookup(key) {
        return raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid {}: {} ({})", key, raw, e)));
    }
    Ok(from_file)
}
