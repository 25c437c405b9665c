//! Configuration loading and checking.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pi_fetch::{FetchError, SourceUrl};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment overrides, e.g. `PROGRAM_IMPORT_FREQUENCY=5`.
const ENV_PREFIX: &str = "PROGRAM_IMPORT_";

/// Configuration errors, raised before any import runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    /// A required option is absent.
    #[error("the program import requires a `{option}` option")]
    Missing { option: &'static str },
    /// `frequency` is zero, negative or too large.
    #[error("`frequency` must be a positive number of minutes, got {value}")]
    InvalidFrequency { value: i64 },
    /// `source` is not an absolute http(s) URL.
    #[error("invalid `source` option: {0}")]
    InvalidSource(#[source] FetchError),
}

/// Options exactly as written in configuration, before any checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// File the program document is written to.
    pub destination: Option<PathBuf>,
    /// Minutes between scheduled runs.
    pub frequency: Option<i64>,
    /// Absolute URL of the upstream feed.
    pub source: Option<String>,
    /// Upstream `tsId`s whose entries are left out of the import.
    #[serde(default)]
    pub ignored_time_slots: Vec<i64>,
}

/// Checked configuration for the program import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    destination: PathBuf,
    frequency_minutes: u32,
    source: SourceUrl,
    ignored_time_slots: Vec<i64>,
}

impl ImportConfig {
    /// Loads configuration from default locations.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    ///
    /// Later layers win: the platform config file, then `config_path`, then
    /// `PROGRAM_IMPORT_*` environment variables. Use [`Self::from_file`] to
    /// read a single file without the ambient layers.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        Self::from_figment(&figment)
    }

    /// Loads configuration from `path` alone, ignoring the platform config
    /// file and the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_figment(&Figment::new().merge(Toml::file(path)))
    }

    /// Extracts and checks configuration from an assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let options: ImportOptions = figment.extract().map_err(Box::new)?;
        let config = Self::try_from(options)?;
        tracing::debug!(?config, "loaded import configuration");
        Ok(config)
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub const fn frequency_minutes(&self) -> u32 {
        self.frequency_minutes
    }

    pub const fn source(&self) -> &SourceUrl {
        &self.source
    }

    pub fn ignored_time_slots(&self) -> &[i64] {
        &self.ignored_time_slots
    }
}

impl TryFrom<ImportOptions> for ImportConfig {
    type Error = ConfigError;

    fn try_from(options: ImportOptions) -> Result<Self, Self::Error> {
        let destination = options.destination.ok_or(ConfigError::Missing {
            option: "destination",
        })?;
        let frequency = options.frequency.ok_or(ConfigError::Missing {
            option: "frequency",
        })?;
        let source = options
            .source
            .ok_or(ConfigError::Missing { option: "source" })?;

        let frequency_minutes = u32::try_from(frequency)
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or(ConfigError::InvalidFrequency { value: frequency })?;
        let source = SourceUrl::parse(&source).map_err(ConfigError::InvalidSource)?;

        Ok(Self {
            destination,
            frequency_minutes,
            source,
            ignored_time_slots: options.ignored_time_slots,
        })
    }
}

/// Returns the platform-specific config directory for the importer.
///
/// On Linux: `~/.config/program-import`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("program-import"))
}
