use std::{
    env, fmt, io,
    path::{Path, PathBuf},
};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Directory containing configuration files relative to application root.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and profile configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Environment variable naming the profile whose file overrides the base configuration.
const PROFILE_ENV_NAME: &str = "APP_PROFILE";

/// Stem of the always-present base configuration file.
const BASE_STEM: &str = "base";

/// Identifies which configuration file is currently being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind<'a> {
    /// Always-present base configuration.
    Base,
    /// Optional overrides for a named profile.
    Profile(&'a str),
}

impl ConfigFileKind<'_> {
    fn stem(&self) -> &str {
        match self {
            ConfigFileKind::Base => BASE_STEM,
            ConfigFileKind::Profile(profile) => profile,
        }
    }
}

impl fmt::Display for ConfigFileKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Profile(profile) => write!(f, "`{profile}` profile configuration"),
        }
    }
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The configured `configuration` directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// Could not locate the base configuration file.
    #[error("could not locate {kind_description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        kind_description: String,
        directory: PathBuf,
        attempted: String,
    },

    /// A configuration file existed but could not be parsed.
    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    /// Environment variable overrides failed to merge into the configuration.
    #[error("failed to load configuration from environment variables: {0}")]
    EnvironmentVariables(#[source] config::ConfigError),

    /// The configuration sources were parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),

    /// The `APP_PROFILE` variable is set but is not valid unicode.
    #[error("failed to read `{PROFILE_ENV_NAME}`: {0}")]
    ProfileVariable(#[source] env::VarError),

    /// A profile name that cannot be used as a configuration file stem.
    #[error("invalid configuration profile `{0}`: expected letters, digits, `-` or `_`")]
    InvalidProfile(String),
}

/// Loads configuration from `./configuration` for the profile named by `APP_PROFILE`.
///
/// An unset or empty `APP_PROFILE` loads the base configuration only. See [`load_config_from`]
/// for the layering rules.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_path = env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let profile = profile_from_env()?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), profile.as_deref())
}

/// Reads the profile name from `APP_PROFILE`.
pub fn profile_from_env() -> Result<Option<String>, LoadConfigError> {
    match env::var(PROFILE_ENV_NAME) {
        Ok(profile) if profile.is_empty() => Ok(None),
        Ok(profile) => Ok(Some(profile)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(LoadConfigError::ProfileVariable(err)),
    }
}

/// Loads hierarchical configuration from `directory`.
///
/// Reads `base.(yaml|yml|json)`, then `{profile}.(yaml|yml|json)` when a profile is given and
/// its file exists, then overrides from `APP_`-prefixed environment variables. Nested keys use
/// double underscores (`APP_FAN_IN__STRATEGY`).
pub fn load_config_from<T>(directory: &Path, profile: Option<&str>) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    if let Some(profile) = profile {
        validate_profile(profile)?;
    }

    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = find_configuration_file(directory, ConfigFileKind::Base).ok_or_else(|| {
        LoadConfigError::ConfigurationFileMissing {
            kind_description: ConfigFileKind::Base.to_string(),
            directory: directory.to_path_buf(),
            attempted: attempted_paths(directory, ConfigFileKind::Base),
        }
    })?;

    let builder = config::Config::builder().add_source(config::File::from(base_file.clone()));
    validate_configuration_source(&builder, ConfigFileKind::Base, &base_file)?;

    let profile_file = profile.map(ConfigFileKind::Profile).and_then(|kind| {
        find_configuration_file(directory, kind).map(|path| (kind, path))
    });
    let builder = match profile_file {
        Some((kind, path)) => {
            let builder = builder.add_source(config::File::from(path.clone()));
            validate_configuration_source(&builder, kind, &path)?;
            builder
        }
        None => builder,
    };

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::EnvironmentVariables)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Rejects profiles that are empty, name the base file or could escape the directory.
fn validate_profile(profile: &str) -> Result<(), LoadConfigError> {
    let well_formed = !profile.is_empty()
        && profile != BASE_STEM
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if well_formed {
        Ok(())
    } else {
        Err(LoadConfigError::InvalidProfile(profile.to_string()))
    }
}

/// Finds the first existing file for `kind` among the supported extensions.
fn find_configuration_file(directory: &Path, kind: ConfigFileKind) -> Option<PathBuf> {
    let stem = kind.stem();

    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
}

fn attempted_paths(directory: &Path, kind: ConfigFileKind) -> String {
    let stem = kind.stem();

    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| format!("`{}`", directory.join(format!("{stem}.{extension}")).display()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_configuration_source(
    builder: &ConfigBuilder<DefaultState>,
    kind: ConfigFileKind,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            kind_description: kind.to_string(),
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}
