use std::{
    borrow::Cow,
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::{Captures, Regex};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use rust_cli_config::{ConfigError, File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to application root.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// `${NAME}` or `$NAME` reference inside an explicitly named configuration file.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("environment reference pattern is valid")
});

/// Trait implemented by configuration structures that require list parsing help.
pub trait Config {
    /// Keys whose values should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Identifies which configuration file is currently being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    /// Always-present base configuration of the hierarchical layout.
    Base,
    /// Environment-specific overrides (dev/prod).
    Environment(Environment),
    /// A single file named explicitly by the operator.
    Explicit,
}

impl ConfigFileKind {
    fn stem(&self) -> Cow<'static, str> {
        match self {
            ConfigFileKind::Base => Cow::Borrowed("base"),
            ConfigFileKind::Environment(env) => Cow::Owned(env.to_string()),
            ConfigFileKind::Explicit => Cow::Borrowed("config"),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
            ConfigFileKind::Explicit => f.write_str("configuration file"),
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

    /// Could not locate one of the required configuration files.
    #[error("could not locate {kind_description} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        kind_description: String,
        directory: PathBuf,
        attempted: String,
    },

    /// An explicitly named configuration file could not be read.
    #[error("failed to read configuration file `{path}`: {source}")]
    ConfigurationFileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configuration file existed but could not be parsed.
    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: ConfigError,
    },

    /// The configuration files were parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] ConfigError),

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    /// Failed to initialize the configuration builder.
    #[error("failed to initialize configuration builder: {0}")]
    Builder(#[source] ConfigError),
}

/// Loads hierarchical configuration from base, environment, and environment-variable sources.
///
/// Loads files from `configuration/base.(yaml|yml|json)` and `configuration/{environment}.{yaml|yml|json}`
/// before applying overrides from `APP_`-prefixed environment variables.
/// Nested keys use double underscores (`APP_DESTINATION__BIG_QUERY__PROJECT_ID`), and list values
/// are comma-separated.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let configuration_directory = base_path.join(CONFIGURATION_DIR);

    if !configuration_directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            configuration_directory,
        ));
    }

    let environment = Environment::load()?;

    let base_file = find_configuration_file(&configuration_directory, ConfigFileKind::Base)?;
    let environment_file = find_configuration_file(
        &configuration_directory,
        ConfigFileKind::Environment(environment),
    )?;

    let builder = rust_cli_config::Config::builder().add_source(File::from(base_file.clone()));
    validate_configuration_source(&builder, ConfigFileKind::Base, &base_file)?;

    let builder = builder.add_source(File::from(environment_file.clone()));
    validate_configuration_source(
        &builder,
        ConfigFileKind::Environment(environment),
        &environment_file,
    )?;

    finish::<T>(builder)
}

/// Loads configuration from a single YAML or JSON file.
///
/// `${VAR}` and `$VAR` references in the file are replaced with the values of the matching
/// environment variables before parsing; unset variables expand to the empty string. The file
/// format is picked from the extension (`json`, otherwise YAML). `APP_`-prefixed environment
/// variables are applied on top, exactly as in [`load_config`].
pub fn load_config_from_path<T>(path: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let raw = fs::read_to_string(path).map_err(|source| LoadConfigError::ConfigurationFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let expanded = expand_env(&raw, |name| std::env::var(name).ok());

    let format = match path.extension().and_then(|extension| extension.to_str()) {
        Some("json") => FileFormat::Json,
        _ => FileFormat::Yaml,
    };

    let builder = rust_cli_config::Config::builder().add_source(File::from_str(&expanded, format));
    validate_configuration_source(&builder, ConfigFileKind::Explicit, path)?;

    finish::<T>(builder)
}

/// Replaces `${NAME}` and `$NAME` references using `lookup`.
///
/// Names consist of ASCII alphanumerics and underscores, and bare names cannot start with a
/// digit. A `$` that does not start a valid reference is kept verbatim, and references that
/// `lookup` cannot resolve become empty.
pub fn expand_env<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |name| name.as_str());

            lookup(name).unwrap_or_default()
        })
        .into_owned()
}

/// Applies the `APP_` environment overrides and deserializes the final configuration.
fn finish<T>(builder: ConfigBuilder<DefaultState>) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let mut environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Finds the configuration file that matches the requested kind and supported extensions.
fn find_configuration_file(
    directory: &Path,
    kind: ConfigFileKind,
) -> Result<PathBuf, LoadConfigError> {
    let stem = kind.stem();
    let mut attempted_paths = Vec::with_capacity(CONFIG_FILE_EXTENSIONS.len());

    for extension in CONFIG_FILE_EXTENSIONS {
        let path = directory.join(format!("{stem}.{extension}"));
        attempted_paths.push(path.clone());

        if path.is_file() {
            return Ok(path);
        }
    }

    let attempted = attempted_paths
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        kind_description: kind.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "USER" => Some("replicator".to_string()),
            "PORT" => Some("3306".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_braced_and_bare_references() {
        assert_eq!(
            expand_env("user: ${USER}\nport: $PORT", lookup),
            "user: replicator\nport: 3306"
        );
    }

    #[test]
    fn unresolved_references_expand_to_empty() {
        assert_eq!(expand_env("password: '${MISSING}'", lookup), "password: ''");
        assert_eq!(expand_env("a$MISSING.b", lookup), "a.b");
    }

    #[test]
    fn keeps_dollars_that_do_not_start_a_reference() {
        assert_eq!(expand_env("cost: 5$", lookup), "cost: 5$");
        assert_eq!(expand_env("$1 and ${} and $-", lookup), "$1 and ${} and $-");
        assert_eq!(expand_env("${USER", lookup), "${USER");
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        tables: Vec<String>,
    }

    impl Config for Sample {
        const LIST_PARSE_KEYS: &'static [&'static str] = &[];
    }

    #[test]
    fn loads_a_single_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "name: sample\ntables:\n  - orders\n  - users").unwrap();

        let sample: Sample = load_config_from_path(file.path()).unwrap();
        assert_eq!(sample.name, "sample");
        assert_eq!(sample.tables, vec!["orders", "users"]);
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = load_config_from_path::<Sample>(Path::new("/nonexistent/bqsync.yaml"))
            .unwrap_err();
        assert!(matches!(err, LoadConfigError::ConfigurationFileRead { .. }));
    }
}
