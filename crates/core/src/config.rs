use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::SETTINGS_URL;

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub vault: VaultConfig,
    pub credentials: CredentialsConfig,
    pub settings: SettingsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct VaultConfig {
    pub backend: VaultBackend,
    pub secret_name: String,
    pub source_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct CredentialsConfig {
    /// `None` means the store's own default location.
    pub path: Option<PathBuf>,
    pub enabled: bool,
}

#[derive(Clone, Debug)]
pub struct SettingsConfig {
    pub settings_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultBackend {
    Env,
    SecretsManager,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub vault_backend: Option<VaultBackend>,
    pub vault_source_path: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            vault: VaultConfig {
                backend: VaultBackend::Env,
                secret_name: "incidentfox/secrets".to_string(),
                source_path: None,
            },
            credentials: CredentialsConfig { path: None, enabled: true },
            settings: SettingsConfig { settings_url: SETTINGS_URL.to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for VaultBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "secrets_manager" | "secrets-manager" => Ok(Self::SecretsManager),
            other => Err(ConfigError::Validation(format!(
                "unsupported vault backend `{other}` (expected env|secrets_manager)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl RuntimeConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("incidentfox.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(vault) = patch.vault {
            if let Some(backend) = vault.backend {
                self.vault.backend = backend;
            }
            if let Some(secret_name) = vault.secret_name {
                self.vault.secret_name = secret_name;
            }
            if let Some(source_path) = vault.source_path {
                self.vault.source_path = Some(source_path);
            }
        }

        if let Some(credentials) = patch.credentials {
            if let Some(path) = credentials.path {
                self.credentials.path = Some(path);
            }
            if let Some(enabled) = credentials.enabled {
                self.credentials.enabled = enabled;
            }
        }

        if let Some(settings) = patch.settings {
            if let Some(settings_url) = settings.settings_url {
                self.settings.settings_url = settings_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("INCIDENTFOX_VAULT_BACKEND") {
            self.vault.backend = value.parse()?;
        }
        if let Some(value) = read_env("INCIDENTFOX_VAULT_SECRET_NAME") {
            self.vault.secret_name = value;
        }
        if let Some(value) = read_env("INCIDENTFOX_VAULT_SOURCE_PATH") {
            self.vault.source_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("INCIDENTFOX_CREDENTIALS_FILE") {
            self.credentials.path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("INCIDENTFOX_CREDENTIALS_ENABLED") {
            self.credentials.enabled = parse_bool("INCIDENTFOX_CREDENTIALS_ENABLED", &value)?;
        }

        if let Some(value) = read_env("INCIDENTFOX_SETTINGS_URL") {
            self.settings.settings_url = value;
        }

        let log_level =
            read_env("INCIDENTFOX_LOGGING_LEVEL").or_else(|| read_env("INCIDENTFOX_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("INCIDENTFOX_LOGGING_FORMAT").or_else(|| read_env("INCIDENTFOX_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(backend) = overrides.vault_backend {
            self.vault.backend = backend;
        }
        if let Some(source_path) = overrides.vault_source_path {
            self.vault.source_path = Some(source_path);
        }
        if let Some(path) = overrides.credentials_path {
            self.credentials.path = Some(path);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_vault(&self.vault)?;
        validate_settings(&self.settings)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("incidentfox.toml"), PathBuf::from("config/incidentfox.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_vault(vault: &VaultConfig) -> Result<(), ConfigError> {
    if vault.secret_name.trim().is_empty() {
        return Err(ConfigError::Validation("vault.secret_name must not be empty".to_string()));
    }

    if vault.backend == VaultBackend::SecretsManager && vault.source_path.is_none() {
        return Err(ConfigError::Validation(
            "vault.source_path is required when vault.backend is `secrets_manager`".to_string(),
        ));
    }

    Ok(())
}

fn validate_settings(settings: &SettingsConfig) -> Result<(), ConfigError> {
    let url = settings.settings_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "settings.settings_url must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    vault: Option<VaultPatch>,
    credentials: Option<CredentialsPatch>,
    settings: Option<SettingsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct VaultPatch {
    backend: Option<VaultBackend>,
    secret_name: Option<String>,
    source_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsPatch {
    path: Option<PathBuf>,
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsPatch {
    settings_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
