//! Connector configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::link::client::socket_io_url;
use crate::{AppError, Result};

/// Keychain service under which the API key may be stored.
const KEYRING_SERVICE: &str = "shogistack-connector";

/// Environment variable consulted when neither the file nor the keychain
/// provides an API key.
pub const API_KEY_ENV: &str = "SHOGISTACK_API_KEY";

fn default_server_url() -> String {
    "https://shogistack-server.onrender.com".into()
}

fn default_engine_options() -> toml::Table {
    let mut options = toml::Table::new();
    options.insert("USI_Hash".into(), toml::Value::Integer(1024));
    options.insert("Threads".into(), toml::Value::Integer(4));
    options.insert("MultiPV".into(), toml::Value::Integer(5));
    options
}

/// Connector configuration parsed from `config.toml`.
///
/// The API key may be left out of the file; [`GlobalConfig::load_credentials`]
/// then fills it from the OS keychain or the [`API_KEY_ENV`] variable.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Path to the USI engine executable.
    pub engine_path: PathBuf,
    /// Connector API key issued by the web UI.
    #[serde(default)]
    pub api_key: String,
    /// Analysis server endpoint.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// USI options applied after the handshake, in file order.
    #[serde(default = "default_engine_options")]
    pub engine_options: toml::Table,
}

/// Immutable engine launch settings derived from [`GlobalConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Absolute path to the engine executable.
    pub executable: PathBuf,
    /// Options sent as `setoption` commands, in insertion order.
    pub options: Vec<EngineOption>,
}

impl EngineConfig {
    /// Directory the engine is started in: the executable's parent.
    ///
    /// Engines resolve evaluation files relative to their own location, so
    /// the working directory always follows the executable.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        self.executable
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

/// A single `setoption name <name> value <value>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOption {
    /// USI option name, e.g. `USI_Hash`.
    pub name: String,
    /// Value rendered as the engine expects it on the wire.
    pub value: String,
}

/// Remote endpoint and credential used by the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server base URL (`https://…`, `http://…`, `wss://…` or `ws://…`).
    pub server_url: String,
    /// Opaque connector token.
    pub token: String,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails, including a
    /// `server_url` with an unsupported scheme.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill in the API key from the OS keychain with env-var fallback when
    /// the file does not carry one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no source provides the key.
    pub async fn load_credentials(&mut self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            self.api_key = load_credential("api_key", API_KEY_ENV).await?;
        }
        Ok(())
    }

    /// Engine launch settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an option value is not a string,
    /// integer, float, or boolean.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let options = self
            .engine_options
            .iter()
            .map(|(name, value)| {
                render_option_value(value).map(|value| EngineOption {
                    name: name.clone(),
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EngineConfig {
            executable: self.engine_path.clone(),
            options,
        })
    }

    /// Remote link settings.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            server_url: self.server_url.clone(),
            token: self.api_key.clone(),
        }
    }

    /// Replace the engine path, resolving it against the current directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the path is empty or the current
    /// directory cannot be determined.
    pub fn set_engine_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.engine_path = absolutize(&path.into())?;
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.engine_path = absolutize(&self.engine_path)?;

        let trimmed = self.server_url.trim();
        if trimmed.is_empty() {
            return Err(AppError::Config("server_url must not be empty".into()));
        }
        socket_io_url(trimmed)?;
        self.server_url = trimmed.trim_end_matches('/').to_owned();

        self.engine_config()?;
        Ok(())
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(AppError::Config("engine_path must not be empty".into()));
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir()
        .map_err(|err| AppError::Config(format!("cannot resolve engine_path: {err}")))?;
    Ok(cwd.join(path))
}

fn render_option_value(value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(AppError::Config(format!(
            "unsupported engine option value: {other}"
        ))),
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            AppError::Config(format!(
                "credential {keyring_key} not found in config, keychain or {env_key} env var"
            ))
        })
}
