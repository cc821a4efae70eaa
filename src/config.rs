//! Provider configuration via `ortho-config`.
//!
//! Connection parameters come from the provider block first and fall back to
//! layered sources (defaults, configuration files, `PURE_*` environment
//! variables). [`ProviderOptions::resolve`] merges both and refuses to
//! produce [`ConnectionSettings`] unless a target and a usable credential
//! combination are present.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Terraform";

/// Legacy environment variable accepted for the API token.
pub const LEGACY_API_TOKEN_ENV: &str = "PURE_APITOKEN";

/// Connection settings layered from defaults, configuration files and
/// `PURE_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "PURE")]
pub struct ProviderConfig {
    /// Array management address (`PURE_TARGET`).
    pub target: Option<String>,
    /// User name exchanged for an API token (`PURE_USERNAME`).
    pub username: Option<String>,
    /// Password for `username` (`PURE_PASSWORD`).
    pub password: Option<String>,
    /// API token (`PURE_API_TOKEN`).
    pub api_token: Option<String>,
    /// REST API version to use; negotiated when unset.
    pub rest_version: Option<String>,
    /// Whether the array's TLS certificate is verified.
    #[ortho_config(default = false)]
    pub verify_https: bool,
    /// Path to a PEM bundle trusted in addition to the system roots.
    pub ssl_cert: Option<String>,
    /// User agent sent with every request.
    #[ortho_config(default = DEFAULT_USER_AGENT.to_owned())]
    pub user_agent: String,
}

impl ProviderConfig {
    /// Returns a configuration with every optional field unset.
    #[must_use]
    pub fn unset() -> Self {
        Self {
            target: None,
            username: None,
            password: None,
            api_token: None,
            rest_version: None,
            verify_https: false,
            ssl_cert: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Loads configuration without parsing CLI arguments. Values merge
    /// defaults, configuration files and environment variables; the legacy
    /// `PURE_APITOKEN` variable fills the token when nothing else does.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_iter([std::ffi::OsString::from("purefa-provider")])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        if config.api_token.is_none() {
            config.api_token = std::env::var(LEGACY_API_TOKEN_ENV).ok();
        }
        Ok(config)
    }
}

/// Options declared in the provider block. Every field is optional and
/// overrides the layered [`ProviderConfig`] value.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderOptions {
    /// Array management address.
    pub target: Option<String>,
    /// User name exchanged for an API token.
    pub username: Option<String>,
    /// Password for `username`.
    pub password: Option<String>,
    /// API token.
    pub api_token: Option<String>,
    /// REST API version.
    pub rest_version: Option<String>,
    /// Whether the array's TLS certificate is verified.
    pub verify_https: Option<bool>,
    /// Path to a PEM bundle trusted in addition to the system roots.
    pub ssl_cert: Option<String>,
    /// User agent sent with every request.
    pub user_agent: Option<String>,
    /// Extra HTTP client options (`timeout`, `connect_timeout` in seconds).
    pub request_kwargs: BTreeMap<String, Value>,
}

/// Credentials used to open an API session.
#[derive(Clone, Eq, PartialEq)]
pub enum Credentials {
    /// Pre-issued API token.
    ApiToken(String),
    /// User name and password exchanged for a token at connect time.
    Password {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiToken(_) => f.write_str("ApiToken(<redacted>)"),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Fully resolved parameters for [`RestClient::connect`](crate::flasharray::RestClient::connect).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionSettings {
    /// Array management address.
    pub target: String,
    /// Session credentials.
    pub credentials: Credentials,
    /// Pinned REST version, if any.
    pub rest_version: Option<String>,
    /// Whether the array's TLS certificate is verified.
    pub verify_https: bool,
    /// Extra trusted certificate bundle.
    pub ssl_cert: Option<Utf8PathBuf>,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Overall request timeout.
    pub timeout: Option<Duration>,
    /// Connection establishment timeout.
    pub connect_timeout: Option<Duration>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    option: &'static str,
    env_var: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, option: &'static str, env_var: &'static str) -> Self {
        Self {
            description,
            option,
            env_var,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set `{}` in the provider block or export {}",
            self.description, self.option, self.env_var
        ))
    }
}

const TARGET: FieldMetadata = FieldMetadata::new("array target", "target", "PURE_TARGET");
const USERNAME: FieldMetadata = FieldMetadata::new("user name", "username", "PURE_USERNAME");
const PASSWORD: FieldMetadata = FieldMetadata::new("password", "password", "PURE_PASSWORD");

impl ProviderOptions {
    /// Merges declared options over layered configuration and validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the target is missing or a
    /// username/password pair is incomplete, [`ConfigError::MissingCredentials`]
    /// when no credential is configured at all, and
    /// [`ConfigError::InvalidRequestOption`] for unsupported `request_kwargs`.
    pub fn resolve(&self, layered: &ProviderConfig) -> Result<ConnectionSettings, ConfigError> {
        let target = pick(self.target.as_ref(), layered.target.as_ref())
            .ok_or_else(|| TARGET.missing())?;
        let credentials = resolve_credentials(
            pick(self.api_token.as_ref(), layered.api_token.as_ref()),
            pick(self.username.as_ref(), layered.username.as_ref()),
            pick(self.password.as_ref(), layered.password.as_ref()),
        )?;
        let (timeout, connect_timeout) = parse_request_kwargs(&self.request_kwargs)?;

        Ok(ConnectionSettings {
            target,
            credentials,
            rest_version: pick(self.rest_version.as_ref(), layered.rest_version.as_ref()),
            verify_https: self.verify_https.unwrap_or(layered.verify_https),
            ssl_cert: pick(self.ssl_cert.as_ref(), layered.ssl_cert.as_ref())
                .map(Utf8PathBuf::from),
            user_agent: pick(self.user_agent.as_ref(), Some(&layered.user_agent))
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
            timeout,
            connect_timeout,
        })
    }
}

/// Returns the first non-blank value, trimmed.
fn pick(declared: Option<&String>, fallback: Option<&String>) -> Option<String> {
    [declared, fallback]
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}

fn resolve_credentials(
    api_token: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<Credentials, ConfigError> {
    match (api_token, username, password) {
        (Some(token), _, _) => Ok(Credentials::ApiToken(token)),
        (None, Some(username), Some(password)) => Ok(Credentials::Password { username, password }),
        (None, Some(_), None) => Err(PASSWORD.missing()),
        (None, None, Some(_)) => Err(USERNAME.missing()),
        (None, None, None) => Err(ConfigError::MissingCredentials),
    }
}

fn parse_request_kwargs(
    kwargs: &BTreeMap<String, Value>,
) -> Result<(Option<Duration>, Option<Duration>), ConfigError> {
    let mut timeout = None;
    let mut connect_timeout = None;
    for (key, value) in kwargs {
        let duration = seconds(key, value)?;
        match key.as_str() {
            "timeout" => timeout = Some(duration),
            "connect_timeout" => connect_timeout = Some(duration),
            _ => {
                return Err(ConfigError::InvalidRequestOption {
                    key: key.clone(),
                    message: String::from("unsupported option"),
                });
            }
        }
    }
    Ok((timeout, connect_timeout))
}

fn seconds(key: &str, value: &Value) -> Result<Duration, ConfigError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidRequestOption {
            key: key.to_owned(),
            message: format!("expected a whole number of seconds, got {value}"),
        })
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Neither an API token nor a username/password pair is configured.
    #[error(
        "missing credentials: set `api_token` (PURE_API_TOKEN) or both `username` \
         (PURE_USERNAME) and `password` (PURE_PASSWORD)"
    )]
    MissingCredentials,
    /// A `request_kwargs` entry is unsupported or malformed.
    #[error("invalid request option `{key}`: {message}")]
    InvalidRequestOption {
        /// Offending key.
        key: String,
        /// Why the entry was rejected.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
