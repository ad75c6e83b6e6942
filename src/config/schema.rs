use std::env;
use std::fmt::{Debug, Formatter};
use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Prefix of environment variables overriding config file entries, e.g.
/// `SESAM_ODATA__FRONTEND__HTTP__BIND_PORT=80`
pub const ENV_PREFIX: &str = "SESAM_ODATA";
/// Host of the Sesam instance, e.g. `datahub-1234.sesam.cloud`
pub const SESAM_URL_ENV: &str = "SESAM_URL";
/// JWT used as the bearer token against the Sesam API
pub const SESAM_TOKEN_ENV: &str = "SESAM_JWT";

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const DEFAULT_SCHEMA_SAMPLE_SIZE: u32 = 50;

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SesamOdataConfig {
    pub remote: Remote,
    #[serde(default)]
    pub frontend: Frontend,
    #[serde(default)]
    pub misc: Misc,
}

#[derive(Deserialize, PartialEq, Eq, Clone)]
pub struct Remote {
    pub host: String,
    pub token: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub metadata_timeout_secs: u64,
    /// Entity reads have no request timeout unless this is set
    #[serde(default)]
    pub data_timeout_secs: Option<u64>,
}

impl Remote {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            scheme: default_scheme(),
            connect_timeout_secs: default_timeout_secs(),
            metadata_timeout_secs: default_timeout_secs(),
            data_timeout_secs: None,
        }
    }
}

// Keep the token out of logs
impl Debug for Remote {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("scheme", &self.scheme)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("metadata_timeout_secs", &self.metadata_timeout_secs)
            .field("data_timeout_secs", &self.data_timeout_secs)
            .finish()
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Debug, PartialEq, Eq, Default, Clone)]
pub struct Frontend {
    #[serde(default)]
    pub http: HttpFrontend,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct HttpFrontend {
    pub bind_host: String,
    pub bind_port: u16,
    /// Externally visible base URL (scheme and authority) used in next-page links.
    /// Falls back to `http://<Host header>` when unset.
    pub public_url: Option<String>,
}

impl Default for HttpFrontend {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8080,
            public_url: None,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Misc {
    /// Number of entities fetched from the remote store per collection page
    pub page_size: u64,
    /// Number of entities the remote store samples to infer a dataset's schema
    pub schema_sample_size: u32,
}

impl Default for Misc {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            schema_sample_size: DEFAULT_SCHEMA_SAMPLE_SIZE,
        }
    }
}

pub fn validate_config(config: SesamOdataConfig) -> Result<SesamOdataConfig, ConfigError> {
    if config.remote.host.trim().is_empty() || config.remote.token.trim().is_empty() {
        return Err(ConfigError::Message(format!(
            "The Sesam host and token must be provided (set {SESAM_URL_ENV} and \
            {SESAM_TOKEN_ENV}, or remote.host and remote.token in the config file)"
        )));
    }

    if !matches!(config.remote.scheme.as_str(), "http" | "https") {
        return Err(ConfigError::Message(format!(
            "Unsupported remote scheme {:?}, expected \"http\" or \"https\"",
            config.remote.scheme
        )));
    }

    if config.misc.page_size == 0 {
        return Err(ConfigError::Message(
            "misc.page_size must be greater than zero".to_string(),
        ));
    }

    Ok(config)
}

// Environment variables take precedence over the config file
fn with_env_overrides(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("remote.host", env::var(SESAM_URL_ENV).ok())?
        .set_override_option("remote.token", env::var(SESAM_TOKEN_ENV).ok())
}

/// Load the config from an optional TOML file, layered with the environment
pub fn load_config(path: Option<&Path>) -> Result<SesamOdataConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }

    with_env_overrides(builder)?
        .build()?
        .try_deserialize()
        .and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
) -> Result<SesamOdataConfig, ConfigError> {
    let config =
        Config::builder().add_source(File::from_str(config_str, FileFormat::Toml));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
