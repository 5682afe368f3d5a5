use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{Result, VolumeError};
use crate::secrets::{get_secret_json, ConfigStore};

pub const INTEROP_CONFIG_SECRET: &str = "volume-test-config";
pub const DATABASE_SECRET: &str = "rds-read-write";
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    pub fn from_node_env(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("production") => Mode::Production,
            _ => Mode::Development,
        }
    }
}

/// Snapshot of the process environment taken once at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn from_env() -> Self {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    fn require(&self, name: &'static str) -> Result<String> {
        self.get(name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(VolumeError::MissingVar(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Process-wide settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub aws_region: Option<String>,
    pub config_prefix: String,
    pub print_results: bool,
    pub cleanup_delay: Duration,
}

impl Settings {
    pub fn from_vars(vars: &EnvVars) -> Result<Self> {
        let cleanup_delay = match vars.get("CLEANUP_DELAY_MS") {
            Some(raw) if !raw.trim().is_empty() => {
                let millis = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|err| VolumeError::InvalidVar {
                        name: "CLEANUP_DELAY_MS",
                        reason: err.to_string(),
                    })?;
                Duration::from_millis(millis)
            }
            _ => DEFAULT_CLEANUP_DELAY,
        };

        Ok(Self {
            mode: Mode::from_node_env(vars.get("NODE_ENV")),
            aws_region: vars
                .get("AWS_REGION")
                .filter(|region| !region.is_empty())
                .map(str::to_string),
            config_prefix: vars.get("CONFIG_VAR_PREFIX").unwrap_or_default().to_string(),
            print_results: vars.get("PRINT_RESULTS") == Some("true"),
            cleanup_delay,
        })
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCredentials {
    pub private_key: String,
    pub token: String,
}

impl fmt::Debug for UploadCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCredentials")
            .field("private_key", &"<redacted>")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Target of the volume test: the interop server and the credentials used to
/// upload to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropConfig {
    pub id: String,
    pub upload: UploadCredentials,
    pub url: String,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: PgSslMode,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish_non_exhaustive()
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.ssl_mode)
    }
}

#[derive(Deserialize)]
struct DatabaseSecret {
    username: String,
    password: String,
}

/// Where configuration comes from for this run. Development reads the
/// environment snapshot; production reads the secret/parameter store.
#[derive(Clone)]
pub enum ConfigSource {
    Environment(EnvVars),
    Store(Arc<dyn ConfigStore>),
}

impl ConfigSource {
    pub async fn interop_config(&self) -> Result<InteropConfig> {
        match self {
            ConfigSource::Environment(vars) => Ok(InteropConfig {
                id: vars.require("INTEROP_SERVER_ID")?,
                upload: UploadCredentials {
                    private_key: vars.require("UPLOAD_INTEROP_PRIVATE_KEY")?,
                    token: vars.require("UPLOAD_INTEROP_TOKEN")?,
                },
                url: vars.require("INTEROP_URL")?,
            }),
            ConfigSource::Store(store) => {
                get_secret_json(store.as_ref(), INTEROP_CONFIG_SECRET).await
            }
        }
    }

    pub async fn database_config(&self) -> Result<DatabaseConfig> {
        match self {
            ConfigSource::Environment(vars) => {
                let port = vars.require("DB_PORT")?;
                let port = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|err| VolumeError::InvalidVar {
                        name: "DB_PORT",
                        reason: err.to_string(),
                    })?;
                let ssl = vars
                    .get("DB_SSL")
                    .is_some_and(|value| value.to_ascii_lowercase().contains("true"));

                Ok(DatabaseConfig {
                    host: vars.require("DB_HOST")?,
                    port,
                    user: vars.require("DB_USER")?,
                    password: vars.get("DB_PASSWORD").unwrap_or_default().to_string(),
                    database: vars.require("DB_DATABASE")?,
                    ssl_mode: if ssl {
                        PgSslMode::VerifyFull
                    } else {
                        PgSslMode::Disable
                    },
                })
            }
            ConfigSource::Store(store) => {
                let store = store.as_ref();
                let (secret, host, port, ssl, database) = tokio::try_join!(
                    get_secret_json::<DatabaseSecret>(store, DATABASE_SECRET),
                    store.get_parameter("db_host"),
                    store.get_parameter("db_port"),
                    store.get_parameter("db_ssl"),
                    store.get_parameter("db_database"),
                )?;

                let port = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|err| VolumeError::Secret {
                        name: "db_port".into(),
                        message: err.to_string(),
                    })?;

                Ok(DatabaseConfig {
                    host,
                    port,
                    user: secret.username,
                    password: secret.password,
                    database,
                    // The managed instance presents a certificate we do not verify.
                    ssl_mode: if ssl == "true" {
                        PgSslMode::Require
                    } else {
                        PgSslMode::Disable
                    },
                })
            }
        }
    }
}
