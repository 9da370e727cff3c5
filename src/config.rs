use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_LIVE_FOLDER: &str = "momentos-en-vivo";
pub const DEFAULT_ARCHIVE_FOLDER: &str = "archived";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Store namespaces for live uploads and archived photos.
#[derive(Debug, Clone, PartialEq)]
pub struct Folders {
    pub live: String,
    pub archive: String,
}

impl Default for Folders {
    fn default() -> Self {
        Folders {
            live: DEFAULT_LIVE_FOLDER.to_string(),
            archive: DEFAULT_ARCHIVE_FOLDER.to_string(),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct S3Config {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
    /// S3-compatible endpoint, addressed path-style.
    pub endpoint: Option<String>,
    pub public_base_url: Option<String>,
}

// Keeps the keys out of logs.
impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    /// S3 for bytes, Postgres for metadata and tags.
    Cloud { database_url: String, s3: S3Config },
    Memory,
}

/// Process-wide settings, built once at startup and read-only afterwards.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub api_key: String,
    pub folders: Folders,
    pub max_upload_bytes: usize,
    pub backend: StoreBackend,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("folders", &self.folders)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let backend = match vars.or("STORE_BACKEND", "cloud").as_str() {
            "memory" => {
                warn!("STORE_BACKEND=memory, photos will not survive a restart");
                StoreBackend::Memory
            }
            "cloud" => StoreBackend::Cloud {
                database_url: vars.required("DATABASE_URL")?,
                s3: S3Config {
                    access_key: vars.required("AWS_ACCESS_KEY_ID")?,
                    secret_key: vars.required("AWS_SECRET_ACCESS_KEY")?,
                    region: vars.or("AWS_REGION", "us-west-2"),
                    bucket: vars.required("MY_BUCKET_NAME")?,
                    endpoint: vars.optional("S3_ENDPOINT"),
                    public_base_url: vars.optional("PUBLIC_BASE_URL"),
                },
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                    reason: "expected `cloud` or `memory`".to_string(),
                })
            }
        };

        Ok(Config {
            host: vars.or("HOST", "0.0.0.0"),
            port: vars.parse("PORT", 8000)?,
            api_key: vars.required("API_KEY")?,
            folders: Folders {
                live: vars.or("LIVE_FOLDER", DEFAULT_LIVE_FOLDER),
                archive: vars.or("ARCHIVE_FOLDER", DEFAULT_ARCHIVE_FOLDER),
            },
            max_upload_bytes: vars.parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            backend,
        })
    }

    /// Where this server answers `/media` for `STORE_BACKEND=memory`.
    pub fn media_base_url(&self) -> String {
        format!("http://{}:{}/media", self.host, self.port)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + Display,
        T::Err: Display,
    {
        match self.optional(key) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
            None => {
                info!("{key} not set, using default: {default}");
                Ok(default)
            }
        }
    }
}
