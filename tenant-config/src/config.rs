use crate::cache::CacheConfig;
use serde::Deserialize;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("{0} cannot be empty")]
    EmptySecret(&'static str),

    #[error("signing_secret and admin_secret must differ")]
    SharedSecret,

    #[error("Cache TTL cannot be 0")]
    ZeroTtl,

    #[error("Timeout cannot be 0")]
    ZeroTimeout,

    #[error("Store path cannot be empty")]
    EmptyStorePath,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 5002,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreConfig {
    #[default]
    Memory,
    Filesystem {
        path: String,
    },
}

/// Configuration of the config service, which owns the tenant store.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    /// Key used to sign connection URIs. Must match the resolvers' key.
    pub signing_secret: String,
    /// Key used to verify admin tokens on mutation endpoints.
    pub admin_secret: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if self.signing_secret.is_empty() {
            return Err(ValidationError::EmptySecret("signing_secret"));
        }
        if self.admin_secret.is_empty() {
            return Err(ValidationError::EmptySecret("admin_secret"));
        }
        if self.signing_secret == self.admin_secret {
            return Err(ValidationError::SharedSecret);
        }
        if let StoreConfig::Filesystem { path } = &self.store
            && path.is_empty()
        {
            return Err(ValidationError::EmptyStorePath);
        }
        validate_cache(&self.cache)
    }
}

/// Configuration of a resolver talking to a remote config service.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct ResolverConfig {
    pub registry_url: Url,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub signing_secret: String,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        if self.signing_secret.is_empty() {
            return Err(ValidationError::EmptySecret("signing_secret"));
        }
        validate_cache(&self.cache)
    }
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ValidationError> {
    if cache.ttl_secs == 0 {
        return Err(ValidationError::ZeroTtl);
    }
    Ok(())
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
