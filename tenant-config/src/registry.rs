use crate::store::{StoreError, TenantStore};
use crate::types::ConfigRecord;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("registry request timed out")]
    Timeout,
    #[error("registry returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("invalid registry URL: {0}")]
    InvalidUrl(String),
    #[error("invalid registry response: {0}")]
    InvalidResponse(String),
    #[error("tenant store error: {0}")]
    Store(#[from] StoreError),
}

/// Source of truth for tenant configurations, consulted on cache misses.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// `Ok(None)` means the registry was reached and has no configuration for the tenant.
    async fn fetch(&self, tenant_id: &str) -> Result<Option<ConfigRecord>, RegistryError>;
}

/// Fetches configurations from a remote config service.
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRegistry {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, RegistryError> {
        if base_url.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        Ok(HttpRegistry { client, base_url })
    }

    fn config_url(&self, tenant_id: &str) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["config", "get-config", tenant_id]);
        Ok(url)
    }
}

#[async_trait]
impl TenantRegistry for HttpRegistry {
    async fn fetch(&self, tenant_id: &str) -> Result<Option<ConfigRecord>, RegistryError> {
        let url = self.config_url(tenant_id)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout
            } else {
                RegistryError::Unavailable(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::OK => {
                let record = response.json::<ConfigRecord>().await.map_err(|e| {
                    if e.is_timeout() {
                        RegistryError::Timeout
                    } else {
                        RegistryError::InvalidResponse(e.to_string())
                    }
                })?;
                Ok(Some(record))
            }
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => Err(
                RegistryError::Unavailable(format!("registry responded {}", response.status())),
            ),
            StatusCode::GATEWAY_TIMEOUT => Err(RegistryError::Timeout),
            status => Err(RegistryError::UnexpectedStatus(status)),
        }
    }
}

/// Reads configurations straight from a local tenant store.
pub struct StoreRegistry {
    store: Arc<dyn TenantStore>,
}

impl StoreRegistry {
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        StoreRegistry { store }
    }
}

#[async_trait]
impl TenantRegistry for StoreRegistry {
    async fn fetch(&self, tenant_id: &str) -> Result<Option<ConfigRecord>, RegistryError> {
        Ok(self.store.get(tenant_id).await?.map(ConfigRecord::from))
    }
}
