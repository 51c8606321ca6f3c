use crate::cache::ConfigCache;
use crate::metrics_defs::CONFIG_MUTATION;
use crate::registry::StoreRegistry;
use crate::resolver::{ConfigResolver, ResolveError};
use crate::signer::{SignerError, TokenSigner};
use crate::store::{StoreError, TenantConfigPatch, TenantStore};
use crate::types::{ConfigRecord, FeatureFlags, TenantConfig, unix_now};
use serde::Deserialize;
use shared::counter;
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NewTenantConfig {
    pub tenant_id: String,
    pub db_url: String,
    #[serde(default)]
    pub feature_flags: Option<FeatureFlags>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TenantConfigUpdate {
    pub db_url: Option<String>,
    pub feature_flags: Option<FeatureFlags>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration for {0} already exists")]
    AlreadyExists(String),

    #[error("configuration not found")]
    NotFound,

    #[error("could not resolve configuration: {0}")]
    Resolve(ResolveError),

    #[error("could not sign connection URI: {0}")]
    Signer(#[from] SignerError),

    #[error("tenant store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ConfigServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(tenant_id) => ConfigServiceError::AlreadyExists(tenant_id),
            StoreError::NotFound(_) => ConfigServiceError::NotFound,
            other => ConfigServiceError::Store(other),
        }
    }
}

impl From<ResolveError> for ConfigServiceError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => ConfigServiceError::NotFound,
            other => ConfigServiceError::Resolve(other),
        }
    }
}

/// Owns the tenant store. Connection URIs are signed before they are written and
/// every write drops the tenant's cache entry before it is acknowledged.
#[derive(Clone)]
pub struct ConfigService {
    store: Arc<dyn TenantStore>,
    signer: TokenSigner,
    resolver: ConfigResolver,
}

impl ConfigService {
    /// Reads go through a resolver over the same store, sharing `cache`.
    pub fn new(
        store: Arc<dyn TenantStore>,
        cache: Arc<dyn ConfigCache>,
        signer: TokenSigner,
    ) -> Self {
        let resolver = ConfigResolver::new(
            Arc::new(StoreRegistry::new(store.clone())),
            cache,
            signer.clone(),
        );

        ConfigService {
            store,
            signer,
            resolver,
        }
    }

    /// Resolver sharing this service's cache, for database access in the same process.
    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub async fn get_config(&self, tenant_id: &str) -> Result<ConfigRecord, ConfigServiceError> {
        Ok(self.resolver.resolve_verified(tenant_id).await?.record)
    }

    pub async fn add_config(&self, new: NewTenantConfig) -> Result<(), ConfigServiceError> {
        if new.tenant_id.trim().is_empty() {
            return Err(ConfigServiceError::InvalidRequest("tenant_id is required".into()));
        }
        if new.db_url.trim().is_empty() {
            return Err(ConfigServiceError::InvalidRequest("db_url is required".into()));
        }

        let config = TenantConfig {
            connection_uri_token: self.signer.sign_database_url(&new.tenant_id, &new.db_url)?,
            tenant_id: new.tenant_id,
            feature_flags: new.feature_flags.unwrap_or_default(),
            created_at: unix_now(),
        };
        let tenant_id = config.tenant_id.clone();

        self.store.insert(config).await?;
        self.acknowledge(&tenant_id, "add");
        Ok(())
    }

    pub async fn update_config(
        &self,
        tenant_id: &str,
        update: TenantConfigUpdate,
    ) -> Result<(), ConfigServiceError> {
        let connection_uri_token = match update.db_url {
            Some(db_url) if db_url.trim().is_empty() => {
                return Err(ConfigServiceError::InvalidRequest("db_url cannot be empty".into()));
            }
            Some(db_url) => Some(self.signer.sign_database_url(tenant_id, &db_url)?),
            None => None,
        };

        self.store
            .modify(
                tenant_id,
                TenantConfigPatch {
                    connection_uri_token,
                    feature_flags: update.feature_flags,
                },
            )
            .await?;
        self.acknowledge(tenant_id, "update");
        Ok(())
    }

    pub async fn delete_config(&self, tenant_id: &str) -> Result<(), ConfigServiceError> {
        self.store.delete(tenant_id).await?;
        self.acknowledge(tenant_id, "delete");
        Ok(())
    }

    fn acknowledge(&self, tenant_id: &str, operation: &'static str) {
        self.resolver.invalidate(tenant_id);
        counter!(CONFIG_MUTATION, "operation" => operation).increment(1);
        tracing::info!(tenant_id, operation, "Tenant configuration changed");
    }
}
