//! Tenant configuration: the config service owning the tenant store, and the
//! resolver that maps a tenant id to its database connection URI.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod metrics_defs;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod signer;
pub mod store;
pub mod types;

#[cfg(test)]
mod testutils;

use auth::AdminGuard;
use cache::MokaConfigCache;
use registry::{HttpRegistry, RegistryError};
use resolver::ConfigResolver;
use service::ConfigService;
use signer::TokenSigner;
use std::sync::Arc;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum TenantConfigError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] config::ValidationError),
    #[error("tenant store error: {0}")]
    Store(#[from] store::StoreError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("config API error: {0}")]
    Api(#[from] api::ConfigApiError),
}

/// Runs the config service until the listener fails.
pub async fn run(config: config::Config) -> Result<(), TenantConfigError> {
    config.validate()?;

    let store = store::get_store(&config.store)?;
    let cache = Arc::new(MokaConfigCache::new(&config.cache));
    let service = ConfigService::new(store, cache, TokenSigner::new(&config.signing_secret));
    let guard = AdminGuard::new(TokenSigner::new(&config.admin_secret));

    api::serve(&config.listener, service, guard).await?;
    Ok(())
}

/// Builds a resolver backed by a remote config service.
pub fn remote_resolver(config: &config::ResolverConfig) -> Result<ConfigResolver, TenantConfigError> {
    config.validate()?;

    let registry = HttpRegistry::new(
        config.registry_url.clone(),
        Duration::from_secs(config.timeout_secs),
    )?;

    Ok(ConfigResolver::new(
        Arc::new(registry),
        Arc::new(MokaConfigCache::new(&config.cache)),
        TokenSigner::new(&config.signing_secret),
    ))
}
