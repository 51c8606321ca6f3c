use crate::cache::ConfigCache;
use crate::metrics_defs::{CACHE_HIT, CACHE_MISS, INTEGRITY_FAILURE, REGISTRY_FETCH_DURATION};
use crate::registry::{RegistryError, TenantRegistry};
use crate::signer::{SignerError, TokenSigner};
use crate::types::ConfigRecord;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("no configuration for tenant")]
    NotFound,

    #[error("tenant registry unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("tenant registry timed out")]
    UpstreamTimeout,

    #[error("signed configuration failed verification: {0}")]
    IntegrityFailure(#[from] SignerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ResolveError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unavailable(reason) => ResolveError::UpstreamUnavailable(reason),
            RegistryError::UnexpectedStatus(status) => {
                ResolveError::UpstreamUnavailable(format!("registry responded {status}"))
            }
            RegistryError::Timeout => ResolveError::UpstreamTimeout,
            other => ResolveError::Internal(other.to_string()),
        }
    }
}

/// A configuration whose signature has been checked, with the connection URI decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedConfig {
    pub record: ConfigRecord,
    pub connection_uri: String,
}

/// Resolves a tenant to its database connection URI.
///
/// The cache only ever holds signed tokens. Every read from it is verified
/// against the signing key and the requested tenant; an entry that does not
/// verify is evicted and the registry is consulted instead, so a party able to
/// write to the cache cannot redirect a tenant to another database.
#[derive(Clone)]
pub struct ConfigResolver {
    registry: Arc<dyn TenantRegistry>,
    cache: Arc<dyn ConfigCache>,
    signer: TokenSigner,
}

impl ConfigResolver {
    pub fn new(
        registry: Arc<dyn TenantRegistry>,
        cache: Arc<dyn ConfigCache>,
        signer: TokenSigner,
    ) -> Self {
        ConfigResolver {
            registry,
            cache,
            signer,
        }
    }

    pub async fn resolve(&self, tenant_id: &str) -> Result<String, ResolveError> {
        Ok(self.resolve_verified(tenant_id).await?.connection_uri)
    }

    pub async fn resolve_verified(&self, tenant_id: &str) -> Result<VerifiedConfig, ResolveError> {
        if let Some(verified) = self.lookup_cached(tenant_id) {
            counter!(CACHE_HIT).increment(1);
            return Ok(verified);
        }
        counter!(CACHE_MISS).increment(1);

        // Read before fetching so a write acknowledged meanwhile keeps this result out of the cache
        let generation = self.cache.generation(tenant_id);
        let started = Instant::now();
        let fetched = self.registry.fetch(tenant_id).await;
        let outcome = match &fetched {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(_) => "error",
        };
        histogram!(REGISTRY_FETCH_DURATION, "outcome" => outcome)
            .record(started.elapsed().as_secs_f64());

        let record = fetched
            .inspect_err(|e| tracing::warn!(tenant_id, error = %e, "Tenant registry fetch failed"))?
            .ok_or(ResolveError::NotFound)?;

        let connection_uri = self
            .signer
            .verify_database_url(tenant_id, &record.database_url_hash)
            .inspect_err(|e| {
                counter!(INTEGRITY_FAILURE, "source" => "registry").increment(1);
                tracing::error!(tenant_id, error = %e, "Registry returned a token that does not verify");
            })?;

        if !self.cache.insert_if_current(
            tenant_id,
            generation,
            record.database_url_hash.clone(),
            record.feature_flags.clone(),
        ) {
            tracing::debug!(tenant_id, "Configuration changed during fetch, not caching");
        }

        Ok(VerifiedConfig {
            record,
            connection_uri,
        })
    }

    /// Drops the cached entry for the tenant.
    pub fn invalidate(&self, tenant_id: &str) {
        self.cache.invalidate(tenant_id);
    }

    fn lookup_cached(&self, tenant_id: &str) -> Option<VerifiedConfig> {
        let entry = self.cache.get(tenant_id)?;

        if entry.tenant_id != tenant_id || entry.is_expired() {
            self.cache.invalidate(tenant_id);
            return None;
        }

        match self
            .signer
            .verify_database_url(tenant_id, &entry.signed_payload)
        {
            Ok(connection_uri) => Some(VerifiedConfig {
                record: ConfigRecord {
                    tenant_id: entry.tenant_id,
                    database_url_hash: entry.signed_payload,
                    feature_flags: entry.feature_flags,
                },
                connection_uri,
            }),
            Err(e) => {
                counter!(INTEGRITY_FAILURE, "source" => "cache").increment(1);
                tracing::warn!(tenant_id, error = %e, "Discarding cache entry that failed verification");
                self.cache.invalidate(tenant_id);
                None
            }
        }
    }
}
