// Cache of signed tenant configurations. Entries hold the signed token exactly as it
// was received from the registry; readers must verify it before trusting the contents.
use crate::types::{FeatureFlags, TenantId};
use moka::sync::Cache;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

pub const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub tenant_id: TenantId,
    pub signed_payload: String,
    pub feature_flags: FeatureFlags,
    pub inserted_at: SystemTime,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        match self.inserted_at.elapsed() {
            Ok(age) => age >= self.ttl,
            // Inserted in the future, don't trust it
            Err(_) => true,
        }
    }
}

/// Storage tier for signed configurations. Implementations may be shared with
/// other processes, so nothing read from it is trusted without verification.
pub trait ConfigCache: Send + Sync {
    fn get(&self, tenant_id: &str) -> Option<CacheEntry>;

    /// Stores an entry, replacing any previous one for the same tenant.
    fn insert(&self, tenant_id: &str, signed_payload: String, feature_flags: FeatureFlags);

    /// Stores a fully formed entry as is, keeping its `inserted_at` and `ttl`.
    fn insert_entry(&self, entry: CacheEntry);

    /// Counter bumped by every `invalidate` of the tenant.
    fn generation(&self, tenant_id: &str) -> u64;

    /// Stores an entry unless the tenant was invalidated after `generation` was
    /// read. Returns whether the entry was stored.
    fn insert_if_current(
        &self,
        tenant_id: &str,
        generation: u64,
        signed_payload: String,
        feature_flags: FeatureFlags,
    ) -> bool;

    fn invalidate(&self, tenant_id: &str);
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_max_capacity() -> u64 {
    DEFAULT_MAX_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: DEFAULT_TTL_SECS,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

pub struct MokaConfigCache {
    cache: Cache<TenantId, CacheEntry>,
    ttl: Duration,
    // Held while comparing and storing, and while invalidating
    generations: Mutex<HashMap<TenantId, u64>>,
}

impl MokaConfigCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(ttl)
            .build();

        MokaConfigCache {
            cache,
            ttl,
            generations: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, tenant_id: &str, signed_payload: String, feature_flags: FeatureFlags) -> CacheEntry {
        CacheEntry {
            tenant_id: tenant_id.into(),
            signed_payload,
            feature_flags,
            inserted_at: SystemTime::now(),
            ttl: self.ttl,
        }
    }
}

impl ConfigCache for MokaConfigCache {
    fn get(&self, tenant_id: &str) -> Option<CacheEntry> {
        self.cache.get(tenant_id)
    }

    fn insert(&self, tenant_id: &str, signed_payload: String, feature_flags: FeatureFlags) {
        self.insert_entry(self.entry(tenant_id, signed_payload, feature_flags));
    }

    fn insert_entry(&self, entry: CacheEntry) {
        self.cache.insert(entry.tenant_id.clone(), entry);
    }

    fn generation(&self, tenant_id: &str) -> u64 {
        self.generations
            .lock()
            .get(tenant_id)
            .copied()
            .unwrap_or_default()
    }

    fn insert_if_current(
        &self,
        tenant_id: &str,
        generation: u64,
        signed_payload: String,
        feature_flags: FeatureFlags,
    ) -> bool {
        let generations = self.generations.lock();
        if generations.get(tenant_id).copied().unwrap_or_default() != generation {
            return false;
        }
        self.insert_entry(self.entry(tenant_id, signed_payload, feature_flags));
        true
    }

    fn invalidate(&self, tenant_id: &str) {
        let mut generations = self.generations.lock();
        *generations.entry(tenant_id.into()).or_default() += 1;
        self.cache.invalidate(tenant_id);
    }
}
