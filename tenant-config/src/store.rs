//! Durable storage for tenant configurations, keyed by tenant id.
use crate::config::StoreConfig;
use crate::types::{FeatureFlags, TenantConfig};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("configuration for {0} already exists")]
    AlreadyExists(String),

    #[error("no configuration for {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Fields to replace in a stored configuration. `None` keeps the stored value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TenantConfigPatch {
    pub connection_uri_token: Option<String>,
    pub feature_flags: Option<FeatureFlags>,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantConfig>, StoreError>;

    /// Fails with `AlreadyExists` if the tenant is already present.
    async fn insert(&self, config: TenantConfig) -> Result<(), StoreError>;

    /// Applies `patch` to the stored configuration in one step and returns the
    /// result. Fails with `NotFound` if the tenant is absent.
    async fn modify(
        &self,
        tenant_id: &str,
        patch: TenantConfigPatch,
    ) -> Result<TenantConfig, StoreError>;

    /// Removes and returns the configuration.
    async fn delete(&self, tenant_id: &str) -> Result<TenantConfig, StoreError>;
}

pub fn get_store(config: &StoreConfig) -> Result<Arc<dyn TenantStore>, StoreError> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(InMemoryTenantStore::new())),
        StoreConfig::Filesystem { path } => Ok(Arc::new(FilesystemTenantStore::open(path)?)),
    }
}

type Tenants = HashMap<String, TenantConfig>;

fn apply_insert(tenants: &mut Tenants, config: TenantConfig) -> Result<(), StoreError> {
    if tenants.contains_key(&config.tenant_id) {
        return Err(StoreError::AlreadyExists(config.tenant_id));
    }
    tenants.insert(config.tenant_id.clone(), config);
    Ok(())
}

fn apply_modify(
    tenants: &mut Tenants,
    tenant_id: &str,
    patch: TenantConfigPatch,
) -> Result<TenantConfig, StoreError> {
    let config = tenants
        .get_mut(tenant_id)
        .ok_or_else(|| StoreError::NotFound(tenant_id.into()))?;

    if let Some(token) = patch.connection_uri_token {
        config.connection_uri_token = token;
    }
    if let Some(feature_flags) = patch.feature_flags {
        config.feature_flags = feature_flags;
    }
    Ok(config.clone())
}

fn apply_delete(tenants: &mut Tenants, tenant_id: &str) -> Result<TenantConfig, StoreError> {
    tenants
        .remove(tenant_id)
        .ok_or_else(|| StoreError::NotFound(tenant_id.into()))
}

#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<Tenants>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantConfig>, StoreError> {
        Ok(self.tenants.read().get(tenant_id).cloned())
    }

    async fn insert(&self, config: TenantConfig) -> Result<(), StoreError> {
        apply_insert(&mut self.tenants.write(), config)
    }

    async fn modify(
        &self,
        tenant_id: &str,
        patch: TenantConfigPatch,
    ) -> Result<TenantConfig, StoreError> {
        apply_modify(&mut self.tenants.write(), tenant_id, patch)
    }

    async fn delete(&self, tenant_id: &str) -> Result<TenantConfig, StoreError> {
        apply_delete(&mut self.tenants.write(), tenant_id)
    }
}

/// Keeps all tenants in memory and rewrites a JSON snapshot on every mutation.
/// The snapshot is written to a sibling temp file and renamed over the previous
/// one, so a crash mid-write leaves the previous snapshot intact. File I/O runs
/// on the blocking pool.
pub struct FilesystemTenantStore {
    path: PathBuf,
    tenants: Arc<RwLock<Tenants>>,
    // Serializes mutations, readers only wait for the final swap
    writer: Arc<Mutex<()>>,
}

impl FilesystemTenantStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let tenants = match File::open(&path) {
            Ok(file) => {
                let records: Vec<TenantConfig> = serde_json::from_reader(BufReader::new(file))?;
                records
                    .into_iter()
                    .map(|c| (c.tenant_id.clone(), c))
                    .collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Tenants::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), tenants = tenants.len(), "Opened tenant store");

        Ok(FilesystemTenantStore {
            path,
            tenants: Arc::new(RwLock::new(tenants)),
            writer: Arc::new(Mutex::new(())),
        })
    }

    // Applies `op` to a copy and only swaps it in once the snapshot is on disk.
    async fn mutate<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Tenants) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        let tenants = self.tenants.clone();
        let writer = self.writer.clone();

        tokio::task::spawn_blocking(move || {
            let _writer = writer.lock();
            let mut next = tenants.read().clone();
            let result = op(&mut next)?;
            persist(&path, &next)?;
            *tenants.write() = next;
            Ok(result)
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }
}

fn persist(path: &Path, tenants: &Tenants) -> Result<(), StoreError> {
    let mut records: Vec<&TenantConfig> = tenants.values().collect();
    records.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));

    let tmp_path = path.with_extension("tmp");
    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    fs::rename(&tmp_path, path)?;

    Ok(())
}

#[async_trait]
impl TenantStore for FilesystemTenantStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantConfig>, StoreError> {
        Ok(self.tenants.read().get(tenant_id).cloned())
    }

    async fn insert(&self, config: TenantConfig) -> Result<(), StoreError> {
        self.mutate(move |tenants| apply_insert(tenants, config))
            .await
    }

    async fn modify(
        &self,
        tenant_id: &str,
        patch: TenantConfigPatch,
    ) -> Result<TenantConfig, StoreError> {
        let tenant_id = tenant_id.to_string();
        self.mutate(move |tenants| apply_modify(tenants, &tenant_id, patch))
            .await
    }

    async fn delete(&self, tenant_id: &str) -> Result<TenantConfig, StoreError> {
        let tenant_id = tenant_id.to_string();
        self.mutate(move |tenants| apply_delete(tenants, &tenant_id))
            .await
    }
}
