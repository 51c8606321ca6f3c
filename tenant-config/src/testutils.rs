use crate::registry::{RegistryError, TenantRegistry};
use crate::signer::TokenSigner;
use crate::store::{InMemoryTenantStore, StoreError, TenantConfigPatch, TenantStore};
use crate::types::{ConfigRecord, FeatureFlags, TenantConfig};
use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub fn record(tenant_id: &str, token: &str) -> ConfigRecord {
    ConfigRecord {
        tenant_id: tenant_id.into(),
        database_url_hash: token.into(),
        feature_flags: FeatureFlags::new(),
    }
}

pub fn signed_record(secret: &str, tenant_id: &str, uri: &str) -> ConfigRecord {
    let token = TokenSigner::new(secret)
        .sign_database_url(tenant_id, uri)
        .unwrap();
    record(tenant_id, &token)
}

/// In-memory registry that counts fetches.
pub struct CountingRegistry {
    records: HashMap<String, ConfigRecord>,
    error: Option<fn() -> RegistryError>,
    calls: AtomicUsize,
}

impl CountingRegistry {
    pub fn new(records: Vec<ConfigRecord>) -> Self {
        CountingRegistry {
            records: records
                .into_iter()
                .map(|r| (r.tenant_id.clone(), r))
                .collect(),
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: fn() -> RegistryError) -> Self {
        CountingRegistry {
            records: HashMap::new(),
            error: Some(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantRegistry for CountingRegistry {
    async fn fetch(&self, tenant_id: &str) -> Result<Option<ConfigRecord>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.error {
            Some(error) => Err(error()),
            None => Ok(self.records.get(tenant_id).cloned()),
        }
    }
}

/// Holds the first read that passes through it after `arm` until `release`.
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    reached: Notify,
    released: Notify,
}

impl Gate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Waits until a read is held at the gate.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.released.notified().await;
        }
    }
}

/// In-memory store whose reads can be held after the record was read.
#[derive(Default)]
pub struct GatedStore {
    inner: InMemoryTenantStore,
    pub gate: Gate,
}

impl GatedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for GatedStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<TenantConfig>, StoreError> {
        let config = self.inner.get(tenant_id).await?;
        self.gate.pass().await;
        Ok(config)
    }

    async fn insert(&self, config: TenantConfig) -> Result<(), StoreError> {
        self.inner.insert(config).await
    }

    async fn modify(
        &self,
        tenant_id: &str,
        patch: TenantConfigPatch,
    ) -> Result<TenantConfig, StoreError> {
        self.inner.modify(tenant_id, patch).await
    }

    async fn delete(&self, tenant_id: &str) -> Result<TenantConfig, StoreError> {
        self.inner.delete(tenant_id).await
    }
}

/// Registry whose records can be replaced and whose fetches can be held.
#[derive(Default)]
pub struct GatedRegistry {
    records: parking_lot::Mutex<HashMap<String, ConfigRecord>>,
    pub gate: Gate,
}

impl GatedRegistry {
    pub fn set(&self, record: ConfigRecord) {
        self.records.lock().insert(record.tenant_id.clone(), record);
    }
}

#[async_trait]
impl TenantRegistry for GatedRegistry {
    async fn fetch(&self, tenant_id: &str) -> Result<Option<ConfigRecord>, RegistryError> {
        let record = self.records.lock().get(tenant_id).cloned();
        self.gate.pass().await;
        Ok(record)
    }
}

#[derive(Clone)]
struct ServerState {
    records: Arc<HashMap<String, ConfigRecord>>,
    delay: Option<Duration>,
    hits: Arc<AtomicUsize>,
}

/// Serves `GET /config/get-config/{tenant_id}` on a random local port.
pub struct TestRegistryServer {
    addr: std::net::SocketAddr,
    hits: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestRegistryServer {
    pub async fn spawn(records: Vec<ConfigRecord>) -> Self {
        Self::start(records, None).await
    }

    pub async fn spawn_slow(delay: Duration) -> Self {
        Self::start(vec![], Some(delay)).await
    }

    async fn start(records: Vec<ConfigRecord>, delay: Option<Duration>) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            records: Arc::new(
                records
                    .into_iter()
                    .map(|r| (r.tenant_id.clone(), r))
                    .collect(),
            ),
            delay,
            hits: hits.clone(),
        };

        let app = Router::new()
            .route("/config/get-config/{tenant_id}", get(get_config))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestRegistryServer { addr, hits, handle }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestRegistryServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get_config(State(state): State<ServerState>, Path(tenant_id): Path<String>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }
    match state.records.get(&tenant_id) {
        Some(record) => axum::Json(record.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A URL on which nothing is listening.
pub async fn unused_local_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}")).unwrap()
}
