use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub type TenantId = String;
pub type FeatureFlags = BTreeMap<String, bool>;

/// A tenant's stored configuration. The connection URI only ever appears
/// inside `connection_uri_token`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    pub connection_uri_token: String,
    #[serde(default)]
    pub feature_flags: FeatureFlags,
    /// Seconds since the unix epoch.
    pub created_at: u64,
}

/// Wire form of a tenant configuration as served by `get-config`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub tenant_id: TenantId,
    pub database_url_hash: String,
    #[serde(default)]
    pub feature_flags: FeatureFlags,
}

impl From<TenantConfig> for ConfigRecord {
    fn from(config: TenantConfig) -> Self {
        ConfigRecord {
            tenant_id: config.tenant_id,
            database_url_hash: config.connection_uri_token,
            feature_flags: config.feature_flags,
        }
    }
}

/// What a signed token may be used for. Every verification checks it, so a
/// token issued for one use is rejected everywhere else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    DatabaseUrl,
    Admin,
}

/// Claims carried by a connection URI token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatabaseUrlClaims {
    pub typ: TokenKind,
    pub tenant_id: TenantId,
    pub database_url: String,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
