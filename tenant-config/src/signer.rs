//! Compact HMAC-SHA256 signed tokens.
//!
//! Tokens use the JWT HS256 layout: `base64url(header).base64url(claims).base64url(mac)`,
//! without padding. The MAC covers the first two segments exactly as transmitted.
use crate::types::{DatabaseUrlClaims, TokenKind};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SignerError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("token was issued as {actual:?}, expected {expected:?}")]
    WrongKind { expected: TokenKind, actual: TokenKind },
    #[error("token was issued for tenant {actual}, expected {expected}")]
    TenantMismatch { expected: String, actual: String },
    #[error("could not encode claims: {0}")]
    Encode(String),
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Arc<[u8]>,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        TokenSigner {
            key: Arc::from(secret.as_ref()),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size")
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, SignerError> {
        let header = Header {
            alg: ALGORITHM.into(),
            typ: "JWT".into(),
        };
        let header = serde_json::to_vec(&header).map_err(|e| SignerError::Encode(e.to_string()))?;
        let claims = serde_json::to_vec(claims).map_err(|e| SignerError::Encode(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Checks the signature and decodes the claims. Nothing is decoded before
    /// the signature has been checked.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, SignerError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SignerError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignerError::Malformed)?;

        let mut mac = self.mac();
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(claims.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SignerError::BadSignature)?;

        let header: Header = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(SignerError::UnsupportedAlgorithm(header.alg));
        }

        decode_segment(claims)
    }

    pub fn sign_database_url(
        &self,
        tenant_id: &str,
        database_url: &str,
    ) -> Result<String, SignerError> {
        self.sign(&DatabaseUrlClaims {
            typ: TokenKind::DatabaseUrl,
            tenant_id: tenant_id.into(),
            database_url: database_url.into(),
        })
    }

    /// Verifies a connection URI token and checks it was issued for `tenant_id`.
    pub fn verify_database_url(&self, tenant_id: &str, token: &str) -> Result<String, SignerError> {
        let claims: DatabaseUrlClaims = self.verify(token)?;
        if claims.typ != TokenKind::DatabaseUrl {
            return Err(SignerError::WrongKind {
                expected: TokenKind::DatabaseUrl,
                actual: claims.typ,
            });
        }
        if claims.tenant_id != tenant_id {
            return Err(SignerError::TenantMismatch {
                expected: tenant_id.into(),
                actual: claims.tenant_id,
            });
        }
        Ok(claims.database_url)
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, SignerError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| SignerError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| SignerError::Malformed)
}
