// Admin token guard for the configuration mutation endpoints.
use crate::signer::TokenSigner;
use crate::types::{TokenKind, unix_now};
use axum::Json;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("Token is missing!")]
    Missing,
    #[error("Token is malformed!")]
    Malformed,
    #[error("Invalid token!")]
    Invalid,
    #[error("Token has expired!")]
    Expired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminClaims {
    pub typ: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry in seconds since the unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Default for AdminClaims {
    fn default() -> Self {
        AdminClaims {
            typ: TokenKind::Admin,
            sub: None,
            exp: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdminGuard {
    signer: TokenSigner,
}

impl AdminGuard {
    pub fn new(signer: TokenSigner) -> Self {
        AdminGuard { signer }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<AdminClaims, AuthError> {
        let value = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
        let value = value.to_str().map_err(|_| AuthError::Malformed)?;

        let token = match value.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            _ => return Err(AuthError::Malformed),
        };

        let claims: AdminClaims = self.signer.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected admin token");
            AuthError::Invalid
        })?;

        if claims.typ != TokenKind::Admin {
            tracing::debug!(typ = ?claims.typ, "Rejected token issued for another purpose");
            return Err(AuthError::Invalid);
        }

        if let Some(exp) = claims.exp
            && exp <= unix_now()
        {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }
}

pub async fn require_admin(
    State(guard): State<AdminGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    guard.authorize(request.headers())?;
    Ok(next.run(request).await)
}
