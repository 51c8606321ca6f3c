// Header policy for forwarded requests. The inbound Host never reaches a backend and the
// validated tenant id is the only X-Tenant-ID a backend sees.

use crate::errors::GatewayError;
use http::Version;
use http::header::{HOST, HeaderMap, HeaderName, HeaderValue};
use shared::http::filter_hop_by_hop;

pub static TENANT_HEADER: HeaderName = HeaderName::from_static("x-tenant-id");

pub fn outbound_headers(inbound: &HeaderMap, tenant_id: &str) -> Result<HeaderMap, GatewayError> {
    let tenant = HeaderValue::from_str(tenant_id)
        .map_err(|_| GatewayError::BadRequest("invalid tenant id".into()))?;

    let mut headers = inbound.clone();
    headers.remove(HOST);
    // The backend hop is always HTTP/1.1 and the body is re-framed
    filter_hop_by_hop(&mut headers, Version::HTTP_11);
    // Replaces every existing value, whatever its case on the wire
    headers.insert(TENANT_HEADER.clone(), tenant);

    Ok(headers)
}

/// Tenant id from the inbound headers. Absent, empty or non-visible-ASCII values are rejected.
pub fn tenant_id(headers: &HeaderMap) -> Result<String, GatewayError> {
    headers
        .get(&TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(String::from)
        .ok_or(GatewayError::MissingTenant)
}
