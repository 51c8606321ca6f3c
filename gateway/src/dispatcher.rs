use crate::directory::ServiceDirectory;
use crate::errors::GatewayError;
use crate::headers::outbound_headers;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// A request as handed over by the gateway boundary, tenant already validated.
#[derive(Clone, Debug)]
pub struct ForwardedRequest {
    pub service: String,
    pub endpoint: String,
    pub tenant_id: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub query: Option<String>,
}

/// A fully collected backend response.
#[derive(Clone, Debug)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Forwards requests to the backend services named in the directory.
///
/// The timeout covers connecting, sending the request, receiving the response
/// headers and collecting the complete response body. Requests are never retried.
#[derive(Clone)]
pub struct Dispatcher {
    directory: Arc<ServiceDirectory>,
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(directory: ServiceDirectory, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Dispatcher {
            directory: Arc::new(directory),
            client,
            timeout,
        }
    }

    pub async fn forward(
        &self,
        request: ForwardedRequest,
    ) -> Result<ForwardedResponse, GatewayError> {
        let route = self.directory.resolve(&request.service)?;
        let url = route.target(&request.endpoint, request.query.as_deref())?;
        let headers = outbound_headers(&request.headers, &request.tenant_id)?;

        tracing::debug!(
            service = %route.name,
            tenant_id = %request.tenant_id,
            method = %request.method,
            url = %url,
            "Forwarding request"
        );

        let mut upstream_request = Request::builder()
            .method(request.method)
            .uri(url.as_str())
            .body(Full::new(request.body))
            .map_err(|e| GatewayError::BadRequest(format!("invalid target: {e}")))?;
        *upstream_request.headers_mut() = headers;

        let service = route.name.as_str();
        let exchange = async {
            let response = self
                .client
                .request(upstream_request)
                .await
                .map_err(|e| classify(service, e))?;

            let (mut parts, body) = response.into_parts();
            shared::http::filter_hop_by_hop(&mut parts.headers, parts.version);

            let body = body
                .collect()
                .await
                .map(|collected| collected.to_bytes())
                .map_err(|e| GatewayError::UpstreamUnavailable {
                    service: service.to_string(),
                    reason: format!("failed to read response body: {e}"),
                })?;

            Ok::<_, GatewayError>(ForwardedResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        timeout(self.timeout, exchange)
            .await
            .map_err(|_| GatewayError::UpstreamTimeout(service.to_string()))?
    }
}

fn classify(service: &str, error: hyper_util::client::legacy::Error) -> GatewayError {
    if error.is_connect() || is_connection_failure(&error) {
        return GatewayError::UpstreamUnavailable {
            service: service.to_string(),
            reason: error_chain(&error),
        };
    }
    GatewayError::Unexpected(format!("request to {service} failed: {}", error_chain(&error)))
}

fn is_connection_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>()
            && (hyper_err.is_closed()
                || hyper_err.is_incomplete_message()
                || hyper_err.is_canceled())
        {
            return true;
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            )
        {
            return true;
        }
        source = err.source();
    }
    false
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
