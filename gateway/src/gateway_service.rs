use crate::dispatcher::{Dispatcher, ForwardedRequest};
use crate::errors::GatewayError;
use crate::headers::tenant_id;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT, UPSTREAM_ERRORS};
use http::{Method, Request, Response};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use shared::{counter, gauge, histogram};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

/// Public entry point of the gateway: `METHOD /{service}/{endpoint...}`.
pub struct GatewayService {
    dispatcher: Dispatcher,
}

impl GatewayService {
    pub fn new(dispatcher: Dispatcher) -> Self {
        GatewayService { dispatcher }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<BoxBody<Bytes, GatewayError>>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();

        Box::pin(async move {
            let response = handle(&dispatcher, req).await;
            Ok(response.map(|body| Full::new(body).map_err(|e| match e {}).boxed()))
        })
    }
}

// Counts a request as in flight until dropped, which also covers clients that go away mid-request
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

/// Handles one inbound request. Failures are turned into responses here and nowhere else.
pub async fn handle<B>(dispatcher: &Dispatcher, request: Request<B>) -> Response<Bytes>
where
    B: Body,
    B::Error: Display,
{
    let start = Instant::now();
    let _inflight = InflightGuard::new();

    let response = match route(dispatcher, request).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                GatewayError::UpstreamUnavailable { .. } => {
                    counter!(UPSTREAM_ERRORS, "kind" => "unavailable").increment(1)
                }
                GatewayError::UpstreamTimeout(_) => {
                    counter!(UPSTREAM_ERRORS, "kind" => "timeout").increment(1)
                }
                _ => {}
            }
            err.into_response()
        }
    };

    histogram!(REQUEST_DURATION, "status" => response.status().as_str().to_string())
        .record(start.elapsed().as_secs_f64());

    response
}

async fn route<B>(dispatcher: &Dispatcher, request: Request<B>) -> Result<Response<Bytes>, GatewayError>
where
    B: Body,
    B::Error: Display,
{
    if *request.method() == Method::GET && request.uri().path() == "/health" {
        return Ok(Response::new(Bytes::from_static(b"OK")));
    }

    if !matches!(
        *request.method(),
        Method::GET | Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    ) {
        return Err(GatewayError::MethodNotAllowed(request.method().clone()));
    }

    let (service, endpoint) = split_path(request.uri().path())?;
    let tenant_id = tenant_id(request.headers())?;

    tracing::debug!(%service, %endpoint, %tenant_id, "Routing request");

    let (parts, body) = request.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| GatewayError::BadRequest(format!("could not read request body: {e}")))?;

    let forwarded = dispatcher
        .forward(ForwardedRequest {
            service,
            endpoint,
            tenant_id,
            method: parts.method,
            headers: parts.headers,
            body,
            query: parts.uri.query().map(String::from),
        })
        .await?;

    let mut response = Response::new(forwarded.body);
    *response.status_mut() = forwarded.status;
    *response.headers_mut() = forwarded.headers;
    Ok(response)
}

/// Splits `/{service}/{endpoint...}`. Both parts must be non-empty.
fn split_path(path: &str) -> Result<(String, String), GatewayError> {
    match path.trim_start_matches('/').split_once('/') {
        Some((service, endpoint)) if !service.is_empty() && !endpoint.is_empty() => {
            Ok((service.to_string(), endpoint.to_string()))
        }
        _ => Err(GatewayError::NoRoute(path.to_string())),
    }
}
