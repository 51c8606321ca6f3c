use crate::config::ServiceConfig;
use crate::directory::ServiceDirectory;
use crate::dispatcher::Dispatcher;
use http::header::{CONTENT_TYPE, HOST};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Backend that answers with a JSON description of the request it received.
/// Paths ending in `/missing` get a 404.
pub struct TestBackend {
    url: Url,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl TestBackend {
    pub async fn spawn() -> Self {
        Self::spawn_with_delay(Duration::ZERO).await
    }

    pub async fn spawn_slow(delay: Duration) -> Self {
        Self::spawn_with_delay(delay).await
    }

    async fn spawn_with_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let counter = counter.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        echo(req, delay)
                    });
                    let _ = Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        TestBackend {
            url: Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            hits,
            handle,
        }
    }

    pub fn url(&self) -> Url {
        self.url.clone()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn echo(req: Request<Incoming>, delay: Duration) -> Result<Response<Full<Bytes>>, Infallible> {
    tokio::time::sleep(delay).await;

    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let tenant_ids: Vec<&str> = parts
        .headers
        .get_all("x-tenant-id")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let echo = serde_json::json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "host": parts.headers.get(HOST).and_then(|h| h.to_str().ok()),
        "tenant_ids": tenant_ids,
        "x_secret": parts.headers.contains_key("x-secret"),
        "body": String::from_utf8_lossy(&body),
    });

    let status = match parts.uri.path().ends_with("/missing") {
        true => StatusCode::NOT_FOUND,
        false => StatusCode::OK,
    };

    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header("x-backend", "echo")
        .body(Full::new(Bytes::from(echo.to_string())))
        .unwrap();
    Ok(response)
}

/// URL of a local port nothing listens on.
pub async fn refused_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{port}")).unwrap()
}

pub fn dispatcher(services: &[(&str, Url)], timeout: Duration) -> Dispatcher {
    let services: Vec<ServiceConfig> = services
        .iter()
        .map(|(name, url)| ServiceConfig {
            name: name.to_string(),
            url: url.clone(),
        })
        .collect();
    Dispatcher::new(ServiceDirectory::try_new(&services).unwrap(), timeout)
}
