use crate::auth::{AdminGuard, require_admin};
use crate::config::Listener as ListenerConfig;
use crate::resolver::ResolveError;
use crate::service::{ConfigService, ConfigServiceError, NewTenantConfig, TenantConfigUpdate};
use crate::types::ConfigRecord;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router, middleware};
use serde::Serialize;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ConfigApiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub async fn serve(
    listener: &ListenerConfig,
    service: ConfigService,
    guard: AdminGuard,
) -> Result<(), ConfigApiError> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Config service listening");

    axum::serve(listener, router(service, guard)).await?;
    Ok(())
}

pub fn router(service: ConfigService, guard: AdminGuard) -> Router {
    let admin = Router::new()
        .route("/add-config", post(add_config))
        .route("/update-config/{tenant_id}", put(update_config))
        .route("/delete-config/{tenant_id}", delete(delete_config))
        .route_layer(middleware::from_fn_with_state(guard, require_admin));

    let config = Router::new()
        .route("/get-config/{tenant_id}", get(get_config))
        .merge(admin);

    Router::new()
        .nest("/config", config)
        .route("/health", get(health))
        .with_state(service)
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: String) -> Json<Self> {
        Json(MessageResponse { message })
    }
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn health() -> &'static str {
    "OK"
}

async fn get_config(
    State(service): State<ConfigService>,
    Path(tenant_id): Path<String>,
) -> Result<Json<ConfigRecord>, ConfigServiceError> {
    service.get_config(&tenant_id).await.map(Json)
}

async fn add_config(
    State(service): State<ConfigService>,
    payload: Result<Json<NewTenantConfig>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ConfigServiceError> {
    let Json(new) = payload.map_err(|e| ConfigServiceError::InvalidRequest(e.body_text()))?;
    let tenant_id = new.tenant_id.clone();
    service.add_config(new).await?;

    Ok((
        StatusCode::CREATED,
        MessageResponse::new(format!("Configuration for {tenant_id} added successfully")),
    ))
}

async fn update_config(
    State(service): State<ConfigService>,
    Path(tenant_id): Path<String>,
    payload: Result<Json<TenantConfigUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse>, ConfigServiceError> {
    let Json(update) = payload.map_err(|e| ConfigServiceError::InvalidRequest(e.body_text()))?;
    service.update_config(&tenant_id, update).await?;

    Ok(MessageResponse::new(format!(
        "Configuration for {tenant_id} updated successfully"
    )))
}

async fn delete_config(
    State(service): State<ConfigService>,
    Path(tenant_id): Path<String>,
) -> Result<Json<MessageResponse>, ConfigServiceError> {
    service.delete_config(&tenant_id).await?;

    Ok(MessageResponse::new(format!(
        "Configuration for {tenant_id} deleted successfully"
    )))
}

impl IntoResponse for ConfigServiceError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            ConfigServiceError::InvalidRequest(reason) => (
                StatusCode::BAD_REQUEST,
                "Invalid request".to_string(),
                Some(reason.clone()),
            ),
            ConfigServiceError::AlreadyExists(_) => (StatusCode::CONFLICT, self.to_string(), None),
            ConfigServiceError::NotFound => (
                StatusCode::NOT_FOUND,
                "Configuration not found".to_string(),
                None,
            ),
            ConfigServiceError::Resolve(ResolveError::UpstreamUnavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable".to_string(),
                None,
            ),
            ConfigServiceError::Resolve(ResolveError::UpstreamTimeout) => (
                StatusCode::GATEWAY_TIMEOUT,
                "Request Timeout".to_string(),
                None,
            ),
            ConfigServiceError::Resolve(_)
            | ConfigServiceError::Signer(_)
            | ConfigServiceError::Store(_) => {
                tracing::error!(error = %self, "Config service request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    Some("Something went wrong on our end.".to_string()),
                )
            }
        };

        (status, Json(ApiErrorResponse { error, message })).into_response()
    }
}
