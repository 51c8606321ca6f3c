pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod errors;
pub mod gateway_service;
pub mod headers;
pub mod metrics_defs;

#[cfg(test)]
mod testutils;

use directory::ServiceDirectory;
use dispatcher::Dispatcher;
use errors::GatewayError;
use gateway_service::GatewayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::time::Duration;

/// Runs the gateway and its admin listener until either fails.
pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    config.validate()?;

    let directory = ServiceDirectory::try_new(&config.services)?;
    let dispatcher = Dispatcher::new(directory, Duration::from_secs(config.timeout_secs));

    let gateway_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        GatewayService::new(dispatcher),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, GatewayError>::new(|| true),
    );

    tokio::try_join!(gateway_task, admin_task)?;
    Ok(())
}
