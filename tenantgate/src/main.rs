mod config;

use clap::{Args, Parser};
use config::{CommonConfig, Config, ConfigError, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;
use tenant_config::resolver::ResolveError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "tenantgate";

#[derive(Parser)]
#[command(name = "tenantgate", about = "Multi-tenant gateway and tenant config service")]
enum CliCommand {
    /// Forward tenant traffic to the configured backend services
    Gateway(CliArgs),
    /// Serve tenant configurations and sign their connection URIs
    ConfigService(CliArgs),
    /// Resolve a tenant's database connection URI through the config service
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct CliArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(Args)]
struct ResolveArgs {
    #[command(flatten)]
    base: CliArgs,
    #[arg(long)]
    tenant_id: String,
}

impl CliCommand {
    fn config_file_path(&self) -> &PathBuf {
        match self {
            CliCommand::Gateway(args) | CliCommand::ConfigService(args) => &args.config_file_path,
            CliCommand::Resolve(args) => &args.base.config_file_path,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
    #[error("gateway failed: {0}")]
    Gateway(#[from] gateway::errors::GatewayError),
    #[error("config service failed: {0}")]
    TenantConfig(#[from] tenant_config::TenantConfigError),
    #[error("could not resolve tenant: {0}")]
    Resolve(#[from] ResolveError),
}

fn main() {
    let cli = CliCommand::parse();

    if let Err(e) = cli_main(cli) {
        tracing::error!(error = %e, "Exiting");
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn cli_main(cli: CliCommand) -> Result<(), CliError> {
    let config = Config::from_file(cli.config_file_path())?;

    // Held until exit so buffered events are flushed
    let _sentry = init_logging(&config.common);
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli, config))
}

async fn run(cli: CliCommand, config: Config) -> Result<(), CliError> {
    match cli {
        CliCommand::Gateway(_) => {
            let gateway_config = config.gateway.ok_or(ConfigError::MissingSection("gateway"))?;
            tracing::info!(
                port = gateway_config.listener.port,
                services = gateway_config.services.len(),
                "Starting gateway"
            );
            gateway::run(gateway_config).await?;
        }
        CliCommand::ConfigService(_) => {
            let service_config = config
                .config_service
                .ok_or(ConfigError::MissingSection("config_service"))?;
            tracing::info!(port = service_config.listener.port, "Starting config service");
            tenant_config::run(service_config).await?;
        }
        CliCommand::Resolve(args) => {
            let resolver_config = config.resolver.ok_or(ConfigError::MissingSection("resolver"))?;
            let resolver = tenant_config::remote_resolver(&resolver_config)?;
            let connection_uri = resolver.resolve(&args.tenant_id).await?;
            println!("{connection_uri}");
        }
    }

    Ok(())
}

fn init_logging(common: &CommonConfig) -> Option<sentry::ClientInitGuard> {
    let guard = common
        .logging
        .as_ref()
        .and_then(|logging| logging.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|_| CliError::Metrics("a global recorder is already installed".into()))?;

    shared::metrics_defs::describe_all(gateway::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(tenant_config::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Metrics exported to statsd"
    );
    Ok(())
}
