use gateway::config::Config as GatewayConfig;
use serde::Deserialize;
use std::fs::File;
use tenant_config::config::{Config as ConfigServiceConfig, ResolverConfig};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Configuration file shared by every subcommand. Each subcommand reads its own section.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gateway: Option<GatewayConfig>,
    pub config_service: Option<ConfigServiceConfig>,
    pub resolver: Option<ResolverConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("config file has no `{0}` section")]
    MissingSection(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tenant_config::config::StoreConfig;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            gateway:
                listener:
                    host: 0.0.0.0
                    port: 5000
                admin_listener:
                    host: 0.0.0.0
                    port: 5100
                timeout_secs: 10
                services:
                    - name: auth
                      url: http://auth-service:5001/auth
                    - name: config
                      url: http://config-service:5002/config
            config_service:
                listener:
                    host: 0.0.0.0
                    port: 5002
                signing_secret: sign-me
                admin_secret: admin-me
                store:
                    type: filesystem
                    path: /var/lib/tenantgate/tenants.json
            resolver:
                registry_url: http://config-service:5002
                signing_secret: sign-me
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.common.metrics.unwrap().statsd_port, 8125);
        assert!(config.common.logging.unwrap().sentry_dsn.is_some());

        let gateway = config.gateway.expect("gateway config");
        assert_eq!(gateway.timeout_secs, 10);
        assert_eq!(gateway.services[1].name, "config");
        assert!(gateway.validate().is_ok());

        let config_service = config.config_service.expect("config service config");
        assert_eq!(
            config_service.store,
            StoreConfig::Filesystem {
                path: "/var/lib/tenantgate/tenants.json".into()
            }
        );
        assert!(config_service.validate().is_ok());

        let resolver = config.resolver.expect("resolver config");
        assert_eq!(resolver.registry_url.as_str(), "http://config-service:5002/");
    }

    #[test]
    fn sections_are_optional() {
        let tmp = write_tmp_file(
            r#"
            config_service:
                signing_secret: s
                admin_secret: a
            "#,
        );
        let config = Config::from_file(tmp.path()).expect("load config");
        assert_eq!(config.common, CommonConfig::default());
        assert!(config.gateway.is_none());
        assert!(config.resolver.is_none());
        assert!(config.config_service.is_some());
    }

    #[test]
    fn invalid_files() {
        let missing = Config::from_file(std::path::Path::new("/nonexistent/tenantgate.yaml"));
        assert!(matches!(missing, Err(ConfigError::LoadError(_))));

        let tmp = write_tmp_file("gateway: [not, a, map]");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
