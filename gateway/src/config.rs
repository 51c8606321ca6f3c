use serde::Deserialize;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Timeout cannot be 0")]
    ZeroTimeout,

    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    #[error("Empty service name")]
    EmptyServiceName,

    #[error("Service {0} must have an absolute http URL")]
    InvalidServiceUrl(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// A named backend service the gateway forwards to.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub name: String,
    pub url: Url,
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for tenant traffic
    pub listener: Listener,
    /// Listener for health and readiness probes
    pub admin_listener: Listener,
    /// Bound on every forwarded request, including reading the response body
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub services: Vec<ServiceConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }

        crate::directory::ServiceDirectory::try_new(&self.services)?;
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
listener:
    host: 0.0.0.0
    port: 5000
admin_listener:
    host: 127.0.0.1
    port: 5001
services:
    - name: auth
      url: http://auth-service:5001/auth
    - name: board
      url: http://board-service:5003
"#;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.listener.port, 5000);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].url.path(), "/auth");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let base: Config = serde_yaml::from_str(CONFIG).unwrap();

        let mut config = base.clone();
        config.admin_listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = base.clone();
        config.timeout_secs = 0;
        assert_eq!(config.validate(), Err(ValidationError::ZeroTimeout));

        let mut config = base.clone();
        config.services[1].name = "auth".into();
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateService("auth".into()))
        );

        let mut config = base.clone();
        config.services[0].name = String::new();
        assert_eq!(config.validate(), Err(ValidationError::EmptyServiceName));

        let mut config = base;
        config.services[0].url = Url::parse("ftp://auth-service/").unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidServiceUrl("auth".into()))
        );
    }

    #[test]
    fn test_relative_url_rejected() {
        let yaml = CONFIG.replace("http://board-service:5003", "/board");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }
}
