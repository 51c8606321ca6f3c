use crate::config::{ServiceConfig, ValidationError};
use crate::errors::GatewayError;
use std::collections::HashMap;
use url::Url;

#[derive(Clone, Debug, PartialEq)]
pub struct ServiceRoute {
    pub name: String,
    pub base_url: Url,
}

impl TryFrom<&ServiceConfig> for ServiceRoute {
    type Error = ValidationError;

    fn try_from(config: &ServiceConfig) -> Result<Self, Self::Error> {
        if config.name.is_empty() {
            return Err(ValidationError::EmptyServiceName);
        }

        // Outbound calls use a plain HTTP connector
        let url = &config.url;
        if url.scheme() != "http" || url.host_str().is_none() || url.cannot_be_a_base() {
            return Err(ValidationError::InvalidServiceUrl(config.name.clone()));
        }

        Ok(ServiceRoute {
            name: config.name.clone(),
            base_url: url.clone(),
        })
    }
}

impl ServiceRoute {
    /// `{base_url}/{endpoint}` with the inbound query string. Endpoints with
    /// `.` or `..` segments are rejected so the target stays under the base path.
    pub fn target(&self, endpoint: &str, query: Option<&str>) -> Result<Url, GatewayError> {
        if endpoint.split('/').any(is_dot_segment) {
            return Err(GatewayError::NoRoute(format!("/{}/{}", self.name, endpoint)));
        }

        let mut url = self.base_url.clone();
        let path = format!("{}/{}", self.base_url.path().trim_end_matches('/'), endpoint);
        url.set_path(&path);
        url.set_query(query);
        Ok(url)
    }
}

// Percent-encoded dots are normalized the same way by the URL parser
fn is_dot_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        "." | ".." | "%2e" | ".%2e" | "%2e." | "%2e%2e"
    )
}

/// Immutable mapping of service name to base URL, loaded once at startup.
#[derive(Debug)]
pub struct ServiceDirectory {
    map: HashMap<String, ServiceRoute>,
}

impl ServiceDirectory {
    pub fn try_new(services: &[ServiceConfig]) -> Result<Self, ValidationError> {
        let mut map = HashMap::with_capacity(services.len());
        for service in services {
            let route = ServiceRoute::try_from(service)?;
            if map.insert(route.name.clone(), route).is_some() {
                return Err(ValidationError::DuplicateService(service.name.clone()));
            }
        }

        Ok(ServiceDirectory { map })
    }

    pub fn resolve(&self, service: &str) -> Result<&ServiceRoute, GatewayError> {
        self.map
            .get(service)
            .ok_or_else(|| GatewayError::UnknownService(service.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, url: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.into(),
            url: Url::parse(url).unwrap(),
        }
    }

    #[test]
    fn test_resolve() {
        let directory = ServiceDirectory::try_new(&[
            service("board", "http://board-svc"),
            service("auth", "http://auth-service:5001/auth"),
        ])
        .unwrap();

        let board = directory.resolve("board").unwrap();
        assert_eq!(board.base_url.as_str(), "http://board-svc/");
        assert!(matches!(
            directory.resolve("payments"),
            Err(GatewayError::UnknownService(name)) if name == "payments"
        ));
        // Names are exact
        assert!(directory.resolve("Board").is_err());
    }

    #[test]
    fn test_target() {
        let board = ServiceRoute::try_from(&service("board", "http://board-svc")).unwrap();
        assert_eq!(board.target("123", None).unwrap().as_str(), "http://board-svc/123");
        assert_eq!(
            board.target("123/threads", Some("page=2")).unwrap().as_str(),
            "http://board-svc/123/threads?page=2"
        );

        let auth = ServiceRoute::try_from(&service("auth", "http://auth-service:5001/auth/")).unwrap();
        assert_eq!(
            auth.target("login", None).unwrap().as_str(),
            "http://auth-service:5001/auth/login"
        );
        // Dots inside a segment are fine
        assert_eq!(
            auth.target("v1.2/..x", None).unwrap().as_str(),
            "http://auth-service:5001/auth/v1.2/..x"
        );
    }

    #[test]
    fn test_target_stays_under_base_path() {
        let auth = ServiceRoute::try_from(&service("auth", "http://auth-service:5001/auth")).unwrap();
        for endpoint in ["../admin", "a/../../admin", "./login", "%2e%2e/admin", ".%2E/admin", "login/.."] {
            assert!(
                matches!(auth.target(endpoint, None), Err(GatewayError::NoRoute(_))),
                "{endpoint} was accepted"
            );
        }
    }

    #[test]
    fn test_invalid_routes() {
        assert_eq!(
            ServiceDirectory::try_new(&[service("", "http://board-svc")]).unwrap_err(),
            ValidationError::EmptyServiceName
        );
        assert_eq!(
            ServiceDirectory::try_new(&[service("mail", "mailto:ops@example.com")]).unwrap_err(),
            ValidationError::InvalidServiceUrl("mail".into())
        );
        assert_eq!(
            ServiceDirectory::try_new(&[
                service("board", "http://board-a"),
                service("board", "http://board-b"),
            ])
            .unwrap_err(),
            ValidationError::DuplicateService("board".into())
        );
    }
}
