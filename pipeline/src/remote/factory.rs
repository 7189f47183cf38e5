//! Factory for creating service backends from configuration.

use std::str::FromStr;
use std::sync::Arc;

use super::http::HttpGateway;
use super::local::LocalServices;
use super::service::RemoteServices;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;

/// Which backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteType {
    /// Real services over HTTP
    Http,
    /// In-memory services
    Local,
}

impl FromStr for RemoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "remote" => Ok(Self::Http),
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown remote type: {}", s)),
        }
    }
}

/// Creates shared service backends.
pub struct RemoteFactory;

impl RemoteFactory {
    /// Create a backend of the given type.
    ///
    /// # Errors
    /// Returns a configuration error when an HTTP backend is requested with
    /// an invalid configuration.
    pub fn create(
        remote_type: RemoteType,
        config: &PipelineConfig,
    ) -> PipelineResult<Arc<dyn RemoteServices>> {
        match remote_type {
            RemoteType::Http => Ok(Arc::new(HttpGateway::new(config)?)),
            RemoteType::Local => Ok(Self::create_local()),
        }
    }

    pub fn create_local() -> Arc<dyn RemoteServices> {
        Arc::new(LocalServices::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_type_from_str() {
        assert_eq!("HTTP".parse::<RemoteType>(), Ok(RemoteType::Http));
        assert_eq!("memory".parse::<RemoteType>(), Ok(RemoteType::Local));
        assert!("grpc".parse::<RemoteType>().is_err());
    }

    #[test]
    fn test_create_http_validates_config() {
        let mut config = PipelineConfig::default();
        config.endpoints.risk_url = "nope".to_string();
        assert!(RemoteFactory::create(RemoteType::Http, &config).is_err());
        assert!(RemoteFactory::create(RemoteType::Local, &config).is_ok());
    }
}
