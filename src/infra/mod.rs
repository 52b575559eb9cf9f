pub mod fs_model_registry;
pub mod http_model_registry;
pub mod model_cache;

use std::sync::Arc;

use crate::app::ports::ModelRegistryPort;
use crate::config::RegistryConfig;
use crate::error::RegistryError;

pub use fs_model_registry::FsModelRegistry;
pub use http_model_registry::HttpModelRegistry;
pub use model_cache::ModelCache;

/// HTTP registry when an endpoint is configured, filesystem registry otherwise.
pub fn registry_from_config(
    config: &RegistryConfig,
) -> Result<Arc<dyn ModelRegistryPort>, RegistryError> {
    match &config.endpoint {
        Some(endpoint) if !endpoint.trim().is_empty() => Ok(Arc::new(HttpModelRegistry::new(
            endpoint,
            config.username.clone(),
            config.token.clone(),
        )?)),
        _ => Ok(Arc::new(FsModelRegistry::new(&config.root))),
    }
}
