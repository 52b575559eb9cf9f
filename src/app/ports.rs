use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::model::{ModelArtifact, ModelRef};

/// Storage of versioned model artifacts addressed by name and alias.
#[async_trait]
pub trait ModelRegistryPort: Send + Sync {
    async fn load(&self, model_ref: &ModelRef) -> Result<ModelArtifact, RegistryError>;

    /// Store a new version of `artifact.name`, returning the version assigned.
    async fn register(&self, artifact: ModelArtifact) -> Result<u32, RegistryError>;

    async fn set_alias(&self, name: &str, alias: &str, version: u32) -> Result<(), RegistryError>;

    /// Version an alias currently points at.
    async fn alias_version(&self, name: &str, alias: &str) -> Result<u32, RegistryError>;
}

/// Hands out loaded, shareable models for a URI.
#[async_trait]
pub trait ModelLoaderPort: Send + Sync {
    async fn load_model(&self, model_uri: &str) -> Result<Arc<ModelArtifact>, RegistryError>;
}
