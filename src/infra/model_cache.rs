use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use crate::app::ports::{ModelLoaderPort, ModelRegistryPort};
use crate::error::RegistryError;
use crate::model::{ModelArtifact, ModelRef};
use crate::observability::metrics;

type Slot = Arc<OnceCell<Arc<ModelArtifact>>>;

/// Loads each model URI from the registry once and shares it afterwards.
///
/// Each URI has its own slot, so a slow load only holds up callers of the
/// same URI. Alias moves are not observed until [`ModelCache::invalidate`]
/// is called.
pub struct ModelCache {
    registry: Arc<dyn ModelRegistryPort>,
    loaded: Mutex<HashMap<String, Slot>>,
}

impl ModelCache {
    pub fn new(registry: Arc<dyn ModelRegistryPort>) -> Self {
        Self {
            registry,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Drop one cached URI, or all of them.
    pub async fn invalidate(&self, model_uri: Option<&str>) {
        let mut loaded = self.loaded.lock().await;
        match model_uri {
            Some(uri) => {
                loaded.remove(uri);
            }
            None => loaded.clear(),
        }
    }

    async fn fetch(&self, model_uri: &str, model_ref: &ModelRef) -> Result<Arc<ModelArtifact>, RegistryError> {
        match self.registry.load(model_ref).await {
            Ok(artifact) => {
                metrics::registry::model_loaded(true);
                info!("🧠 Loaded {} (version {})", model_uri, artifact.version);
                Ok(Arc::new(artifact))
            }
            Err(e) => {
                metrics::registry::model_loaded(false);
                warn!("Failed to load {}: {}", model_uri, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ModelLoaderPort for ModelCache {
    async fn load_model(&self, model_uri: &str) -> Result<Arc<ModelArtifact>, RegistryError> {
        let model_ref = ModelRef::parse(model_uri)?;
        // The map lock only covers finding the slot, never the load itself
        let slot = self
            .loaded
            .lock()
            .await
            .entry(model_uri.to_string())
            .or_default()
            .clone();

        // A failed init leaves the slot empty, so the next call retries
        let model = slot
            .get_or_try_init(|| self.fetch(model_uri, &model_ref))
            .await?;
        Ok(model.clone())
    }
}
