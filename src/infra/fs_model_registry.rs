use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::app::ports::ModelRegistryPort;
use crate::error::RegistryError;
use crate::model::{ModelArtifact, ModelRef, ModelSelector};

/// Model registry on the local filesystem:
///
/// ```text
/// <root>/<name>/versions/<v>.json     artifact
/// <root>/<name>/versions/<v>.sha256   hex digest of the artifact bytes
/// <root>/<name>/aliases.json          {"champion": 3, ...}
/// ```
pub struct FsModelRegistry {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn versions_dir(&self, name: &str) -> PathBuf {
        self.root.join(name).join("versions")
    }

    fn aliases_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join("aliases.json")
    }

    async fn read_aliases(&self, name: &str) -> Result<BTreeMap<String, u32>, RegistryError> {
        match fs::read(self.aliases_path(name)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn versions(&self, name: &str) -> Result<Vec<u32>, RegistryError> {
        let mut entries = match fs::read_dir(self.versions_dir(name)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(v) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok())
            {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn load_version(&self, name: &str, version: u32) -> Result<ModelArtifact, RegistryError> {
        let dir = self.versions_dir(name);
        let artifact_path = dir.join(format!("{version}.json"));
        let bytes = match fs::read(&artifact_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::NotFound(format!("models:/{name}/{version}")));
            }
            Err(e) => return Err(e.into()),
        };

        match fs::read_to_string(dir.join(format!("{version}.sha256"))).await {
            Ok(expected) => {
                let actual = hex::encode(Sha256::digest(&bytes));
                if expected.trim() != actual {
                    return Err(RegistryError::ChecksumMismatch(format!("models:/{name}/{version}")));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checksum stored for {}/{}", name, version);
            }
            Err(e) => return Err(e.into()),
        }

        let mut artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        artifact.version = version;
        Ok(artifact)
    }
}

#[async_trait]
impl ModelRegistryPort for FsModelRegistry {
    async fn load(&self, model_ref: &ModelRef) -> Result<ModelArtifact, RegistryError> {
        let version = match &model_ref.selector {
            ModelSelector::Version(v) => *v,
            ModelSelector::Alias(alias) => self.alias_version(&model_ref.name, alias).await?,
        };
        self.load_version(&model_ref.name, version).await
    }

    async fn register(&self, mut artifact: ModelArtifact) -> Result<u32, RegistryError> {
        ModelRef::parse(&format!("models:/{}/1", artifact.name))?;
        let _guard = self.write_lock.lock().await;

        let version = self.versions(&artifact.name).await?.last().copied().unwrap_or(0) + 1;
        artifact.version = version;

        let dir = self.versions_dir(&artifact.name);
        fs::create_dir_all(&dir).await?;
        let bytes = serde_json::to_vec_pretty(&artifact)?;
        fs::write(dir.join(format!("{version}.json")), &bytes).await?;
        fs::write(
            dir.join(format!("{version}.sha256")),
            hex::encode(Sha256::digest(&bytes)),
        )
        .await?;

        info!("📦 Registered {} version {}", artifact.name, version);
        Ok(version)
    }

    async fn set_alias(&self, name: &str, alias: &str, version: u32) -> Result<(), RegistryError> {
        ModelRef::parse(&format!("models:/{name}@{alias}"))?;
        let _guard = self.write_lock.lock().await;

        if !self.versions(name).await?.contains(&version) {
            return Err(RegistryError::NotFound(format!("models:/{name}/{version}")));
        }
        let mut aliases = self.read_aliases(name).await?;
        aliases.insert(alias.to_string(), version);
        fs::write(self.aliases_path(name), serde_json::to_vec_pretty(&aliases)?).await?;

        info!("🏷️ {}@{} -> version {}", name, alias, version);
        Ok(())
    }

    async fn alias_version(&self, name: &str, alias: &str) -> Result<u32, RegistryError> {
        self.read_aliases(name)
            .await?
            .get(alias)
            .copied()
            .ok_or_else(|| RegistryError::NotFound(format!("models:/{name}@{alias}")))
    }
}
