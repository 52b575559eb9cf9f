use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::app::ports::ModelRegistryPort;
use crate::error::RegistryError;
use crate::model::{ModelArtifact, ModelRef, ModelSelector};

/// Any body carrying a version number. Artifacts returned for an alias
/// deserialize into this too; a body without one is an error.
#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: u32,
}

impl VersionResponse {
    fn checked(self, what: &str) -> Result<u32, RegistryError> {
        match self.version {
            0 => Err(RegistryError::Unversioned(what.to_string())),
            v => Ok(v),
        }
    }
}

#[derive(Debug, Serialize)]
struct AliasRequest {
    version: u32,
}

/// Remote registry speaking a small JSON protocol:
///
/// - `GET  {endpoint}/models/{name}/versions/{v}` returns an artifact
/// - `GET  {endpoint}/models/{name}/aliases/{alias}` returns an artifact
/// - `POST {endpoint}/models/{name}/versions` stores one, returns `{"version": n}`
/// - `PUT  {endpoint}/models/{name}/aliases/{alias}` with `{"version": n}`
///
/// With a username the token is sent as basic auth, otherwise as a bearer token.
pub struct HttpModelRegistry {
    client: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    token: Option<String>,
}

impl HttpModelRegistry {
    pub fn new(
        endpoint: &str,
        username: Option<String>,
        token: Option<String>,
    ) -> Result<Self, RegistryError> {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(RegistryError::Config(format!(
                "registry endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            username,
            token,
        })
    }

    pub fn artifact_url(&self, model_ref: &ModelRef) -> String {
        match &model_ref.selector {
            ModelSelector::Version(v) => self.version_url(&model_ref.name, *v),
            ModelSelector::Alias(alias) => self.alias_url(&model_ref.name, alias),
        }
    }

    fn version_url(&self, name: &str, version: u32) -> String {
        format!("{}/models/{}/versions/{}", self.endpoint, name, version)
    }

    fn alias_url(&self, name: &str, alias: &str) -> String {
        format!("{}/models/{}/aliases/{}", self.endpoint, name, alias)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.username, &self.token) {
            (Some(user), token) => request.basic_auth(user, token.as_ref()),
            (None, Some(token)) => request.bearer_auth(token),
            (None, None) => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::Response, RegistryError> {
        let response = self.authorize(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(what.to_string()));
        }
        Ok(response.error_for_status()?)
    }
}

#[async_trait]
impl ModelRegistryPort for HttpModelRegistry {
    async fn load(&self, model_ref: &ModelRef) -> Result<ModelArtifact, RegistryError> {
        let url = self.artifact_url(model_ref);
        debug!("Fetching model artifact from {}", url);
        let response = self
            .send(self.client.get(&url), &model_ref.to_string())
            .await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn register(&self, artifact: ModelArtifact) -> Result<u32, RegistryError> {
        let url = format!("{}/models/{}/versions", self.endpoint, artifact.name);
        let response = self
            .send(self.client.post(&url).json(&artifact), &artifact.name)
            .await?;
        let bytes = response.bytes().await?;
        let version = serde_json::from_slice::<VersionResponse>(&bytes)?.checked(&artifact.name)?;
        info!("📦 Registered {} version {} at {}", artifact.name, version, self.endpoint);
        Ok(version)
    }

    async fn set_alias(&self, name: &str, alias: &str, version: u32) -> Result<(), RegistryError> {
        let url = self.alias_url(name, alias);
        self.send(
            self.client.put(&url).json(&AliasRequest { version }),
            &format!("models:/{name}/{version}"),
        )
        .await?;
        info!("🏷️ {}@{} -> version {}", name, alias, version);
        Ok(())
    }

    async fn alias_version(&self, name: &str, alias: &str) -> Result<u32, RegistryError> {
        let model_ref = ModelRef::alias(name, alias);
        let response = self
            .send(self.client.get(self.artifact_url(&model_ref)), &model_ref.to_string())
            .await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice::<VersionResponse>(&bytes)?.checked(&model_ref.to_string())
    }
}
