//! REST adapter for Kubernetes-style cluster APIs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{object_name, ClusterAccess, ClusterError, RawResource, ResourceKind, Scope};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpCluster`]
#[derive(Debug, Clone)]
pub struct HttpClusterConfig {
    /// API server base URL, e.g. `https://10.0.0.1:6443`
    pub server: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Accept self-signed or otherwise invalid certificates
    pub insecure: bool,
    pub timeout: Duration,
}

impl HttpClusterConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            token: None,
            insecure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<Value>,
}

/// Subset of the API server's `Status` error body
#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    message: Option<String>,
}

/// [`ClusterAccess`] over HTTP
#[derive(Clone)]
pub struct HttpCluster {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpCluster {
    pub fn new(config: &HttpClusterConfig) -> Result<Self, ClusterError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.server.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the collection holding `kind` in `namespace` (or cluster-wide)
    pub fn collection_url(&self, kind: &ResourceKind, namespace: Option<&str>) -> String {
        let prefix = if kind.group.is_empty() {
            format!("{}/api/{}", self.base_url, kind.version)
        } else {
            format!("{}/apis/{}/{}", self.base_url, kind.group, kind.version)
        };

        match namespace {
            Some(ns) if !kind.cluster_scoped => {
                format!("{}/namespaces/{}/{}", prefix, ns, kind.plural)
            }
            _ => format!("{}/{}", prefix, kind.plural),
        }
    }

    /// URL of a single named object
    pub fn item_url(&self, kind: &ResourceKind, namespace: Option<&str>, name: &str) -> String {
        format!("{}/{}", self.collection_url(kind, namespace), name)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        kind: &str,
        name: &str,
    ) -> Result<Response, ClusterError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StatusBody>(&body)
            .ok()
            .and_then(|s| s.message)
            .unwrap_or(body);

        Err(match status {
            StatusCode::NOT_FOUND => ClusterError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            StatusCode::CONFLICT if message.contains("already exists") => {
                ClusterError::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
            }
            _ => ClusterError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn decode_list(response: Response) -> Result<Vec<Value>, ClusterError> {
        let list: ListResponse = response
            .json()
            .await
            .map_err(|e| ClusterError::InvalidResponse(e.to_string()))?;
        Ok(list.items)
    }
}

/// List items usually omit `kind`/`apiVersion`; restore needs them
fn with_type_meta(kind: &ResourceKind, mut item: Value) -> Value {
    if let Some(obj) = item.as_object_mut() {
        obj.entry("kind").or_insert_with(|| json!(kind.name));
        obj.entry("apiVersion")
            .or_insert_with(|| json!(kind.api_version()));
    }
    item
}

#[async_trait]
impl ClusterAccess for HttpCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        let url = format!("{}/api/v1/namespaces", self.base_url);
        let response = self
            .send(self.request(Method::GET, &url), "Namespace", "*")
            .await?;
        let items = Self::decode_list(response).await?;
        Ok(items
            .iter()
            .filter_map(|item| object_name(item).map(String::from))
            .collect())
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        scope: &Scope,
    ) -> Result<Vec<RawResource>, ClusterError> {
        let url = self.collection_url(kind, scope.namespace());
        tracing::debug!(kind = %kind, scope = %scope, url = %url, "Listing resources");
        let response = self
            .send(self.request(Method::GET, &url), &kind.name, "*")
            .await?;
        let items = Self::decode_list(response).await?;
        Ok(items
            .into_iter()
            .map(|item| with_type_meta(kind, item))
            .collect())
    }

    async fn create(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, ClusterError> {
        let name = object_name(payload)
            .ok_or_else(|| ClusterError::InvalidResource("metadata.name is required".into()))?;
        let url = self.collection_url(kind, namespace);
        let response = self
            .send(
                self.request(Method::POST, &url).json(payload),
                &kind.name,
                name,
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| ClusterError::InvalidResponse(e.to_string()))
    }

    async fn update(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        payload: &RawResource,
    ) -> Result<RawResource, ClusterError> {
        let name = object_name(payload)
            .ok_or_else(|| ClusterError::InvalidResource("metadata.name is required".into()))?;
        let url = self.item_url(kind, namespace, name);
        let response = self
            .send(
                self.request(Method::PUT, &url).json(payload),
                &kind.name,
                name,
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| ClusterError::InvalidResponse(e.to_string()))
    }
}
