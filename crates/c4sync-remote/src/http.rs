//! [`RemoteStore`] over the IcePanel REST API.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;

use c4sync_core::settings::Settings;

use crate::error::RemoteError;
use crate::parse::{parse_created, parse_list};
use crate::store::{ConnectionPayload, DiagramPayload, ObjectPayload, RemoteRecord, RemoteStore, ResourceKind, Scope};

/// Page size requested for every listing.
pub const PAGE_SIZE: u32 = 1000;

pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpStore {
    pub fn new(settings: &Settings) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(RemoteError::Client)?;
        Ok(HttpStore {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn landscape_url(&self, landscape: &str) -> String {
        format!("{}/landscapes/{}", self.base_url, landscape)
    }

    fn scoped_url(&self, scope: &Scope, path: &str) -> String {
        format!(
            "{}/landscapes/{}/versions/{}/{}",
            self.base_url, scope.landscape, scope.version, path
        )
    }

    /// Issue one request and return status and body text.
    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, String), RemoteError> {
        tracing::debug!(%method, url, "remote call");
        let mut req = self.client.request(method.clone(), url);
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let transport = |source| RemoteError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };
        let resp = req.send().await.map_err(transport)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport)?;
        Ok((status, text))
    }

    /// Like [`call`](Self::call) but any non-2xx status is an error.
    async fn call_ok<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<String, RemoteError> {
        let (status, text) = self.call(method.clone(), url, body).await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn exists(&self, url: &str) -> Result<bool, RemoteError> {
        let (status, text) = self.call::<()>(Method::GET, url, None).await?;
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(RemoteError::Status {
                method: Method::GET.to_string(),
                url: url.to_string(),
                status: s.as_u16(),
                body: text,
            }),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn landscape_exists(&self, landscape: &str) -> Result<bool, RemoteError> {
        self.exists(&self.landscape_url(landscape)).await
    }

    async fn version_exists(&self, scope: &Scope) -> Result<bool, RemoteError> {
        let url = format!("{}/versions/{}", self.landscape_url(&scope.landscape), scope.version);
        self.exists(&url).await
    }

    async fn list(&self, scope: &Scope, kind: ResourceKind) -> Result<Vec<RemoteRecord>, RemoteError> {
        let url = format!("{}?per={}", self.scoped_url(scope, kind.path()), PAGE_SIZE);
        let body = self.call_ok::<()>(Method::GET, &url, None).await?;
        parse_list("GET", &url, &body)
    }

    async fn delete(&self, scope: &Scope, kind: ResourceKind, id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/{}", self.scoped_url(scope, kind.path()), id);
        self.call_ok::<()>(Method::DELETE, &url, None).await?;
        Ok(())
    }

    async fn create_object(&self, scope: &Scope, object: &ObjectPayload) -> Result<String, RemoteError> {
        let url = self.scoped_url(scope, ResourceKind::Objects.path());
        let body = self.call_ok(Method::POST, &url, Some(object)).await?;
        parse_created("POST", &url, &body)
    }

    async fn update_object(&self, scope: &Scope, id: &str, object: &ObjectPayload) -> Result<(), RemoteError> {
        let url = format!("{}/{}", self.scoped_url(scope, ResourceKind::Objects.path()), id);
        self.call_ok(Method::PATCH, &url, Some(object)).await?;
        Ok(())
    }

    async fn create_connection(
        &self,
        scope: &Scope,
        connection: &ConnectionPayload,
    ) -> Result<String, RemoteError> {
        let url = self.scoped_url(scope, ResourceKind::Connections.path());
        let body = self.call_ok(Method::POST, &url, Some(connection)).await?;
        parse_created("POST", &url, &body)
    }

    async fn create_diagram(&self, scope: &Scope, diagram: &DiagramPayload) -> Result<String, RemoteError> {
        let url = self.scoped_url(scope, ResourceKind::Diagrams.path());
        let body = self.call_ok(Method::POST, &url, Some(diagram)).await?;
        parse_created("POST", &url, &body)
    }
}
