#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! An HTTP client for the SNFOK backend's session and cluster endpoints.
//!
//! Credentials travel the way the browser sends them: as the `access_token`
//! cookie on every request.

use bytes::Bytes;
use http::{header, HeaderValue, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use snfok_console_gate_core::{
    api::{Cluster, Envelope},
    ClusterList, ListClusters, ValidateSession,
};
use thiserror::Error;
use tracing::{debug, trace};


pub const DEFAULT_VALIDATE_PATH: &str = "/api/v1/auth/validate";
pub const DEFAULT_CLUSTERS_PATH: &str = "/api/v1/clusters/all";
pub const SESSION_COOKIE: &str = "access_token";

#[derive(Clone, Debug)]
pub struct Config {
    /// Scheme and authority of the backend, e.g. `http://localhost:8080`.
    pub base_url: String,
    pub validate_path: String,
    pub clusters_path: String,
    pub access_token: Option<String>,

    /// The `meta.code` that marks an empty cluster registry.
    pub no_cluster_code: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid backend uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("invalid session cookie: {0}")]
    InvalidCookie(#[from] http::header::InvalidHeaderValue),

    #[error("failed to build request: {0}")]
    Build(#[from] http::Error),

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("unexpected response status: {0}")]
    Status(StatusCode),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone, Debug)]
pub struct Backend {
    client: Client<HttpConnector, Empty<Bytes>>,
    validate_uri: Uri,
    clusters_uri: Uri,
    cookie: Option<HeaderValue>,
    no_cluster_code: i64,
}

// === impl Config ===

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            validate_path: DEFAULT_VALIDATE_PATH.to_string(),
            clusters_path: DEFAULT_CLUSTERS_PATH.to_string(),
            access_token: None,
            no_cluster_code: snfok_console_gate_core::NO_CLUSTER_AVAILABLE,
        }
    }

    fn uri(&self, path: &str) -> Result<Uri, Error> {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{base}/{path}").parse()?)
    }
}

// === impl Backend ===

impl Backend {
    pub fn new(config: Config) -> Result<Self, Error> {
        let cookie = config
            .access_token
            .as_deref()
            .map(|token| HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")))
            .transpose()?
            .map(|mut value| {
                value.set_sensitive(true);
                value
            });

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            validate_uri: config.uri(&config.validate_path)?,
            clusters_uri: config.uri(&config.clusters_path)?,
            cookie,
            no_cluster_code: config.no_cluster_code,
        })
    }

    /// Succeeds iff the backend answers the validation endpoint with a 2xx.
    pub async fn validate(&self) -> Result<(), Error> {
        let (status, _) = self.get(&self.validate_uri).await?;
        if !status.is_success() {
            return Err(Error::Status(status));
        }
        Ok(())
    }

    pub async fn clusters(&self) -> Result<ClusterList, Error> {
        let (status, body) = self.get(&self.clusters_uri).await?;
        if !status.is_success() {
            return Err(Error::Status(status));
        }

        let envelope = serde_json::from_slice::<Envelope<Vec<Cluster>>>(&body)?;
        debug!(
            status = %envelope.status,
            code = envelope.meta.code,
            request_id = %envelope.meta.request_id,
            "Listed clusters"
        );
        if envelope.meta.code == self.no_cluster_code {
            return Ok(ClusterList::Empty);
        }
        Ok(ClusterList::Registered(envelope.data.unwrap_or_default()))
    }

    async fn get(&self, uri: &Uri) -> Result<(StatusCode, Bytes), Error> {
        let mut req = Request::get(uri.clone());
        if let Some(cookie) = &self.cookie {
            req = req.header(header::COOKIE, cookie.clone());
        }
        let req = req.body(Empty::new())?;

        trace!(%uri, "Sending request");
        let rsp = self.client.request(req).await?;
        let status = rsp.status();
        let body = rsp.into_body().collect().await?.to_bytes();
        debug!(%uri, %status, bytes = body.len(), "Received response");
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl ValidateSession for Backend {
    async fn validate_session(&self) -> anyhow::Result<()> {
        self.validate().await.map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl ListClusters for Backend {
    async fn list_clusters(&self) -> anyhow::Result<ClusterList> {
        self.clusters().await.map_err(Into::into)
    }
}
