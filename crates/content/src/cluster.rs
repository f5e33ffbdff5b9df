//! HTTP client for an IPFS-Cluster style REST API plus an IPFS gateway.

use crate::error::{Result, StoreError};
use crate::store::cid_link::CidRepr;
use crate::store::{ClusterDirectory, ClusterPeer, ContentStore, PinStatus, Replication};
use async_trait::async_trait;
use peerfs_types::ContentId;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Cluster API and gateway endpoints.
#[derive(Clone)]
pub struct ClusterClient {
    api_url: Url,
    gateway_url: Url,
    http: Client,
}

#[derive(Deserialize)]
struct AddResponse {
    cid: CidRepr,
}

impl ClusterClient {
    /// Create a client for `api_url` (e.g. `http://127.0.0.1:9094/`) and
    /// `gateway_url` (e.g. `http://127.0.0.1:8080/`).
    pub fn new(api_url: impl AsRef<str>, gateway_url: impl AsRef<str>) -> Result<Self> {
        Self::with_http_client(
            api_url,
            gateway_url,
            Client::builder().timeout(Duration::from_secs(30)).build()?,
        )
    }

    /// Use an existing reqwest client (custom TLS, timeouts or middleware).
    pub fn with_http_client(
        api_url: impl AsRef<str>,
        gateway_url: impl AsRef<str>,
        http: Client,
    ) -> Result<Self> {
        Ok(Self {
            api_url: normalize_base(api_url.as_ref())?,
            gateway_url: normalize_base(gateway_url.as_ref())?,
            http,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn gateway_url(&self) -> &Url {
        &self.gateway_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.api_url.join(path)?;
        let response = self.http.get(url).send().await?;
        let text = Self::ensure_success(response).await?.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| StoreError::parse_error(format!("{path}: {e}")))
    }

    /// Endpoints that list things answer either with a JSON array or with
    /// newline-delimited JSON objects depending on the cluster version.
    async fn get_json_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.api_url.join(path)?;
        let response = self.http.get(url).send().await?;
        let text = Self::ensure_success(response).await?.text().await?;
        parse_json_list(&text).map_err(|e| StoreError::parse_error(format!("{path}: {e}")))
    }

    async fn ensure_success(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::status(status, message))
    }
}

#[async_trait]
impl ContentStore for ClusterClient {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ContentId> {
        let url = self.api_url.join("add")?;
        let size = bytes.len();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(name.to_string()));
        let response = self.http.post(url).multipart(form).send().await?;
        let text = Self::ensure_success(response).await?.text().await?;

        // Streaming add responses carry one object per added node; the last
        // one describes the root.
        let root = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .ok_or_else(|| StoreError::parse_error("empty add response"))?;
        let added: AddResponse = serde_json::from_str(root)
            .map_err(|e| StoreError::parse_error(format!("add: {e}")))?;
        let cid = ContentId::from(added.cid);
        info!(%cid, name, size, "content added to cluster");
        Ok(cid)
    }

    async fn get(&self, cid: &ContentId) -> Result<Vec<u8>> {
        let url = self.gateway_url.join(&format!("ipfs/{cid}"))?;
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(cid.clone()));
        }
        let bytes = Self::ensure_success(response).await?.bytes().await?;
        debug!(%cid, size = bytes.len(), "content fetched from gateway");
        Ok(bytes.to_vec())
    }

    async fn remove(&self, cid: &ContentId) -> Result<()> {
        let url = self.api_url.join(&format!("pins/{cid}"))?;
        let response = self.http.delete(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%cid, "content was not pinned, nothing to remove");
            return Ok(());
        }
        Self::ensure_success(response).await?;
        info!(%cid, "content unpinned from cluster");
        Ok(())
    }
}

#[async_trait]
impl ClusterDirectory for ClusterClient {
    async fn local_peer(&self) -> Result<ClusterPeer> {
        self.get_json("id").await
    }

    async fn peers(&self) -> Result<Vec<ClusterPeer>> {
        self.get_json_list("peers").await
    }

    async fn pin(&self, cid: &ContentId, replication: Replication) -> Result<()> {
        let url = self.api_url.join(&format!("pins/{cid}"))?;
        let response = self.http.post(url).json(&replication).send().await?;
        Self::ensure_success(response).await?;
        info!(%cid, min = replication.min, max = replication.max, "content pinned");
        Ok(())
    }

    async fn pin_status(&self, cid: &ContentId) -> Result<PinStatus> {
        self.get_json(&format!("pins/{cid}")).await
    }

    async fn pins(&self) -> Result<Vec<PinStatus>> {
        self.get_json_list("pins").await
    }
}

fn normalize_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|_| StoreError::InvalidBaseUrl(raw.to_string()))?;
    if !url.path().ends_with('/') {
        let mut path = url.path().trim_end_matches('/').to_owned();
        path.push('/');
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_json_list<T: DeserializeOwned>(text: &str) -> serde_json::Result<Vec<T>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}
