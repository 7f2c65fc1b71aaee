//! Blob data-plane client
//!
//! Container-level calls against `https://{account}.blob.{suffix}`,
//! authorized with the account's shared key.

use super::shared_key::SharedKeySigner;
use crate::azure::error::ApiError;
use crate::azure::http::USER_AGENT;
use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use url::Url;

pub const STORAGE_API_VERSION: &str = "2023-11-03";

const METADATA_PREFIX: &str = "x-ms-meta-";

/// Properties returned by `Get Container Properties`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDataProperties {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub lease_state: Option<String>,
    pub lease_status: Option<String>,
    pub public_access: Option<String>,
    pub has_immutability_policy: bool,
    pub has_legal_hold: bool,
    pub metadata: BTreeMap<String, String>,
}

impl ContainerDataProperties {
    fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let metadata = headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(METADATA_PREFIX)?;
                Some((key.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        Self {
            etag: get("etag"),
            last_modified: get("last-modified"),
            lease_state: get("x-ms-lease-state"),
            lease_status: get("x-ms-lease-status"),
            public_access: get("x-ms-blob-public-access"),
            has_immutability_policy: get("x-ms-has-immutability-policy").as_deref() == Some("true"),
            has_legal_hold: get("x-ms-has-legal-hold").as_deref() == Some("true"),
            metadata,
        }
    }
}

/// Shared-key authorized client for one storage account
#[derive(Clone)]
pub struct BlobDataClient {
    http: Client,
    endpoint: Url,
    signer: SharedKeySigner,
}

impl BlobDataClient {
    /// Client for the public endpoint `https://{account}.blob.{storage_suffix}`
    pub fn new(account: &str, account_key: &str, storage_suffix: &str) -> Result<Self> {
        let endpoint = format!("https://{}.blob.{}", account, storage_suffix);
        Self::with_endpoint(account, account_key, &endpoint)
    }

    /// Client for an explicit endpoint, e.g. the account's `primaryEndpoints.blob`
    pub fn with_endpoint(account: &str, account_key: &str, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .with_context(|| format!("invalid blob endpoint {:?}", endpoint))?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            signer: SharedKeySigner::new(account, account_key)?,
        })
    }

    fn container_url(&self, container: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("blob endpoint cannot be a base URL"))?
            .pop_if_empty()
            .push(container);
        url.query_pairs_mut().append_pair("restype", "container");
        Ok(url)
    }

    /// Fetch container properties; `None` when the container does not exist
    pub async fn get_container_properties(
        &self,
        container: &str,
    ) -> Result<Option<ContainerDataProperties>> {
        let url = self.container_url(container)?;
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();

        let mut signed = BTreeMap::new();
        signed.insert("x-ms-date".to_string(), date);
        signed.insert("x-ms-version".to_string(), STORAGE_API_VERSION.to_string());
        let authorization = self.signer.authorization("HEAD", &url, &signed)?;

        tracing::debug!("HEAD {}", url);

        let mut request = self
            .http
            .request(Method::HEAD, url.clone())
            .header("Authorization", authorization);
        for (name, value) in &signed {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(ApiError::Transport)
            .with_context(|| format!("retrieving properties for container {:?}", container))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let code = response
                .headers()
                .get("x-ms-error-code")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("Unknown")
                .to_string();
            return Err(ApiError::Status {
                status,
                code,
                message: format!("HEAD {}", url.path()),
            })
            .with_context(|| format!("retrieving properties for container {:?}", container));
        }

        Ok(Some(ContainerDataProperties::from_headers(response.headers())))
    }
}
