//! Azure Client
//!
//! Main client for interacting with ARM, combining authentication, the
//! retrying transport and long-running-operation polling.

use super::auth::ArmCredentials;
use super::error::ApiError;
use super::http::{retry_after, ArmHttpClient, ArmRequest, ArmResponse};
use super::lro;
use super::pager::Pager;
use crate::config::{ApiVersions, Config};
use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Main ARM client
#[derive(Clone)]
pub struct AzureClient {
    pub credentials: ArmCredentials,
    pub http: ArmHttpClient,
    pub subscription_id: String,
    pub api_versions: ApiVersions,
    endpoint: String,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl AzureClient {
    /// Create a client using the credentials named by the configuration
    pub fn new(config: &Config, subscription_id: &str) -> Result<Self> {
        let credentials =
            ArmCredentials::from_config(config).context("Failed to initialize Azure credentials")?;
        Self::with_credentials(config, subscription_id, credentials)
    }

    pub fn with_credentials(
        config: &Config,
        subscription_id: &str,
        credentials: ArmCredentials,
    ) -> Result<Self> {
        let http = ArmHttpClient::new(&config.retry).context("Failed to create HTTP client")?;

        Ok(Self {
            credentials,
            http,
            subscription_id: subscription_id.to_string(),
            api_versions: config.api_versions.clone(),
            endpoint: config
                .environment
                .resource_manager_endpoint
                .trim_end_matches('/')
                .to_string(),
            poll_interval: config.retry.poll_interval(),
            operation_timeout: config.retry.operation_timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Absolute URL for an ARM path such as a resource ID
    pub fn resource_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}/{}", self.endpoint, path)
        }
    }

    /// Absolute URL below the configured subscription
    pub fn subscription_url(&self, suffix: &str) -> String {
        self.resource_url(&format!(
            "/subscriptions/{}/{}",
            self.subscription_id,
            suffix.trim_start_matches('/')
        ))
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// Send a single request with a fresh token; no LRO handling
    pub async fn send(&self, request: ArmRequest<'_>) -> Result<ArmResponse> {
        let token = self.credentials.get_token().await?;
        Ok(self.http.send(&request, &token).await?)
    }

    /// GET an ARM path
    pub async fn get(&self, path: &str, api_version: &str) -> Result<Value> {
        let url = self.resource_url(path);
        let response = self
            .send(ArmRequest::new(Method::GET, &url).query("api-version", api_version))
            .await?;
        Ok(response.body)
    }

    /// GET an ARM path and decode the body
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<T> {
        let body = self.get(path, api_version).await?;
        serde_json::from_value(body).with_context(|| format!("decoding response from {}", path))
    }

    /// PUT a payload, waiting for any long-running operation to finish
    pub async fn put(&self, path: &str, api_version: &str, body: &Value) -> Result<Value> {
        self.write(Method::PUT, path, api_version, Some(body)).await
    }

    /// PATCH a payload, waiting for any long-running operation to finish
    pub async fn patch(&self, path: &str, api_version: &str, body: &Value) -> Result<Value> {
        self.write(Method::PATCH, path, api_version, Some(body)).await
    }

    /// POST an action such as `listKeys`
    pub async fn post(&self, path: &str, api_version: &str, body: Option<&Value>) -> Result<Value> {
        self.write(Method::POST, path, api_version, body).await
    }

    /// DELETE an ARM path; a resource that is already gone counts as deleted
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<()> {
        match self.write(Method::DELETE, path, api_version, None).await {
            Ok(_) => Ok(()),
            Err(e) if super::error::is_not_found(&e) => {
                tracing::debug!("DELETE {}: already gone", path);
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    /// Page through a collection endpoint
    pub fn list<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Pager<T> {
        Pager::new(self.clone(), self.resource_url(path), api_version)
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.resource_url(path);
        let mut request = ArmRequest::new(method.clone(), &url).query("api-version", api_version);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = self.send(request).await?;
        self.complete(&method, &url, api_version, response).await
    }

    /// Wait for a long-running operation started by `response`, if any
    async fn complete(
        &self,
        method: &Method,
        url: &str,
        api_version: &str,
        response: ArmResponse,
    ) -> Result<Value> {
        let Some(strategy) = lro::strategy_for(method, url, &response) else {
            return Ok(response.body);
        };

        tracing::info!("{} {}: waiting for long-running operation", method, url);

        let deadline = Instant::now() + self.operation_timeout;
        let mut wait = retry_after(&response.headers).unwrap_or(self.poll_interval);

        loop {
            if Instant::now() + wait > deadline {
                return Err(ApiError::OperationTimeout(self.operation_timeout).into());
            }
            tokio::time::sleep(wait).await;

            let request = match &strategy {
                lro::PollStrategy::ProvisioningState(resource) => {
                    ArmRequest::new(Method::GET, resource).query("api-version", api_version)
                },
                other => ArmRequest::new(Method::GET, other.url()),
            };

            let polled = self
                .send(request)
                .await
                .context("polling long-running operation")?;
            wait = retry_after(&polled.headers).unwrap_or(self.poll_interval);

            if let Some(body) = lro::interpret(&strategy, &polled).into_result()? {
                tracing::info!("{} {}: long-running operation succeeded", method, url);
                if lro::needs_final_get(method, &strategy) {
                    let response = self
                        .send(ArmRequest::new(Method::GET, url).query("api-version", api_version))
                        .await?;
                    return Ok(response.body);
                }
                return Ok(body);
            }
        }
    }
}
