//! Azure Authentication
//!
//! Handles authentication using either a pre-issued bearer token
//! (`ARM_ACCESS_TOKEN`) or the OAuth2 client-credentials grant of a
//! service principal.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// TTL assumed for tokens whose lifetime is unknown
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// A token as issued by a token source
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: Option<Duration>,
}

/// Anything able to mint bearer tokens for the Resource Manager audience
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken>;
}

/// A fixed token supplied by the caller
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch(&self) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.0.clone(),
            expires_in: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Service principal authenticating with a client secret
pub struct ClientSecretCredential {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        resource_manager_endpoint: &str,
    ) -> Result<Self> {
        if tenant_id.is_empty() || client_id.is_empty() || client_secret.is_empty() {
            bail!("tenant_id, client_id and client_secret are all required");
        }

        let http = reqwest::Client::builder()
            .user_agent(super::http::USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            token_url: token_url(authority_host, tenant_id),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: format!("{}/.default", resource_manager_endpoint.trim_end_matches('/')),
        })
    }
}

/// Token endpoint for a tenant
fn token_url(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        urlencoding::encode(tenant_id)
    )
}

#[async_trait]
impl TokenSource for ClientSecretCredential {
    async fn fetch(&self) -> Result<AccessToken> {
        tracing::debug!("Requesting token from {}", self.token_url);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .context("Failed to send token request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read token response")?;

        if !status.is_success() {
            // Security: the token endpoint may echo request details, never log the body
            return Err(super::error::ApiError::from_response(status.as_u16(), &body))
                .context("acquiring access token");
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).context("Failed to parse token response")?;

        Ok(AccessToken {
            token: parsed.access_token,
            expires_in: parsed.expires_in.map(Duration::from_secs),
        })
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct ArmCredentials {
    source: Arc<dyn TokenSource>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl ArmCredentials {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn from_static(token: &str) -> Self {
        Self::new(Arc::new(StaticToken(token.to_string())))
    }

    /// Pick a token source from configuration: an explicit token wins over a service principal
    pub fn from_config(config: &Config) -> Result<Self> {
        if let Some(token) = config.access_token.as_deref() {
            tracing::debug!("Using bearer token from ARM_ACCESS_TOKEN");
            return Ok(Self::from_static(token));
        }

        match (
            config.tenant_id.as_deref(),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
        ) {
            (Some(tenant), Some(client), Some(secret)) => {
                tracing::debug!("Using client secret credential for client {}", client);
                let credential = ClientSecretCredential::new(
                    &config.environment.authority_host,
                    tenant,
                    client,
                    secret,
                    &config.environment.resource_manager_endpoint,
                )?;
                Ok(Self::new(Arc::new(credential)))
            },
            _ => bail!(
                "No credentials configured. Set ARM_ACCESS_TOKEN, or ARM_TENANT_ID, ARM_CLIENT_ID and ARM_CLIENT_SECRET"
            ),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let issued = self
            .source
            .fetch()
            .await
            .context("Failed to get access token")?;

        let ttl = issued.expires_in.unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: issued.token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(issued.token)
    }

    /// Force refresh the token
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        expires_in: Option<Duration>,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch(&self) -> Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: format!("token-{}", n),
                expires_in: self.expires_in,
            })
        }
    }

    #[test]
    fn test_token_url() {
        assert_eq!(
            token_url("https://login.microsoftonline.com/", "tenant-1"),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
        );
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::from_secs(3600)),
        });
        let creds = ArmCredentials::new(source.clone());

        assert_eq!(creds.get_token().await.unwrap(), "token-0");
        assert_eq!(creds.get_token().await.unwrap(), "token-0");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        assert_eq!(creds.refresh_token().await.unwrap(), "token-1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refetched() {
        // Lifetime below the expiry buffer is treated as already expired
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::from_secs(30)),
        });
        let creds = ArmCredentials::new(source.clone());

        creds.get_token().await.unwrap();
        creds.get_token().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = Config::default();
        assert!(ArmCredentials::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_from_config_prefers_access_token() {
        let mut config = Config::default();
        config.access_token = Some("static".to_string());
        config.tenant_id = Some("t".to_string());
        let creds = ArmCredentials::from_config(&config).unwrap();
        assert_eq!(creds.get_token().await.unwrap(), "static");
    }

    #[test]
    fn test_client_secret_requires_all_fields() {
        assert!(ClientSecretCredential::new(
            DEFAULT_AUTHORITY,
            "",
            "client",
            "secret",
            "https://management.azure.com"
        )
        .is_err());
    }

    const DEFAULT_AUTHORITY: &str = crate::config::DEFAULT_AUTHORITY_HOST;
}
