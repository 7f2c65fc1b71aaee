//! Storage account cache
//!
//! Data-plane calls need the account's resource group and access key, which
//! are only discoverable through ARM. Both are cached per account name so
//! they are fetched once per process.

use crate::azure::client::AzureClient;
use crate::azure::models::{StorageAccount, StorageAccountKeys};
use crate::resourceids::{ResourceId, StorageAccountId};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What is known about one storage account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDetails {
    pub id: StorageAccountId,
    pub kind: Option<String>,
    pub primary_blob_endpoint: Option<String>,
    account_key: Option<String>,
}

impl AccountDetails {
    pub fn new(id: StorageAccountId) -> Self {
        Self {
            id,
            kind: None,
            primary_blob_endpoint: None,
            account_key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.account_key = Some(key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn resource_group(&self) -> &str {
        &self.id.resource_group
    }

    pub fn account_key(&self) -> Option<&str> {
        self.account_key.as_deref()
    }

    fn from_account(account: &StorageAccount) -> Result<Self> {
        let raw_id = account
            .id
            .as_deref()
            .ok_or_else(|| anyhow!("storage account in list response has no id"))?;
        let id = StorageAccountId::parse_insensitively(raw_id)?;

        Ok(Self {
            id,
            kind: account.kind.clone(),
            primary_blob_endpoint: account
                .properties
                .as_ref()
                .and_then(|p| p.primary_endpoints.as_ref())
                .and_then(|e| e.blob.clone()),
            account_key: None,
        })
    }
}

fn cache_key(account_name: &str) -> String {
    account_name.to_ascii_lowercase()
}

/// Account name → details, behind a single lock; names match ignoring case
#[derive(Clone, Default)]
pub struct AccountCache {
    accounts: Arc<RwLock<HashMap<String, AccountDetails>>>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, account_name: &str) -> Option<AccountDetails> {
        self.accounts.read().await.get(&cache_key(account_name)).cloned()
    }

    pub async fn insert(&self, details: AccountDetails) {
        let key = cache_key(details.name());
        self.accounts.write().await.insert(key, details);
    }

    /// Forget an account, e.g. after it was deleted
    pub async fn remove(&self, account_name: &str) -> Option<AccountDetails> {
        self.accounts.write().await.remove(&cache_key(account_name))
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    /// Look an account up by name, listing the subscription's accounts on a miss
    pub async fn find_account(
        &self,
        client: &AzureClient,
        account_name: &str,
    ) -> Result<Option<AccountDetails>> {
        if let Some(details) = self.get(account_name).await {
            return Ok(Some(details));
        }

        tracing::debug!("Storage account {:?} not cached, listing accounts", account_name);

        let path = format!(
            "/subscriptions/{}/providers/Microsoft.Storage/storageAccounts",
            client.subscription_id
        );
        let matching: Vec<StorageAccount> = client
            .list(&path, &client.api_versions.storage)
            .list_all_matching(|account: &StorageAccount| {
                account
                    .name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(account_name))
            })
            .await
            .context("listing Storage Accounts")?;

        let Some(account) = matching.first() else {
            return Ok(None);
        };

        let details = AccountDetails::from_account(account)?;
        self.insert(details.clone()).await;
        Ok(Some(details))
    }

    /// Primary access key of an account, fetched via `listKeys` on first use
    pub async fn account_key(&self, client: &AzureClient, account_name: &str) -> Result<String> {
        let details = self
            .find_account(client, account_name)
            .await?
            .ok_or_else(|| anyhow!("Storage Account {:?} was not found", account_name))?;

        if let Some(key) = details.account_key() {
            return Ok(key.to_string());
        }

        let path = format!("{}/listKeys", details.id.id());
        let response = client
            .post(&path, &client.api_versions.storage, None)
            .await
            .with_context(|| format!("listing keys for Storage Account {:?}", account_name))?;
        let keys: StorageAccountKeys =
            serde_json::from_value(response).context("decoding listKeys response")?;
        let key = keys
            .keys
            .into_iter()
            .next()
            .map(|k| k.value)
            .ok_or_else(|| anyhow!("Storage Account {:?} returned no keys", account_name))?;

        {
            let mut accounts = self.accounts.write().await;
            if let Some(entry) = accounts.get_mut(&cache_key(details.name())) {
                entry.account_key = Some(key.clone());
            }
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str) -> AccountDetails {
        AccountDetails::new(StorageAccountId::new("sub", "rg", name)).with_key(format!("{}-key", name))
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let cache = AccountCache::new();
        assert!(cache.is_empty().await);

        cache.insert(details("acct1")).await;
        let found = cache.get("acct1").await.unwrap();
        assert_eq!(found.resource_group(), "rg");
        assert_eq!(found.account_key(), Some("acct1-key"));

        assert!(cache.remove("acct1").await.is_some());
        assert!(cache.get("acct1").await.is_none());
        assert!(cache.remove("acct1").await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_ignores_case() {
        let cache = AccountCache::new();
        cache.insert(details("Acct1")).await;

        assert!(cache.get("ACCT1").await.is_some());
        assert!(cache.get("acct1").await.is_some());
        assert_eq!(cache.len().await, 1);

        assert!(cache.remove("aCcT1").await.is_some());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = AccountCache::new();
        let other = cache.clone();
        cache.insert(details("shared")).await;
        assert_eq!(other.len().await, 1);
    }

    #[test]
    fn test_from_account_reads_endpoint() {
        let account: StorageAccount = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/sub/resourceGroups/RG1/providers/Microsoft.Storage/storageAccounts/acct",
            "name": "acct",
            "location": "westeurope",
            "kind": "StorageV2",
            "properties": {"primaryEndpoints": {"blob": "https://acct.blob.core.windows.net/"}}
        }))
        .unwrap();
        let d = AccountDetails::from_account(&account).unwrap();
        assert_eq!(d.resource_group(), "RG1");
        assert_eq!(d.primary_blob_endpoint.as_deref(), Some("https://acct.blob.core.windows.net/"));
        assert_eq!(d.account_key(), None);
    }
}
