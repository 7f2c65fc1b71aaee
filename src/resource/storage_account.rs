//! azurerm_storage_account

use super::handler::{
    decode_config, ensure_absent, get_optional, normalize_location, state_object, ResourceHandler,
};
use crate::azure::client::AzureClient;
use crate::azure::models::{StorageAccount, Tags};
use crate::resourceids::{ResourceId, StorageAccountId};
use crate::storage::AccountCache;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const TYPE_NAME: &str = "azurerm_storage_account";

const ACCOUNT_KINDS: &[&str] = &[
    "BlobStorage",
    "BlockBlobStorage",
    "FileStorage",
    "Storage",
    "StorageV2",
];
const ACCOUNT_TIERS: &[&str] = &["Standard", "Premium"];
const REPLICATION_TYPES: &[&str] = &["LRS", "ZRS", "GRS", "RAGRS", "GZRS", "RAGZRS"];
const ACCESS_TIERS: &[&str] = &["Hot", "Cool"];
const TLS_VERSIONS: &[&str] = &["TLS1_0", "TLS1_1", "TLS1_2"];

fn default_kind() -> String {
    "StorageV2".to_string()
}

fn default_access_tier() -> String {
    "Hot".to_string()
}

fn default_tls() -> String {
    "TLS1_2".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageAccountConfig {
    name: String,
    resource_group_name: String,
    location: String,
    #[serde(default = "default_kind")]
    account_kind: String,
    account_tier: String,
    account_replication_type: String,
    #[serde(default = "default_access_tier")]
    access_tier: String,
    #[serde(default = "default_true")]
    https_traffic_only_enabled: bool,
    #[serde(default = "default_tls")]
    min_tls_version: String,
    #[serde(default = "default_true")]
    allow_nested_items_to_be_public: bool,
    #[serde(default)]
    tags: Tags,
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        bail!("{} must be one of {:?}, got {:?}", field, allowed, value);
    }
    Ok(())
}

/// 3-24 characters, lowercase letters and digits only
fn validate_name(name: &str) -> Result<()> {
    let valid = (3..=24).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !valid {
        bail!(
            "name {:?} can only consist of lowercase letters and numbers, and must be between 3 and 24 characters long",
            name
        );
    }
    Ok(())
}

impl StorageAccountConfig {
    fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        one_of("account_kind", &self.account_kind, ACCOUNT_KINDS)?;
        one_of("account_tier", &self.account_tier, ACCOUNT_TIERS)?;
        one_of(
            "account_replication_type",
            &self.account_replication_type,
            REPLICATION_TYPES,
        )?;
        one_of("access_tier", &self.access_tier, ACCESS_TIERS)?;
        one_of("min_tls_version", &self.min_tls_version, TLS_VERSIONS)?;

        if self.account_tier == "Premium"
            && !matches!(self.account_replication_type.as_str(), "LRS" | "ZRS")
        {
            bail!(
                "account_replication_type {:?} is not supported for the Premium tier",
                self.account_replication_type
            );
        }
        Ok(())
    }

    fn sku_name(&self) -> String {
        format!("{}_{}", self.account_tier, self.account_replication_type)
    }

    fn properties(&self) -> Value {
        let mut properties = json!({
            "supportsHttpsTrafficOnly": self.https_traffic_only_enabled,
            "minimumTlsVersion": self.min_tls_version,
            "allowBlobPublicAccess": self.allow_nested_items_to_be_public,
        });
        // Access tier only applies to blob-capable kinds
        if matches!(self.account_kind.as_str(), "StorageV2" | "BlobStorage") {
            properties["accessTier"] = json!(self.access_tier);
        }
        properties
    }

    fn create_payload(&self) -> Value {
        json!({
            "location": normalize_location(&self.location),
            "kind": self.account_kind,
            "sku": {"name": self.sku_name()},
            "tags": self.tags,
            "properties": self.properties(),
        })
    }

    fn update_payload(&self) -> Value {
        json!({
            "sku": {"name": self.sku_name()},
            "tags": self.tags,
            "properties": self.properties(),
        })
    }
}

pub struct StorageAccountHandler {
    client: AzureClient,
    cache: AccountCache,
}

impl StorageAccountHandler {
    pub fn new(client: AzureClient, cache: AccountCache) -> Self {
        Self { client, cache }
    }

    fn api_version(&self) -> &str {
        &self.client.api_versions.storage
    }

    fn flatten(id: &StorageAccountId, account: &StorageAccount) -> Value {
        let (tier, replication) = account
            .sku
            .as_ref()
            .and_then(|sku| sku.name.split_once('_'))
            .map(|(t, r)| (Some(t.to_string()), Some(r.to_string())))
            .unwrap_or((None, None));
        let props = account.properties.clone().unwrap_or_default();
        let endpoints = props.primary_endpoints.clone().unwrap_or_default();

        state_object([
            ("id", json!(id.id())),
            ("name", json!(id.name)),
            ("resource_group_name", json!(id.resource_group)),
            ("location", json!(normalize_location(&account.location))),
            ("account_kind", json!(account.kind)),
            ("account_tier", json!(tier)),
            ("account_replication_type", json!(replication)),
            ("access_tier", json!(props.access_tier)),
            ("https_traffic_only_enabled", json!(props.supports_https_traffic_only)),
            ("min_tls_version", json!(props.minimum_tls_version)),
            ("allow_nested_items_to_be_public", json!(props.allow_blob_public_access)),
            ("primary_location", json!(props.primary_location)),
            ("primary_blob_endpoint", json!(endpoints.blob)),
            ("tags", json!(account.tags.clone().unwrap_or_default())),
        ])
    }
}

#[async_trait]
impl ResourceHandler for StorageAccountHandler {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(&self, config: &Value) -> Result<Value> {
        let config: StorageAccountConfig = decode_config(TYPE_NAME, config)?;
        config.validate()?;

        let id = StorageAccountId::new(
            &self.client.subscription_id,
            &config.resource_group_name,
            &config.name,
        );
        ensure_absent(&self.client, &id.id(), self.api_version()).await?;

        tracing::info!("Creating Storage Account {:?}", config.name);
        self.client
            .put(&id.id(), self.api_version(), &config.create_payload())
            .await
            .with_context(|| format!("creating Storage Account {:?}", config.name))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Storage Account {:?} was not found after creation", config.name))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>> {
        let id = StorageAccountId::parse(id)?;
        let account: Option<StorageAccount> =
            get_optional(&self.client, &id.id(), self.api_version())
                .await
                .with_context(|| format!("retrieving Storage Account {:?}", id.name))?;

        let Some(account) = account else {
            tracing::info!("Storage Account {:?} was not found, removing from state", id.name);
            self.cache.remove(&id.name).await;
            return Ok(None);
        };
        Ok(Some(Self::flatten(&id, &account)))
    }

    async fn update(&self, id: &str, config: &Value) -> Result<Value> {
        let id = StorageAccountId::parse(id)?;
        let config: StorageAccountConfig = decode_config(TYPE_NAME, config)?;
        config.validate()?;

        if config.name != id.name || config.resource_group_name != id.resource_group {
            bail!(
                "name and resource_group_name cannot be changed, the Storage Account {:?} must be recreated",
                id.name
            );
        }

        tracing::info!("Updating Storage Account {:?}", id.name);
        self.client
            .patch(&id.id(), self.api_version(), &config.update_payload())
            .await
            .with_context(|| format!("updating Storage Account {:?}", id.name))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Storage Account {:?} was not found after update", id.name))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = StorageAccountId::parse(id)?;
        tracing::info!("Deleting Storage Account {:?}", id.name);
        self.client
            .delete(&id.id(), self.api_version())
            .await
            .with_context(|| format!("deleting Storage Account {:?}", id.name))?;

        self.cache.remove(&id.name).await;
        Ok(())
    }

    fn import(&self, id: &str) -> Result<String> {
        Ok(StorageAccountId::parse(id)?.id())
    }

    async fn list(&self) -> Result<Vec<Value>> {
        let path = format!(
            "/subscriptions/{}/providers/Microsoft.Storage/storageAccounts",
            self.client.subscription_id
        );
        let accounts: Vec<StorageAccount> = self
            .client
            .list(&path, self.api_version())
            .list_all()
            .await
            .context("listing Storage Accounts")?;

        accounts
            .iter()
            .map(|account| {
                let raw = account.id.as_deref().context("Storage Account in list response has no id")?;
                let id = StorageAccountId::parse_insensitively(raw)?;
                Ok(Self::flatten(&id, account))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::models::{Endpoints, Sku, StorageAccountProperties};

    fn config(overrides: Value) -> StorageAccountConfig {
        let mut base = json!({
            "name": "acct1",
            "resource_group_name": "rg1",
            "location": "westeurope",
            "account_tier": "Standard",
            "account_replication_type": "LRS"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_validate() {
        assert!(config(json!({})).validate().is_ok());
        assert!(config(json!({"name": "Upper"})).validate().is_err());
        assert!(config(json!({"name": "ab"})).validate().is_err());
        assert!(config(json!({"account_tier": "Gold"})).validate().is_err());
        assert!(config(json!({"account_tier": "Premium", "account_replication_type": "GRS"}))
            .validate()
            .is_err());
        assert!(config(json!({"min_tls_version": "TLS1_3"})).validate().is_err());
    }

    #[test]
    fn test_create_payload() {
        let payload = config(json!({"tags": {"env": "dev"}})).create_payload();
        assert_eq!(payload["sku"]["name"], "Standard_LRS");
        assert_eq!(payload["kind"], "StorageV2");
        assert_eq!(payload["properties"]["accessTier"], "Hot");
        assert_eq!(payload["properties"]["minimumTlsVersion"], "TLS1_2");
        assert_eq!(payload["tags"]["env"], "dev");
    }

    #[test]
    fn test_file_storage_has_no_access_tier() {
        let payload = config(json!({"account_kind": "FileStorage", "account_tier": "Premium"}))
            .create_payload();
        assert!(payload["properties"].get("accessTier").is_none());
    }

    #[test]
    fn test_flatten_splits_sku() {
        let id = StorageAccountId::new("sub", "rg1", "acct1");
        let account = StorageAccount {
            location: "West Europe".to_string(),
            kind: Some("StorageV2".to_string()),
            sku: Some(Sku { name: "Standard_RAGRS".to_string(), tier: None }),
            properties: Some(StorageAccountProperties {
                primary_endpoints: Some(Endpoints {
                    blob: Some("https://acct1.blob.core.windows.net/".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let state = StorageAccountHandler::flatten(&id, &account);
        assert_eq!(state["account_tier"], "Standard");
        assert_eq!(state["account_replication_type"], "RAGRS");
        assert_eq!(state["location"], "westeurope");
        assert_eq!(state["primary_blob_endpoint"], "https://acct1.blob.core.windows.net/");
    }
}
