//! azurerm_storage_container
//!
//! Containers are managed through the ARM `blobServices/default/containers`
//! endpoint. The configuration names the account but not its resource
//! group, which is resolved through the shared [`AccountCache`].

use super::handler::{decode_config, ensure_absent, get_optional, state_object, ResourceHandler};
use crate::azure::client::AzureClient;
use crate::azure::models::{BlobContainer, PublicAccess};
use crate::resourceids::{ResourceId, StorageContainerId};
use crate::storage::{AccountCache, BlobDataClient, ContainerDataProperties};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const TYPE_NAME: &str = "azurerm_storage_container";

fn default_access_type() -> String {
    PublicAccess::None.as_config_str().to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StorageContainerConfig {
    name: String,
    storage_account_name: String,
    #[serde(default = "default_access_type")]
    container_access_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl StorageContainerConfig {
    fn validate(&self) -> Result<PublicAccess> {
        validate_name(&self.name)?;
        for key in self.metadata.keys() {
            validate_metadata_key(key)?;
        }
        PublicAccess::from_config_str(&self.container_access_type).ok_or_else(|| {
            anyhow!(
                "container_access_type must be one of \"private\", \"blob\" or \"container\", got {:?}",
                self.container_access_type
            )
        })
    }

    fn payload(&self, access: PublicAccess) -> Value {
        json!({
            "properties": {
                "publicAccess": access,
                "metadata": self.metadata,
            }
        })
    }
}

/// 3-63 characters of lowercase letters, digits and single hyphens, starting
/// with a letter or digit; `$root` and `$web` are reserved names
fn validate_name(name: &str) -> Result<()> {
    if matches!(name, "$root" | "$web") {
        return Ok(());
    }
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid = (3..=63).contains(&name.len())
        && chars_ok
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");
    if !valid {
        bail!(
            "name {:?} must be 3-63 lowercase letters, numbers or single hyphens, and must start and end with a letter or number",
            name
        );
    }
    Ok(())
}

/// Metadata keys must be valid C# identifiers, lowercase by convention
fn validate_metadata_key(key: &str) -> Result<()> {
    let mut chars = key.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        bail!("metadata key {:?} must be a lowercase identifier", key);
    }
    Ok(())
}

pub struct StorageContainerHandler {
    client: AzureClient,
    cache: AccountCache,
    storage_suffix: String,
}

impl StorageContainerHandler {
    pub fn new(client: AzureClient, cache: AccountCache, storage_suffix: impl Into<String>) -> Self {
        Self {
            client,
            cache,
            storage_suffix: storage_suffix.into(),
        }
    }

    fn api_version(&self) -> &str {
        &self.client.api_versions.storage
    }

    async fn container_id(&self, account_name: &str, name: &str) -> Result<StorageContainerId> {
        let account = self
            .cache
            .find_account(&self.client, account_name)
            .await?
            .ok_or_else(|| anyhow!("locating Storage Account {:?}: not found", account_name))?;
        Ok(StorageContainerId::new(
            &self.client.subscription_id,
            account.resource_group(),
            account.name(),
            name,
        ))
    }

    fn flatten(id: &StorageContainerId, container: &BlobContainer) -> Value {
        let props = container.properties.clone().unwrap_or_default();
        state_object([
            ("id", json!(id.id())),
            ("name", json!(id.name)),
            ("storage_account_name", json!(id.account_name)),
            (
                "container_access_type",
                json!(props.public_access.unwrap_or_default().as_config_str()),
            ),
            ("metadata", json!(props.metadata.unwrap_or_default())),
            (
                "has_immutability_policy",
                json!(props.has_immutability_policy.unwrap_or(false)),
            ),
            ("has_legal_hold", json!(props.has_legal_hold.unwrap_or(false))),
        ])
    }

    /// Data-plane properties of a container, authorized with the account key
    pub async fn data_plane_properties(&self, id: &str) -> Result<Option<ContainerDataProperties>> {
        let id = StorageContainerId::parse(id)?;
        let key = self.cache.account_key(&self.client, &id.account_name).await?;
        let endpoint = self
            .cache
            .get(&id.account_name)
            .await
            .and_then(|details| details.primary_blob_endpoint);

        let data = match endpoint {
            Some(endpoint) => BlobDataClient::with_endpoint(&id.account_name, &key, &endpoint)?,
            None => BlobDataClient::new(&id.account_name, &key, &self.storage_suffix)?,
        };
        data.get_container_properties(&id.name).await
    }
}

#[async_trait]
impl ResourceHandler for StorageContainerHandler {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(&self, config: &Value) -> Result<Value> {
        let config: StorageContainerConfig = decode_config(TYPE_NAME, config)?;
        let access = config.validate()?;

        let id = self
            .container_id(&config.storage_account_name, &config.name)
            .await
            .with_context(|| format!("creating Storage Container {:?}", config.name))?;
        ensure_absent(&self.client, &id.id(), self.api_version()).await?;

        tracing::info!(
            "Creating Storage Container {:?} in account {:?}",
            id.name,
            id.account_name
        );
        self.client
            .put(&id.id(), self.api_version(), &config.payload(access))
            .await
            .with_context(|| format!("creating Storage Container {:?}", id.name))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Storage Container {:?} was not found after creation", id.name))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>> {
        let id = StorageContainerId::parse(id)?;
        let container: Option<BlobContainer> =
            get_optional(&self.client, &id.id(), self.api_version())
                .await
                .with_context(|| format!("retrieving Storage Container {:?}", id.name))?;

        let Some(container) = container else {
            tracing::info!("Storage Container {:?} was not found, removing from state", id.name);
            return Ok(None);
        };
        Ok(Some(Self::flatten(&id, &container)))
    }

    async fn update(&self, id: &str, config: &Value) -> Result<Value> {
        let id = StorageContainerId::parse(id)?;
        let config: StorageContainerConfig = decode_config(TYPE_NAME, config)?;
        let access = config.validate()?;

        if config.name != id.name || config.storage_account_name != id.account_name {
            bail!(
                "name and storage_account_name cannot be changed, the Storage Container {:?} must be recreated",
                id.name
            );
        }

        tracing::info!("Updating Storage Container {:?}", id.name);
        self.client
            .patch(&id.id(), self.api_version(), &config.payload(access))
            .await
            .with_context(|| format!("updating Storage Container {:?}", id.name))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Storage Container {:?} was not found after update", id.name))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = StorageContainerId::parse(id)?;
        tracing::info!("Deleting Storage Container {:?}", id.name);
        self.client
            .delete(&id.id(), self.api_version())
            .await
            .with_context(|| format!("deleting Storage Container {:?}", id.name))
    }

    fn import(&self, id: &str) -> Result<String> {
        Ok(StorageContainerId::parse(id)?.id())
    }
}
