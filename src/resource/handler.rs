//! The resource lifecycle contract and helpers shared by every handler

use crate::azure::client::AzureClient;
use crate::azure::error::is_not_found;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Returned by `create` when the target already exists in Azure
#[derive(Debug, thiserror::Error)]
#[error(
    "a resource with the ID {id:?} already exists - to be managed via Terraform this resource needs to be imported into the State"
)]
pub struct ResourceExists {
    pub id: String,
}

/// Create/Read/Update/Delete for one Terraform resource type
///
/// Configuration and state are JSON objects keyed by the Terraform
/// attribute names. State always carries `id`.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Terraform type name, e.g. `azurerm_resource_group`
    fn type_name(&self) -> &'static str;

    async fn create(&self, config: &Value) -> Result<Value>;

    /// `None` when the resource no longer exists
    async fn read(&self, id: &str) -> Result<Option<Value>>;

    async fn update(&self, id: &str, config: &Value) -> Result<Value>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Validate an ID supplied by `terraform import` and return it in canonical form
    fn import(&self, id: &str) -> Result<String>;

    /// State of every instance in the subscription
    async fn list(&self) -> Result<Vec<Value>> {
        anyhow::bail!("listing {} is not supported", self.type_name())
    }
}

/// Decode a configuration object into the handler's typed config
pub fn decode_config<T: DeserializeOwned>(type_name: &str, config: &Value) -> Result<T> {
    serde_json::from_value(config.clone())
        .with_context(|| format!("decoding configuration for {}", type_name))
}

/// Fail with [`ResourceExists`] when `id` is already present
pub async fn ensure_absent(client: &AzureClient, id: &str, api_version: &str) -> Result<()> {
    match client.get(id, api_version).await {
        Ok(_) => Err(ResourceExists { id: id.to_string() }.into()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(e.context(format!("checking for presence of existing {}", id))),
    }
}

/// GET a resource, mapping 404 to `None`
pub async fn get_optional<T: DeserializeOwned>(
    client: &AzureClient,
    id: &str,
    api_version: &str,
) -> Result<Option<T>> {
    match client.get_as::<T>(id, api_version).await {
        Ok(resource) => Ok(Some(resource)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lowercase a location and drop its spaces: `West Europe` → `westeurope`
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// Build a state object from attribute pairs
pub fn state_object<I>(attributes: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    Value::Object(
        attributes
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<Map<String, Value>>(),
    )
}
