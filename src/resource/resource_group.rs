//! azurerm_resource_group

use super::handler::{
    decode_config, ensure_absent, get_optional, normalize_location, state_object, ResourceHandler,
};
use crate::azure::client::AzureClient;
use crate::azure::models::{ResourceGroup, Tags};
use crate::resourceids::{ResourceGroupId, ResourceId};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const TYPE_NAME: &str = "azurerm_resource_group";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceGroupConfig {
    name: String,
    location: String,
    #[serde(default)]
    managed_by: Option<String>,
    #[serde(default)]
    tags: Tags,
}

impl ResourceGroupConfig {
    fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.location.trim().is_empty() {
            bail!("location must not be empty");
        }
        Ok(())
    }

    fn payload(&self) -> Value {
        let mut payload = json!({
            "location": normalize_location(&self.location),
            "tags": self.tags,
        });
        if let Some(managed_by) = &self.managed_by {
            payload["managedBy"] = json!(managed_by);
        }
        payload
    }
}

/// 1-90 characters: alphanumerics, underscores, parentheses, hyphens and
/// periods; may not end in a period
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 90 {
        bail!("name must be between 1 and 90 characters, got {:?}", name);
    }
    if name.ends_with('.') {
        bail!("name {:?} must not end with a period", name);
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '_' | '(' | ')' | '-' | '.');
    if !name.chars().all(allowed) {
        bail!(
            "name {:?} may only contain alphanumerics, underscores, parentheses, hyphens and periods",
            name
        );
    }
    Ok(())
}

pub struct ResourceGroupHandler {
    client: AzureClient,
}

impl ResourceGroupHandler {
    pub fn new(client: AzureClient) -> Self {
        Self { client }
    }

    fn api_version(&self) -> &str {
        &self.client.api_versions.resources
    }

    fn flatten(id: &ResourceGroupId, group: &ResourceGroup) -> Value {
        state_object([
            ("id", json!(id.id())),
            ("name", json!(id.resource_group)),
            ("location", json!(normalize_location(&group.location))),
            ("managed_by", json!(group.managed_by)),
            ("tags", json!(group.tags.clone().unwrap_or_default())),
        ])
    }
}

#[async_trait]
impl ResourceHandler for ResourceGroupHandler {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(&self, config: &Value) -> Result<Value> {
        let config: ResourceGroupConfig = decode_config(TYPE_NAME, config)?;
        config.validate()?;

        let id = ResourceGroupId::new(&self.client.subscription_id, &config.name);
        ensure_absent(&self.client, &id.id(), self.api_version()).await?;

        tracing::info!("Creating Resource Group {:?}", config.name);
        self.client
            .put(&id.id(), self.api_version(), &config.payload())
            .await
            .with_context(|| format!("creating Resource Group {:?}", config.name))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Resource Group {:?} was not found after creation", config.name))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>> {
        let id = ResourceGroupId::parse(id)?;
        let group: Option<ResourceGroup> = get_optional(&self.client, &id.id(), self.api_version())
            .await
            .with_context(|| format!("retrieving Resource Group {:?}", id.resource_group))?;

        let Some(group) = group else {
            tracing::info!("Resource Group {:?} was not found, removing from state", id.resource_group);
            return Ok(None);
        };
        Ok(Some(Self::flatten(&id, &group)))
    }

    async fn update(&self, id: &str, config: &Value) -> Result<Value> {
        let id = ResourceGroupId::parse(id)?;
        let config: ResourceGroupConfig = decode_config(TYPE_NAME, config)?;
        config.validate()?;

        if config.name != id.resource_group {
            bail!(
                "name cannot be changed from {:?} to {:?}, the Resource Group must be recreated",
                id.resource_group,
                config.name
            );
        }

        let existing: ResourceGroup = self
            .client
            .get_as(&id.id(), self.api_version())
            .await
            .with_context(|| format!("retrieving Resource Group {:?}", id.resource_group))?;
        if normalize_location(&existing.location) != normalize_location(&config.location) {
            bail!(
                "location cannot be changed from {:?} to {:?}, the Resource Group must be recreated",
                existing.location,
                config.location
            );
        }

        let mut patch = json!({ "tags": config.tags });
        if let Some(managed_by) = &config.managed_by {
            patch["managedBy"] = json!(managed_by);
        }

        tracing::info!("Updating Resource Group {:?}", id.resource_group);
        self.client
            .patch(&id.id(), self.api_version(), &patch)
            .await
            .with_context(|| format!("updating Resource Group {:?}", id.resource_group))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Resource Group {:?} was not found after update", id.resource_group))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = ResourceGroupId::parse(id)?;
        tracing::info!("Deleting Resource Group {:?}", id.resource_group);
        self.client
            .delete(&id.id(), self.api_version())
            .await
            .with_context(|| format!("deleting Resource Group {:?}", id.resource_group))
    }

    fn import(&self, id: &str) -> Result<String> {
        Ok(ResourceGroupId::parse(id)?.id())
    }

    async fn list(&self) -> Result<Vec<Value>> {
        let path = format!("/subscriptions/{}/resourcegroups", self.client.subscription_id);
        let groups: Vec<ResourceGroup> = self
            .client
            .list(&path, self.api_version())
            .list_all()
            .await
            .context("listing Resource Groups")?;

        groups
            .iter()
            .map(|group| {
                let raw = group.id.as_deref().context("Resource Group in list response has no id")?;
                let id = ResourceGroupId::parse_insensitively(raw)?;
                Ok(Self::flatten(&id, group))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("rg-prod_01(a).b").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("ends.").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name(&"a".repeat(91)).is_err());
    }

    #[test]
    fn test_payload_normalizes_location() {
        let config: ResourceGroupConfig = serde_json::from_value(json!({
            "name": "rg1",
            "location": "West Europe",
            "tags": {"env": "test"}
        }))
        .unwrap();
        assert_eq!(
            config.payload(),
            json!({"location": "westeurope", "tags": {"env": "test"}})
        );
    }

    #[test]
    fn test_flatten() {
        let id = ResourceGroupId::new("sub", "rg1");
        let group = ResourceGroup {
            location: "westeurope".to_string(),
            ..Default::default()
        };
        let state = ResourceGroupHandler::flatten(&id, &group);
        assert_eq!(state["id"], "/subscriptions/sub/resourceGroups/rg1");
        assert_eq!(state["name"], "rg1");
        assert_eq!(state["tags"], json!({}));
        assert!(state["managed_by"].is_null());
    }
}
