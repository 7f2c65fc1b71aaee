//! Resource Registry - look handlers up by Terraform type name

use super::handler::ResourceHandler;
use super::metric_alert::MetricAlertHandler;
use super::resource_group::ResourceGroupHandler;
use super::storage_account::StorageAccountHandler;
use super::storage_container::StorageContainerHandler;
use crate::azure::client::AzureClient;
use crate::storage::AccountCache;
use std::collections::BTreeMap;

/// Type name → handler
#[derive(Default)]
pub struct Registry {
    handlers: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in handler, sharing one account cache
    pub fn new(client: AzureClient, storage_suffix: &str) -> Self {
        Self::with_cache(client, storage_suffix, AccountCache::new())
    }

    pub fn with_cache(client: AzureClient, storage_suffix: &str, cache: AccountCache) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ResourceGroupHandler::new(client.clone())));
        registry.register(Box::new(StorageAccountHandler::new(
            client.clone(),
            cache.clone(),
        )));
        registry.register(Box::new(StorageContainerHandler::new(
            client.clone(),
            cache,
            storage_suffix,
        )));
        registry.register(Box::new(MetricAlertHandler::new(client)));
        registry
    }

    /// Add a handler, replacing any registered under the same type name
    pub fn register(&mut self, handler: Box<dyn ResourceHandler>) {
        self.handlers.insert(handler.type_name(), handler);
    }

    pub fn get(&self, type_name: &str) -> Option<&dyn ResourceHandler> {
        self.handlers.get(type_name).map(|h| h.as_ref())
    }

    /// Registered type names in sorted order
    pub fn type_names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::auth::ArmCredentials;
    use crate::config::Config;

    #[test]
    fn test_builtin_handlers_registered() {
        let client =
            AzureClient::with_credentials(&Config::default(), "sub", ArmCredentials::from_static("t"))
                .unwrap();
        let registry = Registry::new(client, "core.windows.net");

        assert_eq!(
            registry.type_names(),
            vec![
                "azurerm_monitor_metric_alert",
                "azurerm_resource_group",
                "azurerm_storage_account",
                "azurerm_storage_container",
            ]
        );
        let handler = registry.get("azurerm_storage_account").unwrap();
        assert_eq!(handler.type_name(), "azurerm_storage_account");
        assert!(registry.get("azurerm_virtual_machine").is_none());
    }

    #[test]
    fn test_import_validates_id() {
        let client =
            AzureClient::with_credentials(&Config::default(), "sub", ArmCredentials::from_static("t"))
                .unwrap();
        let registry = Registry::new(client, "core.windows.net");
        let handler = registry.get("azurerm_resource_group").unwrap();

        assert_eq!(
            handler.import("/subscriptions/sub/resourceGroups/rg1/").unwrap(),
            "/subscriptions/sub/resourceGroups/rg1"
        );
        assert!(handler
            .import("/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/a")
            .is_err());
    }
}
