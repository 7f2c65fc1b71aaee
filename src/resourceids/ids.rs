//! Resource ID types
//!
//! One struct per supported ARM resource type. Field names follow the
//! segment they capture.

use super::segments::{ParsedId, ResourceIdError, Segment};
use super::{ResourceGroupScoped, ResourceId};
use std::fmt;
use std::str::FromStr;

/// Allowed values for the blob service segment
pub const BLOB_SERVICE_NAMES: &[&str] = &["default"];

fn subscription_prefix() -> Vec<Segment> {
    vec![
        Segment::fixed("staticSubscriptions", "subscriptions"),
        Segment::subscription_id("subscriptionId"),
    ]
}

fn resource_group_prefix() -> Vec<Segment> {
    let mut segments = subscription_prefix();
    segments.push(Segment::fixed("staticResourceGroups", "resourceGroups"));
    segments.push(Segment::resource_group("resourceGroupName"));
    segments
}

fn provider_prefix(namespace: &'static str) -> Vec<Segment> {
    let mut segments = resource_group_prefix();
    segments.push(Segment::fixed("staticProviders", "providers"));
    segments.push(Segment::provider("staticProviderNamespace", namespace));
    segments
}

macro_rules! display_via_id {
    ($($t:ty),* $(,)?) => {
        $(
            impl fmt::Display for $t {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.id())
                }
            }

            impl FromStr for $t {
                type Err = ResourceIdError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$t as ResourceId>::parse(s)
                }
            }
        )*
    };
}

// =============================================================================
// Subscription / Resource Group
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    pub subscription_id: String,
}

impl SubscriptionId {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }
}

impl ResourceId for SubscriptionId {
    const KIND: &'static str = "Subscription";

    fn segments() -> Vec<Segment> {
        subscription_prefix()
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self::new(parsed.get("subscriptionId"))
    }

    fn id(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceGroupId {
    pub subscription_id: String,
    pub resource_group: String,
}

impl ResourceGroupId {
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }
}

impl ResourceId for ResourceGroupId {
    const KIND: &'static str = "Resource Group";

    fn segments() -> Vec<Segment> {
        resource_group_prefix()
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self::new(parsed.get("subscriptionId"), parsed.get("resourceGroupName"))
    }

    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageAccountId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl StorageAccountId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for StorageAccountId {
    const KIND: &'static str = "Storage Account";

    fn segments() -> Vec<Segment> {
        let mut segments = provider_prefix("Microsoft.Storage");
        segments.push(Segment::fixed("staticStorageAccounts", "storageAccounts"));
        segments.push(Segment::user_specified("storageAccountName", "storageAccountValue"));
        segments
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self::new(
            parsed.get("subscriptionId"),
            parsed.get("resourceGroupName"),
            parsed.get("storageAccountName"),
        )
    }

    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageContainerId {
    pub subscription_id: String,
    pub resource_group: String,
    pub account_name: String,
    pub blob_service_name: String,
    pub name: String,
}

impl StorageContainerId {
    /// Container in the account's `default` blob service
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        account_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            account_name: account_name.into(),
            blob_service_name: "default".to_string(),
            name: name.into(),
        }
    }

    pub fn storage_account_id(&self) -> StorageAccountId {
        StorageAccountId::new(&self.subscription_id, &self.resource_group, &self.account_name)
    }
}

impl ResourceId for StorageContainerId {
    const KIND: &'static str = "Storage Container";

    fn segments() -> Vec<Segment> {
        let mut segments = StorageAccountId::segments();
        segments.push(Segment::fixed("staticBlobServices", "blobServices"));
        segments.push(Segment::constant("blobServiceName", BLOB_SERVICE_NAMES, "default"));
        segments.push(Segment::fixed("staticContainers", "containers"));
        segments.push(Segment::user_specified("containerName", "containerValue"));
        segments
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self {
            subscription_id: parsed.get("subscriptionId"),
            resource_group: parsed.get("resourceGroupName"),
            account_name: parsed.get("storageAccountName"),
            blob_service_name: parsed.get("blobServiceName"),
            name: parsed.get("containerName"),
        }
    }

    fn id(&self) -> String {
        format!(
            "{}/blobServices/{}/containers/{}",
            self.storage_account_id().id(),
            self.blob_service_name,
            self.name
        )
    }
}

// =============================================================================
// Network
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualNetworkId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl VirtualNetworkId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for VirtualNetworkId {
    const KIND: &'static str = "Virtual Network";

    fn segments() -> Vec<Segment> {
        let mut segments = provider_prefix("Microsoft.Network");
        segments.push(Segment::fixed("staticVirtualNetworks", "virtualNetworks"));
        segments.push(Segment::user_specified("virtualNetworkName", "virtualNetworkValue"));
        segments
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self::new(
            parsed.get("subscriptionId"),
            parsed.get("resourceGroupName"),
            parsed.get("virtualNetworkName"),
        )
    }

    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubnetId {
    pub subscription_id: String,
    pub resource_group: String,
    pub virtual_network_name: String,
    pub name: String,
}

impl SubnetId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        virtual_network_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            virtual_network_name: virtual_network_name.into(),
            name: name.into(),
        }
    }

    pub fn virtual_network_id(&self) -> VirtualNetworkId {
        VirtualNetworkId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.virtual_network_name,
        )
    }
}

impl ResourceId for SubnetId {
    const KIND: &'static str = "Subnet";

    fn segments() -> Vec<Segment> {
        let mut segments = VirtualNetworkId::segments();
        segments.push(Segment::fixed("staticSubnets", "subnets"));
        segments.push(Segment::user_specified("subnetName", "subnetValue"));
        segments
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self::new(
            parsed.get("subscriptionId"),
            parsed.get("resourceGroupName"),
            parsed.get("virtualNetworkName"),
            parsed.get("subnetName"),
        )
    }

    fn id(&self) -> String {
        format!("{}/subnets/{}", self.virtual_network_id().id(), self.name)
    }
}

// =============================================================================
// Monitor / Key Vault
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricAlertId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl MetricAlertId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for MetricAlertId {
    const KIND: &'static str = "Metric Alert";

    fn segments() -> Vec<Segment> {
        let mut segments = provider_prefix("Microsoft.Insights");
        segments.push(Segment::fixed("staticMetricAlerts", "metricAlerts"));
        segments.push(Segment::user_specified("metricAlertName", "metricAlertValue"));
        segments
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self::new(
            parsed.get("subscriptionId"),
            parsed.get("resourceGroupName"),
            parsed.get("metricAlertName"),
        )
    }

    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Insights/metricAlerts/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyVaultId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl KeyVaultId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for KeyVaultId {
    const KIND: &'static str = "Key Vault";

    fn segments() -> Vec<Segment> {
        let mut segments = provider_prefix("Microsoft.KeyVault");
        segments.push(Segment::fixed("staticVaults", "vaults"));
        segments.push(Segment::user_specified("vaultName", "vaultValue"));
        segments
    }

    fn from_parsed(parsed: &ParsedId) -> Self {
        Self::new(
            parsed.get("subscriptionId"),
            parsed.get("resourceGroupName"),
            parsed.get("vaultName"),
        )
    }

    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.KeyVault/vaults/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

display_via_id!(
    SubscriptionId,
    ResourceGroupId,
    StorageAccountId,
    StorageContainerId,
    VirtualNetworkId,
    SubnetId,
    MetricAlertId,
    KeyVaultId,
);

macro_rules! resource_group_scoped {
    ($($t:ty),* $(,)?) => {
        $(
            impl ResourceGroupScoped for $t {
                fn subscription_id(&self) -> &str {
                    &self.subscription_id
                }

                fn resource_group(&self) -> &str {
                    &self.resource_group
                }
            }
        )*
    };
}

resource_group_scoped!(
    ResourceGroupId,
    StorageAccountId,
    StorageContainerId,
    VirtualNetworkId,
    SubnetId,
    MetricAlertId,
    KeyVaultId,
);

/// Try every known ID type and describe the first that matches
pub fn describe(input: &str) -> Option<(&'static str, Vec<(&'static str, String)>)> {
    fn fields<T: ResourceId>(input: &str) -> Option<(&'static str, Vec<(&'static str, String)>)> {
        let parsed = super::segments::IdParser::new(T::KIND, T::segments())
            .insensitively()
            .parse(input)
            .ok()?;
        let values = T::segments()
            .into_iter()
            .filter(|s| s.is_value())
            .map(|s| (s.name, parsed.get(s.name)))
            .collect();
        Some((T::KIND, values))
    }

    fields::<StorageContainerId>(input)
        .or_else(|| fields::<SubnetId>(input))
        .or_else(|| fields::<StorageAccountId>(input))
        .or_else(|| fields::<VirtualNetworkId>(input))
        .or_else(|| fields::<MetricAlertId>(input))
        .or_else(|| fields::<KeyVaultId>(input))
        .or_else(|| fields::<ResourceGroupId>(input))
        .or_else(|| fields::<SubscriptionId>(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: &str = "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/group1/providers/Microsoft.Storage/storageAccounts/account1/blobServices/default/containers/container1";

    #[test]
    fn test_parse_storage_container() {
        let id = StorageContainerId::parse(CONTAINER).unwrap();
        assert_eq!(id.name, "container1");
        assert_eq!(id.account_name, "account1");
        assert_eq!(id.blob_service_name, "default");
        assert_eq!(id.resource_group, "group1");
        assert_eq!(id.subscription_id, "12345678-1234-9876-4563-123456789012");
        assert_eq!(id.to_string(), CONTAINER);
    }

    #[test]
    fn test_container_rejects_other_blob_service() {
        let input = CONTAINER.replace("/default/", "/custom/");
        assert!(StorageContainerId::parse(&input).is_err());
    }

    #[test]
    fn test_container_requires_every_segment() {
        let parts: Vec<&str> = CONTAINER.trim_start_matches('/').split('/').collect();
        for len in 0..parts.len() {
            let truncated = format!("/{}", parts[..len].join("/"));
            assert!(
                StorageContainerId::parse(&truncated).is_err(),
                "{truncated} should not parse"
            );
        }
    }

    #[test]
    fn test_account_id_does_not_accept_container_id() {
        assert!(StorageAccountId::parse(CONTAINER).is_err());
    }

    #[test]
    fn test_container_to_account() {
        let id = StorageContainerId::parse(CONTAINER).unwrap();
        let account = id.storage_account_id();
        assert_eq!(account.name, "account1");
        assert_eq!(account.resource_group_id().id(), "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/group1");
    }

    #[test]
    fn test_every_scoped_id_yields_its_resource_group() {
        let group = ResourceGroupId::new("sub", "rg");

        assert_eq!(StorageContainerId::parse(CONTAINER).unwrap().resource_group_id().resource_group, "group1");
        assert_eq!(StorageAccountId::new("sub", "rg", "a").resource_group_id(), group);
        assert_eq!(StorageContainerId::new("sub", "rg", "a", "c").resource_group_id(), group);
        assert_eq!(VirtualNetworkId::new("sub", "rg", "vnet").resource_group_id(), group);
        assert_eq!(SubnetId::new("sub", "rg", "vnet", "snet").resource_group_id(), group);
        assert_eq!(MetricAlertId::new("sub", "rg", "cpu").resource_group_id(), group);
        assert_eq!(KeyVaultId::new("sub", "rg", "kv").resource_group_id(), group);
        assert_eq!(group.resource_group_id(), group);
    }

    #[test]
    fn test_parse_insensitively() {
        let lowered = "/subscriptions/sub/resourcegroups/Group1/providers/microsoft.storage/storageaccounts/account1";
        assert!(StorageAccountId::parse(lowered).is_err());
        let id = StorageAccountId::parse_insensitively(lowered).unwrap();
        assert_eq!(id.resource_group, "Group1");
        assert_eq!(
            id.id(),
            "/subscriptions/sub/resourceGroups/Group1/providers/Microsoft.Storage/storageAccounts/account1"
        );
    }

    #[test]
    fn test_subnet_round_trip() {
        let id = SubnetId::new("sub", "rg", "vnet1", "subnet1");
        assert_eq!(SubnetId::parse(&id.id()).unwrap(), id);
        assert_eq!(id.virtual_network_id().name, "vnet1");
    }

    #[test]
    fn test_from_str() {
        let id: MetricAlertId = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Insights/metricAlerts/cpu"
            .parse()
            .unwrap();
        assert_eq!(id.name, "cpu");
    }

    #[test]
    fn test_example_parses() {
        assert!(StorageContainerId::parse(&StorageContainerId::example()).is_ok());
        assert!(KeyVaultId::parse(&KeyVaultId::example()).is_ok());
        assert!(SubscriptionId::parse(&SubscriptionId::example()).is_ok());
    }

    #[test]
    fn test_describe_picks_most_specific() {
        let (kind, values) = describe(CONTAINER).unwrap();
        assert_eq!(kind, "Storage Container");
        assert!(values.contains(&("containerName", "container1".to_string())));

        let (kind, _) = describe("/subscriptions/s/resourceGroups/g").unwrap();
        assert_eq!(kind, "Resource Group");

        assert!(describe("/not/an/arm/id").is_none());
    }
}
