//! ARM request/response payloads
//!
//! Field names mirror the service JSON. Optional fields are skipped when
//! absent so PUT payloads only carry what the caller set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

/// `{"provisioningState": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

// =============================================================================
// Resource groups (Microsoft.Resources)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<ProvisioningProperties>,
}

// =============================================================================
// Storage accounts and blob containers (Microsoft.Storage)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dfs: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_https_traffic_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_tls_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_blob_public_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_endpoints: Option<Endpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<StorageAccountProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccountKey {
    pub key_name: String,
    pub value: String,
    #[serde(default)]
    pub permissions: Option<String>,
}

/// Response of `listKeys`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageAccountKeys {
    #[serde(default)]
    pub keys: Vec<StorageAccountKey>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum PublicAccess {
    #[default]
    None,
    Blob,
    Container,
}

impl PublicAccess {
    /// The lowercase spelling used in configuration
    pub fn as_config_str(&self) -> &'static str {
        match self {
            Self::None => "private",
            Self::Blob => "blob",
            Self::Container => "container",
        }
    }

    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::None),
            "blob" => Some(Self::Blob),
            "container" => Some(Self::Container),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_access: Option<PublicAccess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_immutability_policy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_legal_hold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobContainer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<ContainerProperties>,
}

// =============================================================================
// Metric alerts (Microsoft.Insights)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricDimension {
    pub name: String,
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticThresholdCriterion {
    pub name: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_namespace: Option<String>,
    pub time_aggregation: String,
    pub operator: String,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<MetricDimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_metric_validation: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFailingPeriods {
    pub number_of_evaluation_periods: f64,
    pub min_failing_periods_to_alert: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicThresholdCriterion {
    pub name: String,
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_namespace: Option<String>,
    pub time_aggregation: String,
    pub operator: String,
    pub alert_sensitivity: String,
    pub failing_periods: DynamicFailingPeriods,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<MetricDimension>,
}

/// One condition of a metric alert, discriminated by `criterionType`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "criterionType")]
pub enum MetricCriterion {
    #[serde(rename = "StaticThresholdCriterion")]
    Static(StaticThresholdCriterion),
    #[serde(rename = "DynamicThresholdCriterion")]
    Dynamic(DynamicThresholdCriterion),
}

impl MetricCriterion {
    pub fn metric_name(&self) -> &str {
        match self {
            Self::Static(c) => &c.metric_name,
            Self::Dynamic(c) => &c.metric_name,
        }
    }
}

/// Alert criteria, discriminated by `odata.type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "odata.type")]
pub enum MetricAlertCriteria {
    #[serde(rename = "Microsoft.Azure.Monitor.SingleResourceMultipleMetricCriteria")]
    SingleResourceMultipleMetric {
        #[serde(rename = "allOf", default)]
        all_of: Vec<MetricCriterion>,
    },
    #[serde(rename = "Microsoft.Azure.Monitor.MultipleResourceMultipleMetricCriteria")]
    MultipleResourceMultipleMetric {
        #[serde(rename = "allOf", default)]
        all_of: Vec<MetricCriterion>,
    },
    #[serde(rename = "Microsoft.Azure.Monitor.WebtestLocationAvailabilityCriteria")]
    WebtestLocationAvailability {
        #[serde(rename = "webTestId")]
        web_test_id: String,
        #[serde(rename = "componentId")]
        component_id: String,
        #[serde(rename = "failedLocationCount")]
        failed_location_count: i64,
    },
    /// A criteria type this client does not model
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlertAction {
    pub action_group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_hook_properties: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlertProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: i32,
    pub enabled: bool,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub evaluation_frequency: String,
    pub window_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_resource_region: Option<String>,
    pub criteria: MetricAlertCriteria,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_mitigate: Option<bool>,
    #[serde(default)]
    pub actions: Vec<MetricAlertAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    pub properties: MetricAlertProperties,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_single_resource_criteria() {
        let raw = json!({
            "odata.type": "Microsoft.Azure.Monitor.SingleResourceMultipleMetricCriteria",
            "allOf": [{
                "criterionType": "StaticThresholdCriterion",
                "name": "Metric1",
                "metricName": "Transactions",
                "metricNamespace": "Microsoft.Storage/storageAccounts",
                "timeAggregation": "Total",
                "operator": "GreaterThan",
                "threshold": 50.0,
                "dimensions": [{"name": "ApiName", "operator": "Include", "values": ["*"]}]
            }]
        });
        let criteria: MetricAlertCriteria = serde_json::from_value(raw).unwrap();
        match criteria {
            MetricAlertCriteria::SingleResourceMultipleMetric { all_of } => {
                assert_eq!(all_of.len(), 1);
                assert_eq!(all_of[0].metric_name(), "Transactions");
                assert!(matches!(all_of[0], MetricCriterion::Static(ref c) if c.threshold == 50.0));
            },
            other => panic!("unexpected criteria: {other:?}"),
        }
    }

    #[test]
    fn test_decode_dynamic_criterion() {
        let raw = json!({
            "odata.type": "Microsoft.Azure.Monitor.MultipleResourceMultipleMetricCriteria",
            "allOf": [{
                "criterionType": "DynamicThresholdCriterion",
                "name": "Metric1",
                "metricName": "Percentage CPU",
                "timeAggregation": "Average",
                "operator": "GreaterOrLessThan",
                "alertSensitivity": "Medium",
                "failingPeriods": {"numberOfEvaluationPeriods": 4.0, "minFailingPeriodsToAlert": 4.0}
            }]
        });
        let criteria: MetricAlertCriteria = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            criteria,
            MetricAlertCriteria::MultipleResourceMultipleMetric { ref all_of } if matches!(all_of[0], MetricCriterion::Dynamic(_))
        ));
    }

    #[test]
    fn test_decode_webtest_criteria() {
        let raw = json!({
            "odata.type": "Microsoft.Azure.Monitor.WebtestLocationAvailabilityCriteria",
            "webTestId": "/subscriptions/s/resourceGroups/g/providers/Microsoft.Insights/webtests/t",
            "componentId": "/subscriptions/s/resourceGroups/g/providers/Microsoft.Insights/components/c",
            "failedLocationCount": 2
        });
        let criteria: MetricAlertCriteria = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            criteria,
            MetricAlertCriteria::WebtestLocationAvailability { failed_location_count: 2, .. }
        ));
    }

    #[test]
    fn test_unknown_discriminator_falls_back() {
        let raw = json!({"odata.type": "Microsoft.Azure.Monitor.SomethingNew", "foo": 1});
        let criteria: MetricAlertCriteria = serde_json::from_value(raw).unwrap();
        assert_eq!(criteria, MetricAlertCriteria::Unknown);
    }

    #[test]
    fn test_criteria_encodes_type_tag() {
        let criteria = MetricAlertCriteria::WebtestLocationAvailability {
            web_test_id: "w".to_string(),
            component_id: "c".to_string(),
            failed_location_count: 3,
        };
        let value = serde_json::to_value(&criteria).unwrap();
        assert_eq!(value["odata.type"], "Microsoft.Azure.Monitor.WebtestLocationAvailabilityCriteria");
        assert_eq!(value["failedLocationCount"], 3);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let account = StorageAccount {
            location: "westeurope".to_string(),
            kind: Some("StorageV2".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value, json!({"location": "westeurope", "kind": "StorageV2"}));
    }

    #[test]
    fn test_public_access_config_spelling() {
        assert_eq!(PublicAccess::from_config_str("private"), Some(PublicAccess::None));
        assert_eq!(PublicAccess::Container.as_config_str(), "container");
        assert_eq!(PublicAccess::from_config_str("None"), None);
    }
}
