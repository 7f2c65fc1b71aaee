//! azurerm_monitor_metric_alert
//!
//! The configuration carries three mutually exclusive criteria blocks which
//! map onto the `odata.type` discriminated union of the API:
//!
//! - `criteria` on a single scope → `SingleResourceMultipleMetricCriteria`
//! - `criteria` on several scopes, or any `dynamic_criteria` →
//!   `MultipleResourceMultipleMetricCriteria`
//! - `application_insights_web_test_location_availability_criteria` →
//!   `WebtestLocationAvailabilityCriteria`

use super::handler::{decode_config, ensure_absent, get_optional, state_object, ResourceHandler};
use crate::azure::client::AzureClient;
use crate::azure::models::{
    DynamicFailingPeriods, DynamicThresholdCriterion, MetricAlert, MetricAlertAction,
    MetricAlertCriteria, MetricAlertProperties, MetricCriterion, MetricDimension,
    StaticThresholdCriterion, Tags,
};
use crate::resourceids::{MetricAlertId, ResourceId};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const TYPE_NAME: &str = "azurerm_monitor_metric_alert";

const AGGREGATIONS: &[&str] = &["Average", "Count", "Minimum", "Maximum", "Total"];
const STATIC_OPERATORS: &[&str] = &[
    "Equals",
    "GreaterThan",
    "GreaterThanOrEqual",
    "LessThan",
    "LessThanOrEqual",
];
const DYNAMIC_OPERATORS: &[&str] = &["LessThan", "GreaterThan", "GreaterOrLessThan"];
const SENSITIVITIES: &[&str] = &["Low", "Medium", "High"];
const FREQUENCIES: &[&str] = &["PT1M", "PT5M", "PT15M", "PT30M", "PT1H"];
const WINDOW_SIZES: &[&str] = &["PT1M", "PT5M", "PT15M", "PT30M", "PT1H", "PT6H", "PT12H", "P1D"];

fn default_severity() -> i32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_frequency() -> String {
    "PT1M".to_string()
}

fn default_window_size() -> String {
    "PT5M".to_string()
}

fn default_dimension_operator() -> String {
    "Include".to_string()
}

fn default_evaluation_count() -> u32 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct DimensionBlock {
    name: String,
    #[serde(default = "default_dimension_operator")]
    operator: String,
    values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct CriteriaBlock {
    metric_namespace: String,
    metric_name: String,
    aggregation: String,
    operator: String,
    threshold: f64,
    #[serde(default)]
    dimension: Vec<DimensionBlock>,
    #[serde(default)]
    skip_metric_validation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct DynamicCriteriaBlock {
    metric_namespace: String,
    metric_name: String,
    aggregation: String,
    operator: String,
    alert_sensitivity: String,
    #[serde(default = "default_evaluation_count")]
    evaluation_total_count: u32,
    #[serde(default = "default_evaluation_count")]
    evaluation_failure_count: u32,
    #[serde(default)]
    dimension: Vec<DimensionBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct WebTestCriteriaBlock {
    web_test_id: String,
    component_id: String,
    failed_location_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct ActionBlock {
    action_group_id: String,
    #[serde(default)]
    webhook_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricAlertConfig {
    name: String,
    resource_group_name: String,
    scopes: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_severity")]
    severity: i32,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_true")]
    auto_mitigate: bool,
    #[serde(default = "default_frequency")]
    frequency: String,
    #[serde(default = "default_window_size")]
    window_size: String,
    #[serde(default)]
    target_resource_type: Option<String>,
    #[serde(default)]
    target_resource_location: Option<String>,
    #[serde(default)]
    criteria: Vec<CriteriaBlock>,
    #[serde(default)]
    dynamic_criteria: Option<DynamicCriteriaBlock>,
    #[serde(default)]
    application_insights_web_test_location_availability_criteria: Option<WebTestCriteriaBlock>,
    #[serde(default)]
    action: Vec<ActionBlock>,
    #[serde(default)]
    tags: Tags,
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        bail!("{} must be one of {:?}, got {:?}", field, allowed, value);
    }
    Ok(())
}

fn expand_dimensions(blocks: &[DimensionBlock]) -> Vec<MetricDimension> {
    blocks
        .iter()
        .map(|d| MetricDimension {
            name: d.name.clone(),
            operator: d.operator.clone(),
            values: d.values.clone(),
        })
        .collect()
}

fn flatten_dimensions(dimensions: &[MetricDimension]) -> Vec<DimensionBlock> {
    dimensions
        .iter()
        .map(|d| DimensionBlock {
            name: d.name.clone(),
            operator: d.operator.clone(),
            values: d.values.clone(),
        })
        .collect()
}

impl MetricAlertConfig {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("name must not be empty");
        }
        if self.scopes.is_empty() {
            bail!("at least one scope is required");
        }
        if !(0..=4).contains(&self.severity) {
            bail!("severity must be between 0 and 4, got {}", self.severity);
        }
        one_of("frequency", &self.frequency, FREQUENCIES)?;
        one_of("window_size", &self.window_size, WINDOW_SIZES)?;

        let blocks = [
            !self.criteria.is_empty(),
            self.dynamic_criteria.is_some(),
            self.application_insights_web_test_location_availability_criteria.is_some(),
        ];
        match blocks.iter().filter(|set| **set).count() {
            0 => bail!(
                "one of criteria, dynamic_criteria or application_insights_web_test_location_availability_criteria must be set"
            ),
            1 => {},
            _ => bail!(
                "only one of criteria, dynamic_criteria or application_insights_web_test_location_availability_criteria can be set"
            ),
        }

        for c in &self.criteria {
            one_of("criteria.aggregation", &c.aggregation, AGGREGATIONS)?;
            one_of("criteria.operator", &c.operator, STATIC_OPERATORS)?;
        }
        if let Some(c) = &self.dynamic_criteria {
            one_of("dynamic_criteria.aggregation", &c.aggregation, AGGREGATIONS)?;
            one_of("dynamic_criteria.operator", &c.operator, DYNAMIC_OPERATORS)?;
            one_of("dynamic_criteria.alert_sensitivity", &c.alert_sensitivity, SENSITIVITIES)?;
            if c.evaluation_failure_count > c.evaluation_total_count {
                bail!(
                    "dynamic_criteria.evaluation_failure_count ({}) must not exceed evaluation_total_count ({})",
                    c.evaluation_failure_count,
                    c.evaluation_total_count
                );
            }
        }
        Ok(())
    }

    /// Single-scope alerts without an explicit target use the legacy shape
    fn is_single_resource(&self) -> bool {
        self.scopes.len() == 1
            && self.target_resource_type.is_none()
            && self.target_resource_location.is_none()
    }

    fn expand_criteria(&self) -> MetricAlertCriteria {
        if let Some(web) = &self.application_insights_web_test_location_availability_criteria {
            return MetricAlertCriteria::WebtestLocationAvailability {
                web_test_id: web.web_test_id.clone(),
                component_id: web.component_id.clone(),
                failed_location_count: web.failed_location_count,
            };
        }

        if let Some(d) = &self.dynamic_criteria {
            let criterion = MetricCriterion::Dynamic(DynamicThresholdCriterion {
                name: "Metric1".to_string(),
                metric_name: d.metric_name.clone(),
                metric_namespace: Some(d.metric_namespace.clone()),
                time_aggregation: d.aggregation.clone(),
                operator: d.operator.clone(),
                alert_sensitivity: d.alert_sensitivity.clone(),
                failing_periods: DynamicFailingPeriods {
                    number_of_evaluation_periods: f64::from(d.evaluation_total_count),
                    min_failing_periods_to_alert: f64::from(d.evaluation_failure_count),
                },
                dimensions: expand_dimensions(&d.dimension),
            });
            return MetricAlertCriteria::MultipleResourceMultipleMetric {
                all_of: vec![criterion],
            };
        }

        let all_of = self
            .criteria
            .iter()
            .enumerate()
            .map(|(i, c)| {
                MetricCriterion::Static(StaticThresholdCriterion {
                    name: format!("Metric{}", i + 1),
                    metric_name: c.metric_name.clone(),
                    metric_namespace: Some(c.metric_namespace.clone()),
                    time_aggregation: c.aggregation.clone(),
                    operator: c.operator.clone(),
                    threshold: c.threshold,
                    dimensions: expand_dimensions(&c.dimension),
                    skip_metric_validation: Some(c.skip_metric_validation),
                })
            })
            .collect();

        if self.is_single_resource() {
            MetricAlertCriteria::SingleResourceMultipleMetric { all_of }
        } else {
            MetricAlertCriteria::MultipleResourceMultipleMetric { all_of }
        }
    }

    fn to_alert(&self) -> MetricAlert {
        MetricAlert {
            id: None,
            name: None,
            location: "global".to_string(),
            tags: Some(self.tags.clone()),
            properties: MetricAlertProperties {
                description: self.description.clone(),
                severity: self.severity,
                enabled: self.enabled,
                scopes: self.scopes.clone(),
                evaluation_frequency: self.frequency.clone(),
                window_size: self.window_size.clone(),
                target_resource_type: self.target_resource_type.clone(),
                target_resource_region: self.target_resource_location.clone(),
                criteria: self.expand_criteria(),
                auto_mitigate: Some(self.auto_mitigate),
                actions: self
                    .action
                    .iter()
                    .map(|a| MetricAlertAction {
                        action_group_id: a.action_group_id.clone(),
                        web_hook_properties: Some(a.webhook_properties.clone()),
                    })
                    .collect(),
            },
        }
    }
}

fn period_count(field: &str, value: f64) -> Result<u32> {
    if value.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&value) {
        bail!("{} must be a whole number of periods, got {}", field, value);
    }
    Ok(value as u32)
}

/// State attributes for the criteria union: one of the three blocks is populated
fn flatten_criteria(criteria: &MetricAlertCriteria) -> Result<[(&'static str, Value); 3]> {
    let mut statics = Vec::new();
    let mut dynamic = Value::Null;
    let mut web_test = Value::Null;

    match criteria {
        MetricAlertCriteria::SingleResourceMultipleMetric { all_of }
        | MetricAlertCriteria::MultipleResourceMultipleMetric { all_of } => {
            for criterion in all_of {
                match criterion {
                    MetricCriterion::Static(c) => statics.push(CriteriaBlock {
                        metric_namespace: c.metric_namespace.clone().unwrap_or_default(),
                        metric_name: c.metric_name.clone(),
                        aggregation: c.time_aggregation.clone(),
                        operator: c.operator.clone(),
                        threshold: c.threshold,
                        dimension: flatten_dimensions(&c.dimensions),
                        skip_metric_validation: c.skip_metric_validation.unwrap_or(false),
                    }),
                    MetricCriterion::Dynamic(c) => {
                        if !dynamic.is_null() {
                            bail!("the alert has more than one dynamic criterion");
                        }
                        dynamic = serde_json::to_value(DynamicCriteriaBlock {
                            metric_namespace: c.metric_namespace.clone().unwrap_or_default(),
                            metric_name: c.metric_name.clone(),
                            aggregation: c.time_aggregation.clone(),
                            operator: c.operator.clone(),
                            alert_sensitivity: c.alert_sensitivity.clone(),
                            evaluation_total_count: period_count(
                                "numberOfEvaluationPeriods",
                                c.failing_periods.number_of_evaluation_periods,
                            )?,
                            evaluation_failure_count: period_count(
                                "minFailingPeriodsToAlert",
                                c.failing_periods.min_failing_periods_to_alert,
                            )?,
                            dimension: flatten_dimensions(&c.dimensions),
                        })?;
                    },
                }
            }
        },
        MetricAlertCriteria::WebtestLocationAvailability {
            web_test_id,
            component_id,
            failed_location_count,
        } => {
            web_test = serde_json::to_value(WebTestCriteriaBlock {
                web_test_id: web_test_id.clone(),
                component_id: component_id.clone(),
                failed_location_count: *failed_location_count,
            })?;
        },
        MetricAlertCriteria::Unknown => {
            bail!("the alert uses a criteria type that is not supported");
        },
    }

    Ok([
        ("criteria", serde_json::to_value(statics)?),
        ("dynamic_criteria", dynamic),
        ("application_insights_web_test_location_availability_criteria", web_test),
    ])
}

pub struct MetricAlertHandler {
    client: AzureClient,
}

impl MetricAlertHandler {
    pub fn new(client: AzureClient) -> Self {
        Self { client }
    }

    fn api_version(&self) -> &str {
        &self.client.api_versions.insights
    }

    fn flatten(id: &MetricAlertId, alert: &MetricAlert) -> Result<Value> {
        let props = &alert.properties;
        let criteria = flatten_criteria(&props.criteria)
            .with_context(|| format!("flattening criteria of Metric Alert {:?}", id.name))?;

        let actions: Vec<ActionBlock> = props
            .actions
            .iter()
            .map(|a| ActionBlock {
                action_group_id: a.action_group_id.clone(),
                webhook_properties: a.web_hook_properties.clone().unwrap_or_default(),
            })
            .collect();

        let mut attributes = vec![
            ("id", json!(id.id())),
            ("name", json!(id.name)),
            ("resource_group_name", json!(id.resource_group)),
            ("scopes", json!(props.scopes)),
            ("description", json!(props.description)),
            ("severity", json!(props.severity)),
            ("enabled", json!(props.enabled)),
            ("auto_mitigate", json!(props.auto_mitigate.unwrap_or(true))),
            ("frequency", json!(props.evaluation_frequency)),
            ("window_size", json!(props.window_size)),
            ("target_resource_type", json!(props.target_resource_type)),
            ("target_resource_location", json!(props.target_resource_region)),
            ("action", serde_json::to_value(actions)?),
            ("tags", json!(alert.tags.clone().unwrap_or_default())),
        ];
        attributes.extend(criteria);
        Ok(state_object(attributes))
    }

    async fn put_alert(&self, id: &MetricAlertId, config: &MetricAlertConfig) -> Result<()> {
        let payload = serde_json::to_value(config.to_alert())?;
        self.client.put(&id.id(), self.api_version(), &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for MetricAlertHandler {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn create(&self, config: &Value) -> Result<Value> {
        let config: MetricAlertConfig = decode_config(TYPE_NAME, config)?;
        config.validate()?;

        let id = MetricAlertId::new(
            &self.client.subscription_id,
            &config.resource_group_name,
            &config.name,
        );
        ensure_absent(&self.client, &id.id(), self.api_version()).await?;

        tracing::info!("Creating Metric Alert {:?}", config.name);
        self.put_alert(&id, &config)
            .await
            .with_context(|| format!("creating Metric Alert {:?}", config.name))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Metric Alert {:?} was not found after creation", config.name))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>> {
        let id = MetricAlertId::parse(id)?;
        let alert: Option<MetricAlert> = get_optional(&self.client, &id.id(), self.api_version())
            .await
            .with_context(|| format!("retrieving Metric Alert {:?}", id.name))?;

        let Some(alert) = alert else {
            tracing::info!("Metric Alert {:?} was not found, removing from state", id.name);
            return Ok(None);
        };
        Self::flatten(&id, &alert).map(Some)
    }

    async fn update(&self, id: &str, config: &Value) -> Result<Value> {
        let id = MetricAlertId::parse(id)?;
        let config: MetricAlertConfig = decode_config(TYPE_NAME, config)?;
        config.validate()?;

        if config.name != id.name || config.resource_group_name != id.resource_group {
            bail!(
                "name and resource_group_name cannot be changed, the Metric Alert {:?} must be recreated",
                id.name
            );
        }

        tracing::info!("Updating Metric Alert {:?}", id.name);
        self.put_alert(&id, &config)
            .await
            .with_context(|| format!("updating Metric Alert {:?}", id.name))?;

        self.read(&id.id())
            .await?
            .with_context(|| format!("Metric Alert {:?} was not found after update", id.name))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = MetricAlertId::parse(id)?;
        tracing::info!("Deleting Metric Alert {:?}", id.name);
        self.client
            .delete(&id.id(), self.api_version())
            .await
            .with_context(|| format!("deleting Metric Alert {:?}", id.name))
    }

    fn import(&self, id: &str) -> Result<String> {
        Ok(MetricAlertId::parse(id)?.id())
    }

    async fn list(&self) -> Result<Vec<Value>> {
        let path = format!(
            "/subscriptions/{}/providers/Microsoft.Insights/metricAlerts",
            self.client.subscription_id
        );
        let alerts: Vec<MetricAlert> = self
            .client
            .list(&path, self.api_version())
            .list_all()
            .await
            .context("listing Metric Alerts")?;

        let mut states = Vec::with_capacity(alerts.len());
        for alert in &alerts {
            let raw = alert.id.as_deref().context("Metric Alert in list response has no id")?;
            let id = MetricAlertId::parse_insensitively(raw)?;
            match Self::flatten(&id, alert) {
                Ok(state) => states.push(state),
                Err(e) => tracing::warn!("Skipping Metric Alert {:?}: {:#}", id.name, e),
            }
        }
        Ok(states)
    }
}
