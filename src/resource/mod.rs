//! Resource lifecycle handlers
//!
//! Each supported Terraform resource type has a handler implementing
//! [`ResourceHandler`]: it decodes configuration into a typed struct,
//! builds the ARM payload, calls the client and encodes the response back
//! into a state object.
//!
//! # Architecture
//!
//! - [`handler`] - the lifecycle trait and shared helpers
//! - [`registry`] - looks handlers up by type name
//! - one module per resource type
//!
//! # Example
//!
//! ```ignore
//! use tfarm::resource::Registry;
//!
//! async fn create_group(registry: &Registry) -> anyhow::Result<serde_json::Value> {
//!     let handler = registry.get("azurerm_resource_group").unwrap();
//!     handler
//!         .create(&serde_json::json!({"name": "rg1", "location": "westeurope"}))
//!         .await
//! }
//! ```

pub mod handler;
pub mod metric_alert;
pub mod registry;
pub mod resource_group;
pub mod storage_account;
pub mod storage_container;

pub use handler::{ResourceExists, ResourceHandler};
pub use registry::Registry;

/// Every built-in resource type
pub const TYPE_NAMES: &[&str] = &[
    metric_alert::TYPE_NAME,
    resource_group::TYPE_NAME,
    storage_account::TYPE_NAME,
    storage_container::TYPE_NAME,
];
