//! Azure Resource Manager API interaction module
//!
//! This module provides the core functionality for talking to ARM:
//! authentication, the retrying HTTP transport, pagination and
//! long-running-operation polling.
//!
//! # Module Structure
//!
//! - [`auth`] - bearer token sources and token caching
//! - [`client`] - main client combining auth, transport and LRO polling
//! - [`error`] - the ARM error envelope and client error type
//! - [`http`] - HTTP transport with retry on transient failures
//! - [`lro`] - long-running-operation polling strategies
//! - [`models`] - request/response payloads
//! - [`pager`] - `nextLink` pagination
//!
//! # Example
//!
//! ```ignore
//! use tfarm::azure::client::AzureClient;
//! use tfarm::azure::models::StorageAccount;
//!
//! async fn example(client: &AzureClient) -> anyhow::Result<()> {
//!     let accounts: Vec<StorageAccount> = client
//!         .list(&format!("/subscriptions/{}/providers/Microsoft.Storage/storageAccounts", client.subscription_id), "2023-01-01")
//!         .list_all()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod lro;
pub mod models;
pub mod pager;

pub use client::AzureClient;
pub use error::{format_azure_error, is_not_found, ApiError};
