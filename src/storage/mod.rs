//! Storage account helpers
//!
//! - [`cache`] - account name → resource group / access key cache
//! - [`shared_key`] - Shared Key request signing
//! - [`blob`] - blob data-plane client for container properties

pub mod blob;
pub mod cache;
pub mod shared_key;

pub use blob::{BlobDataClient, ContainerDataProperties};
pub use cache::{AccountCache, AccountDetails};
pub use shared_key::SharedKeySigner;
