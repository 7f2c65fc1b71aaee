//! tfarm - Azure Resource Manager provider core
//!
//! Typed resource IDs, a retrying ARM REST client with pagination and
//! long-running-operation polling, and lifecycle handlers for a set of
//! Terraform resource types.

pub mod azure;
pub mod config;
pub mod resource;
pub mod resourceids;
pub mod state;
pub mod storage;
