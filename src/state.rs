//! Local state file
//!
//! Maps resource addresses (`<type>.<name>`) to the ARM ID and the
//! attributes last read back from Azure.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_STATE_FILE: &str = "tfarm.tfstate.json";

/// One managed resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceState {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    pub version: u32,
    /// Incremented on every write
    pub serial: u64,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// `<type>.<name>`
pub fn address(resource_type: &str, name: &str) -> String {
    format!("{}.{}", resource_type, name)
}

/// Split an address into type and name
pub fn split_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once('.') {
        Some((ty, name)) if !ty.is_empty() && !name.is_empty() => Ok((ty, name)),
        _ => bail!("invalid resource address {:?}, expected <type>.<name>", address),
    }
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            resources: BTreeMap::new(),
        }
    }

    /// Load from `path`; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No state file at {:?}, starting empty", path);
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading state file {:?}", path))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {:?}", path))?;

        if state.version > Self::CURRENT_VERSION {
            bail!(
                "state file {:?} has version {}, newer than supported version {}",
                path,
                state.version,
                Self::CURRENT_VERSION
            );
        }
        Ok(state)
    }

    /// Write as pretty JSON, incrementing the serial
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.serial += 1;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing state file {:?}", path))?;
        tracing::debug!("Saved state serial {} to {:?}", self.serial, path);
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    pub fn upsert(&mut self, address: &str, resource: ResourceState) {
        self.resources.insert(address.to_string(), resource);
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        self.resources.remove(address)
    }
}
