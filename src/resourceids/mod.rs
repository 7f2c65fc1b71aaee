//! Typed ARM resource IDs
//!
//! Every ARM resource is addressed by a slash-delimited path such as
//! `/subscriptions/{s}/resourceGroups/{g}/providers/Microsoft.Storage/storageAccounts/{a}`.
//! This module turns those paths into typed structs and back.
//!
//! # Module Structure
//!
//! - [`segments`] - the positional segment grammar and the generic parser
//! - [`ids`] - one struct per supported resource type
//!
//! # Example
//!
//! ```ignore
//! use tfarm::resourceids::{ResourceId, StorageContainerId};
//!
//! let id = StorageContainerId::parse(
//!     "/subscriptions/s/resourceGroups/g/providers/Microsoft.Storage/storageAccounts/a/blobServices/default/containers/c",
//! )?;
//! assert_eq!(id.account_name, "a");
//! ```

pub mod ids;
pub mod segments;

pub use ids::*;
pub use segments::{example_id, IdParser, ParsedId, ResourceIdError, Segment, SegmentKind};

/// Behaviour shared by all typed resource IDs
pub trait ResourceId: Sized {
    /// Human readable type name used in error messages, e.g. "Storage Account"
    const KIND: &'static str;

    /// Ordered segments making up this ID
    fn segments() -> Vec<Segment>;

    /// Build the typed ID from captured segment values
    fn from_parsed(parsed: &ParsedId) -> Self;

    /// Format the canonical ID string
    fn id(&self) -> String;

    /// Parse an ID, matching fixed segments exactly
    fn parse(input: &str) -> Result<Self, ResourceIdError> {
        let parsed = IdParser::new(Self::KIND, Self::segments()).parse(input)?;
        Ok(Self::from_parsed(&parsed))
    }

    /// Parse an ID whose fixed segments may differ in case, as returned by some ARM APIs
    fn parse_insensitively(input: &str) -> Result<Self, ResourceIdError> {
        let parsed = IdParser::new(Self::KIND, Self::segments())
            .insensitively()
            .parse(input)?;
        Ok(Self::from_parsed(&parsed))
    }

    /// An example ID for this type, used in validation messages
    fn example() -> String {
        example_id(&Self::segments())
    }
}

/// IDs that live inside a resource group
pub trait ResourceGroupScoped {
    fn subscription_id(&self) -> &str;

    fn resource_group(&self) -> &str;

    /// The ID of the enclosing resource group
    fn resource_group_id(&self) -> ResourceGroupId {
        ResourceGroupId::new(self.subscription_id(), self.resource_group())
    }
}
