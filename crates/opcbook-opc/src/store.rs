//! Capability traits over a package
//!
//! The cloner and the workbook layer only need to create, read and write
//! parts and to walk or extend the relationship graph. These traits name
//! exactly that surface.

use std::fmt;

use crate::error::OpcResult;
use crate::part::{Part, PartReader, PartWriter};
use crate::relationship::{Relationship, RelationshipSet, TargetMode};

/// Source of a relationship: the package root or a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipOwner<'a> {
    /// The package itself
    Package,
    /// A part, by normalized name
    Part(&'a str),
}

impl<'a> RelationshipOwner<'a> {
    /// Part name, or `None` for the package root
    pub fn part_name(&self) -> Option<&'a str> {
        match self {
            RelationshipOwner::Package => None,
            RelationshipOwner::Part(name) => Some(name),
        }
    }
}

impl fmt::Display for RelationshipOwner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipOwner::Package => write!(f, "package root"),
            RelationshipOwner::Part(name) => write!(f, "/{name}"),
        }
    }
}

/// Named parts with byte streams
pub trait PartStore {
    /// Create an empty part. Fails if the name is taken.
    fn create_part(&mut self, name: &str, content_type: &str) -> OpcResult<&mut Part>;

    /// Look up a part
    fn part(&self, name: &str) -> Option<&Part>;

    /// Whether a part exists
    fn has_part(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    /// Open a part's content for reading
    fn open_read(&self, name: &str) -> OpcResult<PartReader<'_>>;

    /// Open a part's content for replacement
    fn open_write(&mut self, name: &str) -> OpcResult<PartWriter<'_>>;

    /// Names of all parts, sorted
    fn part_names(&self) -> Vec<String>;
}

/// Typed edges between parts
pub trait RelationshipGraph {
    /// Relationships owned by `owner`
    fn relationships_of(&self, owner: RelationshipOwner<'_>) -> OpcResult<&RelationshipSet>;

    /// Add a relationship from `owner`.
    ///
    /// For internal relationships `target` is a part name; for external ones
    /// it is an opaque URI. Without `explicit_id` the next free `rIdN` is used.
    fn add_relationship(
        &mut self,
        owner: RelationshipOwner<'_>,
        target: &str,
        mode: TargetMode,
        rel_type: &str,
        explicit_id: Option<&str>,
    ) -> OpcResult<Relationship>;

    /// Store a relationship exactly as given, target text included.
    /// Fails if `owner` already has a relationship with the same id.
    fn insert_relationship(
        &mut self,
        owner: RelationshipOwner<'_>,
        rel: Relationship,
    ) -> OpcResult<()>;
}
