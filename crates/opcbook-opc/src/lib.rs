//! # opcbook-opc
//!
//! Open Packaging Conventions container model for opcbook.
//!
//! A [`Package`] is a ZIP container of named parts linked by typed
//! relationships. The relationship graph may contain shared targets and
//! cycles; parts are kept in a name-keyed arena and relationships refer to
//! them by name.

pub mod clone;
pub mod content_types;
pub mod error;
pub mod package;
pub mod part;
pub mod path;
pub mod properties;
pub mod relationship;
pub mod store;

pub use clone::{clone_into, PackageCloner};
pub use content_types::ContentTypes;
pub use error::{OpcError, OpcResult};
pub use package::{Package, PackageAccess, DEFAULT_CORE_PROPERTIES_PART};
pub use part::{Part, PartReader, PartWriter};
pub use properties::PackageProperties;
pub use relationship::{rel_types, Relationship, RelationshipSet, TargetMode};
pub use store::{PartStore, RelationshipGraph, RelationshipOwner};
