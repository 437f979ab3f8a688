//! Package error types

use thiserror::Error;

/// Result type for package operations
pub type OpcResult<T> = std::result::Result<T, OpcError>;

/// Errors that can occur while reading, editing or writing a package
#[derive(Debug, Error)]
pub enum OpcError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed container or relationship data
    #[error("Invalid package: {0}")]
    InvalidFormat(String),

    /// Part name that cannot be normalized
    #[error("Invalid part name: {0:?}")]
    InvalidPartName(String),

    /// A part that should exist does not
    #[error("Missing part: {0}")]
    MissingPart(String),

    /// A part with this name already exists
    #[error("Part already exists: {0}")]
    DuplicatePart(String),

    /// No officeDocument relationship at the package root
    #[error("Package has no core document part")]
    MissingCorePart,

    /// Relationship ids are unique per source
    #[error("Relationship id '{id}' already used by {owner}")]
    DuplicateRelationshipId { owner: String, id: String },

    /// The package was opened read-only
    #[error("Package is read-only; clone it to obtain a writable copy")]
    ReadOnly,

    /// Any failure while cloning a package, wrapped once
    #[error("Failed to clone package: {source}")]
    Clone {
        #[source]
        source: Box<OpcError>,
    },
}
