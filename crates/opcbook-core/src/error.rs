//! Error types for opcbook-core
//!
//! Every variant here is a caller error: it is reported by the call that
//! violates the rule, before anything is mutated.

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in opcbook-core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Sheet index out of bounds
    #[error("Sheet index {0} out of bounds (count: {1})")]
    SheetOutOfBounds(usize, usize),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Invalid sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Duplicate sheet name
    #[error("The workbook already contains a sheet named '{0}'")]
    DuplicateSheetName(String),

    /// Invalid defined name
    #[error("Invalid named range: {0}")]
    InvalidName(String),

    /// Defined name already present in the same scope
    #[error("Named range '{0}' already exists in this scope")]
    DuplicateName(String),

    /// Named range index out of bounds
    #[error("Named range index {0} out of bounds (count: {1})")]
    NameOutOfBounds(usize, usize),
}
