//! Workbook error types

use thiserror::Error;

/// Result type for workbook operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur while assembling or committing a workbook
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Package error
    #[error("Package error: {0}")]
    Opc(#[from] opcbook_opc::OpcError),

    /// Invalid argument from the caller
    #[error("{0}")]
    Core(#[from] opcbook_core::Error),

    /// The package does not hold a usable workbook
    #[error("Invalid workbook structure: {0}")]
    Structural(String),

    /// Every custom number format id is taken
    #[error("No free number format id left")]
    NumberFormatsExhausted,

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}
