//! Errors of the file-level helpers

use thiserror::Error;

/// Result type for [`crate::WorkbookExt`]
pub type BookResult<T> = std::result::Result<T, BookError>;

/// Errors raised while opening or saving a workbook file
#[derive(Debug, Error)]
pub enum BookError {
    /// The container could not be read or written
    #[error("Package error: {0}")]
    Package(#[from] opcbook_opc::OpcError),

    /// The workbook could not be assembled or committed
    #[error("Workbook error: {0}")]
    Workbook(#[from] opcbook_xlsx::XlsxError),

    /// The file extension is not one of the spreadsheet package formats
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}
