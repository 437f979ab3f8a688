//! # opcbook-xlsx
//!
//! Spreadsheet workbook assembler over OPC packages.
//!
//! [`XlsxWorkbook`] loads a package into sheets, a shared-string table, a
//! style table and defined names, and writes changes back on save. Parts
//! the assembler does not understand are carried through untouched.

pub mod error;
pub mod relation;
pub mod shared_strings;
pub mod styles;
pub mod workbook;
pub mod workbook_xml;
pub mod worksheet;

pub use error::{XlsxError, XlsxResult};
pub use relation::{PartRole, PictureType, XlsxRelation};
pub use shared_strings::SharedStringTable;
pub use styles::{DataFormat, StyleTable};
pub use workbook::{EmbeddedObject, XlsxWorkbook, DEFAULT_CREATOR};
pub use workbook_xml::{SheetEntry, SheetState, WorkbookXml};
pub use worksheet::{Hyperlink, Worksheet};
