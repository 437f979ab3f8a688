//! # opcbook
//!
//! A Rust library for OPC packages and the spreadsheet workbooks stored in
//! them.
//!
//! ## Features
//!
//! - Read and write ZIP-based OPC packages with their relationship graph
//! - Deep-copy a package, following relationships, into a writable one
//! - Load a workbook into sheets, shared strings, styles and defined names
//! - Create, clone, remove, rename and reorder sheets
//! - Print areas and number formats
//!
//! ## Example
//!
//! ```rust
//! use opcbook::prelude::*;
//! use std::io::Cursor;
//!
//! let mut workbook = XlsxWorkbook::new().unwrap();
//! workbook.create_sheet("Data").unwrap();
//! workbook.set_print_area_range(0, 0, 9, 0, 3).unwrap();
//!
//! let mut buf = Cursor::new(Vec::new());
//! workbook.write(&mut buf).unwrap();
//!
//! let package = Package::from_reader(Cursor::new(buf.into_inner())).unwrap();
//! let loaded = XlsxWorkbook::load(package).unwrap();
//! assert_eq!(loaded.print_area(0), Some("'Data'!$A$1:$D$10"));
//! ```

pub mod error;
pub mod prelude;

pub use error::{BookError, BookResult};

// Re-export core types
pub use opcbook_core::{
    is_unique_against, print_area_reference, unique_clone_name, validate_sheet_name, CellAddress,
    CellRange, ColumnData, DefinedName, Error, NameScope, NamedRangeCollection, RawCell, Result,
    Row, SheetData, BUILTIN_PRINT_AREA, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export package types
pub use opcbook_opc::{
    clone_into, rel_types, OpcError, OpcResult, Package, PackageAccess, PackageCloner,
    PackageProperties, Part, PartStore, Relationship, RelationshipGraph, RelationshipOwner,
    RelationshipSet, TargetMode,
};

// Re-export workbook types
pub use opcbook_xlsx::{
    DataFormat, EmbeddedObject, Hyperlink, PictureType, SheetState, SharedStringTable,
    StyleTable, Worksheet, XlsxError, XlsxResult, XlsxWorkbook, DEFAULT_CREATOR,
};

use std::io::{Read, Seek};
use std::path::Path;

const PACKAGE_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xltx", "xltm"];

/// Extension trait for XlsxWorkbook to add file I/O
pub trait WorkbookExt: Sized {
    /// Open a workbook from a file
    fn open_file<P: AsRef<Path>>(path: P) -> BookResult<Self>;

    /// Read a workbook from a stream. The stream is never written to.
    fn read<R: Read + Seek>(reader: R) -> BookResult<Self>;

    /// Save the workbook to a file
    fn save_file<P: AsRef<Path>>(&mut self, path: P) -> BookResult<()>;
}

impl WorkbookExt for XlsxWorkbook {
    fn open_file<P: AsRef<Path>>(path: P) -> BookResult<Self> {
        let path = path.as_ref();
        check_extension(path)?;
        let package = Package::open(path)?;
        Ok(XlsxWorkbook::load(package)?)
    }

    fn read<R: Read + Seek>(reader: R) -> BookResult<Self> {
        let package = Package::from_reader(reader)?;
        Ok(XlsxWorkbook::load(package)?)
    }

    fn save_file<P: AsRef<Path>>(&mut self, path: P) -> BookResult<()> {
        let path = path.as_ref();
        check_extension(path)?;
        Ok(self.write_file(path)?)
    }
}

fn check_extension(path: &Path) -> BookResult<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some(ext) if PACKAGE_EXTENSIONS.contains(&ext) => Ok(()),
        _ => Err(BookError::UnsupportedFormat(path.display().to_string())),
    }
}
