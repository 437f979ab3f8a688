//! # opcbook-core
//!
//! Core data structures shared by the opcbook crates.
//!
//! This crate provides the pieces of the workbook model that do not depend on
//! the package container:
//! - [`validate_sheet_name`] and friends - sheet naming rules
//! - [`CellAddress`] and [`CellRange`] - A1 addressing and print-area references
//! - [`DefinedName`] and [`NamedRangeCollection`] - named ranges
//! - [`SheetData`] - the raw row/column content of a worksheet
//!
//! ## Example
//!
//! ```rust
//! use opcbook_core::{print_area_reference, validate_sheet_name};
//!
//! validate_sheet_name("Data").unwrap();
//! assert!(validate_sheet_name("Q1/Q2").is_err());
//!
//! assert_eq!(print_area_reference("Sheet1", 2, 3, 2, 4), "'Sheet1'!$C$3:$E$4");
//! ```

pub mod error;
pub mod named_range;
pub mod reference;
pub mod sheet_data;
pub mod sheet_name;

pub use error::{Error, Result};
pub use named_range::{
    validate_defined_name, DefinedName, NameScope, NamedRangeCollection, BUILTIN_PRINT_AREA,
};
pub use reference::{print_area_reference, CellAddress, CellRange};
pub use sheet_data::{ColumnData, RawCell, Row, SheetData};
pub use sheet_name::{is_unique_against, unique_clone_name, validate_sheet_name};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name, in characters
pub const MAX_SHEET_NAME_LEN: usize = 31;
