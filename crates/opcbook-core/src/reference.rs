//! A1 references
//!
//! Worksheet parts address cells as `B7`. Defined names and print areas use
//! the anchored form `$B$7`, and ranges join two corners with `:`.

use std::fmt;

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// One cell position, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub col: u16,
    /// `$` before the row number
    pub fixed_row: bool,
    /// `$` before the column letters
    pub fixed_col: bool,
}

impl CellAddress {
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            fixed_row: false,
            fixed_col: false,
        }
    }

    /// Position written as `$C$3`
    pub fn anchored(row: u32, col: u16) -> Self {
        Self {
            fixed_row: true,
            fixed_col: true,
            ..Self::new(row, col)
        }
    }

    /// Read `C3`, `$C$3` or a mixed form such as `C$3`
    ///
    /// ```
    /// use opcbook_core::CellAddress;
    ///
    /// let cell = CellAddress::parse("$B7").unwrap();
    /// assert_eq!((cell.row, cell.col), (6, 1));
    /// assert!(cell.fixed_col && !cell.fixed_row);
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(text.to_string());

        let (fixed_col, rest) = strip_anchor(text.trim());
        let split = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .ok_or_else(invalid)?;
        let (letters, rest) = rest.split_at(split);
        let (fixed_row, digits) = strip_anchor(rest);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let col = column_index(letters).ok_or_else(invalid)?;
        let row = digits
            .parse::<u32>()
            .ok()
            .filter(|row| (1..=MAX_ROWS).contains(row))
            .ok_or_else(invalid)?;

        Ok(Self {
            row: row - 1,
            col,
            fixed_row,
            fixed_col,
        })
    }

    pub fn to_a1_string(&self) -> String {
        let col_anchor = if self.fixed_col { "$" } else { "" };
        let row_anchor = if self.fixed_row { "$" } else { "" };
        format!(
            "{col_anchor}{}{row_anchor}{}",
            column_name(self.col),
            self.row + 1
        )
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

fn strip_anchor(text: &str) -> (bool, &str) {
    match text.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, text),
    }
}

/// `A` is 0, `AA` is 26. `None` past the last worksheet column.
fn column_index(letters: &str) -> Option<u16> {
    if letters.is_empty() {
        return None;
    }
    let number = letters.bytes().try_fold(0u32, |acc, b| {
        let digit = u32::from(b.to_ascii_uppercase().checked_sub(b'A')?) + 1;
        Some(acc * 26 + digit).filter(|n| *n <= u32::from(MAX_COLS))
    })?;
    u16::try_from(number - 1).ok()
}

fn column_name(col: u16) -> String {
    let mut letters = Vec::new();
    let mut n = u32::from(col) + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// A rectangle of cells, top-left corner first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Order the corners so `start` is the top-left one
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        let (mut start, mut end) = (a, b);
        if start.row > end.row {
            std::mem::swap(&mut start.row, &mut end.row);
        }
        if start.col > end.col {
            std::mem::swap(&mut start.col, &mut end.col);
        }
        Self { start, end }
    }

    /// Both corners written as `$C$3`
    pub fn anchored(first_row: u32, first_col: u16, last_row: u32, last_col: u16) -> Self {
        Self::new(
            CellAddress::anchored(first_row, first_col),
            CellAddress::anchored(last_row, last_col),
        )
    }

    /// `C3:E4`. A single-cell range still writes both corners.
    pub fn to_a1_string(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

/// Reference stored in a sheet's built-in print area name, such as
/// `'Sheet1'!$C$3:$E$4`.
///
/// Bounds are 0-based and inclusive. The sheet name is always quoted.
pub fn print_area_reference(
    sheet_name: &str,
    start_row: u32,
    end_row: u32,
    start_col: u16,
    end_col: u16,
) -> String {
    let range = CellRange::anchored(start_row, start_col, end_row, end_col);
    format!("'{}'!{range}", sheet_name.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        for (col, name) in [(0, "A"), (25, "Z"), (26, "AA"), (701, "ZZ"), (702, "AAA"), (16383, "XFD")] {
            assert_eq!(column_name(col), name);
            assert_eq!(column_index(name), Some(col));
        }
        assert_eq!(column_index("xfd"), Some(16383));
        assert_eq!(column_index("XFE"), None);
        assert_eq!(column_index(""), None);
    }

    #[test]
    fn test_parse_forms() {
        let cell = CellAddress::parse("C3").unwrap();
        assert_eq!(cell, CellAddress::new(2, 2));
        assert_eq!(CellAddress::parse("$C$3").unwrap(), CellAddress::anchored(2, 2));
        assert_eq!(CellAddress::parse("C$3").unwrap().to_a1_string(), "C$3");

        for bad in ["", "A0", "1A", "A", "$", "A1B", "A-1", "A1048577", "XFE1"] {
            assert!(CellAddress::parse(bad).is_err(), "{bad}");
        }
        assert!(CellAddress::parse("XFD1048576").is_ok());
    }

    #[test]
    fn test_range_corners_are_ordered() {
        let range = CellRange::new(CellAddress::new(3, 4), CellAddress::new(2, 2));
        assert_eq!(range.to_a1_string(), "C3:E4");
    }

    #[test]
    fn test_print_area_reference() {
        assert_eq!(
            print_area_reference("Sheet1", 2, 3, 2, 4),
            "'Sheet1'!$C$3:$E$4"
        );
        assert_eq!(
            print_area_reference("Bob's Data", 0, 0, 0, 0),
            "'Bob''s Data'!$A$1:$A$1"
        );
    }
}
