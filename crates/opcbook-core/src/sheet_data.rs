//! Row and column content of a worksheet
//!
//! Cell values are kept exactly as they appear in the worksheet part: the
//! `t` type attribute, the `s` style index and the text of `<v>`/`<f>`.
//! Interpreting them (shared-string lookups, number formats, dates) is the
//! caller's business.

use std::collections::BTreeMap;

use crate::reference::{CellAddress, CellRange};

/// One `<c>` element
#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    /// Column index (0-based)
    pub column: u16,
    /// Cell type attribute (`s`, `str`, `b`, `e`, `n`, `inlineStr`)
    pub cell_type: Option<String>,
    /// Style index into the workbook's cellXfs
    pub style_index: Option<u32>,
    /// Raw value text; for `inlineStr` cells, the inline text
    pub value: Option<String>,
    /// Formula text without a leading `=`. Cells that follow a shared
    /// formula carry an empty text.
    pub formula: Option<String>,
    /// Attributes of `<f>` (`t`, `ref`, `si`, ...) in document order
    pub formula_attributes: Vec<(String, String)>,
}

impl RawCell {
    /// Create an empty cell in the given column
    pub fn new(column: u16) -> Self {
        Self {
            column,
            cell_type: None,
            style_index: None,
            value: None,
            formula: None,
            formula_attributes: Vec::new(),
        }
    }

    /// Set the raw value and type
    pub fn with_value(mut self, value: impl Into<String>, cell_type: Option<&str>) -> Self {
        self.value = Some(value.into());
        self.cell_type = cell_type.map(str::to_string);
        self
    }

    /// Set the formula text
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// The `t` attribute of the formula, `shared` or `array` for formulas
    /// spanning several cells
    pub fn formula_kind(&self) -> Option<&str> {
        self.formula_attributes
            .iter()
            .find(|(key, _)| key == "t")
            .map(|(_, value)| value.as_str())
    }
}

/// Row metadata plus its cells
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row index (0-based)
    pub index: u32,
    /// Custom height (None = default)
    pub height: Option<f64>,
    /// Height was set explicitly
    pub custom_height: bool,
    /// Row is hidden
    pub hidden: bool,
    /// Row-level style index (None = no row style)
    pub style_index: Option<u32>,
    /// Cells keyed by column
    pub cells: BTreeMap<u16, RawCell>,
}

impl Row {
    /// Create a new row with default settings
    pub fn new(index: u32) -> Self {
        Self {
            index,
            height: None,
            custom_height: false,
            hidden: false,
            style_index: None,
            cells: BTreeMap::new(),
        }
    }

    /// Get a cell by column index
    pub fn cell(&self, col: u16) -> Option<&RawCell> {
        self.cells.get(&col)
    }

    /// Insert or replace a cell
    pub fn set_cell(&mut self, cell: RawCell) {
        self.cells.insert(cell.column, cell);
    }
}

/// Column metadata for a run of columns (`<col min max>`)
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    /// Start column index (0-based)
    pub min: u16,
    /// End column index (inclusive)
    pub max: u16,
    /// Width
    pub width: Option<f64>,
    /// Width was set explicitly
    pub custom_width: bool,
    /// Hidden
    pub hidden: bool,
    /// Outline level
    pub outline_level: u8,
    /// Style index
    pub style_index: Option<u32>,
    /// Best fit
    pub best_fit: bool,
}

impl ColumnData {
    /// Create column data for a range of columns
    pub fn range(min: u16, max: u16) -> Self {
        Self {
            min,
            max,
            width: None,
            custom_width: false,
            hidden: false,
            outline_level: 0,
            style_index: None,
            best_fit: false,
        }
    }

    /// Set width
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self.custom_width = true;
        self
    }

    /// Set hidden
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

/// The row/column structures of one worksheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    rows: BTreeMap<u32, Row>,
    columns: Vec<ColumnData>,
}

impl SheetData {
    /// Create empty sheet content
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a row by index
    pub fn row(&self, index: u32) -> Option<&Row> {
        self.rows.get(&index)
    }

    /// Get a row by index, creating it if needed
    pub fn row_mut(&mut self, index: u32) -> &mut Row {
        self.rows.entry(index).or_insert_with(|| Row::new(index))
    }

    /// Insert or replace a whole row
    pub fn insert_row(&mut self, row: Row) {
        self.rows.insert(row.index, row);
    }

    /// Remove a row
    pub fn remove_row(&mut self, index: u32) -> Option<Row> {
        self.rows.remove(&index)
    }

    /// Iterate rows in ascending order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Number of rows present
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column definitions in document order
    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    /// Append a column definition
    pub fn push_column(&mut self, column: ColumnData) {
        self.columns.push(column);
    }

    /// Get a cell by address
    pub fn cell(&self, row: u32, col: u16) -> Option<&RawCell> {
        self.rows.get(&row).and_then(|r| r.cell(col))
    }

    /// Set a cell, creating its row when needed
    pub fn set_cell(&mut self, row: u32, cell: RawCell) {
        self.row_mut(row).set_cell(cell);
    }

    /// Whether there are no rows and no column definitions
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    /// The smallest range covering every cell, if there are any
    pub fn used_range(&self) -> Option<CellRange> {
        let mut bounds: Option<(u32, u16, u32, u16)> = None;
        for row in self.rows.values() {
            let (first, last) = match (row.cells.keys().next(), row.cells.keys().next_back()) {
                (Some(first), Some(last)) => (*first, *last),
                _ => continue,
            };
            bounds = Some(match bounds {
                None => (row.index, first, row.index, last),
                Some((r0, c0, r1, c1)) => (
                    r0.min(row.index),
                    c0.min(first),
                    r1.max(row.index),
                    c1.max(last),
                ),
            });
        }
        bounds.map(|(r0, c0, r1, c1)| {
            CellRange::new(CellAddress::new(r0, c0), CellAddress::new(r1, c1))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_cell() {
        let mut data = SheetData::new();
        data.set_cell(4, RawCell::new(2).with_value("42", None));

        assert_eq!(data.cell(4, 2).unwrap().value.as_deref(), Some("42"));
        assert!(data.cell(4, 3).is_none());
        assert_eq!(data.row_count(), 1);
    }

    #[test]
    fn test_used_range() {
        let mut data = SheetData::new();
        assert!(data.used_range().is_none());

        data.set_cell(2, RawCell::new(4).with_value("1", None));
        data.set_cell(0, RawCell::new(1).with_value("0", Some("s")));
        // a row with only formatting does not widen the range
        data.row_mut(10).hidden = true;

        assert_eq!(data.used_range().unwrap().to_a1_string(), "B1:E3");
    }

    #[test]
    fn test_clone_is_deep() {
        let mut data = SheetData::new();
        data.set_cell(0, RawCell::new(0).with_value("a", Some("str")));
        let copy = data.clone();
        data.set_cell(0, RawCell::new(0).with_value("b", Some("str")));

        assert_eq!(copy.cell(0, 0).unwrap().value.as_deref(), Some("a"));
    }
}
