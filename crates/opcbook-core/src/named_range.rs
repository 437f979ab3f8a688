//! Named range definitions
//!
//! A defined name gives a meaningful label to a cell, a range or a constant.
//! Names are either workbook-wide or scoped to one sheet, identified by the
//! sheet's position in the workbook (`localSheetId`). Reserved `_xlnm.*`
//! names such as the print area are always sheet scoped.
//!
//! # Example
//!
//! ```text
//! workbook.create_name(DefinedName::workbook_scope("TaxRate", "Sheet1!$B$1"))?;
//! =Price * TaxRate
//! ```

use crate::error::{Error, Result};
use crate::reference::CellAddress;

/// Built-in name holding a sheet's print area
pub const BUILTIN_PRINT_AREA: &str = "_xlnm.Print_Area";

/// Scope of a named range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameScope {
    /// Available throughout the workbook (global)
    Workbook,
    /// Scoped to the sheet at this position
    Sheet(usize),
}

/// A named range definition, one `<definedName>` of the workbook part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    /// The name (e.g., "SalesData", "_xlnm.Print_Area")
    pub name: String,
    /// Position of the owning sheet for sheet-scoped names
    pub local_sheet_id: Option<u32>,
    /// What the name refers to, without a leading `=`
    pub refers_to: String,
    /// Optional comment/description
    pub comment: Option<String>,
    /// Whether this name is hidden from the UI
    pub hidden: bool,
}

impl DefinedName {
    /// Create a new named range
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            local_sheet_id: match scope {
                NameScope::Workbook => None,
                NameScope::Sheet(idx) => Some(idx as u32),
            },
            refers_to: refers_to.into(),
            comment: None,
            hidden: false,
        }
    }

    /// Create a workbook-scoped named range
    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    /// Create a sheet-scoped named range
    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet_index: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet_index))
    }

    /// Set a comment for this named range
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Mark this named range as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Scope derived from `local_sheet_id`
    pub fn scope(&self) -> NameScope {
        match self.local_sheet_id {
            Some(idx) => NameScope::Sheet(idx as usize),
            None => NameScope::Workbook,
        }
    }

    /// Whether this is one of the reserved `_xlnm.*` names
    pub fn is_builtin(&self) -> bool {
        has_builtin_prefix(&self.name)
    }

    fn matches(&self, name: &str, scope: NameScope) -> bool {
        self.scope() == scope && self.name.eq_ignore_ascii_case(name)
    }
}

fn has_builtin_prefix(name: &str) -> bool {
    name.len() > 6
        && name
            .get(..6)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("_xlnm."))
}

/// Check a user-supplied defined name.
///
/// Built-in `_xlnm.*` names are accepted as is. Other names must start with
/// a letter, `_` or `\`, contain only letters, digits, `_`, `.` and `\`, and
/// must not read as a cell reference.
pub fn validate_defined_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("name cannot be empty".into()));
    }
    if has_builtin_prefix(name) {
        return Ok(());
    }
    if name.chars().count() > 255 {
        return Err(Error::InvalidName(format!("'{}' is too long", name)));
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !(first.is_alphabetic() || first == '_' || first == '\\') {
            return Err(Error::InvalidName(format!(
                "'{}' must start with a letter, '_' or '\\'",
                name
            )));
        }
    }
    if let Some(c) = chars.find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '\\'))) {
        return Err(Error::InvalidName(format!(
            "invalid char ({}) in '{}'",
            c, name
        )));
    }
    if CellAddress::parse(name).is_ok() {
        return Err(Error::InvalidName(format!(
            "'{}' looks like a cell reference",
            name
        )));
    }

    Ok(())
}

/// Ordered collection of defined names.
///
/// Order is preserved so a loaded workbook writes its names back in the
/// order it read them.
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    names: Vec<DefinedName>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a new named range, validating the name and rejecting a
    /// duplicate in the same scope.
    pub fn define(&mut self, range: DefinedName) -> Result<usize> {
        validate_defined_name(&range.name)?;
        if self.contains(&range.name, range.scope()) {
            return Err(Error::DuplicateName(range.name));
        }
        self.names.push(range);
        Ok(self.names.len() - 1)
    }

    /// Append a name read from an existing document without validation
    pub fn push_loaded(&mut self, range: DefinedName) {
        self.names.push(range);
    }

    /// Get a named range by name and current sheet context
    ///
    /// Sheet-scoped names for `current_sheet` win over workbook-scoped ones.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&DefinedName> {
        self.get_exact(name, NameScope::Sheet(current_sheet))
            .or_else(|| self.get_exact(name, NameScope::Workbook))
    }

    /// Get a named range by exact scope
    pub fn get_exact(&self, name: &str, scope: NameScope) -> Option<&DefinedName> {
        self.names.iter().find(|n| n.matches(name, scope))
    }

    /// Get a mutable named range by exact scope
    pub fn get_exact_mut(&mut self, name: &str, scope: NameScope) -> Option<&mut DefinedName> {
        self.names.iter_mut().find(|n| n.matches(name, scope))
    }

    /// Get a named range by position
    pub fn get_index(&self, index: usize) -> Option<&DefinedName> {
        self.names.get(index)
    }

    fn checked_mut(&mut self, index: usize) -> Result<&mut DefinedName> {
        let count = self.names.len();
        self.names
            .get_mut(index)
            .ok_or(Error::NameOutOfBounds(index, count))
    }

    /// Rename the name at `index`. The new name is validated and must not
    /// clash with another name of the same scope.
    pub fn rename_at(&mut self, index: usize, new_name: &str) -> Result<()> {
        validate_defined_name(new_name)?;
        let scope = self.checked_mut(index)?.scope();
        let clash = self
            .names
            .iter()
            .enumerate()
            .any(|(i, n)| i != index && n.matches(new_name, scope));
        if clash {
            return Err(Error::DuplicateName(new_name.to_string()));
        }
        self.checked_mut(index)?.name = new_name.to_string();
        Ok(())
    }

    /// Change what the name at `index` refers to
    pub fn set_refers_to_at(&mut self, index: usize, refers_to: impl Into<String>) -> Result<()> {
        self.checked_mut(index)?.refers_to = refers_to.into();
        Ok(())
    }

    pub fn set_comment_at(&mut self, index: usize, comment: Option<String>) -> Result<()> {
        self.checked_mut(index)?.comment = comment;
        Ok(())
    }

    pub fn set_hidden_at(&mut self, index: usize, hidden: bool) -> Result<()> {
        self.checked_mut(index)?.hidden = hidden;
        Ok(())
    }

    /// Position of the first name matching `name` in any scope
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n.name.eq_ignore_ascii_case(name))
    }

    /// Remove a named range by position
    pub fn remove_at(&mut self, index: usize) -> Result<DefinedName> {
        if index >= self.names.len() {
            return Err(Error::NameOutOfBounds(index, self.names.len()));
        }
        Ok(self.names.remove(index))
    }

    /// Remove a named range
    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<DefinedName> {
        let idx = self.names.iter().position(|n| n.matches(name, scope))?;
        Some(self.names.remove(idx))
    }

    /// Check if a name exists in the given scope
    pub fn contains(&self, name: &str, scope: NameScope) -> bool {
        self.get_exact(name, scope).is_some()
    }

    /// Iterate over all named ranges in definition order
    pub fn iter(&self) -> impl Iterator<Item = &DefinedName> {
        self.names.iter()
    }

    /// Get the number of named ranges
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get all names scoped to a specific sheet
    pub fn sheet_names(&self, sheet_index: usize) -> impl Iterator<Item = &DefinedName> {
        self.names
            .iter()
            .filter(move |r| r.scope() == NameScope::Sheet(sheet_index))
    }

    /// Drop the names scoped to a removed sheet and renumber the names of
    /// the sheets after it.
    pub fn sheet_removed(&mut self, sheet_index: usize) {
        let removed = sheet_index as u32;
        self.names.retain(|n| n.local_sheet_id != Some(removed));
        for name in &mut self.names {
            if let Some(id) = name.local_sheet_id.as_mut() {
                if *id > removed {
                    *id -= 1;
                }
            }
        }
    }

    /// Renumber sheet scopes after the sheet at `from` moved to `to`.
    pub fn sheet_moved(&mut self, from: usize, to: usize) {
        let (from, to) = (from as u32, to as u32);
        for name in &mut self.names {
            if let Some(id) = name.local_sheet_id.as_mut() {
                if *id == from {
                    *id = to;
                } else if from < to && *id > from && *id <= to {
                    *id -= 1;
                } else if to < from && *id >= to && *id < from {
                    *id += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collection_scope_lookup() {
        let mut coll = NamedRangeCollection::new();
        coll.define(DefinedName::workbook_scope("Rate", "0.05"))
            .unwrap();
        coll.define(DefinedName::sheet_scope("Rate", "0.08", 0))
            .unwrap();

        assert_eq!(coll.get("Rate", 0).unwrap().refers_to, "0.08");
        assert_eq!(coll.get("Rate", 1).unwrap().refers_to, "0.05");
    }

    #[test]
    fn test_case_insensitive_duplicates() {
        let mut coll = NamedRangeCollection::new();
        coll.define(DefinedName::workbook_scope("TaxRate", "0.05"))
            .unwrap();

        assert!(coll.get("TAXRATE", 0).is_some());
        assert_eq!(
            coll.define(DefinedName::workbook_scope("taxrate", "0.10")),
            Err(Error::DuplicateName("taxrate".into()))
        );
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_defined_name("Sales_2024").is_ok());
        assert!(validate_defined_name("_hidden.thing").is_ok());
        assert!(validate_defined_name(BUILTIN_PRINT_AREA).is_ok());
        assert!(validate_defined_name("").is_err());
        assert!(validate_defined_name("1st").is_err());
        assert!(validate_defined_name("two words").is_err());
        assert!(validate_defined_name("AB12").is_err());
    }

    #[test]
    fn test_builtin_detection() {
        assert!(DefinedName::sheet_scope(BUILTIN_PRINT_AREA, "x", 0).is_builtin());
        assert!(!DefinedName::workbook_scope("Print_Area", "x").is_builtin());
    }

    #[test]
    fn test_sheet_removed_renumbers() {
        let mut coll = NamedRangeCollection::new();
        coll.define(DefinedName::sheet_scope("A", "1", 0)).unwrap();
        coll.define(DefinedName::sheet_scope("B", "2", 1)).unwrap();
        coll.define(DefinedName::sheet_scope("C", "3", 2)).unwrap();
        coll.define(DefinedName::workbook_scope("D", "4")).unwrap();

        coll.sheet_removed(1);

        let scopes: Vec<_> = coll.iter().map(|n| (n.name.as_str(), n.scope())).collect();
        assert_eq!(
            scopes,
            vec![
                ("A", NameScope::Sheet(0)),
                ("C", NameScope::Sheet(1)),
                ("D", NameScope::Workbook),
            ]
        );
    }

    #[test]
    fn test_sheet_moved_renumbers() {
        let mut coll = NamedRangeCollection::new();
        for i in 0..4 {
            coll.define(DefinedName::sheet_scope(format!("N{}", i), "1", i))
                .unwrap();
        }

        // [0, 1, 2, 3] -> move 3 to position 1 -> [0, 3, 1, 2]
        coll.sheet_moved(3, 1);

        let ids: Vec<_> = coll.iter().map(|n| n.local_sheet_id.unwrap()).collect();
        assert_eq!(ids, vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_rename_checks_name_and_scope() {
        let mut coll = NamedRangeCollection::new();
        coll.define(DefinedName::workbook_scope("Rate", "0.05")).unwrap();
        coll.define(DefinedName::workbook_scope("Total", "Sheet1!$A$1"))
            .unwrap();
        coll.define(DefinedName::sheet_scope("Local", "1", 0)).unwrap();

        assert_eq!(
            coll.rename_at(1, "rate"),
            Err(Error::DuplicateName("rate".into()))
        );
        assert!(matches!(coll.rename_at(1, "B2"), Err(Error::InvalidName(_))));
        // another scope is no clash, and a name may change its own case
        coll.rename_at(2, "Rate").unwrap();
        coll.rename_at(0, "RATE").unwrap();
        assert_eq!(coll.get_index(0).unwrap().name, "RATE");
        assert_eq!(coll.rename_at(9, "Other"), Err(Error::NameOutOfBounds(9, 3)));
    }

    #[test]
    fn test_setters_by_index() {
        let mut coll = NamedRangeCollection::new();
        coll.define(DefinedName::workbook_scope("Rate", "0.05")).unwrap();
        coll.set_refers_to_at(0, "0.07").unwrap();
        coll.set_comment_at(0, Some("VAT".into())).unwrap();
        coll.set_hidden_at(0, true).unwrap();

        let name = coll.get_index(0).unwrap();
        assert_eq!(name.refers_to, "0.07");
        assert_eq!(name.comment.as_deref(), Some("VAT"));
        assert!(name.hidden);
        assert_eq!(coll.set_hidden_at(1, true), Err(Error::NameOutOfBounds(1, 1)));
    }

    #[test]
    fn test_remove_at_out_of_bounds() {
        let mut coll = NamedRangeCollection::new();
        assert_eq!(coll.remove_at(0), Err(Error::NameOutOfBounds(0, 0)));
    }
}
