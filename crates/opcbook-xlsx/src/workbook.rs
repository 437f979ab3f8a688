//! The workbook aggregate
//!
//! [`XlsxWorkbook`] owns a writable [`Package`] and the typed view of the
//! parts a spreadsheet is made of: the root workbook part, the worksheets it
//! lists, the shared-string table, the style table and the defined names.
//! Mutations stay in memory until [`XlsxWorkbook::save`] writes every dirty
//! part back into the package.

use std::collections::HashMap;
use std::io::{Seek, Write};
use std::path::Path;

use once_cell::unsync::OnceCell;

use opcbook_core::{
    is_unique_against, print_area_reference, unique_clone_name, validate_sheet_name, DefinedName,
    Error, NameScope, NamedRangeCollection, BUILTIN_PRINT_AREA,
};
use opcbook_opc::{
    OpcError, Package, PackageProperties, Part, PartStore, RelationshipGraph,
    RelationshipOwner, TargetMode,
};

use crate::error::{XlsxError, XlsxResult};
use crate::relation::{is_embedding, PartRole, PictureType, XlsxRelation};
use crate::shared_strings::SharedStringTable;
use crate::styles::{DataFormat, StyleTable};
use crate::workbook_xml::{SheetEntry, SheetState, WorkbookXml};
use crate::worksheet::Worksheet;

/// Producer tag written into the core properties of new workbooks
pub const DEFAULT_CREATOR: &str = "opcbook";

const MEDIA_PREFIX: &str = "xl/media/";

/// An OLE object or embedded package referenced from a worksheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedObject {
    /// Name of the embedded part
    pub part_name: String,
    pub content_type: String,
    pub rel_type: String,
    /// Part name of the worksheet that references it
    pub sheet_part: String,
}

/// A spreadsheet workbook backed by an OPC package
#[derive(Debug)]
pub struct XlsxWorkbook {
    package: Package,
    workbook_part: String,
    root: WorkbookXml,
    sheets: Vec<Worksheet>,
    shared_strings: SharedStringTable,
    shared_strings_part: String,
    styles: StyleTable,
    styles_part: String,
    names: NamedRangeCollection,
    embedded: Vec<EmbeddedObject>,
    formatter: OnceCell<DataFormat>,
}

impl XlsxWorkbook {
    /// Create a workbook with no sheets, an empty shared-string table and
    /// the default style table.
    pub fn new() -> XlsxResult<Self> {
        let mut package = Package::new();

        let relation = XlsxRelation::Workbook;
        let workbook_part = relation
            .part_name(1)
            .ok_or_else(|| XlsxError::Structural("no part name for workbook".into()))?;
        package.create_part(&workbook_part, content_type_of(relation)?)?;
        package.add_relationship(
            RelationshipOwner::Package,
            &workbook_part,
            TargetMode::Internal,
            relation.rel_type(),
            None,
        )?;
        package.properties_mut()?.creator = Some(DEFAULT_CREATOR.to_string());

        let root = WorkbookXml::new_empty();
        package.set_part_data(&workbook_part, root.raw().to_vec())?;

        let (styles_part, _) = attach_part(&mut package, &workbook_part, XlsxRelation::Styles, 1)?;
        let (shared_strings_part, _) =
            attach_part(&mut package, &workbook_part, XlsxRelation::SharedStrings, 1)?;

        log::debug!("Created empty workbook at /{workbook_part}");

        Ok(Self {
            package,
            workbook_part,
            root,
            sheets: Vec::new(),
            shared_strings: SharedStringTable::new(),
            shared_strings_part,
            styles: StyleTable::new(),
            styles_part,
            names: NamedRangeCollection::new(),
            embedded: Vec::new(),
            formatter: OnceCell::new(),
        })
    }

    /// Build the workbook view of a package.
    ///
    /// A read-only package is cloned into a writable one first, so the
    /// workbook never writes through the caller's source.
    pub fn load(package: Package) -> XlsxResult<Self> {
        let mut package = if package.is_read_only() {
            log::debug!("Cloning read-only package before load");
            package.clone_writable()?
        } else {
            package
        };

        let workbook_part = match package.core_part_name() {
            Ok(name) => name,
            Err(OpcError::MissingCorePart) => {
                return Err(XlsxError::Structural(
                    "package has no workbook part".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        let root = {
            let part = package
                .part(&workbook_part)
                .ok_or_else(|| XlsxError::MissingPart(workbook_part.clone()))?;
            WorkbookXml::parse(part.data())?
        };

        // One walk over the workbook relationships. Worksheet targets are
        // kept by id for the sheet list below.
        let mut sheet_parts: HashMap<String, String> = HashMap::new();
        let mut shared_strings: Option<(String, SharedStringTable)> = None;
        let mut styles: Option<(String, StyleTable)> = None;

        let rels = package.relationships_of(RelationshipOwner::Part(&workbook_part))?;
        for rel in rels.iter() {
            let Some(target) = rel.target_part(Some(&workbook_part)) else {
                continue;
            };
            let role = PartRole::from_rel_type(&rel.rel_type);
            let Some(part) = package.part(&target) else {
                match role {
                    PartRole::Worksheet => {
                        log::warn!(
                            "Worksheet relationship {} points at missing part /{}; ignoring it",
                            rel.id,
                            target
                        );
                        continue;
                    }
                    PartRole::SharedStrings | PartRole::Styles | PartRole::Other => {
                        return Err(XlsxError::Structural(format!(
                            "relationship {} points at missing part /{}",
                            rel.id, target
                        )));
                    }
                }
            };
            match role {
                PartRole::SharedStrings => {
                    if shared_strings.is_none() {
                        shared_strings = Some((target, SharedStringTable::parse(part.data())?));
                    }
                }
                PartRole::Styles => {
                    if styles.is_none() {
                        styles = Some((target, StyleTable::parse(part.data())?));
                    }
                }
                PartRole::Worksheet => {
                    sheet_parts.insert(rel.id.clone(), target);
                }
                PartRole::Other => {}
            }
        }

        let (shared_strings_part, shared_strings) = match shared_strings {
            Some(found) => found,
            None => {
                let (name, _) =
                    attach_part(&mut package, &workbook_part, XlsxRelation::SharedStrings, 1)?;
                log::debug!("Workbook has no shared strings; created /{name}");
                (name, SharedStringTable::new())
            }
        };
        let (styles_part, styles) = match styles {
            Some(found) => found,
            None => {
                let (name, _) = attach_part(&mut package, &workbook_part, XlsxRelation::Styles, 1)?;
                log::warn!("Workbook has no style table; created a default one at /{name}");
                (name, StyleTable::new())
            }
        };

        // Walk the sheet list in document order. `positions` maps a sheet's
        // index in the file to its index after dangling entries are dropped.
        let mut sheets = Vec::with_capacity(root.sheets.len());
        let mut embedded = Vec::new();
        let mut positions: Vec<Option<usize>> = Vec::with_capacity(root.sheets.len());
        for entry in &root.sheets {
            let Some(part_name) = sheet_parts.get(&entry.rel_id) else {
                log::warn!(
                    "Sheet '{}' refers to unknown relationship {}; dropping it",
                    entry.name,
                    entry.rel_id
                );
                positions.push(None);
                continue;
            };
            let part = package
                .part(part_name)
                .ok_or_else(|| XlsxError::MissingPart(part_name.clone()))?;
            let mut sheet = Worksheet::parse(entry, part_name, part.data())?;
            sheet.resolve_hyperlinks(part.relationships());

            for rel in part.relationships().iter() {
                if !is_embedding(&rel.rel_type) {
                    continue;
                }
                let Some(target) = rel.target_part(Some(part_name)) else {
                    continue;
                };
                match package.part(&target) {
                    Some(object) => embedded.push(EmbeddedObject {
                        part_name: target,
                        content_type: object.content_type().to_string(),
                        rel_type: rel.rel_type.clone(),
                        sheet_part: part_name.clone(),
                    }),
                    None => log::warn!(
                        "Embedded object /{} referenced from /{} is missing",
                        target,
                        part_name
                    ),
                }
            }

            positions.push(Some(sheets.len()));
            sheets.push(sheet);
        }

        let mut names = NamedRangeCollection::new();
        for name in &root.defined_names {
            let mut name = name.clone();
            if let Some(id) = name.local_sheet_id {
                match positions.get(id as usize).copied().flatten() {
                    Some(index) => name.local_sheet_id = Some(index as u32),
                    None => {
                        log::warn!(
                            "Defined name '{}' is scoped to a dropped sheet; ignoring it",
                            name.name
                        );
                        continue;
                    }
                }
            }
            names.push_loaded(name);
        }

        let mut root = root;
        root.active_tab = remap_tab(root.active_tab, &positions, sheets.len());
        root.first_sheet = remap_tab(root.first_sheet, &positions, sheets.len());

        log::debug!(
            "Loaded workbook /{} with {} sheets and {} names",
            workbook_part,
            sheets.len(),
            names.len()
        );

        Ok(Self {
            package,
            workbook_part,
            root,
            sheets,
            shared_strings,
            shared_strings_part,
            styles,
            styles_part,
            names,
            embedded,
            formatter: OnceCell::new(),
        })
    }

    // ===== Sheets =====

    /// Append a new empty sheet.
    ///
    /// The name must be valid and must not match an existing sheet name,
    /// ignoring case. The first sheet of a workbook is selected.
    pub fn create_sheet(&mut self, name: &str) -> XlsxResult<&mut Worksheet> {
        validate_sheet_name(name)?;
        if !is_unique_against(self.sheet_names(), name, None) {
            return Err(Error::DuplicateSheetName(name.to_string()).into());
        }

        let sheet_id = self.sheets.iter().map(Worksheet::sheet_id).max().unwrap_or(0) + 1;
        let (part_name, rel_id) = attach_part(
            &mut self.package,
            &self.workbook_part,
            XlsxRelation::Worksheet,
            self.sheets.len() + 1,
        )?;

        let mut sheet = Worksheet::new(name.to_string(), sheet_id, rel_id, part_name);
        if self.sheets.is_empty() {
            sheet.set_selected(true);
        }
        log::debug!("Created sheet '{}' at /{}", name, sheet.part_name());

        let index = self.sheets.len();
        self.sheets.push(sheet);
        Ok(&mut self.sheets[index])
    }

    /// Append a sheet named `SheetN`, with the smallest free `N` not below
    /// the new sheet count.
    pub fn create_sheet_default(&mut self) -> XlsxResult<&mut Worksheet> {
        let mut n = self.sheets.len() + 1;
        let name = loop {
            let candidate = format!("Sheet{n}");
            if self.sheet_index(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };
        self.create_sheet(&name)
    }

    /// Append a copy of the sheet at `index`.
    ///
    /// Only the cell content is copied. Relationships of the source sheet
    /// such as drawings or hyperlink targets are not duplicated.
    pub fn clone_sheet(&mut self, index: usize) -> XlsxResult<&mut Worksheet> {
        let source = self.checked_sheet(index)?;
        let data = source.data().clone();
        let lowered: Vec<String> = self.sheet_names().map(str::to_lowercase).collect();
        let name = unique_clone_name(source.name(), |candidate| {
            lowered.contains(&candidate.to_lowercase())
        });

        let sheet = self.create_sheet(&name)?;
        *sheet.data_mut() = data;
        Ok(sheet)
    }

    /// Remove the sheet at `index` with its part, its relationship and the
    /// names scoped to it.
    ///
    /// Parts only the sheet led to, such as its drawings, comments and the
    /// media or embeddings behind them, are removed as well.
    pub fn remove_sheet_at(&mut self, index: usize) -> XlsxResult<()> {
        self.checked_sheet(index)?;
        let sheet = self.sheets.remove(index);

        self.package.remove_relationship(
            RelationshipOwner::Part(&self.workbook_part),
            sheet.rel_id(),
        )?;
        let removed = self.package.remove_unreachable(&[sheet.part_name()])?;
        self.embedded
            .retain(|e| e.sheet_part != sheet.part_name() && !removed.contains(&e.part_name));
        self.names.sheet_removed(index);

        let count = self.sheets.len();
        self.root.active_tab = tab_after_removal(self.root.active_tab, index, count);
        self.root.first_sheet = tab_after_removal(self.root.first_sheet, index, count);
        if count > 0 && !self.sheets.iter().any(Worksheet::is_selected) {
            let active = self.root.active_tab;
            self.sheets[active].set_selected(true);
        }

        log::debug!("Removed sheet '{}'", sheet.name());
        Ok(())
    }

    /// Move the sheet called `name` to position `pos`
    pub fn set_sheet_order(&mut self, name: &str, pos: usize) -> XlsxResult<()> {
        let from = self
            .sheet_index(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        if pos >= self.sheets.len() {
            return Err(Error::SheetOutOfBounds(pos, self.sheets.len()).into());
        }
        if from == pos {
            return Ok(());
        }

        let sheet = self.sheets.remove(from);
        self.sheets.insert(pos, sheet);
        self.names.sheet_moved(from, pos);
        self.root.active_tab = tab_after_move(self.root.active_tab, from, pos);
        self.root.first_sheet = tab_after_move(self.root.first_sheet, from, pos);
        Ok(())
    }

    /// Rename the sheet at `index`
    pub fn set_sheet_name(&mut self, index: usize, name: &str) -> XlsxResult<()> {
        self.checked_sheet(index)?;
        validate_sheet_name(name)?;
        if !is_unique_against(self.sheet_names(), name, Some(index)) {
            return Err(Error::DuplicateSheetName(name.to_string()).into());
        }
        self.sheets[index].set_name(name.to_string());
        Ok(())
    }

    /// Set the visibility of the sheet at `index`
    pub fn set_sheet_state(&mut self, index: usize, state: SheetState) -> XlsxResult<()> {
        self.checked_sheet(index)?;
        self.sheets[index].set_state(state);
        Ok(())
    }

    /// Number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Sheet at `index`
    pub fn sheet_at(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    /// Mutable sheet at `index`
    pub fn sheet_at_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.sheets.get_mut(index)
    }

    /// Sheet by name, ignoring case
    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }

    /// Position of the sheet called `name`, ignoring case
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        let lowered = name.to_lowercase();
        self.sheets
            .iter()
            .position(|s| s.name().to_lowercase() == lowered)
    }

    /// Name of the sheet at `index`
    pub fn sheet_name(&self, index: usize) -> Option<&str> {
        self.sheets.get(index).map(Worksheet::name)
    }

    /// All sheets in tab order
    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(Worksheet::name)
    }

    fn checked_sheet(&self, index: usize) -> XlsxResult<&Worksheet> {
        self.sheets
            .get(index)
            .ok_or_else(|| Error::SheetOutOfBounds(index, self.sheets.len()).into())
    }

    // ===== Tabs =====

    /// Index of the active sheet
    pub fn active_sheet_index(&self) -> usize {
        self.root.active_tab
    }

    /// Make the sheet at `index` active and the only selected one
    pub fn set_active_sheet(&mut self, index: usize) -> XlsxResult<()> {
        self.checked_sheet(index)?;
        for (i, sheet) in self.sheets.iter_mut().enumerate() {
            sheet.set_selected(i == index);
        }
        self.root.active_tab = index;
        Ok(())
    }

    /// Select only the tab at `index`, leaving the active sheet alone
    pub fn set_selected_tab(&mut self, index: usize) -> XlsxResult<()> {
        self.checked_sheet(index)?;
        for (i, sheet) in self.sheets.iter_mut().enumerate() {
            sheet.set_selected(i == index);
        }
        Ok(())
    }

    /// Index of the first tab shown in the tab strip
    pub fn first_visible_tab(&self) -> usize {
        self.root.first_sheet
    }

    pub fn set_first_visible_tab(&mut self, index: usize) -> XlsxResult<()> {
        self.checked_sheet(index)?;
        self.root.first_sheet = index;
        Ok(())
    }

    // ===== Names =====

    /// Add a defined name. A sheet scope must refer to an existing sheet.
    pub fn create_name(&mut self, name: DefinedName) -> XlsxResult<usize> {
        if let NameScope::Sheet(index) = name.scope() {
            self.checked_sheet(index)?;
        }
        Ok(self.names.define(name)?)
    }

    /// Defined name at `index`
    pub fn name_at(&self, index: usize) -> Option<&DefinedName> {
        self.names.get_index(index)
    }

    /// Rename the defined name at `index`, with the same checks as
    /// [`Self::create_name`]
    pub fn rename_name(&mut self, index: usize, new_name: &str) -> XlsxResult<()> {
        Ok(self.names.rename_at(index, new_name)?)
    }

    /// Change the formula of the defined name at `index`
    pub fn set_name_refers_to(&mut self, index: usize, refers_to: &str) -> XlsxResult<()> {
        Ok(self.names.set_refers_to_at(index, refers_to)?)
    }

    pub fn set_name_comment(&mut self, index: usize, comment: Option<&str>) -> XlsxResult<()> {
        Ok(self
            .names
            .set_comment_at(index, comment.map(str::to_string))?)
    }

    pub fn set_name_hidden(&mut self, index: usize, hidden: bool) -> XlsxResult<()> {
        Ok(self.names.set_hidden_at(index, hidden)?)
    }

    /// Position of the first name called `name` in any scope
    pub fn name_index(&self, name: &str) -> Option<usize> {
        self.names.index_of(name)
    }

    pub fn remove_name_at(&mut self, index: usize) -> XlsxResult<DefinedName> {
        Ok(self.names.remove_at(index)?)
    }

    /// Remove the first name called `name` in any scope
    pub fn remove_name(&mut self, name: &str) -> XlsxResult<DefinedName> {
        let index = self
            .names
            .index_of(name)
            .ok_or_else(|| Error::InvalidName(format!("no defined name '{name}'")))?;
        Ok(self.names.remove_at(index)?)
    }

    /// Number of defined names
    pub fn number_of_names(&self) -> usize {
        self.names.len()
    }

    /// All defined names in document order
    pub fn names(&self) -> &NamedRangeCollection {
        &self.names
    }

    /// Add an empty built-in name such as `_xlnm.Print_Area` for a sheet
    pub fn create_builtin_name(&mut self, builtin: &str, sheet_index: usize) -> XlsxResult<usize> {
        self.checked_sheet(sheet_index)?;
        if self.names.contains(builtin, NameScope::Sheet(sheet_index)) {
            return Err(Error::DuplicateName(builtin.to_string()).into());
        }
        Ok(self
            .names
            .define(DefinedName::sheet_scope(builtin, "", sheet_index))?)
    }

    /// Set the print area of a sheet from a reference such as `A1:D10`.
    ///
    /// Comma-separated areas are each qualified with the sheet name unless
    /// they already carry one.
    pub fn set_print_area(&mut self, sheet_index: usize, reference: &str) -> XlsxResult<()> {
        let sheet = self.checked_sheet(sheet_index)?;
        let quoted = format!("'{}'", sheet.name().replace('\'', "''"));
        let refers_to = reference
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part.contains('!') {
                    part.to_string()
                } else {
                    format!("{quoted}!{part}")
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        self.store_print_area(sheet_index, refers_to)
    }

    /// Set the print area of a sheet from 0-based inclusive bounds
    pub fn set_print_area_range(
        &mut self,
        sheet_index: usize,
        start_row: u32,
        end_row: u32,
        start_col: u16,
        end_col: u16,
    ) -> XlsxResult<()> {
        let sheet = self.checked_sheet(sheet_index)?;
        let refers_to =
            print_area_reference(sheet.name(), start_row, end_row, start_col, end_col);
        self.store_print_area(sheet_index, refers_to)
    }

    fn store_print_area(&mut self, sheet_index: usize, refers_to: String) -> XlsxResult<()> {
        let scope = NameScope::Sheet(sheet_index);
        if !self.names.contains(BUILTIN_PRINT_AREA, scope) {
            self.create_builtin_name(BUILTIN_PRINT_AREA, sheet_index)?;
        }
        if let Some(name) = self.names.get_exact_mut(BUILTIN_PRINT_AREA, scope) {
            name.refers_to = refers_to;
        }
        Ok(())
    }

    /// Print area reference of a sheet
    pub fn print_area(&self, sheet_index: usize) -> Option<&str> {
        self.names
            .get_exact(BUILTIN_PRINT_AREA, NameScope::Sheet(sheet_index))
            .map(|n| n.refers_to.as_str())
    }

    /// Drop the print area of a sheet
    pub fn remove_print_area(&mut self, sheet_index: usize) -> Option<DefinedName> {
        self.names
            .remove(BUILTIN_PRINT_AREA, NameScope::Sheet(sheet_index))
    }

    // ===== Formats and tables =====

    /// Formatter bound to this workbook's style table, created on first use
    pub fn data_format(&self) -> &DataFormat {
        self.formatter.get_or_init(DataFormat::new)
    }

    /// Id for a number format code, registering it when new
    pub fn format_index(&mut self, code: &str) -> XlsxResult<u16> {
        let formatter = self.formatter.get_or_init(DataFormat::new);
        formatter.format_index(&mut self.styles, code)
    }

    /// Format code for a number format id
    pub fn format_code(&self, id: u16) -> Option<&str> {
        self.data_format().format_code(&self.styles, id)
    }

    pub fn shared_strings(&self) -> &SharedStringTable {
        &self.shared_strings
    }

    pub fn shared_strings_mut(&mut self) -> &mut SharedStringTable {
        &mut self.shared_strings
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleTable {
        &mut self.styles
    }

    /// OLE objects and embedded packages found on the worksheets
    pub fn embedded_objects(&self) -> &[EmbeddedObject] {
        &self.embedded
    }

    /// Whether the workbook part is a macro-enabled one
    pub fn is_macro_enabled(&self) -> bool {
        self.package
            .part(&self.workbook_part)
            .map(|p| {
                let content_type = Some(p.content_type());
                content_type == XlsxRelation::MacroWorkbook.content_type()
                    || content_type == XlsxRelation::MacroTemplateWorkbook.content_type()
            })
            .unwrap_or(false)
    }

    /// Whether dates use the 1904 epoch
    pub fn is_date1904(&self) -> bool {
        self.root.date1904
    }

    pub fn properties(&self) -> &PackageProperties {
        self.package.properties()
    }

    pub fn properties_mut(&mut self) -> XlsxResult<&mut PackageProperties> {
        Ok(self.package.properties_mut()?)
    }

    // ===== Pictures =====

    /// Store image bytes as a new media part and return its index in
    /// [`Self::all_pictures`].
    ///
    /// The part is not referenced by any drawing.
    pub fn add_picture(&mut self, data: &[u8], kind: PictureType) -> XlsxResult<usize> {
        let relation = XlsxRelation::Image(kind);
        let mut n = self.all_pictures().len() + 1;
        let name = loop {
            let candidate = relation
                .part_name(n)
                .ok_or_else(|| XlsxError::Structural("no part name for image".into()))?;
            if !self.package.has_part(&candidate) {
                break candidate;
            }
            n += 1;
        };
        self.package.create_part(&name, kind.content_type())?;
        self.package.set_part_data(&name, data.to_vec())?;
        log::debug!("Added picture /{name}");

        self.all_pictures()
            .iter()
            .position(|p| p.name() == name)
            .ok_or(XlsxError::MissingPart(name))
    }

    /// Every media part of the package, in part-name order
    pub fn all_pictures(&self) -> Vec<&Part> {
        self.package
            .parts()
            .filter(|p| p.name().starts_with(MEDIA_PREFIX))
            .collect()
    }

    // ===== Persistence =====

    /// Write the sheet list, active tab and defined names into the
    /// workbook part.
    pub fn commit(&mut self) -> XlsxResult<()> {
        let entries: Vec<SheetEntry> = self.sheets.iter().map(Worksheet::entry).collect();
        let names: Vec<DefinedName> = self.names.iter().cloned().collect();
        let bytes = self.root.serialize(&entries, &names)?;
        self.root = WorkbookXml::parse(&bytes)?;
        self.package.set_part_data(&self.workbook_part, bytes)?;
        Ok(())
    }

    /// Write every modified part back into the package, then commit the
    /// workbook part.
    pub fn save(&mut self) -> XlsxResult<()> {
        let mut written = 0usize;
        for sheet in &mut self.sheets {
            if sheet.is_dirty() {
                let bytes = sheet.to_xml()?;
                self.package.set_part_data(sheet.part_name(), bytes.clone())?;
                sheet.mark_saved(bytes);
                written += 1;
            }
        }
        if self.shared_strings.is_dirty() {
            self.package.set_part_data(
                &self.shared_strings_part,
                self.shared_strings.to_xml().into_bytes(),
            )?;
            self.shared_strings.mark_clean();
            written += 1;
        }
        if self.styles.is_dirty() {
            self.package
                .set_part_data(&self.styles_part, self.styles.to_xml()?)?;
            self.styles.mark_clean();
            written += 1;
        }
        log::debug!("Saved {written} modified parts");
        self.commit()
    }

    /// Save and serialize the whole package
    pub fn write<W: Write + Seek>(&mut self, writer: W) -> XlsxResult<()> {
        self.save()?;
        self.package.save(writer)?;
        Ok(())
    }

    /// Save and write the package to a file
    pub fn write_file<P: AsRef<Path>>(&mut self, path: P) -> XlsxResult<()> {
        self.save()?;
        self.package.save_file(path)?;
        Ok(())
    }

    /// Save and return the package as ZIP bytes
    pub fn to_bytes(&mut self) -> XlsxResult<Vec<u8>> {
        self.save()?;
        Ok(self.package.to_bytes()?)
    }

    /// The underlying package. Unsaved changes are not visible in it.
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Save and hand back the package
    pub fn into_package(mut self) -> XlsxResult<Package> {
        self.save()?;
        Ok(self.package)
    }
}

fn content_type_of(relation: XlsxRelation) -> XlsxResult<&'static str> {
    relation
        .content_type()
        .ok_or_else(|| XlsxError::Structural(format!("{relation:?} has no content type")))
}

/// Create the first free part of kind `relation`, counting from `start`,
/// and relate it from `owner`. Returns the part name and relationship id.
fn attach_part(
    package: &mut Package,
    owner: &str,
    relation: XlsxRelation,
    start: usize,
) -> XlsxResult<(String, String)> {
    let content_type = content_type_of(relation)?;
    let mut n = start.max(1);
    let name = loop {
        let candidate = relation
            .part_name(n)
            .ok_or_else(|| XlsxError::Structural(format!("{relation:?} has no part name")))?;
        if !package.has_part(&candidate) {
            break candidate;
        }
        n += 1;
    };
    package.create_part(&name, content_type)?;
    let rel = package.add_relationship(
        RelationshipOwner::Part(owner),
        &name,
        TargetMode::Internal,
        relation.rel_type(),
        None,
    )?;
    Ok((name, rel.id))
}

/// Map a tab index read from the file onto the loaded sheet list
fn remap_tab(tab: usize, positions: &[Option<usize>], count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let mapped = positions
        .get(tab)
        .copied()
        .flatten()
        .or_else(|| positions[..tab.min(positions.len())].iter().rev().flatten().next().copied())
        .unwrap_or(0);
    mapped.min(count - 1)
}

fn tab_after_removal(tab: usize, removed: usize, count: usize) -> usize {
    let tab = if tab > removed { tab - 1 } else { tab };
    tab.min(count.saturating_sub(1))
}

fn tab_after_move(tab: usize, from: usize, to: usize) -> usize {
    if tab == from {
        to
    } else if from < to && tab > from && tab <= to {
        tab - 1
    } else if to < from && tab >= to && tab < from {
        tab + 1
    } else {
        tab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcbook_core::RawCell;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn reopen(wb: &mut XlsxWorkbook) -> XlsxWorkbook {
        let bytes = wb.to_bytes().unwrap();
        let package = Package::from_reader(Cursor::new(bytes)).unwrap();
        XlsxWorkbook::load(package).unwrap()
    }

    #[test]
    fn new_workbook_is_empty_with_creator() {
        let wb = XlsxWorkbook::new().unwrap();
        assert_eq!(wb.sheet_count(), 0);
        assert_eq!(wb.properties().creator.as_deref(), Some(DEFAULT_CREATOR));
        assert!(wb.package().has_part("xl/styles.xml"));
        assert!(wb.package().has_part("xl/sharedStrings.xml"));
        assert!(!wb.is_macro_enabled());
    }

    #[test]
    fn create_sheet_assigns_ids_and_parts() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("Data").unwrap();
        let second = wb.create_sheet("Summary").unwrap();
        assert_eq!(second.sheet_id(), 2);
        assert_eq!(second.part_name(), "xl/worksheets/sheet2.xml");
        assert!(wb.sheet_at(0).unwrap().is_selected());
        assert!(!wb.sheet_at(1).unwrap().is_selected());
    }

    #[test]
    fn duplicate_names_differ_only_in_case() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("Data").unwrap();
        let err = wb.create_sheet("DATA").unwrap_err();
        assert!(matches!(err, XlsxError::Core(Error::DuplicateSheetName(_))));
        assert_eq!(wb.sheet_count(), 1);
    }

    #[test]
    fn invalid_names_are_rejected_before_mutation() {
        let mut wb = XlsxWorkbook::new().unwrap();
        assert!(wb.create_sheet("a/b").is_err());
        assert!(wb.create_sheet("").is_err());
        assert_eq!(wb.sheet_count(), 0);
        assert_eq!(wb.package().part_count(), 3);
    }

    #[test]
    fn default_sheet_names_skip_taken_ones() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("Sheet2").unwrap();
        assert_eq!(wb.create_sheet_default().unwrap().name(), "Sheet3");
        assert_eq!(wb.create_sheet_default().unwrap().name(), "Sheet4");
    }

    #[test]
    fn clone_sheet_copies_cells_with_suffixed_name() {
        let mut wb = XlsxWorkbook::new().unwrap();
        let sheet = wb.create_sheet("Data").unwrap();
        sheet.data_mut().set_cell(0, RawCell::new(0).with_value("42", None));

        let copy = wb.clone_sheet(0).unwrap();
        assert_eq!(copy.name(), "Data(1)");
        assert_eq!(copy.data().cell(0, 0).and_then(|c| c.value.as_deref()), Some("42"));
        assert_eq!(wb.clone_sheet(0).unwrap().name(), "Data(2)");
    }

    #[test]
    fn clone_sheet_truncates_long_names() {
        let mut wb = XlsxWorkbook::new().unwrap();
        let long = "A".repeat(31);
        wb.create_sheet(&long).unwrap();
        let copy = wb.clone_sheet(0).unwrap();
        assert_eq!(copy.name(), format!("{}(1)", "A".repeat(28)));
    }

    #[test]
    fn remove_sheet_drops_part_and_scoped_names() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("One").unwrap();
        wb.create_sheet("Two").unwrap();
        wb.create_sheet("Three").unwrap();
        wb.set_print_area(0, "A1:B2").unwrap();
        wb.set_print_area(2, "C1:D2").unwrap();
        wb.set_active_sheet(2).unwrap();

        wb.remove_sheet_at(0).unwrap();
        assert_eq!(wb.sheet_count(), 2);
        assert!(!wb.package().has_part("xl/worksheets/sheet1.xml"));
        assert_eq!(wb.number_of_names(), 1);
        assert_eq!(wb.print_area(1), Some("'Three'!C1:D2"));
        assert_eq!(wb.active_sheet_index(), 1);

        assert!(wb.remove_sheet_at(5).is_err());
    }

    #[test]
    fn set_sheet_order_moves_scoped_names() {
        let mut wb = XlsxWorkbook::new().unwrap();
        for name in ["A", "B", "C"] {
            wb.create_sheet(name).unwrap();
        }
        wb.set_print_area(0, "A1").unwrap();
        wb.set_sheet_order("a", 2).unwrap();
        let order: Vec<&str> = wb.sheets().iter().map(Worksheet::name).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
        assert_eq!(wb.print_area(2), Some("'A'!A1"));

        assert!(wb.set_sheet_order("missing", 0).is_err());
        assert!(wb.set_sheet_order("A", 3).is_err());
    }

    #[test]
    fn rename_allows_case_change_of_itself() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("Data").unwrap();
        wb.create_sheet("Other").unwrap();
        wb.set_sheet_name(0, "DATA").unwrap();
        assert_eq!(wb.sheet_name(0), Some("DATA"));
        assert!(wb.set_sheet_name(1, "data").is_err());
    }

    #[test]
    fn print_area_range_reference() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("Sheet1").unwrap();
        wb.set_print_area_range(0, 2, 3, 2, 4).unwrap();
        assert_eq!(wb.print_area(0), Some("'Sheet1'!$C$3:$E$4"));

        wb.set_print_area(0, "A1:B2,'Sheet1'!D1").unwrap();
        assert_eq!(wb.print_area(0), Some("'Sheet1'!A1:B2,'Sheet1'!D1"));
        assert_eq!(wb.number_of_names(), 1);

        assert!(wb.remove_print_area(0).is_some());
        assert_eq!(wb.print_area(0), None);
    }

    #[test]
    fn names_are_validated_and_scoped() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("Data").unwrap();
        wb.create_name(DefinedName::workbook_scope("Total", "Data!$A$1"))
            .unwrap();
        wb.create_name(DefinedName::sheet_scope("Total", "Data!$B$1", 0))
            .unwrap();
        assert!(wb
            .create_name(DefinedName::workbook_scope("total", "Data!$C$1"))
            .is_err());
        assert!(wb
            .create_name(DefinedName::sheet_scope("Other", "Data!$C$1", 4))
            .is_err());

        assert_eq!(wb.name_index("TOTAL"), Some(0));
        let removed = wb.remove_name("Total").unwrap();
        assert_eq!(removed.refers_to, "Data!$A$1");
        assert_eq!(wb.number_of_names(), 1);
        assert!(wb.remove_name("missing").is_err());
    }

    #[test]
    fn names_are_edited_through_checked_setters() {
        let mut wb = XlsxWorkbook::new().unwrap();
        wb.create_sheet("Data").unwrap();
        wb.create_name(DefinedName::workbook_scope("Total", "Data!$A$1"))
            .unwrap();
        wb.create_name(DefinedName::workbook_scope("Rate", "0.05"))
            .unwrap();

        assert!(wb.rename_name(1, "total").is_err());
        assert!(wb.rename_name(1, "1st").is_err());
        wb.rename_name(1, "TaxRate").unwrap();
        wb.set_name_refers_to(1, "0.07").unwrap();
        wb.set_name_comment(1, Some("VAT")).unwrap();
        wb.set_name_hidden(1, true).unwrap();
        assert!(wb.set_name_hidden(5, true).is_err());

        let loaded = reopen(&mut wb);
        let name = loaded.name_at(1).unwrap();
        assert_eq!(name.name, "TaxRate");
        assert_eq!(name.refers_to, "0.07");
        assert!(name.hidden);
    }

    #[test]
    fn format_index_registers_custom_codes() {
        let mut wb = XlsxWorkbook::new().unwrap();
        assert_eq!(wb.format_index("0.00").unwrap(), 2);
        let id = wb.format_index("0.000%").unwrap();
        assert!(id >= 164);
        assert_eq!(wb.format_index("0.000%").unwrap(), id);
        assert_eq!(wb.format_code(id), Some("0.000%"));
    }

    #[test]
    fn pictures_are_stored_as_media_parts() {
        let mut wb = XlsxWorkbook::new().unwrap();
        assert_eq!(wb.add_picture(b"png", PictureType::Png).unwrap(), 0);
        assert_eq!(wb.add_picture(b"jpg", PictureType::Jpeg).unwrap(), 1);
        let pictures = wb.all_pictures();
        assert_eq!(pictures.len(), 2);
        assert_eq!(pictures[0].name(), "xl/media/image1.png");
        assert_eq!(pictures[1].data(), b"jpg");
    }

    #[test]
    fn round_trip_keeps_sheets_names_and_cells() {
        let mut wb = XlsxWorkbook::new().unwrap();
        let sheet = wb.create_sheet("Data").unwrap();
        sheet.data_mut().set_cell(1, RawCell::new(2).with_value("7", None));
        wb.create_sheet("Summary").unwrap();
        wb.set_print_area_range(1, 0, 4, 0, 2).unwrap();
        wb.set_active_sheet(1).unwrap();

        let loaded = reopen(&mut wb);
        let names: Vec<&str> = loaded.sheets().iter().map(Worksheet::name).collect();
        assert_eq!(names, vec!["Data", "Summary"]);
        assert_eq!(loaded.active_sheet_index(), 1);
        assert_eq!(loaded.print_area(1), Some("'Summary'!$A$1:$C$5"));
        let cell = loaded.sheet_at(0).unwrap().data().cell(1, 2).unwrap();
        assert_eq!(cell.value.as_deref(), Some("7"));
        assert_eq!(loaded.properties().creator.as_deref(), Some(DEFAULT_CREATOR));
    }

    #[test]
    fn tab_helpers() {
        assert_eq!(tab_after_removal(2, 0, 2), 1);
        assert_eq!(tab_after_removal(0, 0, 0), 0);
        assert_eq!(tab_after_move(0, 0, 2), 2);
        assert_eq!(tab_after_move(1, 0, 2), 0);
        assert_eq!(tab_after_move(0, 2, 0), 1);
        assert_eq!(remap_tab(2, &[Some(0), None, Some(1)], 2), 1);
        assert_eq!(remap_tab(1, &[Some(0), None, Some(1)], 2), 0);
    }
}
