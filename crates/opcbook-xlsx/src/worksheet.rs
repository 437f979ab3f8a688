//! Worksheet parts

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use opcbook_core::{CellAddress, ColumnData, RawCell, Row, SheetData};
use opcbook_opc::RelationshipSet;

use crate::error::{XlsxError, XlsxResult};
use crate::relation::{RELATIONSHIPS_NS, SPREADSHEETML_NS};
use crate::workbook_xml::{SheetEntry, SheetState};

/// A `<hyperlink>` of a worksheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    /// Cell or range the link is anchored to
    pub reference: String,
    /// Relationship id of an external target
    pub rel_id: Option<String>,
    /// Location inside the workbook
    pub location: Option<String>,
    pub display: Option<String>,
    pub tooltip: Option<String>,
    /// Target resolved through the sheet's relationships
    pub target: Option<String>,
}

/// One sheet of the workbook.
///
/// A sheet read from a package keeps the bytes it was read from. Saving
/// streams those bytes and replaces only what the model owns: the selection
/// flag of the first `<sheetView>` always, and `<dimension>`, `<cols>` and
/// `<sheetData>` once the content was edited. Every other element is passed
/// through untouched.
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    sheet_id: u32,
    rel_id: String,
    part_name: String,
    state: SheetState,
    data: SheetData,
    hyperlinks: Vec<Hyperlink>,
    selected: bool,
    source: Option<Vec<u8>>,
    /// Content edited since the last save
    dirty: bool,
    /// Only the selection changed
    view_dirty: bool,
}

impl Worksheet {
    /// A new, empty sheet. It is dirty until first saved.
    pub(crate) fn new(name: String, sheet_id: u32, rel_id: String, part_name: String) -> Self {
        Self {
            name,
            sheet_id,
            rel_id,
            part_name,
            state: SheetState::Visible,
            data: SheetData::new(),
            hyperlinks: Vec::new(),
            selected: false,
            source: None,
            dirty: true,
            view_dirty: false,
        }
    }

    /// Bind a sheet-list entry to its parsed part
    pub(crate) fn parse(entry: &SheetEntry, part_name: &str, data: &[u8]) -> XlsxResult<Self> {
        let mut sheet = Self::new(
            entry.name.clone(),
            entry.sheet_id,
            entry.rel_id.clone(),
            part_name.to_string(),
        );
        sheet.state = entry.state;
        sheet.read_content(data)?;
        sheet.source = Some(data.to_vec());
        sheet.dirty = false;
        Ok(sheet)
    }

    fn read_content(&mut self, data: &[u8]) -> XlsxResult<()> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();

        let mut current_row: Option<u32> = None;
        let mut next_col: u16 = 0;
        let mut current_cell: Option<RawCell> = None;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_text = false;
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        let row = parse_row(&e, current_row)?;
                        current_row = Some(row.index);
                        next_col = 0;
                        self.data.insert_row(row);
                    }
                    b"c" => current_cell = Some(parse_cell(&e, next_col)?),
                    b"v" if current_cell.is_some() => in_value = true,
                    b"f" => {
                        if let Some(cell) = current_cell.as_mut() {
                            cell.formula = Some(String::new());
                            cell.formula_attributes = formula_attributes(&e)?;
                            in_formula = true;
                        }
                    }
                    b"t" if current_cell.is_some() && !in_phonetic => in_inline_text = true,
                    b"rPh" => in_phonetic = true,
                    b"sheetView" => self.read_sheet_view(&e)?,
                    b"hyperlink" => self.hyperlinks.push(parse_hyperlink(&e)?),
                    b"col" => self.data.push_column(parse_column(&e)?),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        let row = parse_row(&e, current_row)?;
                        current_row = Some(row.index);
                        self.data.insert_row(row);
                    }
                    b"c" => {
                        let cell = parse_cell(&e, next_col)?;
                        next_col = cell.column.saturating_add(1);
                        if let Some(row) = current_row {
                            self.data.set_cell(row, cell);
                        }
                    }
                    b"f" => {
                        if let Some(cell) = current_cell.as_mut() {
                            cell.formula = Some(String::new());
                            cell.formula_attributes = formula_attributes(&e)?;
                        }
                    }
                    b"sheetView" => self.read_sheet_view(&e)?,
                    b"hyperlink" => self.hyperlinks.push(parse_hyperlink(&e)?),
                    b"col" => self.data.push_column(parse_column(&e)?),
                    _ => {}
                },
                Ok(Event::Text(t)) => {
                    if let Some(cell) = current_cell.as_mut() {
                        let text = t.unescape()?;
                        if in_value || in_inline_text {
                            cell.value.get_or_insert_with(String::new).push_str(&text);
                        } else if in_formula {
                            cell.formula.get_or_insert_with(String::new).push_str(&text);
                        }
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"c" => {
                        if let Some(cell) = current_cell.take() {
                            next_col = cell.column.saturating_add(1);
                            if let Some(row) = current_row {
                                self.data.set_cell(row, cell);
                            }
                        }
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"t" => in_inline_text = false,
                    b"rPh" => in_phonetic = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    fn read_sheet_view(&mut self, e: &BytesStart<'_>) -> XlsxResult<()> {
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"tabSelected" {
                self.selected = is_true(&attr.unescape_value()?);
            }
        }
        Ok(())
    }

    /// Fill in hyperlink targets from the sheet part's relationships
    pub(crate) fn resolve_hyperlinks(&mut self, rels: &RelationshipSet) {
        for link in &mut self.hyperlinks {
            let Some(id) = link.rel_id.as_deref() else {
                continue;
            };
            match rels.get(id) {
                Some(rel) => link.target = Some(rel.target.clone()),
                None => log::warn!(
                    "Hyperlink {} on sheet '{}' refers to unknown relationship {id}",
                    link.reference,
                    self.name
                ),
            }
        }
    }

    /// Sheet name as shown on its tab
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// `sheetId` in the workbook part
    pub fn sheet_id(&self) -> u32 {
        self.sheet_id
    }

    /// Relationship id from the workbook part to this sheet
    pub fn rel_id(&self) -> &str {
        &self.rel_id
    }

    /// Name of the backing part
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Tab visibility
    pub fn state(&self) -> SheetState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SheetState) {
        self.state = state;
    }

    /// Row and column content
    pub fn data(&self) -> &SheetData {
        &self.data
    }

    /// Row and column content, for editing. Marks the sheet for rewrite.
    pub fn data_mut(&mut self) -> &mut SheetData {
        self.dirty = true;
        &mut self.data
    }

    /// Hyperlinks read from the part
    pub fn hyperlinks(&self) -> &[Hyperlink] {
        &self.hyperlinks
    }

    /// Whether the tab is selected
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Select or deselect the tab. Only the view flag is rewritten on save.
    pub fn set_selected(&mut self, selected: bool) {
        if self.selected != selected {
            self.selected = selected;
            self.view_dirty = true;
        }
    }

    /// Whether the part must be rewritten on save
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.view_dirty
    }

    /// Whether the cell content changed since the last save
    pub fn is_content_dirty(&self) -> bool {
        self.dirty
    }

    /// Record the bytes just written for this sheet
    pub(crate) fn mark_saved(&mut self, bytes: Vec<u8>) {
        self.source = Some(bytes);
        self.dirty = false;
        self.view_dirty = false;
    }

    /// Entry for the workbook part's sheet list
    pub fn entry(&self) -> SheetEntry {
        SheetEntry {
            name: self.name.clone(),
            sheet_id: self.sheet_id,
            rel_id: self.rel_id.clone(),
            state: self.state,
        }
    }

    /// Serialize as a worksheet document.
    ///
    /// A sheet read from a package rewrites its source; a new sheet gets a
    /// minimal document.
    pub fn to_xml(&self) -> XlsxResult<Vec<u8>> {
        match &self.source {
            Some(raw) => self.rewrite(raw),
            None => Ok(self.default_xml().into_bytes()),
        }
    }

    fn rewrite(&self, raw: &[u8]) -> XlsxResult<Vec<u8>> {
        let mut xml_reader = Reader::from_reader(raw);
        let mut writer = Writer::new(Vec::with_capacity(raw.len() + 256));

        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut prefix = String::new();
        let mut skip_until: Option<usize> = None;
        let mut views_seen = false;
        let mut view_written = false;
        let mut cols_written = false;

        loop {
            let event = match xml_reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => return Err(XlsxError::Xml(e)),
            };

            if let Some(skip_depth) = skip_until {
                match event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => {
                        depth -= 1;
                        if depth == skip_depth {
                            skip_until = None;
                        }
                    }
                    Event::Eof => break,
                    _ => {}
                }
                buf.clear();
                continue;
            }

            let (elem, is_start) = match event {
                Event::Eof => break,
                Event::Start(e) => (e, true),
                Event::Empty(e) => (e, false),
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    writer.write_event(Event::End(e))?;
                    buf.clear();
                    continue;
                }
                other => {
                    writer.write_event(other)?;
                    buf.clear();
                    continue;
                }
            };

            if depth == 0 {
                let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
                if let Some((p, _)) = name.split_once(':') {
                    prefix = format!("{p}:");
                }
                emit(&mut writer, elem, is_start, &mut depth)?;
                buf.clear();
                continue;
            }

            if depth == 1 {
                let local = elem.local_name();
                let local = local.as_ref();
                // sheetViews follows sheetPr and dimension; a source without
                // one gets a view only when it has to carry the selection
                if !views_seen && !matches!(local, b"sheetPr" | b"dimension" | b"sheetViews") {
                    if self.selected {
                        writer
                            .get_mut()
                            .extend_from_slice(self.sheet_views_xml(&prefix).as_bytes());
                    }
                    views_seen = true;
                }
                let replacement = match local {
                    b"sheetViews" => {
                        views_seen = true;
                        None
                    }
                    b"dimension" if self.dirty => Some(self.dimension_xml(&prefix)),
                    b"cols" if self.dirty => {
                        cols_written = true;
                        Some(self.cols_xml(&prefix))
                    }
                    b"sheetData" if self.dirty => {
                        let mut xml = String::new();
                        if !cols_written {
                            xml.push_str(&self.cols_xml(&prefix));
                            cols_written = true;
                        }
                        xml.push_str(&self.sheet_data_xml(&prefix));
                        Some(xml)
                    }
                    _ => None,
                };
                if let Some(xml) = replacement {
                    writer.get_mut().extend_from_slice(xml.as_bytes());
                    if is_start {
                        skip_until = Some(depth);
                        depth += 1;
                    }
                    buf.clear();
                    continue;
                }
            }

            if !view_written && depth == 2 && elem.local_name().as_ref() == b"sheetView" {
                view_written = true;
                let view = self.rewrite_view(&elem);
                emit(&mut writer, view, is_start, &mut depth)?;
                buf.clear();
                continue;
            }

            emit(&mut writer, elem, is_start, &mut depth)?;
            buf.clear();
        }

        Ok(writer.into_inner())
    }

    /// Copy of a `<sheetView>` with `tabSelected` matching the model, kept
    /// in its original attribute position when present
    fn rewrite_view(&self, elem: &BytesStart<'_>) -> BytesStart<'static> {
        let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
        let mut view = BytesStart::new(name);
        let mut placed = false;
        for attr in elem.attributes().flatten() {
            if attr.key.as_ref() == b"tabSelected" {
                if self.selected && !placed {
                    view.push_attribute(("tabSelected", "1"));
                    placed = true;
                }
                continue;
            }
            view.push_attribute(attr);
        }
        if self.selected && !placed {
            view.push_attribute(("tabSelected", "1"));
        }
        view
    }

    fn default_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.data.row_count() * 64);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<worksheet xmlns="{SPREADSHEETML_NS}" xmlns:r="{RELATIONSHIPS_NS}">"#
        ));
        xml.push_str(&self.dimension_xml(""));
        xml.push_str(&self.sheet_views_xml(""));
        xml.push_str(r#"<sheetFormatPr defaultRowHeight="15"/>"#);
        xml.push_str(&self.cols_xml(""));
        xml.push_str(&self.sheet_data_xml(""));

        if !self.hyperlinks.is_empty() {
            xml.push_str("<hyperlinks>");
            for link in &self.hyperlinks {
                write_hyperlink(&mut xml, link);
            }
            xml.push_str("</hyperlinks>");
        }

        xml.push_str(
            r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
        );
        xml.push_str("</worksheet>");
        xml
    }

    fn dimension_xml(&self, prefix: &str) -> String {
        let dimension = self
            .data
            .used_range()
            .map(|r| {
                if r.start == r.end {
                    r.start.to_a1_string()
                } else {
                    r.to_a1_string()
                }
            })
            .unwrap_or_else(|| "A1".to_string());
        format!(r#"<{prefix}dimension ref="{dimension}"/>"#)
    }

    fn sheet_views_xml(&self, prefix: &str) -> String {
        let selected = if self.selected { r#" tabSelected="1""# } else { "" };
        format!(
            r#"<{prefix}sheetViews><{prefix}sheetView{selected} workbookViewId="0"/></{prefix}sheetViews>"#
        )
    }

    /// Empty when there are no column definitions
    fn cols_xml(&self, prefix: &str) -> String {
        if self.data.columns().is_empty() {
            return String::new();
        }
        let mut xml = format!("<{prefix}cols>");
        for col in self.data.columns() {
            write_column(&mut xml, prefix, col);
        }
        xml.push_str(&format!("</{prefix}cols>"));
        xml
    }

    fn sheet_data_xml(&self, prefix: &str) -> String {
        if self.data.row_count() == 0 {
            return format!("<{prefix}sheetData/>");
        }
        let mut xml = String::with_capacity(self.data.row_count() * 64);
        xml.push_str(&format!("<{prefix}sheetData>"));
        for row in self.data.rows() {
            write_row(&mut xml, prefix, row);
        }
        xml.push_str(&format!("</{prefix}sheetData>"));
        xml
    }
}

fn emit(
    writer: &mut Writer<Vec<u8>>,
    elem: BytesStart<'_>,
    is_start: bool,
    depth: &mut usize,
) -> XlsxResult<()> {
    if is_start {
        writer.write_event(Event::Start(elem))?;
        *depth += 1;
    } else {
        writer.write_event(Event::Empty(elem))?;
    }
    Ok(())
}

fn parse_row(e: &BytesStart<'_>, previous: Option<u32>) -> XlsxResult<Row> {
    let mut index = previous.map_or(0, |r| r + 1);
    let mut row = Row::new(index);
    let mut custom_format = false;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"r" => {
                index = value
                    .parse::<u32>()
                    .map_err(|_| XlsxError::Parse(format!("invalid row number {value:?}")))?
                    .saturating_sub(1);
            }
            b"ht" => row.height = value.parse().ok(),
            b"customHeight" => row.custom_height = is_true(&value),
            b"hidden" => row.hidden = is_true(&value),
            b"s" => row.style_index = value.parse().ok(),
            b"customFormat" => custom_format = is_true(&value),
            _ => {}
        }
    }
    row.index = index;
    if !custom_format {
        row.style_index = None;
    }
    Ok(row)
}

fn parse_cell(e: &BytesStart<'_>, next_col: u16) -> XlsxResult<RawCell> {
    let mut cell = RawCell::new(next_col);
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"r" => cell.column = CellAddress::parse(&value)?.col,
            b"t" => cell.cell_type = Some(value.into_owned()),
            b"s" => cell.style_index = value.parse().ok(),
            _ => {}
        }
    }
    Ok(cell)
}

fn formula_attributes(e: &BytesStart<'_>) -> XlsxResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        attrs.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(attrs)
}

fn parse_column(e: &BytesStart<'_>) -> XlsxResult<ColumnData> {
    let mut min = 1u16;
    let mut max = 1u16;
    let mut col = ColumnData::range(0, 0);
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"min" => min = value.parse().unwrap_or(1),
            b"max" => max = value.parse().unwrap_or(min),
            b"width" => col.width = value.parse().ok(),
            b"customWidth" => col.custom_width = is_true(&value),
            b"hidden" => col.hidden = is_true(&value),
            b"outlineLevel" => col.outline_level = value.parse().unwrap_or(0),
            b"style" => col.style_index = value.parse().ok(),
            b"bestFit" => col.best_fit = is_true(&value),
            _ => {}
        }
    }
    col.min = min.saturating_sub(1);
    col.max = max.max(min).saturating_sub(1);
    Ok(col)
}

fn parse_hyperlink(e: &BytesStart<'_>) -> XlsxResult<Hyperlink> {
    let mut link = Hyperlink {
        reference: String::new(),
        rel_id: None,
        location: None,
        display: None,
        tooltip: None,
        target: None,
    };
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?.into_owned();
        match attr.key.as_ref() {
            b"ref" => link.reference = value,
            b"location" => link.location = Some(value),
            b"display" => link.display = Some(value),
            b"tooltip" => link.tooltip = Some(value),
            key if attr.key.local_name().as_ref() == b"id" && key != b"id" => {
                link.rel_id = Some(value)
            }
            _ => {}
        }
    }
    Ok(link)
}

fn write_column(xml: &mut String, prefix: &str, col: &ColumnData) {
    xml.push_str(&format!(
        r#"<{prefix}col min="{}" max="{}""#,
        col.min + 1,
        col.max + 1
    ));
    if let Some(width) = col.width {
        xml.push_str(&format!(r#" width="{width}""#));
    }
    if let Some(style) = col.style_index {
        xml.push_str(&format!(r#" style="{style}""#));
    }
    if col.hidden {
        xml.push_str(r#" hidden="1""#);
    }
    if col.best_fit {
        xml.push_str(r#" bestFit="1""#);
    }
    if col.custom_width {
        xml.push_str(r#" customWidth="1""#);
    }
    if col.outline_level > 0 {
        xml.push_str(&format!(r#" outlineLevel="{}""#, col.outline_level));
    }
    xml.push_str("/>");
}

fn write_row(xml: &mut String, prefix: &str, row: &Row) {
    xml.push_str(&format!(r#"<{prefix}row r="{}""#, row.index + 1));
    if let Some(style) = row.style_index {
        xml.push_str(&format!(r#" s="{style}" customFormat="1""#));
    }
    if let Some(height) = row.height {
        xml.push_str(&format!(r#" ht="{height}""#));
    }
    if row.hidden {
        xml.push_str(r#" hidden="1""#);
    }
    if row.custom_height {
        xml.push_str(r#" customHeight="1""#);
    }
    if row.cells.is_empty() {
        xml.push_str("/>");
        return;
    }
    xml.push('>');

    for cell in row.cells.values() {
        write_cell(xml, prefix, row.index, cell);
    }
    xml.push_str(&format!("</{prefix}row>"));
}

fn write_cell(xml: &mut String, prefix: &str, row: u32, cell: &RawCell) {
    let cell_ref = CellAddress::new(row, cell.column).to_a1_string();
    xml.push_str(&format!(r#"<{prefix}c r="{cell_ref}""#));
    if let Some(style) = cell.style_index {
        xml.push_str(&format!(r#" s="{style}""#));
    }
    if let Some(t) = &cell.cell_type {
        xml.push_str(&format!(r#" t="{}""#, escape(t.as_str())));
    }
    if cell.formula.is_none() && cell.value.is_none() {
        xml.push_str("/>");
        return;
    }
    xml.push('>');
    if let Some(formula) = &cell.formula {
        xml.push_str(&format!("<{prefix}f"));
        for (key, value) in &cell.formula_attributes {
            xml.push_str(&format!(r#" {key}="{}""#, escape(value.as_str())));
        }
        if formula.is_empty() {
            xml.push_str("/>");
        } else {
            xml.push_str(&format!(">{}</{prefix}f>", escape(formula.as_str())));
        }
    }
    if let Some(value) = &cell.value {
        if cell.cell_type.as_deref() == Some("inlineStr") {
            xml.push_str(&format!(
                r#"<{prefix}is><{prefix}t xml:space="preserve">{}</{prefix}t></{prefix}is>"#,
                escape(value.as_str())
            ));
        } else {
            xml.push_str(&format!("<{prefix}v>{}</{prefix}v>", escape(value.as_str())));
        }
    }
    xml.push_str(&format!("</{prefix}c>"));
}

fn write_hyperlink(xml: &mut String, link: &Hyperlink) {
    xml.push_str(&format!(r#"<hyperlink ref="{}""#, escape(link.reference.as_str())));
    if let Some(id) = &link.rel_id {
        xml.push_str(&format!(r#" r:id="{}""#, escape(id.as_str())));
    }
    if let Some(location) = &link.location {
        xml.push_str(&format!(r#" location="{}""#, escape(location.as_str())));
    }
    if let Some(display) = &link.display {
        xml.push_str(&format!(r#" display="{}""#, escape(display.as_str())));
    }
    if let Some(tooltip) = &link.tooltip {
        xml.push_str(&format!(r#" tooltip="{}""#, escape(tooltip.as_str())));
    }
    xml.push_str("/>");
}

fn is_true(value: &str) -> bool {
    value == "1" || value == "true"
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcbook_opc::{Relationship, TargetMode};
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews>
  <cols><col min="2" max="3" width="20.5" customWidth="1"/></cols>
  <sheetData>
    <row r="1" ht="30" customHeight="1">
      <c r="A1" t="s"><v>0</v></c>
      <c r="C1" s="2"><f>SUM(A2:A3)</f><v>7</v></c>
    </row>
    <row r="3" hidden="1">
      <c r="B3" t="inlineStr"><is><t>inline &amp; text</t></is></c>
      <c s="1"/>
    </row>
  </sheetData>
  <hyperlinks>
    <hyperlink ref="A1" r:id="rId1"/>
    <hyperlink ref="B3" location="'Other'!A1" display="jump"/>
  </hyperlinks>
</worksheet>"#;

    fn entry() -> SheetEntry {
        SheetEntry {
            name: "Data".into(),
            sheet_id: 1,
            rel_id: "rId1".into(),
            state: SheetState::Visible,
        }
    }

    #[test]
    fn parse_reads_rows_cells_and_views() {
        let sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", SHEET.as_bytes()).unwrap();
        assert!(sheet.is_selected());
        assert!(!sheet.is_dirty());

        let data = sheet.data();
        assert_eq!(data.row_count(), 2);
        assert_eq!(data.row(0).unwrap().height, Some(30.0));
        assert!(data.row(2).unwrap().hidden);

        let a1 = data.cell(0, 0).unwrap();
        assert_eq!(a1.cell_type.as_deref(), Some("s"));
        assert_eq!(a1.value.as_deref(), Some("0"));

        let c1 = data.cell(0, 2).unwrap();
        assert_eq!(c1.formula.as_deref(), Some("SUM(A2:A3)"));
        assert_eq!(c1.style_index, Some(2));

        assert_eq!(data.cell(2, 1).unwrap().value.as_deref(), Some("inline & text"));
        // a cell without r takes the next column
        assert_eq!(data.cell(2, 2).unwrap().style_index, Some(1));

        assert_eq!(data.columns().len(), 1);
        assert_eq!((data.columns()[0].min, data.columns()[0].max), (1, 2));
        assert_eq!(sheet.hyperlinks().len(), 2);
    }

    #[test]
    fn hyperlinks_resolve_through_relationships() {
        let mut sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", SHEET.as_bytes()).unwrap();
        let mut rels = RelationshipSet::new();
        rels.insert(
            Relationship::new(
                "rId1",
                crate::relation::HYPERLINK,
                "https://example.com/",
                TargetMode::External,
            ),
            "sheet",
        )
        .unwrap();
        sheet.resolve_hyperlinks(&rels);

        assert_eq!(sheet.hyperlinks()[0].target.as_deref(), Some("https://example.com/"));
        assert_eq!(sheet.hyperlinks()[1].target, None);
        assert_eq!(sheet.hyperlinks()[1].location.as_deref(), Some("'Other'!A1"));
    }

    /// A sheet with markup the model does not know about
    const MARKED: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheetPr><tabColor rgb="FF00B050"/></sheetPr>
  <dimension ref="A1:D2"/>
  <sheetViews><sheetView tabSelected="1" zoomScale="120" workbookViewId="0"><selection activeCell="B2" sqref="B2"/></sheetView></sheetViews>
  <sheetFormatPr defaultRowHeight="15"/>
  <sheetData>
    <row r="1" spans="1:4"><c r="A1"><f t="shared" ref="A1:A2" si="0">B1*2</f><v>2</v></c><c r="B1"><v>1</v></c></row>
    <row r="2" spans="1:4"><c r="A2"><f t="shared" si="0"/><v>4</v></c><c r="B2"><v>2</v></c></row>
  </sheetData>
  <mergeCells count="1"><mergeCell ref="C1:D1"/></mergeCells>
  <conditionalFormatting sqref="B1:B2"><cfRule type="cellIs" dxfId="0" priority="1" operator="greaterThan"><formula>1</formula></cfRule></conditionalFormatting>
  <pageMargins left="0.5" right="0.5" top="1" bottom="1" header="0.3" footer="0.3"/>
  <pageSetup orientation="landscape"/>
  <drawing r:id="rId2"/>
</worksheet>"#;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn shared_formula_attributes_are_read() {
        let sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", MARKED.as_bytes()).unwrap();
        let a1 = sheet.data().cell(0, 0).unwrap();
        assert_eq!(a1.formula.as_deref(), Some("B1*2"));
        assert_eq!(
            a1.formula_attributes,
            vec![
                ("t".to_string(), "shared".to_string()),
                ("ref".to_string(), "A1:A2".to_string()),
                ("si".to_string(), "0".to_string()),
            ]
        );
        let a2 = sheet.data().cell(1, 0).unwrap();
        assert_eq!(a2.formula.as_deref(), Some(""));
        assert_eq!(a2.formula_kind(), Some("shared"));
        assert_eq!(a2.value.as_deref(), Some("4"));
    }

    #[test]
    fn deselecting_only_drops_the_view_flag() {
        let mut sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", MARKED.as_bytes()).unwrap();
        sheet.set_selected(false);
        assert!(sheet.is_dirty());
        assert!(!sheet.is_content_dirty());

        let out = text(sheet.to_xml().unwrap());
        assert_eq!(out, MARKED.replace(r#" tabSelected="1""#, ""));
    }

    #[test]
    fn selecting_keeps_attribute_order_and_children() {
        let source = MARKED.replace(r#" tabSelected="1""#, "");
        let mut sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", source.as_bytes()).unwrap();
        assert!(!sheet.is_selected());
        sheet.set_selected(true);

        let out = text(sheet.to_xml().unwrap());
        assert!(out.contains(
            r#"<sheetView zoomScale="120" workbookViewId="0" tabSelected="1"><selection activeCell="B2" sqref="B2"/></sheetView>"#
        ));
        assert_eq!(out.replace(r#" tabSelected="1""#, ""), source);
    }

    #[test]
    fn content_edit_keeps_unmodelled_markup() {
        let mut sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", MARKED.as_bytes()).unwrap();
        sheet
            .data_mut()
            .set_cell(4, RawCell::new(3).with_value("9", None));

        let out = text(sheet.to_xml().unwrap());
        assert!(out.contains(r#"<dimension ref="A1:D5"/>"#));
        assert!(out.contains(r#"<tabColor rgb="FF00B050"/>"#));
        assert!(out.contains(r#"<mergeCells count="1"><mergeCell ref="C1:D1"/></mergeCells>"#));
        assert!(out.contains(r#"<cfRule type="cellIs" dxfId="0" priority="1" operator="greaterThan"><formula>1</formula></cfRule>"#));
        assert!(out.contains(r#"<pageSetup orientation="landscape"/>"#));
        assert!(out.contains(r#"<pageMargins left="0.5""#));
        assert!(out.contains(r#"<drawing r:id="rId2"/>"#));
        assert!(out.contains(r#"<c r="A1"><f t="shared" ref="A1:A2" si="0">B1*2</f><v>2</v></c>"#));
        assert!(out.contains(r#"<c r="A2"><f t="shared" si="0"/><v>4</v></c>"#));
        assert_eq!(out.matches("<sheetData>").count(), 1);

        let again = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", out.as_bytes()).unwrap();
        assert_eq!(again.data(), sheet.data());
        assert!(again.is_selected());
    }

    #[test]
    fn prefixed_sheet_keeps_its_prefix() {
        let source = r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData><x:row r="1"><x:c r="A1"><x:v>1</x:v></x:c></x:row></x:sheetData></x:worksheet>"#;
        let mut sheet = Worksheet::parse(&entry(), "p", source.as_bytes()).unwrap();
        sheet.data_mut().set_cell(1, RawCell::new(1).with_value("2", None));

        let out = text(sheet.to_xml().unwrap());
        assert!(out.contains(r#"<x:row r="2"><x:c r="B2"><x:v>2</x:v></x:c></x:row>"#));
        assert!(!out.contains("<row"));
        let again = Worksheet::parse(&entry(), "p", out.as_bytes()).unwrap();
        assert_eq!(again.data(), sheet.data());
    }

    #[test]
    fn selection_without_views_inserts_one() {
        let source = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetData/><pageSetup orientation="portrait"/></worksheet>"#;
        let mut sheet = Worksheet::parse(&entry(), "p", source.as_bytes()).unwrap();
        sheet.set_selected(true);

        let out = text(sheet.to_xml().unwrap());
        assert_eq!(
            out,
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews><sheetData/><pageSetup orientation="portrait"/></worksheet>"#
        );
    }

    #[test]
    fn serialized_form_parses_back() {
        let mut sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", SHEET.as_bytes()).unwrap();
        sheet.data_mut();
        let xml = text(sheet.to_xml().unwrap());
        // the source has no dimension to update
        assert!(!xml.contains("<dimension"));
        assert!(xml.contains(r#"<cols><col min="2" max="3" width="20.5" customWidth="1"/></cols>"#));

        let again = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", xml.as_bytes()).unwrap();
        assert_eq!(again.data(), sheet.data());
        assert_eq!(again.hyperlinks(), sheet.hyperlinks());
        assert!(again.is_selected());
    }

    #[test]
    fn new_sheet_with_content_has_dimension() {
        let mut sheet = Worksheet::new("S".into(), 1, "rId1".into(), "xl/worksheets/sheet1.xml".into());
        sheet
            .data_mut()
            .set_cell(2, RawCell::new(2).with_formula("A1+1").with_value("1", None));
        let xml = text(sheet.to_xml().unwrap());
        assert!(xml.contains(r#"<dimension ref="C3"/>"#));
        assert!(xml.contains(r#"<c r="C3"><f>A1+1</f><v>1</v></c>"#));
    }

    #[test]
    fn selection_and_edits_mark_dirty() {
        let mut sheet = Worksheet::parse(&entry(), "xl/worksheets/sheet1.xml", SHEET.as_bytes()).unwrap();
        sheet.set_selected(true);
        assert!(!sheet.is_dirty());
        sheet.set_selected(false);
        assert!(sheet.is_dirty());
        assert!(!sheet.is_content_dirty());

        let saved = sheet.to_xml().unwrap();
        sheet.mark_saved(saved);
        assert!(!sheet.is_dirty());
        sheet.data_mut().set_cell(9, RawCell::new(0).with_value("1", None));
        assert!(sheet.is_content_dirty());
    }

    #[test]
    fn empty_sheet_document() {
        let sheet = Worksheet::new("S".into(), 1, "rId1".into(), "xl/worksheets/sheet1.xml".into());
        let xml = text(sheet.to_xml().unwrap());
        assert!(xml.contains("<sheetData/>"));
        assert!(xml.contains(r#"<dimension ref="A1"/>"#));
        let again = Worksheet::parse(&entry(), "p", xml.as_bytes()).unwrap();
        assert!(again.data().is_empty());
    }
}
