//! The workbook part (`xl/workbook.xml`)
//!
//! Only the sheet list, the defined names, the first workbook view and the
//! 1904 date flag are modelled. Everything else in the document passes
//! through a commit unchanged.

use std::borrow::Cow;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use opcbook_core::DefinedName;

use crate::error::{XlsxError, XlsxResult};
use crate::relation::{RELATIONSHIPS_NS, SPREADSHEETML_NS};

/// Visibility of a sheet tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetState {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetState {
    fn parse(s: &str) -> Self {
        match s {
            "hidden" => SheetState::Hidden,
            "veryHidden" => SheetState::VeryHidden,
            _ => SheetState::Visible,
        }
    }

    fn as_attr(&self) -> Option<&'static str> {
        match self {
            SheetState::Visible => None,
            SheetState::Hidden => Some("hidden"),
            SheetState::VeryHidden => Some("veryHidden"),
        }
    }
}

/// One `<sheet>` of the sheet list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    /// Relationship id binding the entry to its worksheet part
    pub rel_id: String,
    pub state: SheetState,
}

/// Top-level elements that follow `<definedNames>` in schema order
const AFTER_DEFINED_NAMES: &[&[u8]] = &[
    b"calcPr",
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

/// Parsed workbook part plus the bytes it came from
#[derive(Debug, Clone)]
pub struct WorkbookXml {
    raw: Vec<u8>,
    pub sheets: Vec<SheetEntry>,
    pub defined_names: Vec<DefinedName>,
    pub active_tab: usize,
    pub first_sheet: usize,
    pub date1904: bool,
}

impl WorkbookXml {
    /// Document for a workbook with no sheets
    pub fn new_empty() -> Self {
        let raw = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<workbook xmlns="{}" xmlns:r="{}">"#,
                r#"<workbookPr/>"#,
                r#"<bookViews><workbookView activeTab="0"/></bookViews>"#,
                r#"<sheets/>"#,
                r#"</workbook>"#
            ),
            SPREADSHEETML_NS, RELATIONSHIPS_NS
        );
        Self {
            raw: raw.into_bytes(),
            sheets: Vec::new(),
            defined_names: Vec::new(),
            active_tab: 0,
            first_sheet: 0,
            date1904: false,
        }
    }

    /// Parse the workbook part
    pub fn parse(data: &[u8]) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut wb = Self {
            raw: data.to_vec(),
            sheets: Vec::new(),
            defined_names: Vec::new(),
            active_tab: 0,
            first_sheet: 0,
            date1904: false,
        };

        let mut buf = Vec::new();
        let mut seen_root = false;
        let mut seen_view = false;
        let mut current_name: Option<DefinedName> = None;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if !seen_root => {
                    if e.local_name().as_ref() != b"workbook" {
                        return Err(XlsxError::Structural(format!(
                            "root element is <{}>, expected <workbook>",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                    seen_root = true;
                }
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheet" => {
                    wb.sheets.push(parse_sheet_entry(&e)?);
                }
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"workbookPr" =>
                {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"date1904" {
                            wb.date1904 = is_true(&attr.unescape_value()?);
                        }
                    }
                }
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"workbookView" && !seen_view =>
                {
                    seen_view = true;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"activeTab" => {
                                wb.active_tab = attr.unescape_value()?.parse().unwrap_or(0)
                            }
                            b"firstSheet" => {
                                wb.first_sheet = attr.unescape_value()?.parse().unwrap_or(0)
                            }
                            _ => {}
                        }
                    }
                }
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"definedName" => {
                    current_name = Some(parse_defined_name(&e)?);
                }
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"definedName" => {
                    wb.defined_names.push(parse_defined_name(&e)?);
                }
                Ok(Event::Text(t)) => {
                    if let Some(name) = current_name.as_mut() {
                        name.refers_to.push_str(&t.unescape()?);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(name) = current_name.as_mut() {
                        name.refers_to.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Ok(Event::End(e)) if e.local_name().as_ref() == b"definedName" => {
                    if let Some(name) = current_name.take() {
                        wb.defined_names.push(name);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        if !seen_root {
            return Err(XlsxError::Structural("workbook part is empty".into()));
        }
        Ok(wb)
    }

    /// The bytes this structure was parsed from
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Produce the workbook part for the given sheet list and names.
    ///
    /// The original document is streamed through; `<sheets>` is replaced,
    /// `<definedNames>` is replaced or dropped when `names` is empty, and the
    /// first `<workbookView>` gets `activeTab`/`firstSheet` updated.
    pub fn serialize(&self, sheets: &[SheetEntry], names: &[DefinedName]) -> XlsxResult<Vec<u8>> {
        let mut xml_reader = Reader::from_reader(self.raw.as_slice());
        let mut writer = Writer::new(Vec::with_capacity(self.raw.len() + 256));

        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut prefix = String::new();
        let mut rel_prefix = String::from("r");
        // Depth at which a dropped element started
        let mut skip_until: Option<usize> = None;
        let mut views_seen = false;
        let mut view_written = false;
        let mut sheets_written = false;
        let mut names_written = false;

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
                    if depth == 1 {
                        // closing the root: emit whatever the source lacked
                        if !sheets_written {
                            self.write_book_views_if_missing(&mut writer, &prefix, views_seen);
                            write_sheets(&mut writer, &prefix, &rel_prefix, sheets);
                            sheets_written = true;
                        }
                        if !names_written {
                            write_defined_names(&mut writer, &prefix, names);
                            names_written = true;
                        }
                    }
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
                let found = relationships_prefix(&elem);
                let mut root = elem.into_owned();
                match found {
                    Some(p) => rel_prefix = p,
                    None => root.push_attribute(("xmlns:r", RELATIONSHIPS_NS)),
                }
                emit(&mut writer, root, is_start, &mut depth)?;
                buf.clear();
                continue;
            }

            if depth == 1 {
                let local = elem.local_name();
                match local.as_ref() {
                    b"bookViews" => views_seen = true,
                    b"sheets" => {
                        self.write_book_views_if_missing(&mut writer, &prefix, views_seen);
                        write_sheets(&mut writer, &prefix, &rel_prefix, sheets);
                        sheets_written = true;
                        if is_start {
                            skip_until = Some(depth);
                            depth += 1;
                        }
                        buf.clear();
                        continue;
                    }
                    b"definedNames" => {
                        write_defined_names(&mut writer, &prefix, names);
                        names_written = true;
                        if is_start {
                            skip_until = Some(depth);
                            depth += 1;
                        }
                        buf.clear();
                        continue;
                    }
                    other if !names_written && AFTER_DEFINED_NAMES.contains(&other) => {
                        if !sheets_written {
                            self.write_book_views_if_missing(&mut writer, &prefix, views_seen);
                            write_sheets(&mut writer, &prefix, &rel_prefix, sheets);
                            sheets_written = true;
                        }
                        write_defined_names(&mut writer, &prefix, names);
                        names_written = true;
                    }
                    _ => {}
                }
            }

            if !view_written && elem.local_name().as_ref() == b"workbookView" {
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

    fn rewrite_view(&self, elem: &BytesStart<'_>) -> BytesStart<'static> {
        let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
        let mut view = BytesStart::new(name);
        for attr in elem.attributes().flatten() {
            if !matches!(attr.key.as_ref(), b"activeTab" | b"firstSheet") {
                view.push_attribute(attr);
            }
        }
        if self.first_sheet != 0 {
            view.push_attribute(("firstSheet", self.first_sheet.to_string().as_str()));
        }
        view.push_attribute(("activeTab", self.active_tab.to_string().as_str()));
        view
    }

    fn write_book_views_if_missing(&self, writer: &mut Writer<Vec<u8>>, prefix: &str, seen: bool) {
        if seen || (self.active_tab == 0 && self.first_sheet == 0) {
            return;
        }
        let mut xml = format!(r#"<{prefix}bookViews><{prefix}workbookView"#);
        if self.first_sheet != 0 {
            xml.push_str(&format!(r#" firstSheet="{}""#, self.first_sheet));
        }
        xml.push_str(&format!(
            r#" activeTab="{}"/></{prefix}bookViews>"#,
            self.active_tab
        ));
        writer.get_mut().extend_from_slice(xml.as_bytes());
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

fn write_sheets(writer: &mut Writer<Vec<u8>>, prefix: &str, rel_prefix: &str, sheets: &[SheetEntry]) {
    let out = writer.get_mut();
    if sheets.is_empty() {
        out.extend_from_slice(format!("<{prefix}sheets/>").as_bytes());
        return;
    }
    let mut xml = format!("<{prefix}sheets>");
    for sheet in sheets {
        xml.push_str(&format!(
            r#"<{prefix}sheet name="{}" sheetId="{}""#,
            escape(sheet.name.as_str()),
            sheet.sheet_id
        ));
        if let Some(state) = sheet.state.as_attr() {
            xml.push_str(&format!(r#" state="{state}""#));
        }
        xml.push_str(&format!(
            r#" {rel_prefix}:id="{}"/>"#,
            escape(sheet.rel_id.as_str())
        ));
    }
    xml.push_str(&format!("</{prefix}sheets>"));
    out.extend_from_slice(xml.as_bytes());
}

/// An empty collection writes nothing
fn write_defined_names(writer: &mut Writer<Vec<u8>>, prefix: &str, names: &[DefinedName]) {
    if names.is_empty() {
        return;
    }
    let mut xml = format!("<{prefix}definedNames>");
    for name in names {
        xml.push_str(&format!(
            r#"<{prefix}definedName name="{}""#,
            escape(name.name.as_str())
        ));
        if let Some(comment) = &name.comment {
            xml.push_str(&format!(r#" comment="{}""#, escape(comment.as_str())));
        }
        if let Some(id) = name.local_sheet_id {
            xml.push_str(&format!(r#" localSheetId="{id}""#));
        }
        if name.hidden {
            xml.push_str(r#" hidden="1""#);
        }
        xml.push_str(&format!(
            ">{}</{prefix}definedName>",
            escape(name.refers_to.as_str())
        ));
    }
    xml.push_str(&format!("</{prefix}definedNames>"));
    writer.get_mut().extend_from_slice(xml.as_bytes());
}

/// Prefix bound to the relationships namespace on the root element
fn relationships_prefix(root: &BytesStart<'_>) -> Option<String> {
    root.attributes().flatten().find_map(|attr| {
        let key = attr.key.as_ref();
        let prefix = key.strip_prefix(b"xmlns:")?;
        (attr.value.as_ref() == RELATIONSHIPS_NS.as_bytes())
            .then(|| String::from_utf8_lossy(prefix).into_owned())
    })
}

fn parse_sheet_entry(e: &BytesStart<'_>) -> XlsxResult<SheetEntry> {
    let mut name = None;
    let mut sheet_id = 0;
    let mut rel_id = None;
    let mut state = SheetState::Visible;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"name" => name = Some(value.into_owned()),
            b"sheetId" => sheet_id = value.parse().unwrap_or(0),
            b"state" => state = SheetState::parse(&value),
            // r:id under whatever prefix the document uses
            key if attr.key.local_name().as_ref() == b"id" && key != b"id" => {
                rel_id = Some(value.into_owned())
            }
            _ => {}
        }
    }
    match (name, rel_id) {
        (Some(name), Some(rel_id)) => Ok(SheetEntry {
            name,
            sheet_id,
            rel_id,
            state,
        }),
        _ => Err(XlsxError::Structural(
            "<sheet> is missing its name or r:id".into(),
        )),
    }
}

fn parse_defined_name(e: &BytesStart<'_>) -> XlsxResult<DefinedName> {
    let mut defined = DefinedName::workbook_scope(String::new(), String::new());
    for attr in e.attributes().flatten() {
        let value: Cow<'_, str> = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"name" => defined.name = value.into_owned(),
            b"localSheetId" => defined.local_sheet_id = value.parse().ok(),
            b"hidden" => defined.hidden = is_true(&value),
            b"comment" => defined.comment = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(defined)
}

fn is_true(value: &str) -> bool {
    value == "1" || value == "true"
}
