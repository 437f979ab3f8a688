//! Style table (`xl/styles.xml`) and number formats
//!
//! Fonts, fills and cell formats stay opaque; only the custom number formats
//! are modelled and rewritten.

use std::collections::{BTreeMap, HashMap};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{XlsxError, XlsxResult};
use crate::relation::SPREADSHEETML_NS;

/// First id available for custom number formats
pub const FIRST_CUSTOM_FORMAT_ID: u16 = 164;

/// Number formats every SpreadsheetML consumer knows by id
pub const BUILTIN_FORMATS: &[(u16, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (5, "\"$\"#,##0_);(\"$\"#,##0)"),
    (6, "\"$\"#,##0_);[Red](\"$\"#,##0)"),
    (7, "\"$\"#,##0.00_);(\"$\"#,##0.00)"),
    (8, "\"$\"#,##0.00_);[Red](\"$\"#,##0.00)"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "m/d/yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0_);(#,##0)"),
    (38, "#,##0_);[Red](#,##0)"),
    (39, "#,##0.00_);(#,##0.00)"),
    (40, "#,##0.00_);[Red](#,##0.00)"),
    (41, "_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
    (42, "_(\"$\"* #,##0_);_(\"$\"* (#,##0);_(\"$\"* \"-\"_);_(@_)"),
    (43, "_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
    (44, "_(\"$\"* #,##0.00_);_(\"$\"* (#,##0.00);_(\"$\"* \"-\"??_);_(@_)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mm:ss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

/// Id of a built-in format code
pub fn builtin_format_id(code: &str) -> Option<u16> {
    BUILTIN_FORMATS
        .iter()
        .find(|(_, c)| c.eq_ignore_ascii_case(code))
        .map(|(id, _)| *id)
}

/// Code of a built-in format id
pub fn builtin_format_code(id: u16) -> Option<&'static str> {
    BUILTIN_FORMATS
        .iter()
        .find(|(i, _)| *i == id)
        .map(|(_, c)| *c)
}

/// The workbook's style part
#[derive(Debug, Clone)]
pub struct StyleTable {
    num_formats: BTreeMap<u16, String>,
    font_count: usize,
    cell_xf_count: usize,
    /// Bytes the table was parsed from; `None` for a generated table
    raw: Option<Vec<u8>>,
    dirty: bool,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self {
            num_formats: BTreeMap::new(),
            font_count: 1,
            cell_xf_count: 1,
            raw: None,
            dirty: true,
        }
    }
}

impl StyleTable {
    /// A minimal style table for new workbooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `styleSheet` part
    pub fn parse(data: &[u8]) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut table = Self {
            num_formats: BTreeMap::new(),
            font_count: 0,
            cell_xf_count: 0,
            raw: Some(data.to_vec()),
            dirty: false,
        };

        let mut buf = Vec::new();
        let mut in_fonts = false;
        let mut in_cell_xfs = false;
        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"numFmt" => {
                        let mut id = None;
                        let mut code = None;
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"numFmtId" => id = attr.unescape_value()?.parse::<u16>().ok(),
                                b"formatCode" => {
                                    code = Some(attr.unescape_value()?.into_owned())
                                }
                                _ => {}
                            }
                        }
                        if let (Some(id), Some(code)) = (id, code) {
                            table.num_formats.insert(id, code);
                        }
                    }
                    b"fonts" => in_fonts = true,
                    b"cellXfs" => in_cell_xfs = true,
                    b"font" if in_fonts => table.font_count += 1,
                    b"xf" if in_cell_xfs => table.cell_xf_count += 1,
                    _ => {}
                },
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"fonts" => in_fonts = false,
                    b"cellXfs" => in_cell_xfs = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }
        Ok(table)
    }

    /// Id for a format code: the built-in id, the id already assigned to
    /// this code, or a newly assigned custom id.
    ///
    /// New ids follow the highest one in use. When that is `u16::MAX` the
    /// lowest free custom id is taken instead.
    pub fn put_number_format(&mut self, code: &str) -> XlsxResult<u16> {
        if let Some(id) = builtin_format_id(code) {
            return Ok(id);
        }
        if let Some((&id, _)) = self.num_formats.iter().find(|(_, c)| c.as_str() == code) {
            return Ok(id);
        }
        let id = self.next_format_id()?;
        self.num_formats.insert(id, code.to_string());
        self.dirty = true;
        Ok(id)
    }

    fn next_format_id(&self) -> XlsxResult<u16> {
        let after_max = match self.num_formats.keys().next_back() {
            None => Some(FIRST_CUSTOM_FORMAT_ID),
            Some(&max) => max
                .checked_add(1)
                .map(|id| id.max(FIRST_CUSTOM_FORMAT_ID)),
        };
        after_max
            .or_else(|| {
                (FIRST_CUSTOM_FORMAT_ID..=u16::MAX).find(|id| !self.num_formats.contains_key(id))
            })
            .ok_or(XlsxError::NumberFormatsExhausted)
    }

    /// Format code for an id, custom formats first
    pub fn number_format(&self, id: u16) -> Option<&str> {
        self.num_formats
            .get(&id)
            .map(String::as_str)
            .or_else(|| builtin_format_code(id))
    }

    /// Custom formats by id
    pub fn custom_formats(&self) -> &BTreeMap<u16, String> {
        &self.num_formats
    }

    /// Number of fonts
    pub fn font_count(&self) -> usize {
        self.font_count
    }

    /// Number of cell formats
    pub fn cell_xf_count(&self) -> usize {
        self.cell_xf_count
    }

    /// Whether the part must be rewritten on save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Serialize the style part. A parsed table streams its original bytes
    /// and only replaces `<numFmts>`.
    pub fn to_xml(&self) -> XlsxResult<Vec<u8>> {
        match &self.raw {
            Some(raw) => self.rewrite(raw),
            None => Ok(self.default_xml().into_bytes()),
        }
    }

    fn num_fmts_xml(&self, prefix: &str) -> String {
        if self.num_formats.is_empty() {
            return String::new();
        }
        let mut xml = format!(r#"<{prefix}numFmts count="{}">"#, self.num_formats.len());
        for (id, code) in &self.num_formats {
            xml.push_str(&format!(
                r#"<{prefix}numFmt numFmtId="{id}" formatCode="{}"/>"#,
                escape(code.as_str())
            ));
        }
        xml.push_str(&format!("</{prefix}numFmts>"));
        xml
    }

    fn rewrite(&self, raw: &[u8]) -> XlsxResult<Vec<u8>> {
        let mut xml_reader = Reader::from_reader(raw);
        let mut writer = Writer::new(Vec::with_capacity(raw.len() + 128));

        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut prefix = String::new();
        let mut skip_until: Option<usize> = None;

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

            match event {
                Event::Eof => break,
                Event::Start(e) if depth == 0 => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if let Some((p, _)) = name.split_once(':') {
                        prefix = format!("{p}:");
                    }
                    writer.write_event(Event::Start(e))?;
                    depth += 1;
                    // numFmts is the first child in schema order
                    writer
                        .get_mut()
                        .extend_from_slice(self.num_fmts_xml(&prefix).as_bytes());
                }
                Event::Start(e) if depth == 1 && e.local_name().as_ref() == b"numFmts" => {
                    skip_until = Some(depth);
                    depth += 1;
                }
                Event::Empty(e) if depth == 1 && e.local_name().as_ref() == b"numFmts" => {}
                Event::Start(e) => {
                    writer.write_event(Event::Start(e))?;
                    depth += 1;
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    writer.write_event(Event::End(e))?;
                }
                other => writer.write_event(other)?,
            }
            buf.clear();
        }

        Ok(writer.into_inner())
    }

    fn default_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<styleSheet xmlns="{SPREADSHEETML_NS}">"#));
        xml.push_str(&self.num_fmts_xml(""));
        xml.push_str(concat!(
            r#"<fonts count="1"><font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font></fonts>"#,
            r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
            r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
            r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
            r#"<dxfs count="0"/><tableStyles count="0"/>"#,
        ));
        xml.push_str("</styleSheet>");
        xml
    }
}

/// Maps number-format codes to ids and back for one workbook.
///
/// Created on first use and owned by the workbook.
#[derive(Debug)]
pub struct DataFormat {
    builtin_ids: HashMap<&'static str, u16>,
}

impl DataFormat {
    pub(crate) fn new() -> Self {
        Self {
            builtin_ids: BUILTIN_FORMATS.iter().map(|&(id, code)| (code, id)).collect(),
        }
    }

    /// Id for `code`, registering a custom format in `styles` when needed
    pub fn format_index(&self, styles: &mut StyleTable, code: &str) -> XlsxResult<u16> {
        match self.builtin_ids.get(code) {
            Some(&id) => Ok(id),
            None => styles.put_number_format(code),
        }
    }

    /// Code for `id`
    pub fn format_code<'a>(&self, styles: &'a StyleTable, id: u16) -> Option<&'a str> {
        styles.number_format(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="165" formatCode="0.000"/></numFmts><fonts count="2"><font><sz val="11"/></font><font><b/></font></fonts><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="165"/><xf numFmtId="14"/></cellXfs></styleSheet>"#;

    #[test]
    fn parse_counts_and_formats() {
        let table = StyleTable::parse(STYLES.as_bytes()).unwrap();
        assert_eq!(table.font_count(), 2);
        assert_eq!(table.cell_xf_count(), 3);
        assert_eq!(table.number_format(165), Some("0.000"));
        assert_eq!(table.number_format(14), Some("m/d/yy"));
        assert_eq!(table.number_format(200), None);
        assert!(!table.is_dirty());
    }

    #[test]
    fn put_number_format_assigns_ids() {
        let mut table = StyleTable::parse(STYLES.as_bytes()).unwrap();
        assert_eq!(table.put_number_format("0.00%").unwrap(), 10);
        assert_eq!(table.put_number_format("0.000").unwrap(), 165);
        assert!(!table.is_dirty());
        assert_eq!(table.put_number_format("yyyy-mm-dd").unwrap(), 166);
        assert!(table.is_dirty());

        let mut fresh = StyleTable::new();
        assert_eq!(fresh.put_number_format("0.0").unwrap(), FIRST_CUSTOM_FORMAT_ID);
    }

    #[test]
    fn highest_format_id_in_use_falls_back_to_free_slot() {
        let styles = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="2"><numFmt numFmtId="164" formatCode="0.0"/><numFmt numFmtId="65535" formatCode="0.0000"/></numFmts></styleSheet>"#;
        let mut table = StyleTable::parse(styles.as_bytes()).unwrap();
        assert_eq!(table.put_number_format("0.00000").unwrap(), 165);
        assert_eq!(table.put_number_format("0.000000").unwrap(), 166);
        assert_eq!(table.number_format(65535), Some("0.0000"));
    }

    #[test]
    fn full_format_table_is_an_error() {
        let mut table = StyleTable::new();
        for id in FIRST_CUSTOM_FORMAT_ID..=u16::MAX {
            table.num_formats.insert(id, format!("0.0 \"n{id}\""));
        }
        assert!(matches!(
            table.put_number_format("#,##0.000"),
            Err(XlsxError::NumberFormatsExhausted)
        ));
        assert!(!table.is_dirty());
    }

    #[test]
    fn rewrite_only_touches_num_fmts() {
        let mut table = StyleTable::parse(STYLES.as_bytes()).unwrap();
        table.put_number_format("yyyy-mm-dd").unwrap();
        let out = String::from_utf8(table.to_xml().unwrap()).unwrap();

        assert!(out.contains(r#"<numFmts count="2">"#));
        assert!(out.contains(r#"<cellXfs count="3"><xf numFmtId="0"/>"#));
        let again = StyleTable::parse(out.as_bytes()).unwrap();
        assert_eq!(again.custom_formats(), table.custom_formats());
        assert_eq!(again.font_count(), 2);
    }

    #[test]
    fn generated_table_parses() {
        let mut table = StyleTable::new();
        table.put_number_format("0.0").unwrap();
        let again = StyleTable::parse(&table.to_xml().unwrap()).unwrap();
        assert_eq!(again.number_format(164), Some("0.0"));
        assert_eq!(again.cell_xf_count(), 1);
    }

    #[test]
    fn data_format_round_trips_codes() {
        let mut styles = StyleTable::new();
        let formats = DataFormat::new();
        assert_eq!(formats.format_index(&mut styles, "General").unwrap(), 0);
        let id = formats.format_index(&mut styles, "#,##0.0").unwrap();
        assert_eq!(formats.format_code(&styles, id), Some("#,##0.0"));
        assert_eq!(formats.format_index(&mut styles, "#,##0.0").unwrap(), id);
    }
}
