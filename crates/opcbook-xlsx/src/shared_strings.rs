//! Shared string table (`xl/sharedStrings.xml`)

use std::collections::HashMap;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::relation::SPREADSHEETML_NS;

/// Deduplicated pool of cell strings.
///
/// Rich-text runs are flattened to their text when read.
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable {
    strings: Vec<String>,
    lookup: HashMap<String, usize>,
    /// Total number of references, `count` in the part
    count: usize,
    dirty: bool,
}

impl SharedStringTable {
    /// Create an empty table. It is dirty so a fresh part gets written.
    pub fn new() -> Self {
        Self {
            dirty: true,
            ..Self::default()
        }
    }

    /// Parse the `sst` part
    pub fn parse(data: &[u8]) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(false);

        let mut table = Self::default();
        let mut buf = Vec::new();
        let mut current: Option<String> = None;
        let mut in_t = false;
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"sst" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"count" {
                                table.count = attr.unescape_value()?.parse().unwrap_or(0);
                            }
                        }
                    }
                    b"si" => current = Some(String::new()),
                    b"rPh" => in_phonetic = true,
                    b"t" if !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                    table.push_loaded(String::new());
                }
                Ok(Event::Text(t)) if in_t => {
                    if let Some(s) = current.as_mut() {
                        s.push_str(&t.unescape()?);
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        if let Some(s) = current.take() {
                            table.push_loaded(s);
                        }
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        table.count = table.count.max(table.strings.len());
        Ok(table)
    }

    fn push_loaded(&mut self, s: String) {
        // duplicates in a loaded table keep their own index; lookups find the first
        self.lookup.entry(s.clone()).or_insert(self.strings.len());
        self.strings.push(s);
    }

    /// Add a reference to `s`, returning its index
    pub fn add_string(&mut self, s: &str) -> usize {
        self.count += 1;
        if let Some(&idx) = self.lookup.get(s) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), idx);
        self.dirty = true;
        idx
    }

    /// String at `index`
    pub fn string_at(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Index of `s`, if present
    pub fn index_of(&self, s: &str) -> Option<usize> {
        self.lookup.get(s).copied()
    }

    /// Number of distinct entries
    pub fn unique_count(&self) -> usize {
        self.strings.len()
    }

    /// Total number of references
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the part must be rewritten on save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Serialize as an `sst` part
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(128 + self.strings.len() * 32);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<sst xmlns="{SPREADSHEETML_NS}" count="{}" uniqueCount="{}">"#,
            self.count,
            self.strings.len()
        ));
        for s in &self.strings {
            if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                xml.push_str(&format!(
                    r#"<si><t xml:space="preserve">{}</t></si>"#,
                    escape(s.as_str())
                ));
            } else {
                xml.push_str(&format!("<si><t>{}</t></si>", escape(s.as_str())));
            }
        }
        xml.push_str("</sst>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SST: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="5" uniqueCount="3"><si><t>Hello</t></si><si><r><t>Rich </t></r><r><rPr><b/></rPr><t>text</t></r><rPh sb="0" eb="1"><t>ignored</t></rPh></si><si><t xml:space="preserve"> padded </t></si></sst>"#;

    #[test]
    fn parse_flattens_runs_and_skips_phonetics() {
        let table = SharedStringTable::parse(SST.as_bytes()).unwrap();
        assert_eq!(table.unique_count(), 3);
        assert_eq!(table.count(), 5);
        assert_eq!(table.string_at(0), Some("Hello"));
        assert_eq!(table.string_at(1), Some("Rich text"));
        assert_eq!(table.string_at(2), Some(" padded "));
        assert!(!table.is_dirty());
    }

    #[test]
    fn add_string_dedups() {
        let mut table = SharedStringTable::parse(SST.as_bytes()).unwrap();
        assert_eq!(table.add_string("Hello"), 0);
        assert!(!table.is_dirty());
        assert_eq!(table.add_string("new"), 3);
        assert!(table.is_dirty());
        assert_eq!(table.count(), 7);
        assert_eq!(table.index_of("new"), Some(3));
    }

    #[test]
    fn serialized_form_parses_back() {
        let table = SharedStringTable::parse(SST.as_bytes()).unwrap();
        let again = SharedStringTable::parse(table.to_xml().as_bytes()).unwrap();
        assert_eq!(again.string_at(2), Some(" padded "));
        assert_eq!(again.unique_count(), 3);
        assert_eq!(again.count(), 5);
    }

    #[test]
    fn new_table_is_dirty_and_empty() {
        let table = SharedStringTable::new();
        assert!(table.is_dirty());
        assert_eq!(table.unique_count(), 0);
        assert!(table.to_xml().contains(r#"uniqueCount="0""#));
    }
}
