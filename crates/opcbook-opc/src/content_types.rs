//! `[Content_Types].xml` handling

use std::collections::BTreeMap;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::OpcResult;
use crate::path::{extension, normalize};

/// Content type of `.rels` parts
pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
/// Content type of the core properties part
pub const CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
/// Generic XML
pub const XML: &str = "application/xml";
/// Fallback for parts nothing describes
pub const OCTET_STREAM: &str = "application/octet-stream";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Extension defaults and per-part overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl Default for ContentTypes {
    fn default() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert("rels".to_string(), RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), XML.to_string());
        Self {
            defaults,
            overrides: BTreeMap::new(),
        }
    }
}

impl ContentTypes {
    /// Parse `[Content_Types].xml`
    pub fn parse(data: &[u8]) -> OpcResult<Self> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut types = Self {
            defaults: BTreeMap::new(),
            overrides: BTreeMap::new(),
        };
        let mut buf = Vec::new();
        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => {
                    let mut key = None;
                    let mut content_type = None;
                    let is_default = match e.local_name().as_ref() {
                        b"Default" => true,
                        b"Override" => false,
                        _ => {
                            buf.clear();
                            continue;
                        }
                    };
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => {
                                key = Some(attr.unescape_value()?.into_owned())
                            }
                            b"ContentType" => {
                                content_type = Some(attr.unescape_value()?.into_owned())
                            }
                            _ => {}
                        }
                    }
                    if let (Some(key), Some(content_type)) = (key, content_type) {
                        if is_default {
                            types.defaults.insert(key.to_ascii_lowercase(), content_type);
                        } else {
                            types.overrides.insert(normalize(&key), content_type);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(types)
    }

    /// Content type declared for a part, override first
    pub fn content_type_for(&self, part_name: &str) -> Option<&str> {
        if let Some(ct) = self.overrides.get(part_name) {
            return Some(ct);
        }
        extension(part_name)
            .and_then(|ext| self.defaults.get(&ext))
            .map(String::as_str)
    }

    /// Default content type for an extension
    pub fn default_for(&self, ext: &str) -> Option<&str> {
        self.defaults.get(&ext.to_ascii_lowercase()).map(String::as_str)
    }

    /// Serialize for the given `(part name, content type)` pairs.
    ///
    /// Extension defaults are kept; a part gets an override only when its
    /// content type differs from its extension's default.
    pub fn to_xml<'a, I>(&self, parts: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{CONTENT_TYPES_NS}">"#));

        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(ext.as_str()),
                escape(ct.as_str())
            ));
        }

        let mut overrides: BTreeMap<&str, &str> = BTreeMap::new();
        for (name, ct) in parts {
            let default = extension(name).and_then(|ext| self.defaults.get(&ext));
            if default.map(String::as_str) != Some(ct) {
                overrides.insert(name, ct);
            }
        }
        for (name, ct) in overrides {
            xml.push_str(&format!(
                r#"<Override PartName="/{}" ContentType="{}"/>"#,
                escape(name),
                escape(ct)
            ));
        }

        xml.push_str("</Types>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="XML" ContentType="application/xml"/>
  <Default Extension="png" ContentType="image/png"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
</Types>"#;

    #[test]
    fn lookup_prefers_override() {
        let types = ContentTypes::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            types.content_type_for("xl/workbook.xml"),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml")
        );
        assert_eq!(types.content_type_for("xl/media/image1.PNG"), Some("image/png"));
        assert_eq!(types.content_type_for("xl/other.xml"), Some(XML));
        assert_eq!(types.content_type_for("xl/vbaProject.bin"), None);
    }

    #[test]
    fn serialization_only_overrides_non_defaults() {
        let types = ContentTypes::default();
        let xml = types.to_xml([
            ("xl/workbook.xml", "application/custom+xml"),
            ("docProps/app.xml", XML),
            ("xl/media/image1.png", "image/png"),
        ]);
        assert!(xml.contains(r#"<Override PartName="/xl/workbook.xml" ContentType="application/custom+xml"/>"#));
        assert!(xml.contains(r#"<Override PartName="/xl/media/image1.png""#));
        assert!(!xml.contains("/docProps/app.xml"));

        let reparsed = ContentTypes::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.content_type_for("xl/workbook.xml"), Some("application/custom+xml"));
    }
}
