//! Core package properties (`docProps/core.xml`)

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::OpcResult;

/// Dublin Core style metadata attached to the package.
///
/// Dates are kept as the W3CDTF text found in the part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageProperties {
    pub category: Option<String>,
    pub content_status: Option<String>,
    pub content_type: Option<String>,
    pub created: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub identifier: Option<String>,
    pub keywords: Option<String>,
    pub language: Option<String>,
    pub last_modified_by: Option<String>,
    pub last_printed: Option<String>,
    pub modified: Option<String>,
    pub revision: Option<String>,
    pub subject: Option<String>,
    pub title: Option<String>,
    pub version: Option<String>,
}

impl PackageProperties {
    /// Whether no property is set
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Copy every field of `other` into `self`.
    ///
    /// Fields are copied one by one; fields unset in `other` are left alone.
    pub fn copy_from(&mut self, other: &PackageProperties) {
        fn take(dst: &mut Option<String>, src: &Option<String>) {
            if src.is_some() {
                dst.clone_from(src);
            }
        }
        take(&mut self.category, &other.category);
        take(&mut self.content_status, &other.content_status);
        take(&mut self.content_type, &other.content_type);
        take(&mut self.created, &other.created);
        take(&mut self.creator, &other.creator);
        take(&mut self.description, &other.description);
        take(&mut self.identifier, &other.identifier);
        take(&mut self.keywords, &other.keywords);
        take(&mut self.language, &other.language);
        take(&mut self.last_modified_by, &other.last_modified_by);
        take(&mut self.last_printed, &other.last_printed);
        take(&mut self.modified, &other.modified);
        take(&mut self.revision, &other.revision);
        take(&mut self.subject, &other.subject);
        take(&mut self.title, &other.title);
        take(&mut self.version, &other.version);
    }

    fn field_mut(&mut self, local_name: &[u8]) -> Option<&mut Option<String>> {
        Some(match local_name {
            b"category" => &mut self.category,
            b"contentStatus" => &mut self.content_status,
            b"contentType" => &mut self.content_type,
            b"created" => &mut self.created,
            b"creator" => &mut self.creator,
            b"description" => &mut self.description,
            b"identifier" => &mut self.identifier,
            b"keywords" => &mut self.keywords,
            b"language" => &mut self.language,
            b"lastModifiedBy" => &mut self.last_modified_by,
            b"lastPrinted" => &mut self.last_printed,
            b"modified" => &mut self.modified,
            b"revision" => &mut self.revision,
            b"subject" => &mut self.subject,
            b"title" => &mut self.title,
            b"version" => &mut self.version,
            _ => return None,
        })
    }

    /// Parse a `cp:coreProperties` document
    pub fn parse(data: &[u8]) -> OpcResult<Self> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut props = Self::default();
        let mut current: Option<Vec<u8>> = None;
        let mut buf = Vec::new();
        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let name = e.local_name();
                    current = (name.as_ref() != b"coreProperties").then(|| name.as_ref().to_vec());
                }
                Event::Text(t) => {
                    if let Some(field) = current.as_deref().and_then(|n| props.field_mut(n)) {
                        *field = Some(t.unescape()?.into_owned());
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(props)
    }

    /// Serialize as a `cp:coreProperties` document
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(concat!(
            r#"<cp:coreProperties"#,
            r#" xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties""#,
            r#" xmlns:dc="http://purl.org/dc/elements/1.1/""#,
            r#" xmlns:dcterms="http://purl.org/dc/terms/""#,
            r#" xmlns:dcmitype="http://purl.org/dc/dcmitype/""#,
            r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#
        ));

        let fields: [(&str, &Option<String>, bool); 16] = [
            ("cp:category", &self.category, false),
            ("cp:contentStatus", &self.content_status, false),
            ("cp:contentType", &self.content_type, false),
            ("dcterms:created", &self.created, true),
            ("dc:creator", &self.creator, false),
            ("dc:description", &self.description, false),
            ("dc:identifier", &self.identifier, false),
            ("cp:keywords", &self.keywords, false),
            ("dc:language", &self.language, false),
            ("cp:lastModifiedBy", &self.last_modified_by, false),
            ("cp:lastPrinted", &self.last_printed, false),
            ("dcterms:modified", &self.modified, true),
            ("cp:revision", &self.revision, false),
            ("dc:subject", &self.subject, false),
            ("dc:title", &self.title, false),
            ("cp:version", &self.version, false),
        ];
        for (tag, value, w3cdtf) in fields {
            let Some(value) = value else { continue };
            if w3cdtf {
                xml.push_str(&format!(
                    r#"<{tag} xsi:type="dcterms:W3CDTF">{}</{tag}>"#,
                    escape(value.as_str())
                ));
            } else {
                xml.push_str(&format!("<{tag}>{}</{tag}>", escape(value.as_str())));
            }
        }

        xml.push_str("</cp:coreProperties>");
        xml
    }
}
