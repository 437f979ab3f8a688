//! Typed, directed edges between parts
//!
//! Every source (the package root or a part) owns one [`RelationshipSet`],
//! serialized as a `.rels` part next to it.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{OpcError, OpcResult};
use crate::path::resolve_target;

/// Relationships namespace used by `.rels` parts
pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// Well-known relationship types
pub mod rel_types {
    /// Main document of the package
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    /// Main document, strict flavour
    pub const STRICT_OFFICE_DOCUMENT: &str =
        "http://purl.oclc.org/ooxml/officeDocument/relationships/officeDocument";
    /// Core (Dublin Core) properties
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    /// Core properties as written by some older producers
    pub const LEGACY_CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/officedocument/2006/relationships/metadata/core-properties";
    /// Extended (application) properties
    pub const EXTENDED_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
    /// Thumbnail image
    pub const THUMBNAIL: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail";

    /// Whether a type denotes the core properties part
    pub fn is_core_properties(rel_type: &str) -> bool {
        rel_type == CORE_PROPERTIES || rel_type == LEGACY_CORE_PROPERTIES
    }

    /// Whether a type denotes the main document
    pub fn is_office_document(rel_type: &str) -> bool {
        rel_type == OFFICE_DOCUMENT || rel_type == STRICT_OFFICE_DOCUMENT
    }
}

/// Whether a relationship points into the package or outside it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    /// Target is a part of the same package
    #[default]
    Internal,
    /// Target is an opaque URI outside the package
    External,
}

/// A single relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Id, unique within the owning source
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target as written: a path relative to the source, an absolute part
    /// name, or an external URI
    pub target: String,
    /// Internal or external
    pub target_mode: TargetMode,
}

impl Relationship {
    /// Create a relationship
    pub fn new(
        id: impl Into<String>,
        rel_type: impl Into<String>,
        target: impl Into<String>,
        target_mode: TargetMode,
    ) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.into(),
            target: target.into(),
            target_mode,
        }
    }

    /// Whether the target lies outside the package
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }

    /// Part name this relationship points at, resolved against `source`
    /// (`None` = package root). External relationships have none.
    pub fn target_part(&self, source: Option<&str>) -> Option<String> {
        match self.target_mode {
            TargetMode::Internal => Some(resolve_target(source, &self.target)),
            TargetMode::External => None,
        }
    }
}

/// The relationships owned by one source, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipSet {
    rels: Vec<Relationship>,
}

impl RelationshipSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of relationships
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Iterate in document order
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    /// Look up by id
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    /// Whether an id is taken
    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// All relationships of a type
    pub fn by_type<'a, 'b>(&'a self, rel_type: &'b str) -> impl Iterator<Item = &'a Relationship> + 'b
    where
        'a: 'b,
    {
        self.rels.iter().filter(move |r| r.rel_type == rel_type)
    }

    /// First relationship of a type
    pub fn first_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.by_type(rel_type).next()
    }

    /// Smallest `rIdN` not yet used
    pub fn next_id(&self) -> String {
        (1..)
            .map(|n| format!("rId{n}"))
            .find(|id| !self.contains_id(id))
            .unwrap_or_default()
    }

    /// Add a relationship. Fails when its id is already taken; `owner` only
    /// names the source in the error.
    pub fn insert(&mut self, rel: Relationship, owner: &str) -> OpcResult<()> {
        if self.contains_id(&rel.id) {
            return Err(OpcError::DuplicateRelationshipId {
                owner: owner.to_string(),
                id: rel.id,
            });
        }
        self.rels.push(rel);
        Ok(())
    }

    /// Remove by id
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|r| r.id == id)?;
        Some(self.rels.remove(pos))
    }

    /// Parse a `.rels` part
    pub fn parse(data: &[u8]) -> OpcResult<Self> {
        let mut xml_reader = Reader::from_reader(data);
        xml_reader.trim_text(true);

        let mut set = Self::new();
        let mut buf = Vec::new();
        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id = None;
                    let mut rel_type = None;
                    let mut target = None;
                    let mut target_mode = TargetMode::Internal;

                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value()?.into_owned();
                        match attr.key.as_ref() {
                            b"Id" => id = Some(value),
                            b"Type" => rel_type = Some(value),
                            b"Target" => target = Some(value),
                            b"TargetMode" => {
                                if value.eq_ignore_ascii_case("External") {
                                    target_mode = TargetMode::External;
                                }
                            }
                            _ => {}
                        }
                    }

                    let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) else {
                        return Err(OpcError::InvalidFormat(
                            "relationship is missing Id, Type or Target".to_string(),
                        ));
                    };
                    if set.contains_id(&id) {
                        log::warn!("Ignoring duplicate relationship id {id}");
                        continue;
                    }
                    set.rels.push(Relationship::new(id, rel_type, target, target_mode));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(set)
    }

    /// Serialize as a `.rels` part
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(128 + self.rels.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Relationships xmlns="{RELATIONSHIPS_NS}">"#));
        for rel in &self.rels {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str())
            ));
            if rel.is_external() {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }
        xml.push_str("</Relationships>");
        xml
    }
}

impl<'a> IntoIterator for &'a RelationshipSet {
    type Item = &'a Relationship;
    type IntoIter = std::slice::Iter<'a, Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.rels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn parse_keeps_document_order_and_modes() {
        let set = RelationshipSet::parse(WORKBOOK_RELS.as_bytes()).unwrap();
        let ids: Vec<&str> = set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rId2", "rId1", "rId9"]);

        let link = set.get("rId9").unwrap();
        assert!(link.is_external());
        assert_eq!(link.target, "https://example.com/?a=1&b=2");
        assert_eq!(link.target_part(Some("xl/workbook.xml")), None);

        assert_eq!(
            set.get("rId1").unwrap().target_part(Some("xl/workbook.xml")).as_deref(),
            Some("xl/worksheets/sheet1.xml")
        );
    }

    #[test]
    fn next_id_fills_gaps() {
        let set = RelationshipSet::parse(WORKBOOK_RELS.as_bytes()).unwrap();
        assert_eq!(set.next_id(), "rId3");
        assert_eq!(RelationshipSet::new().next_id(), "rId1");
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut set = RelationshipSet::new();
        set.insert(Relationship::new("rId1", "t", "a.xml", TargetMode::Internal), "/")
            .unwrap();
        let err = set
            .insert(Relationship::new("rId1", "t", "b.xml", TargetMode::Internal), "/")
            .unwrap_err();
        assert!(matches!(err, OpcError::DuplicateRelationshipId { .. }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn serialized_form_parses_back() {
        let set = RelationshipSet::parse(WORKBOOK_RELS.as_bytes()).unwrap();
        let xml = set.to_xml();
        assert!(xml.contains(r#"TargetMode="External""#));
        assert!(xml.contains("a=1&amp;b=2"));
        assert_eq!(RelationshipSet::parse(xml.as_bytes()).unwrap(), set);
    }

    #[test]
    fn missing_target_is_an_error() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t"/></Relationships>"#;
        assert!(RelationshipSet::parse(xml.as_bytes()).is_err());
    }
}
