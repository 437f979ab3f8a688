//! Deep copy of a package into a fresh writable one
//!
//! The copy walks the relationship graph from the package root. A part is
//! created in the destination before its own relationships are followed, and
//! every internal target is checked against the destination first, so shared
//! targets are copied once and cycles terminate.

use std::io::{self, Seek, SeekFrom};

use crate::error::{OpcError, OpcResult};
use crate::package::{Package, PackageAccess};
use crate::relationship::{rel_types, Relationship, TargetMode};
use crate::store::{PartStore, RelationshipGraph, RelationshipOwner};

/// Copies parts and relationships from one store into another
pub struct PackageCloner<'a, S> {
    source: &'a S,
    parts_copied: usize,
}

impl<'a, S> PackageCloner<'a, S>
where
    S: PartStore + RelationshipGraph,
{
    /// Create a cloner reading from `source`
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            parts_copied: 0,
        }
    }

    /// Number of parts created so far
    pub fn parts_copied(&self) -> usize {
        self.parts_copied
    }

    /// Copy everything reachable from the source's root relationships.
    ///
    /// Core-properties relationships are skipped; the caller copies those
    /// properties as values.
    pub fn copy_root<D>(&mut self, dest: &mut D) -> OpcResult<()>
    where
        D: PartStore + RelationshipGraph,
    {
        let root: Vec<Relationship> = self
            .source
            .relationships_of(RelationshipOwner::Package)?
            .iter()
            .cloned()
            .collect();

        for rel in root {
            if rel_types::is_core_properties(&rel.rel_type) {
                continue;
            }
            self.copy_relationship(dest, None, &rel)?;
        }
        Ok(())
    }

    /// Re-create one relationship owned by `owner` in `dest` with its id,
    /// type and target text unchanged, then copy its target if it is an
    /// internal part not yet present.
    fn copy_relationship<D>(
        &mut self,
        dest: &mut D,
        owner: Option<&str>,
        rel: &Relationship,
    ) -> OpcResult<()>
    where
        D: PartStore + RelationshipGraph,
    {
        let dest_owner = match owner {
            None => RelationshipOwner::Package,
            Some(name) => RelationshipOwner::Part(name),
        };
        dest.insert_relationship(dest_owner, rel.clone())?;

        if rel.target_mode == TargetMode::Internal {
            let target = rel
                .target_part(owner)
                .ok_or_else(|| OpcError::InvalidFormat(rel.target.clone()))?;
            self.copy_part(dest, &target)?;
        }
        Ok(())
    }

    fn copy_part<D>(&mut self, dest: &mut D, name: &str) -> OpcResult<()>
    where
        D: PartStore + RelationshipGraph,
    {
        if dest.has_part(name) {
            return Ok(());
        }
        let source = self.source;
        let Some(source_part) = source.part(name) else {
            log::warn!("Relationship target /{name} is not in the package; keeping the dangling relationship");
            return Ok(());
        };

        dest.create_part(name, source_part.content_type())?;
        {
            let mut reader = source.open_read(name)?;
            let mut writer = dest.open_write(name)?;
            io::copy(&mut reader, &mut writer)?;
            writer.finish();
        }
        self.parts_copied += 1;

        for rel in source_part.relationships().iter() {
            self.copy_relationship(dest, Some(name), rel)?;
        }
        Ok(())
    }
}

/// Copy `source` into `dest`: every reachable part and relationship, plus the
/// core properties field by field.
pub fn clone_into(source: &Package, dest: &mut Package) -> OpcResult<()> {
    let mut cloner = PackageCloner::new(source);
    cloner.copy_root(dest)?;
    dest.properties_mut()?.copy_from(source.properties());
    log::debug!("Cloned {} parts", cloner.parts_copied());
    Ok(())
}

impl Package {
    /// Produce an independent, writable deep copy.
    ///
    /// The copy is round-tripped through a temporary file that is removed
    /// before returning. Any failure is reported as [`OpcError::Clone`].
    pub fn clone_writable(&self) -> OpcResult<Package> {
        self.clone_through_temp_file()
            .map_err(|e| OpcError::Clone { source: Box::new(e) })
    }

    fn clone_through_temp_file(&self) -> OpcResult<Package> {
        let mut dest = Package::new();
        clone_into(self, &mut dest)?;

        let mut backing = tempfile::Builder::new()
            .prefix("opcbook-")
            .suffix(".tmp")
            .tempfile()?;
        dest.save(backing.as_file_mut())?;
        backing.as_file_mut().seek(SeekFrom::Start(0))?;

        let reopened = Package::read_with_access(
            io::BufReader::new(backing.as_file_mut()),
            PackageAccess::ReadWrite,
        )?;
        backing.close()?;
        Ok(reopened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::Part;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};

    const XML: &str = "application/xml";

    fn part(pkg: &mut Package, name: &str, body: &str) {
        pkg.create_part(name, XML).unwrap();
        pkg.open_write(name).unwrap().write_all(body.as_bytes()).unwrap();
    }

    fn link(pkg: &mut Package, from: Option<&str>, to: &str, id: &str) {
        let owner = match from {
            None => RelationshipOwner::Package,
            Some(name) => RelationshipOwner::Part(name),
        };
        pkg.add_relationship(owner, to, TargetMode::Internal, "urn:test", Some(id))
            .unwrap();
    }

    fn read_only(pkg: &Package) -> Package {
        Package::from_reader(Cursor::new(pkg.to_bytes().unwrap())).unwrap()
    }

    fn snapshot(pkg: &Package) -> Vec<(String, Vec<u8>, Vec<Relationship>)> {
        pkg.parts()
            .map(|p: &Part| {
                (
                    p.name().to_string(),
                    p.data().to_vec(),
                    p.relationships().iter().cloned().collect(),
                )
            })
            .collect()
    }

    #[test]
    fn shared_target_is_copied_once() {
        let mut src = Package::new();
        part(&mut src, "a.xml", "A");
        part(&mut src, "b.xml", "B");
        part(&mut src, "shared.xml", "S");
        link(&mut src, None, "a.xml", "rId1");
        link(&mut src, None, "b.xml", "rId2");
        link(&mut src, Some("a.xml"), "shared.xml", "rId1");
        link(&mut src, Some("b.xml"), "shared.xml", "rId5");

        let mut dest = Package::new();
        let mut cloner = PackageCloner::new(&src);
        cloner.copy_root(&mut dest).unwrap();

        assert_eq!(cloner.parts_copied(), 3);
        assert_eq!(dest.part_names(), vec!["a.xml", "b.xml", "shared.xml"]);
        assert_eq!(snapshot(&dest), snapshot(&src));
    }

    #[test]
    fn cycles_terminate() {
        let mut src = Package::new();
        part(&mut src, "x/a.xml", "A");
        part(&mut src, "x/b.xml", "B");
        link(&mut src, None, "x/a.xml", "rId1");
        link(&mut src, Some("x/a.xml"), "x/b.xml", "rId1");
        link(&mut src, Some("x/b.xml"), "x/a.xml", "rId1");
        // self loop
        link(&mut src, Some("x/a.xml"), "x/a.xml", "rId2");

        let cloned = read_only(&src).clone_writable().unwrap();
        assert_eq!(cloned.part_count(), 2);
        assert_eq!(snapshot(&cloned), snapshot(&src));
    }

    #[test]
    fn external_relationships_keep_id_and_uri() {
        let mut src = Package::new();
        part(&mut src, "doc.xml", "D");
        link(&mut src, None, "doc.xml", "rId1");
        src.add_relationship(
            RelationshipOwner::Part("doc.xml"),
            "https://example.com/a b",
            TargetMode::External,
            "urn:hyperlink",
            Some("rId42"),
        )
        .unwrap();

        let cloned = read_only(&src).clone_writable().unwrap();
        let rel = cloned
            .relationships_of(RelationshipOwner::Part("doc.xml"))
            .unwrap()
            .get("rId42")
            .cloned()
            .unwrap();
        assert_eq!(rel.target, "https://example.com/a b");
        assert!(rel.is_external());
        // external targets never become parts
        assert_eq!(cloned.part_count(), 1);
    }

    #[test]
    fn target_text_is_kept_verbatim() {
        let mut src = Package::new();
        part(&mut src, "xl/workbook.xml", "W");
        part(&mut src, "xl/worksheets/sheet1.xml", "S");
        link(&mut src, None, "xl/workbook.xml", "rId1");
        src.insert_relationship(
            RelationshipOwner::Part("xl/workbook.xml"),
            Relationship::new(
                "rId2",
                "urn:test",
                "/xl/worksheets/sheet1.xml#frag",
                TargetMode::Internal,
            ),
        )
        .unwrap();

        let cloned = read_only(&src).clone_writable().unwrap();
        let rel = cloned
            .relationships_of(RelationshipOwner::Part("xl/workbook.xml"))
            .unwrap()
            .get("rId2")
            .cloned()
            .unwrap();
        assert_eq!(rel.target, "/xl/worksheets/sheet1.xml#frag");
        assert_eq!(cloned.part("xl/worksheets/sheet1.xml").unwrap().data(), b"S");
        assert_eq!(snapshot(&cloned), snapshot(&src));
    }

    #[test]
    fn unreachable_parts_are_not_copied() {
        let mut src = Package::new();
        part(&mut src, "doc.xml", "D");
        part(&mut src, "orphan.xml", "O");
        link(&mut src, None, "doc.xml", "rId1");

        let cloned = read_only(&src).clone_writable().unwrap();
        assert!(cloned.has_part("doc.xml"));
        assert!(!cloned.has_part("orphan.xml"));
    }

    #[test]
    fn dangling_internal_target_keeps_relationship() {
        let mut src = Package::new();
        part(&mut src, "doc.xml", "D");
        link(&mut src, None, "doc.xml", "rId1");
        src.add_relationship(
            RelationshipOwner::Part("doc.xml"),
            "missing.xml",
            TargetMode::Internal,
            "urn:test",
            Some("rId3"),
        )
        .unwrap();

        let cloned = read_only(&src).clone_writable().unwrap();
        assert!(!cloned.has_part("missing.xml"));
        assert!(cloned
            .relationships_of(RelationshipOwner::Part("doc.xml"))
            .unwrap()
            .contains_id("rId3"));
    }

    #[test]
    fn core_properties_copied_as_values() {
        let mut src = Package::new();
        part(&mut src, "doc.xml", "D");
        link(&mut src, None, "doc.xml", "rId1");
        {
            let props = src.properties_mut().unwrap();
            props.creator = Some("someone".into());
            props.title = Some("Quarterly".into());
        }

        let original = read_only(&src);
        let cloned = original.clone_writable().unwrap();
        assert!(!cloned.is_read_only());
        assert_eq!(cloned.properties(), original.properties());
        assert!(!cloned.has_part("docProps/core.xml"));
        assert_eq!(cloned.part_count(), 1);
    }

    #[test]
    fn clone_is_independent() {
        let mut src = Package::new();
        part(&mut src, "doc.xml", "D");
        link(&mut src, None, "doc.xml", "rId1");
        let original = read_only(&src);

        let mut cloned = original.clone_writable().unwrap();
        cloned.set_part_data("doc.xml", b"changed".to_vec()).unwrap();

        assert_eq!(original.part("doc.xml").unwrap().data(), b"D");
    }

    #[test]
    fn clone_into_read_only_destination_is_wrapped() {
        let mut src = Package::new();
        part(&mut src, "doc.xml", "D");
        link(&mut src, None, "doc.xml", "rId1");

        let mut dest = read_only(&Package::new());
        assert!(matches!(clone_into(&src, &mut dest), Err(OpcError::ReadOnly)));
    }
}
