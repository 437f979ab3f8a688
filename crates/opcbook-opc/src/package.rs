//! The package: a ZIP container of parts linked by relationships

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use crate::content_types::{self, ContentTypes};
use crate::error::{OpcError, OpcResult};
use crate::part::{Part, PartReader, PartWriter};
use crate::path::{
    normalize, normalize_part_name, relative_target, rels_owner, rels_part_name, CONTENT_TYPES,
};
use crate::properties::PackageProperties;
use crate::relationship::{rel_types, Relationship, RelationshipSet, TargetMode};
use crate::store::{PartStore, RelationshipGraph, RelationshipOwner};

/// Default location of the core properties part
pub const DEFAULT_CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Largest buffer reserved up front for a ZIP entry. The declared size is
/// only a hint; larger entries grow while they are read.
const MAX_RESERVE: usize = 1 << 20;

fn reserve_hint(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_RESERVE, |size| size.min(MAX_RESERVE))
}

/// How a package may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAccess {
    /// Parts and relationships are frozen
    Read,
    /// Everything may change
    ReadWrite,
}

/// An OPC package held in memory.
///
/// Parts live in a name-keyed arena; relationships refer to parts by name,
/// so cycles in the relationship graph need no special ownership.
#[derive(Debug, Clone)]
pub struct Package {
    parts: BTreeMap<String, Part>,
    relationships: RelationshipSet,
    content_types: ContentTypes,
    properties: PackageProperties,
    properties_part: Option<String>,
    access: PackageAccess,
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

impl Package {
    /// Create an empty, writable package
    pub fn new() -> Self {
        Self {
            parts: BTreeMap::new(),
            relationships: RelationshipSet::new(),
            content_types: ContentTypes::default(),
            properties: PackageProperties::default(),
            properties_part: None,
            access: PackageAccess::ReadWrite,
        }
    }

    /// Open a package file for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> OpcResult<Self> {
        let file = File::open(path)?;
        Self::read_with_access(BufReader::new(file), PackageAccess::ReadWrite)
    }

    /// Open a package from a stream. The result is read-only; use
    /// [`Package::clone_writable`] to get an editable copy.
    pub fn from_reader<R: Read + Seek>(reader: R) -> OpcResult<Self> {
        Self::read_with_access(reader, PackageAccess::Read)
    }

    /// Open a package from a stream with explicit access
    pub fn read_with_access<R: Read + Seek>(reader: R, access: PackageAccess) -> OpcResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;

        let mut content_types = None;
        let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
        let mut rels: Vec<(Option<String>, Vec<u8>)> = Vec::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = normalize(&file.name().replace('\\', "/"));
            let mut data = Vec::with_capacity(reserve_hint(file.size()));
            file.read_to_end(&mut data)?;

            if name == CONTENT_TYPES {
                content_types = Some(ContentTypes::parse(&data)?);
            } else if let Some(owner) = rels_owner(&name) {
                rels.push((owner, data));
            } else {
                entries.push((name, data));
            }
        }

        let content_types = content_types
            .ok_or_else(|| OpcError::InvalidFormat("Missing [Content_Types].xml".into()))?;

        let mut parts = BTreeMap::new();
        for (name, data) in entries {
            let content_type = match content_types.content_type_for(&name) {
                Some(ct) => ct.to_string(),
                None => {
                    log::warn!("No content type declared for /{name}");
                    content_types::OCTET_STREAM.to_string()
                }
            };
            parts.insert(name.clone(), Part::with_data(name, content_type, data));
        }

        let mut relationships = RelationshipSet::new();
        for (owner, data) in rels {
            let set = RelationshipSet::parse(&data)?;
            match owner {
                None => relationships = set,
                Some(owner) => match parts.get_mut(&owner) {
                    Some(part) => *part.relationships_mut() = set,
                    None => log::warn!("Ignoring relationships of missing part /{owner}"),
                },
            }
        }

        let mut package = Self {
            parts,
            relationships,
            content_types,
            properties: PackageProperties::default(),
            properties_part: None,
            access,
        };
        package.load_core_properties()?;
        Ok(package)
    }

    /// Move the core properties part out of the arena into `properties`
    fn load_core_properties(&mut self) -> OpcResult<()> {
        let target = self
            .relationships
            .iter()
            .find(|r| rel_types::is_core_properties(&r.rel_type))
            .and_then(|r| r.target_part(None));
        let Some(name) = target else {
            return Ok(());
        };
        if let Some(part) = self.parts.remove(&name) {
            self.properties = PackageProperties::parse(part.data())?;
        } else {
            log::warn!("Core properties relationship points at missing part /{name}");
        }
        self.properties_part = Some(name);
        Ok(())
    }

    /// Access mode
    pub fn access(&self) -> PackageAccess {
        self.access
    }

    /// Whether the package refuses changes
    pub fn is_read_only(&self) -> bool {
        self.access == PackageAccess::Read
    }

    pub(crate) fn ensure_writable(&self) -> OpcResult<()> {
        match self.access {
            PackageAccess::ReadWrite => Ok(()),
            PackageAccess::Read => Err(OpcError::ReadOnly),
        }
    }

    /// Core properties
    pub fn properties(&self) -> &PackageProperties {
        &self.properties
    }

    /// Core properties, for editing
    pub fn properties_mut(&mut self) -> OpcResult<&mut PackageProperties> {
        self.ensure_writable()?;
        Ok(&mut self.properties)
    }

    /// Declared content types
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Relationships owned by the package root
    pub fn relationships(&self) -> &RelationshipSet {
        &self.relationships
    }

    /// Iterate all parts in name order
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Number of parts, excluding relationships and core properties
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Name of the main document part: the target of the root
    /// officeDocument relationship
    pub fn core_part_name(&self) -> OpcResult<String> {
        let rel = self
            .relationships
            .iter()
            .find(|r| rel_types::is_office_document(&r.rel_type) && !r.is_external())
            .ok_or(OpcError::MissingCorePart)?;
        let name = rel.target_part(None).ok_or(OpcError::MissingCorePart)?;
        if !self.parts.contains_key(&name) {
            return Err(OpcError::MissingCorePart);
        }
        Ok(name)
    }

    /// The main document part
    pub fn core_part(&self) -> OpcResult<&Part> {
        let name = self.core_part_name()?;
        self.parts.get(&name).ok_or(OpcError::MissingCorePart)
    }

    /// Replace a part's content in one step
    pub fn set_part_data(&mut self, name: &str, data: Vec<u8>) -> OpcResult<()> {
        self.ensure_writable()?;
        let part = self
            .parts
            .get_mut(&normalize(name))
            .ok_or_else(|| OpcError::MissingPart(name.to_string()))?;
        part.set_data(data);
        Ok(())
    }

    /// Remove a part together with the relationships it owns.
    ///
    /// Relationships pointing at the part are left to the caller.
    pub fn remove_part(&mut self, name: &str) -> OpcResult<Option<Part>> {
        self.ensure_writable()?;
        Ok(self.parts.remove(&normalize(name)))
    }

    /// Remove the parts in `names`, and the parts reachable from them,
    /// that the package root no longer reaches.
    ///
    /// Parts still reachable through another path stay, as do unrelated
    /// parts nothing points at. Returns the removed names in sorted order.
    pub fn remove_unreachable(&mut self, names: &[&str]) -> OpcResult<Vec<String>> {
        self.ensure_writable()?;
        let reachable = self.reachable_parts();

        let mut pending: Vec<String> = names.iter().map(|n| normalize(n)).collect();
        let mut doomed = BTreeSet::new();
        while let Some(name) = pending.pop() {
            if reachable.contains(&name) || doomed.contains(&name) {
                continue;
            }
            let Some(part) = self.parts.get(&name) else {
                continue;
            };
            pending.extend(
                part.relationships()
                    .iter()
                    .filter_map(|r| r.target_part(Some(&name))),
            );
            doomed.insert(name);
        }

        for name in &doomed {
            self.parts.remove(name);
        }
        if !doomed.is_empty() {
            log::debug!("Removed {} unreachable parts", doomed.len());
        }
        Ok(doomed.into_iter().collect())
    }

    /// Names of every part reachable from the root relationships
    pub fn reachable_parts(&self) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut pending: Vec<String> = self
            .relationships
            .iter()
            .filter_map(|r| r.target_part(None))
            .collect();
        while let Some(name) = pending.pop() {
            if reached.contains(&name) {
                continue;
            }
            let Some(part) = self.parts.get(&name) else {
                continue;
            };
            pending.extend(
                part.relationships()
                    .iter()
                    .filter_map(|r| r.target_part(Some(&name))),
            );
            reached.insert(name);
        }
        reached
    }

    /// Remove a relationship by id
    pub fn remove_relationship(
        &mut self,
        owner: RelationshipOwner<'_>,
        id: &str,
    ) -> OpcResult<Option<Relationship>> {
        self.ensure_writable()?;
        Ok(self.relationships_of_mut(owner)?.remove(id))
    }

    fn relationships_of_mut(
        &mut self,
        owner: RelationshipOwner<'_>,
    ) -> OpcResult<&mut RelationshipSet> {
        match owner {
            RelationshipOwner::Package => Ok(&mut self.relationships),
            RelationshipOwner::Part(name) => self
                .parts
                .get_mut(&normalize(name))
                .map(Part::relationships_mut)
                .ok_or_else(|| OpcError::MissingPart(name.to_string())),
        }
    }

    /// Write the package as a ZIP container.
    ///
    /// Relationship parts and `[Content_Types].xml` are regenerated; part
    /// bytes are written as they are.
    pub fn save<W: Write + Seek>(&self, writer: W) -> OpcResult<()> {
        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default();

        let mut root_rels = self.relationships.clone();
        let core_props_part = self.core_properties_target(&mut root_rels)?;

        // Content types
        let mut typed: Vec<(&str, &str)> = self
            .parts
            .values()
            .map(|p| (p.name(), p.content_type()))
            .collect();
        if let Some(name) = core_props_part.as_deref() {
            typed.push((name, content_types::CORE_PROPERTIES));
        }
        zip.start_file(CONTENT_TYPES, options)?;
        zip.write_all(self.content_types.to_xml(typed).as_bytes())?;

        // Root relationships
        zip.start_file(rels_part_name(None), options)?;
        zip.write_all(root_rels.to_xml().as_bytes())?;

        if let Some(name) = core_props_part.as_deref() {
            zip.start_file(name, options)?;
            zip.write_all(self.properties.to_xml().as_bytes())?;
        }

        for part in self.parts.values() {
            zip.start_file(part.name(), options)?;
            zip.write_all(part.data())?;

            if !part.relationships().is_empty() {
                zip.start_file(rels_part_name(Some(part.name())), options)?;
                zip.write_all(part.relationships().to_xml().as_bytes())?;
            }
        }

        zip.finish()?;
        Ok(())
    }

    /// Where core properties go on save, adding a root relationship to
    /// `root_rels` when there is none yet but properties are set
    fn core_properties_target(&self, root_rels: &mut RelationshipSet) -> OpcResult<Option<String>> {
        if let Some(name) = &self.properties_part {
            return Ok(Some(name.clone()));
        }
        if self.properties.is_empty() {
            return Ok(None);
        }
        let name = DEFAULT_CORE_PROPERTIES_PART.to_string();
        let id = root_rels.next_id();
        root_rels.insert(
            Relationship::new(id, rel_types::CORE_PROPERTIES, name.clone(), TargetMode::Internal),
            "package root",
        )?;
        Ok(Some(name))
    }

    /// Write the package to a file
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> OpcResult<()> {
        let file = File::create(path)?;
        self.save(file)
    }

    /// Write the package into a byte vector
    pub fn to_bytes(&self) -> OpcResult<Vec<u8>> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        self.save(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

impl PartStore for Package {
    fn create_part(&mut self, name: &str, content_type: &str) -> OpcResult<&mut Part> {
        self.ensure_writable()?;
        let name = normalize_part_name(name)?;
        if self.parts.contains_key(&name) || self.properties_part.as_deref() == Some(name.as_str()) {
            return Err(OpcError::DuplicatePart(name));
        }
        Ok(self
            .parts
            .entry(name.clone())
            .or_insert_with(|| Part::new(name, content_type.to_string())))
    }

    fn part(&self, name: &str) -> Option<&Part> {
        self.parts.get(&normalize(name))
    }

    fn open_read(&self, name: &str) -> OpcResult<PartReader<'_>> {
        self.part(name)
            .map(|p| PartReader::new(p.data()))
            .ok_or_else(|| OpcError::MissingPart(name.to_string()))
    }

    fn open_write(&mut self, name: &str) -> OpcResult<PartWriter<'_>> {
        self.ensure_writable()?;
        self.parts
            .get_mut(&normalize(name))
            .map(PartWriter::new)
            .ok_or_else(|| OpcError::MissingPart(name.to_string()))
    }

    fn part_names(&self) -> Vec<String> {
        self.parts.keys().cloned().collect()
    }
}

impl RelationshipGraph for Package {
    fn relationships_of(&self, owner: RelationshipOwner<'_>) -> OpcResult<&RelationshipSet> {
        match owner {
            RelationshipOwner::Package => Ok(&self.relationships),
            RelationshipOwner::Part(name) => self
                .part(name)
                .map(Part::relationships)
                .ok_or_else(|| OpcError::MissingPart(name.to_string())),
        }
    }

    fn add_relationship(
        &mut self,
        owner: RelationshipOwner<'_>,
        target: &str,
        mode: TargetMode,
        rel_type: &str,
        explicit_id: Option<&str>,
    ) -> OpcResult<Relationship> {
        self.ensure_writable()?;
        let stored_target = match mode {
            TargetMode::Internal => relative_target(owner.part_name(), &normalize_part_name(target)?),
            TargetMode::External => target.to_string(),
        };

        let owner_label = owner.to_string();
        let set = self.relationships_of_mut(owner)?;
        let id = explicit_id.map(str::to_string).unwrap_or_else(|| set.next_id());
        let rel = Relationship::new(id, rel_type, stored_target, mode);
        set.insert(rel.clone(), &owner_label)?;
        Ok(rel)
    }

    fn insert_relationship(
        &mut self,
        owner: RelationshipOwner<'_>,
        rel: Relationship,
    ) -> OpcResult<()> {
        self.ensure_writable()?;
        let owner_label = owner.to_string();
        self.relationships_of_mut(owner)?.insert(rel, &owner_label)
    }
}
