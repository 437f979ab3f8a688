//! Parts and their byte streams

use std::io::{self, Cursor, Read, Write};

use crate::relationship::RelationshipSet;

/// A named byte payload inside the package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    name: String,
    content_type: String,
    data: Vec<u8>,
    relationships: RelationshipSet,
}

impl Part {
    pub(crate) fn new(name: String, content_type: String) -> Self {
        Self {
            name,
            content_type,
            data: Vec::new(),
            relationships: RelationshipSet::new(),
        }
    }

    pub(crate) fn with_data(name: String, content_type: String, data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::new(name, content_type)
        }
    }

    /// Normalized part name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content type
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Current content
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Outgoing relationships
    pub fn relationships(&self) -> &RelationshipSet {
        &self.relationships
    }

    pub(crate) fn relationships_mut(&mut self) -> &mut RelationshipSet {
        &mut self.relationships
    }

    pub(crate) fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }
}

/// Read handle over a part's content
#[derive(Debug)]
pub struct PartReader<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> PartReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }
}

impl Read for PartReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Write handle that replaces a part's content.
///
/// Bytes are buffered and land in the part when the writer is finished or
/// dropped, so the part is never left holding a half-written stream.
#[derive(Debug)]
pub struct PartWriter<'a> {
    part: &'a mut Part,
    buf: Vec<u8>,
}

impl<'a> PartWriter<'a> {
    pub(crate) fn new(part: &'a mut Part) -> Self {
        Self {
            part,
            buf: Vec::new(),
        }
    }

    /// Commit the written bytes
    pub fn finish(self) {
        drop(self);
    }
}

impl Write for PartWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PartWriter<'_> {
    fn drop(&mut self) {
        self.part.set_data(std::mem::take(&mut self.buf));
    }
}
