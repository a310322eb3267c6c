//! Builder for brand-new containers

use crate::container::{EntrySource, FormatHeader, ImageLayout, OutputEntry};
use crate::format::ContainerKind;
use crate::io::WriteSeek;
use crate::priority::{PRIORITY_MANIFEST_NAME, PriorityIndex};
use crate::{Error, Result};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Entry waiting to be written
#[derive(Debug)]
struct PendingEntry {
    name: String,
    data: Vec<u8>,
    priority: i32,
    /// Bypasses reserved-name checks and the generated manifest
    raw: bool,
}

/// Builder for creating WAD, SPC and ZIP containers from scratch
///
/// A priority manifest is appended automatically when any entry was given a
/// non-zero priority.
#[derive(Debug)]
pub struct ContainerBuilder {
    kind: ContainerKind,
    header: FormatHeader,
    pending: Vec<PendingEntry>,
}

impl ContainerBuilder {
    /// Create a builder for a container of `kind`
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            header: FormatHeader::new(kind),
            pending: Vec::new(),
        }
    }

    /// Use a specific format header instead of the kind's default
    pub fn header(mut self, header: FormatHeader) -> Self {
        self.header = header;
        self
    }

    /// Add an entry with priority 0
    pub fn add_entry<S: Into<String>>(self, name: S, data: Vec<u8>) -> Self {
        self.add_entry_with_priority(name, data, 0)
    }

    /// Add an entry with an explicit load-order priority
    pub fn add_entry_with_priority<S: Into<String>>(
        mut self,
        name: S,
        data: Vec<u8>,
        priority: i32,
    ) -> Self {
        self.pending.push(PendingEntry {
            name: name.into(),
            data,
            priority,
            raw: false,
        });
        self
    }

    /// Add an entry verbatim, reserved names included
    pub fn add_raw_entry<S: Into<String>>(mut self, name: S, data: Vec<u8>) -> Self {
        self.pending.push(PendingEntry {
            name: name.into(),
            data,
            priority: 0,
            raw: true,
        });
        self
    }

    fn layout(self) -> Result<(ImageLayout, FormatHeader)> {
        let mut seen = HashSet::new();
        let mut priorities = PriorityIndex::new();
        let mut needs_manifest = false;
        let mut entries = Vec::with_capacity(self.pending.len() + 1);

        for pending in self.pending {
            if !seen.insert(pending.name.clone()) {
                return Err(Error::DuplicateEntry(pending.name));
            }
            if !pending.raw {
                if pending.name == PRIORITY_MANIFEST_NAME {
                    return Err(Error::invalid_request(format!(
                        "{PRIORITY_MANIFEST_NAME} is a reserved entry name"
                    )));
                }
                needs_manifest |= pending.priority != 0;
                priorities.set(pending.name.clone(), pending.priority);
            }
            entries.push(OutputEntry {
                name: pending.name,
                priority: pending.priority,
                source: EntrySource::Data(pending.data),
            });
        }

        if needs_manifest {
            if seen.contains(PRIORITY_MANIFEST_NAME) {
                return Err(Error::DuplicateEntry(PRIORITY_MANIFEST_NAME.to_string()));
            }
            entries.push(OutputEntry {
                name: PRIORITY_MANIFEST_NAME.to_string(),
                priority: 0,
                source: EntrySource::Data(priorities.encode()),
            });
        }

        Ok((
            ImageLayout {
                entries,
                physical_order: Vec::new(),
            },
            self.header,
        ))
    }

    /// Write the container to any seekable writer
    pub fn build_into(self, writer: &mut dyn WriteSeek) -> Result<()> {
        let kind = self.kind;
        let (layout, header) = self.layout()?;
        log::debug!("Building {} container with {} entries", kind, layout.entries.len());
        (kind.capabilities().write)(&layout, None, &header, writer)
    }

    /// Write the container into memory
    pub fn build_to_vec(self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.build_into(&mut out)?;
        Ok(out.into_inner())
    }

    /// Write the container to `path`
    ///
    /// The image is staged in a temporary file next to `path` and renamed
    /// into place once complete.
    pub fn build<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp_file = NamedTempFile::new_in(dir)?;
        self.build_into(temp_file.as_file_mut())?;
        temp_file.as_file_mut().flush()?;

        temp_file.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}
