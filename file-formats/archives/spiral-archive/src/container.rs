//! Uniform view over WAD, SPC and ZIP containers
//!
//! An [`ArchiveContainer`] is a read-only snapshot of a container's entry
//! table taken when it is opened. Writes never go through it: the in-place
//! patcher and the rebuilder produce new container state from it.

use crate::format::ContainerKind;
use crate::io::ReadSeek;
use crate::priority::{PRIORITY_MANIFEST_NAME, PriorityIndex};
use crate::security::ParseLimits;
use crate::{Error, Result, spc, wad, zip_format};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read a container's tables, reporting a short file as corruption
fn parse_table(
    kind: ContainerKind,
    reader: &mut dyn ReadSeek,
    size: u64,
    limits: &ParseLimits,
) -> Result<ParsedContainer> {
    match (kind.capabilities().read)(reader, size, limits) {
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(
            Error::invalid_format(format!("{kind} container is truncated")),
        ),
        result => result,
    }
}

/// One named byte range inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Entry name, unique within the container
    pub name: String,
    /// Stored size in bytes
    pub size: u64,
    /// Offset relative to the container's data region
    pub offset: u64,
    /// Load-order priority taken from the priority manifest (0 if unlisted)
    pub priority: i32,
}

/// Backing byte store of a container
#[derive(Debug, Clone)]
pub enum Backing {
    /// Container read from a file on disk
    File(PathBuf),
    /// Container held in memory
    Memory(Arc<[u8]>),
}

/// Format-specific state carried from a parsed container into its rewrite
#[derive(Debug, Clone)]
pub enum FormatHeader {
    /// WAD version and header blob
    Wad(wad::WadHeader),
    /// SPC unknown fields and per-entry storage flags
    Spc(spc::SpcHeader),
    /// ZIP archive comment
    Zip(zip_format::ZipHeader),
}

impl FormatHeader {
    /// Default header for a freshly created container of `kind`
    pub fn new(kind: ContainerKind) -> Self {
        match kind {
            ContainerKind::Wad => FormatHeader::Wad(wad::WadHeader::default()),
            ContainerKind::Spc => FormatHeader::Spc(spc::SpcHeader::default()),
            ContainerKind::Zip => FormatHeader::Zip(zip_format::ZipHeader::default()),
        }
    }
}

/// Result of parsing a container table
#[derive(Debug)]
pub struct ParsedContainer {
    /// Entries in table order, priorities not yet applied
    pub entries: Vec<ContainerEntry>,
    /// Base offset of the data region
    pub data_offset: u64,
    /// Format-specific header state
    pub header: FormatHeader,
}

/// Where the bytes of an output entry come from
#[derive(Debug, Clone)]
pub enum EntrySource {
    /// Copy the stored bytes of the source container's entry at this index
    Original(usize),
    /// Write these bytes
    Data(Vec<u8>),
}

/// One entry of a container image about to be written
#[derive(Debug, Clone)]
pub struct OutputEntry {
    /// Entry name
    pub name: String,
    /// Priority recorded for this entry
    pub priority: i32,
    /// Payload source
    pub source: EntrySource,
}

/// Complete description of a container image handed to a format writer
#[derive(Debug, Clone, Default)]
pub struct ImageLayout {
    /// Entries in table order
    pub entries: Vec<OutputEntry>,
    /// Indices into `entries` giving the physical order of the data region
    ///
    /// Only formats with a table separate from their data honour this.
    pub physical_order: Vec<usize>,
}

impl ImageLayout {
    /// Stored size of an output entry
    pub fn entry_size(&self, index: usize, source: Option<&ArchiveContainer>) -> Result<u64> {
        match &self.entries[index].source {
            EntrySource::Data(data) => Ok(data.len() as u64),
            EntrySource::Original(original) => source
                .and_then(|container| container.entries().get(*original))
                .map(|entry| entry.size)
                .ok_or_else(|| {
                    Error::invalid_request(format!(
                        "entry {} refers to a missing source entry",
                        self.entries[index].name
                    ))
                }),
        }
    }
}

/// A parsed container
#[derive(Debug, Clone)]
pub struct ArchiveContainer {
    kind: ContainerKind,
    backing: Backing,
    entries: Vec<ContainerEntry>,
    index: HashMap<String, usize>,
    data_offset: u64,
    size: u64,
    header: FormatHeader,
}

impl ArchiveContainer {
    /// Open and parse a container file
    ///
    /// # Errors
    /// - `Error::InvalidFormat` if the kind is unrecognized or the tables are corrupt
    /// - `Error::DuplicateEntry` if two entries share a name
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_limits(path, &ParseLimits::default())
    }

    /// Open a container file with explicit parse limits
    pub fn open_with_limits<P: AsRef<Path>>(path: P, limits: &ParseLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut magic = Vec::with_capacity(4);
        (&mut reader).take(4).read_to_end(&mut magic)?;
        let kind = ContainerKind::detect(&magic).ok_or_else(|| {
            Error::invalid_format(format!("{} is not a WAD, SPC or ZIP container", path.display()))
        })?;

        log::debug!("Opening {} container: {}", kind, path.display());
        let parsed = parse_table(kind, &mut reader, size, limits)?;
        Self::from_parsed(kind, Backing::File(path.to_path_buf()), size, parsed)
    }

    /// Parse a container held in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let data: Arc<[u8]> = data.into();
        let kind = ContainerKind::detect(&data)
            .ok_or_else(|| Error::invalid_format("data is not a WAD, SPC or ZIP container"))?;

        let size = data.len() as u64;
        let mut reader = Cursor::new(&data[..]);
        let parsed = parse_table(kind, &mut reader, size, &ParseLimits::default())?;
        Self::from_parsed(kind, Backing::Memory(data.clone()), size, parsed)
    }

    fn from_parsed(
        kind: ContainerKind,
        backing: Backing,
        size: u64,
        parsed: ParsedContainer,
    ) -> Result<Self> {
        let mut index = HashMap::with_capacity(parsed.entries.len());
        for (i, entry) in parsed.entries.iter().enumerate() {
            if index.insert(entry.name.clone(), i).is_some() {
                return Err(Error::DuplicateEntry(entry.name.clone()));
            }
        }

        let mut container = Self {
            kind,
            backing,
            entries: parsed.entries,
            index,
            data_offset: parsed.data_offset,
            size,
            header: parsed.header,
        };

        if container.contains(PRIORITY_MANIFEST_NAME) {
            let priorities = PriorityIndex::for_container(&container)?;
            for entry in &mut container.entries {
                entry.priority = priorities.get(&entry.name);
            }
        }

        log::debug!(
            "Parsed {} container with {} entries (data offset {})",
            container.kind,
            container.entries.len(),
            container.data_offset
        );
        Ok(container)
    }

    /// Container kind
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Entries in table order
    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    /// Look up an entry by name
    pub fn entry(&self, name: &str) -> Option<&ContainerEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Table index of an entry
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Whether an entry exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Base offset of the data region
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Total container size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Backing store
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// Path of the backing file, if the container lives on disk
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path),
            Backing::Memory(_) => None,
        }
    }

    /// Format-specific header state
    pub fn header(&self) -> &FormatHeader {
        &self.header
    }

    /// Highest priority of any entry, 0 if the container is empty
    pub fn highest_priority(&self) -> i32 {
        self.entries.iter().map(|e| e.priority).max().unwrap_or(0)
    }

    /// Read the payload of a named entry
    ///
    /// # Errors
    /// - `Error::EntryNotFound` if no entry has this name
    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        (self.kind.capabilities().extract)(self, entry)
    }

    /// Open a fresh reader over the backing store
    pub fn open_reader(&self) -> Result<Box<dyn ReadSeek + '_>> {
        match &self.backing {
            Backing::File(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            Backing::Memory(data) => Ok(Box::new(Cursor::new(&data[..]))),
        }
    }
}
