//! WAD (`AGAR`) container layout
//!
//! ```text
//! "AGAR" | major u32 | minor u32 | header_len u32 | header[header_len]
//! file_count u32 | { name_len u32 | name | size u64 | offset u64 } * file_count
//! dir_count u32  | { name_len u32 | name | child_count u32 |
//!                    { name_len u32 | name | is_dir u8 } * child_count } * dir_count
//! <data region>
//! ```
//!
//! All integers are little-endian. Entry offsets are relative to the start
//! of the data region, which begins right after the directory table. The
//! directory table is derived from entry names and is regenerated on every
//! write.

use crate::container::{
    ArchiveContainer, ContainerEntry, EntrySource, FormatHeader, ImageLayout, ParsedContainer,
};
use crate::io::{ReadSeek, WriteSeek, copy_range};
use crate::security::{ParseLimits, validate_entry_bounds};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek, SeekFrom, Write};

/// WAD magic
pub const WAD_MAGIC: &[u8; 4] = b"AGAR";

/// Version and free-form header blob of a WAD container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WadHeader {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Opaque header bytes
    pub header: Vec<u8>,
}

impl Default for WadHeader {
    fn default() -> Self {
        Self {
            major: 1,
            minor: 1,
            header: Vec::new(),
        }
    }
}

/// One record of the directory table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WadDirectory {
    /// Full directory path, empty for the root
    pub name: String,
    /// Child names (last path component) and whether each is a directory
    pub children: Vec<(String, bool)>,
}

/// Check for the WAD magic
pub fn detect(data: &[u8]) -> bool {
    data.starts_with(WAD_MAGIC)
}

fn read_name(reader: &mut dyn ReadSeek, limits: &ParseLimits) -> Result<String> {
    let len = reader.read_u32::<LittleEndian>()?;
    limits.check_name_length(len)?;

    let mut name = vec![0u8; len as usize];
    reader.read_exact(&mut name)?;
    String::from_utf8(name).map_err(|_| Error::invalid_format("WAD name is not valid UTF-8"))
}

/// Parse the file and directory tables
pub fn read_table(reader: &mut dyn ReadSeek, size: u64, limits: &ParseLimits) -> Result<ParsedContainer> {
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != WAD_MAGIC {
        return Err(Error::invalid_format("Missing AGAR magic"));
    }

    let major = reader.read_u32::<LittleEndian>()?;
    let minor = reader.read_u32::<LittleEndian>()?;
    let header_len = reader.read_u32::<LittleEndian>()?;
    if u64::from(header_len) > size {
        return Err(Error::invalid_format(format!(
            "WAD header length {header_len} exceeds container size {size}"
        )));
    }
    let mut header = vec![0u8; header_len as usize];
    reader.read_exact(&mut header)?;

    let file_count = reader.read_u32::<LittleEndian>()?;
    limits.check_count("WAD file", file_count)?;

    let mut entries = Vec::with_capacity(file_count.min(4096) as usize);
    for _ in 0..file_count {
        let name = read_name(reader, limits)?;
        let entry_size = reader.read_u64::<LittleEndian>()?;
        let offset = reader.read_u64::<LittleEndian>()?;
        entries.push(ContainerEntry {
            name,
            size: entry_size,
            offset,
            priority: 0,
        });
    }

    let dir_count = reader.read_u32::<LittleEndian>()?;
    limits.check_count("WAD directory", dir_count)?;
    for _ in 0..dir_count {
        let _name = read_name(reader, limits)?;
        let child_count = reader.read_u32::<LittleEndian>()?;
        limits.check_count("WAD directory child", child_count)?;
        for _ in 0..child_count {
            let _child = read_name(reader, limits)?;
            let _is_dir = reader.read_u8()?;
        }
    }

    let data_offset = reader.stream_position()?;
    for entry in &entries {
        let start = data_offset.checked_add(entry.offset).ok_or_else(|| {
            Error::invalid_format(format!("Entry {} offset overflows", entry.name))
        })?;
        validate_entry_bounds(&entry.name, start, entry.size, size)?;
    }

    log::trace!(
        "WAD v{major}.{minor}: {} files, {dir_count} directories, data at {data_offset}",
        entries.len()
    );

    Ok(ParsedContainer {
        entries,
        data_offset,
        header: FormatHeader::Wad(WadHeader {
            major,
            minor,
            header,
        }),
    })
}

/// Derive the directory table from entry names
///
/// The root directory has the empty name. Directories and their children are
/// sorted by name.
pub fn directory_table<'a, I>(names: I) -> Vec<WadDirectory>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tree: BTreeMap<String, BTreeSet<(String, bool)>> = BTreeMap::new();
    tree.insert(String::new(), BTreeSet::new());

    for name in names {
        let components: Vec<&str> = name.split('/').filter(|c| !c.is_empty()).collect();
        let mut parent = String::new();
        for (i, component) in components.iter().enumerate() {
            let is_dir = i + 1 < components.len();
            tree.entry(parent.clone())
                .or_default()
                .insert((component.to_string(), is_dir));
            if is_dir {
                if !parent.is_empty() {
                    parent.push('/');
                }
                parent.push_str(component);
                tree.entry(parent.clone()).or_default();
            }
        }
    }

    tree.into_iter()
        .map(|(name, children)| WadDirectory {
            name,
            children: children.into_iter().collect(),
        })
        .collect()
}

/// Validate that `order` is a permutation of `0..len`
pub(crate) fn check_physical_order(order: &[usize], len: usize) -> Result<()> {
    if order.len() != len {
        return Err(Error::invalid_request(format!(
            "physical order covers {} of {len} entries",
            order.len()
        )));
    }
    let mut seen = vec![false; len];
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(Error::invalid_request(format!(
                    "physical order index {index} is out of range or repeated"
                )));
            }
        }
    }
    Ok(())
}

fn write_name(writer: &mut dyn WriteSeek, name: &str) -> Result<()> {
    let len = u32::try_from(name.len())
        .map_err(|_| Error::CapacityExceeded(format!("name too long: {name}")))?;
    writer.write_u32::<LittleEndian>(len)?;
    writer.write_all(name.as_bytes())?;
    Ok(())
}

/// Write an entry payload, copying original entries from `source`
pub(crate) fn write_payload<'a>(
    entry_source: &EntrySource,
    source: Option<&'a ArchiveContainer>,
    reader: &mut Option<Box<dyn ReadSeek + 'a>>,
    writer: &mut dyn WriteSeek,
) -> Result<u64> {
    match entry_source {
        EntrySource::Data(data) => {
            writer.write_all(data)?;
            Ok(data.len() as u64)
        }
        EntrySource::Original(index) => {
            let container = source.ok_or_else(|| {
                Error::invalid_request("original entry referenced without a source container")
            })?;
            let entry = container.entries().get(*index).ok_or_else(|| {
                Error::invalid_request(format!("source entry {index} does not exist"))
            })?;
            if reader.is_none() {
                *reader = Some(container.open_reader()?);
            }
            if let Some(reader) = reader.as_mut() {
                copy_range(
                    reader,
                    container.data_offset() + entry.offset,
                    entry.size,
                    writer,
                )?;
            }
            Ok(entry.size)
        }
    }
}

/// Serialize a WAD container image
pub fn write_container(
    layout: &ImageLayout,
    source: Option<&ArchiveContainer>,
    header: &FormatHeader,
    writer: &mut dyn WriteSeek,
) -> Result<()> {
    let FormatHeader::Wad(header) = header else {
        return Err(Error::invalid_request("WAD writer given a non-WAD header"));
    };

    let count = layout.entries.len();
    let physical_order: Vec<usize> = if layout.physical_order.is_empty() {
        (0..count).collect()
    } else {
        layout.physical_order.clone()
    };
    check_physical_order(&physical_order, count)?;

    let mut sizes = Vec::with_capacity(count);
    for index in 0..count {
        sizes.push(layout.entry_size(index, source)?);
    }

    let mut offsets = vec![0u64; count];
    let mut next = 0u64;
    for &index in &physical_order {
        offsets[index] = next;
        next = next
            .checked_add(sizes[index])
            .ok_or_else(|| Error::CapacityExceeded("WAD data region overflows u64".into()))?;
    }

    writer.write_all(WAD_MAGIC)?;
    writer.write_u32::<LittleEndian>(header.major)?;
    writer.write_u32::<LittleEndian>(header.minor)?;
    let header_len = u32::try_from(header.header.len())
        .map_err(|_| Error::CapacityExceeded("WAD header blob too large".into()))?;
    writer.write_u32::<LittleEndian>(header_len)?;
    writer.write_all(&header.header)?;

    let file_count = u32::try_from(count)
        .map_err(|_| Error::CapacityExceeded(format!("{count} entries")))?;
    writer.write_u32::<LittleEndian>(file_count)?;
    for (index, entry) in layout.entries.iter().enumerate() {
        write_name(writer, &entry.name)?;
        writer.write_u64::<LittleEndian>(sizes[index])?;
        writer.write_u64::<LittleEndian>(offsets[index])?;
    }

    let directories = directory_table(layout.entries.iter().map(|e| e.name.as_str()));
    writer.write_u32::<LittleEndian>(directories.len() as u32)?;
    for directory in &directories {
        write_name(writer, &directory.name)?;
        writer.write_u32::<LittleEndian>(directory.children.len() as u32)?;
        for (child, is_dir) in &directory.children {
            write_name(writer, child)?;
            writer.write_u8(u8::from(*is_dir))?;
        }
    }

    let mut reader = None;
    for &index in &physical_order {
        let written = write_payload(&layout.entries[index].source, source, &mut reader, writer)?;
        debug_assert_eq!(written, sizes[index]);
    }

    writer.flush()?;
    Ok(())
}
