//! SPC (`CPS.`) container layout
//!
//! ```text
//! "CPS." | unk1[0x24] | file_count u32 | unk2 u32 | pad[0x10] | "Root" | pad[0x0C]
//! { cmp_flag u16 | unk_flag u16 | cmp_size u32 | dec_size u32 | name_len u32 |
//!   pad[0x10] | name | NUL | pad to 16 | data[cmp_size] | pad to 16 } * file_count
//! ```
//!
//! Entries interleave their headers with their data, so entry offsets are
//! absolute and the data offset is 0. Stored bytes are handed out verbatim;
//! decompression is left to the caller's codec.

use crate::container::{
    ArchiveContainer, ContainerEntry, EntrySource, FormatHeader, ImageLayout, ParsedContainer,
};
use crate::io::{ReadSeek, WriteSeek};
use crate::security::{ParseLimits, validate_entry_bounds};
use crate::wad::write_payload;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// SPC magic
pub const SPC_MAGIC: &[u8; 4] = b"CPS.";

const TABLE_MARKER: &[u8; 4] = b"Root";

/// Compression flag of an entry stored without compression
pub const FLAG_RAW: u16 = 0x01;

/// Secondary flag written for raw entries
pub const UNKNOWN_FLAG_RAW: u16 = 0x04;

/// Storage flags of one SPC entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpcEntryFlags {
    /// Compression flag
    pub cmp_flag: u16,
    /// Unknown secondary flag
    pub unk_flag: u16,
    /// Decompressed size
    pub dec_size: u32,
}

/// Fields of an SPC container preserved across rewrites
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpcHeader {
    /// Unknown block following the magic
    pub unk1: [u8; 0x24],
    /// Unknown field following the file count
    pub unk2: u32,
    /// Storage flags of the entries, in table order
    pub flags: Vec<SpcEntryFlags>,
}

impl Default for SpcHeader {
    fn default() -> Self {
        Self {
            unk1: [0u8; 0x24],
            unk2: 1,
            flags: Vec::new(),
        }
    }
}

/// Check for the SPC magic
pub fn detect(data: &[u8]) -> bool {
    data.starts_with(SPC_MAGIC)
}

#[inline]
fn padding(len: u64) -> u64 {
    (16 - len % 16) % 16
}

/// Parse the interleaved entry headers
pub fn read_table(reader: &mut dyn ReadSeek, size: u64, limits: &ParseLimits) -> Result<ParsedContainer> {
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != SPC_MAGIC {
        return Err(Error::invalid_format("Missing CPS. magic"));
    }

    let mut unk1 = [0u8; 0x24];
    reader.read_exact(&mut unk1)?;
    let file_count = reader.read_u32::<LittleEndian>()?;
    limits.check_count("SPC file", file_count)?;
    let unk2 = reader.read_u32::<LittleEndian>()?;
    reader.seek(SeekFrom::Current(0x10))?;

    let mut marker = [0u8; 4];
    reader.read_exact(&mut marker)?;
    if &marker != TABLE_MARKER {
        return Err(Error::invalid_format("Missing SPC Root table marker"));
    }
    reader.seek(SeekFrom::Current(0x0C))?;

    let capacity = file_count.min(4096) as usize;
    let mut entries = Vec::with_capacity(capacity);
    let mut flags = Vec::with_capacity(capacity);

    for _ in 0..file_count {
        let cmp_flag = reader.read_u16::<LittleEndian>()?;
        let unk_flag = reader.read_u16::<LittleEndian>()?;
        let cmp_size = reader.read_u32::<LittleEndian>()?;
        let dec_size = reader.read_u32::<LittleEndian>()?;
        let name_len = reader.read_u32::<LittleEndian>()?;
        limits.check_name_length(name_len)?;
        reader.seek(SeekFrom::Current(0x10))?;

        let mut name = vec![0u8; name_len as usize];
        reader.read_exact(&mut name)?;
        let name = String::from_utf8(name)
            .map_err(|_| Error::invalid_format("SPC name is not valid UTF-8"))?;
        let name_padding = padding(u64::from(name_len) + 1);
        reader.seek(SeekFrom::Current(1 + name_padding as i64))?;

        let offset = reader.stream_position()?;
        let stored = u64::from(cmp_size);
        validate_entry_bounds(&name, offset, stored, size)?;
        reader.seek(SeekFrom::Start(offset + stored + padding(stored)))?;

        entries.push(ContainerEntry {
            name,
            size: stored,
            offset,
            priority: 0,
        });
        flags.push(SpcEntryFlags {
            cmp_flag,
            unk_flag,
            dec_size,
        });
    }

    log::trace!("SPC: {} entries", entries.len());

    Ok(ParsedContainer {
        entries,
        data_offset: 0,
        header: FormatHeader::Spc(SpcHeader { unk1, unk2, flags }),
    })
}

/// Length of an entry header, from its flags up to its data
fn header_len(name_len: u64) -> u64 {
    0x20 + name_len + 1 + padding(name_len + 1)
}

/// Absolute position of the header that precedes `entry`'s data
pub fn entry_header_offset(entry: &ContainerEntry) -> Option<u64> {
    entry.offset.checked_sub(header_len(entry.name.len() as u64))
}

/// Storage flags of a payload written without compression
pub fn raw_flags(len: u32) -> SpcEntryFlags {
    SpcEntryFlags {
        cmp_flag: FLAG_RAW,
        unk_flag: UNKNOWN_FLAG_RAW,
        dec_size: len,
    }
}

/// Rewrite the header of `entry` to describe a raw payload of its stored size
///
/// Used by in-place patching so an overwritten entry is stored exactly as a
/// rebuild would store it.
pub(crate) fn mark_raw<W: Write + Seek + ?Sized>(
    writer: &mut W,
    entry: &ContainerEntry,
) -> io::Result<()> {
    let start = entry_header_offset(entry).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("SPC entry {} has no room for its header", entry.name),
        )
    })?;
    let size = u32::try_from(entry.size).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("SPC entry {} exceeds 4 GiB", entry.name),
        )
    })?;
    let flags = raw_flags(size);

    writer.seek(SeekFrom::Start(start))?;
    writer.write_u16::<LittleEndian>(flags.cmp_flag)?;
    writer.write_u16::<LittleEndian>(flags.unk_flag)?;
    writer.write_u32::<LittleEndian>(size)?;
    writer.write_u32::<LittleEndian>(flags.dec_size)
}

fn write_padding(writer: &mut dyn WriteSeek, len: u64) -> Result<()> {
    writer.write_all(&[0u8; 16][..padding(len) as usize])?;
    Ok(())
}

/// Serialize an SPC container image
///
/// Copied entries keep their stored bytes and flags; new payloads are
/// written raw.
pub fn write_container(
    layout: &ImageLayout,
    source: Option<&ArchiveContainer>,
    header: &FormatHeader,
    writer: &mut dyn WriteSeek,
) -> Result<()> {
    let FormatHeader::Spc(header) = header else {
        return Err(Error::invalid_request("SPC writer given a non-SPC header"));
    };

    let count = u32::try_from(layout.entries.len())
        .map_err(|_| Error::CapacityExceeded(format!("{} entries", layout.entries.len())))?;

    writer.write_all(SPC_MAGIC)?;
    writer.write_all(&header.unk1)?;
    writer.write_u32::<LittleEndian>(count)?;
    writer.write_u32::<LittleEndian>(header.unk2)?;
    writer.write_all(&[0u8; 0x10])?;
    writer.write_all(TABLE_MARKER)?;
    writer.write_all(&[0u8; 0x0C])?;

    let mut reader = None;
    for (index, entry) in layout.entries.iter().enumerate() {
        let stored = layout.entry_size(index, source)?;
        let cmp_size = u32::try_from(stored).map_err(|_| {
            Error::CapacityExceeded(format!("SPC entry {} exceeds 4 GiB", entry.name))
        })?;

        let flags = match &entry.source {
            EntrySource::Original(original) => header.flags.get(*original).copied(),
            EntrySource::Data(_) => None,
        }
        .unwrap_or_else(|| raw_flags(cmp_size));

        let name_len = u32::try_from(entry.name.len())
            .map_err(|_| Error::CapacityExceeded(format!("name too long: {}", entry.name)))?;

        writer.write_u16::<LittleEndian>(flags.cmp_flag)?;
        writer.write_u16::<LittleEndian>(flags.unk_flag)?;
        writer.write_u32::<LittleEndian>(cmp_size)?;
        writer.write_u32::<LittleEndian>(flags.dec_size)?;
        writer.write_u32::<LittleEndian>(name_len)?;
        writer.write_all(&[0u8; 0x10])?;
        writer.write_all(entry.name.as_bytes())?;
        writer.write_u8(0)?;
        write_padding(writer, u64::from(name_len) + 1)?;

        write_payload(&entry.source, source, &mut reader, writer)?;
        write_padding(writer, stored)?;
    }

    writer.flush()?;
    Ok(())
}
