//! ZIP-wrapped resource bundles
//!
//! Read and written through the `zip` crate. Entry sizes are uncompressed
//! sizes and offsets point at the local data start; since CRCs and
//! compressed sizes live in the headers, ZIP never takes the in-place path.
//! Directory records are not entries; they are kept in [`ZipHeader`] and
//! written back on every rewrite.

use crate::container::{
    ArchiveContainer, ContainerEntry, EntrySource, FormatHeader, ImageLayout, ParsedContainer,
};
use crate::io::{ReadSeek, WriteSeek};
use crate::security::ParseLimits;
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive-level state preserved across rewrites
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipHeader {
    /// Archive comment
    pub comment: Vec<u8>,
    /// Explicit directory records, with their trailing `/`
    pub directories: Vec<String>,
}

/// Check for a local file header or an empty archive's end record
pub fn detect(data: &[u8]) -> bool {
    data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06")
}

/// Read the central directory
pub fn read_table(reader: &mut dyn ReadSeek, _size: u64, limits: &ParseLimits) -> Result<ParsedContainer> {
    reader.seek(SeekFrom::Start(0))?;
    let mut archive = ZipArchive::new(reader)?;

    let count = u32::try_from(archive.len()).unwrap_or(u32::MAX);
    limits.check_count("ZIP file", count)?;

    let mut entries = Vec::with_capacity(archive.len());
    let mut directories = Vec::new();
    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        limits.check_name_length(u32::try_from(file.name().len()).unwrap_or(u32::MAX))?;
        if file.is_dir() {
            directories.push(file.name().to_string());
            continue;
        }
        entries.push(ContainerEntry {
            name: file.name().to_string(),
            size: file.size(),
            offset: file.data_start(),
            priority: 0,
        });
    }

    Ok(ParsedContainer {
        entries,
        data_offset: 0,
        header: FormatHeader::Zip(ZipHeader {
            comment: archive.comment().to_vec(),
            directories,
        }),
    })
}

/// Decompress one entry
pub fn extract(container: &ArchiveContainer, entry: &ContainerEntry) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(container.open_reader()?)?;
    let mut file = archive.by_name(&entry.name)?;

    let mut data = Vec::with_capacity(usize::try_from(entry.size).unwrap_or(0).min(1 << 24));
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Serialize a ZIP image
///
/// Directory records come first. Untouched entries are raw-copied with their
/// original compression; new payloads are deflated.
pub fn write_container(
    layout: &ImageLayout,
    source: Option<&ArchiveContainer>,
    header: &FormatHeader,
    writer: &mut dyn WriteSeek,
) -> Result<()> {
    let FormatHeader::Zip(header) = header else {
        return Err(Error::invalid_request("ZIP writer given a non-ZIP header"));
    };

    let mut source_archive = match source {
        Some(container) => Some(ZipArchive::new(container.open_reader()?)?),
        None => None,
    };

    let mut zip = ZipWriter::new(&mut *writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for directory in &header.directories {
        zip.add_directory(directory.as_str(), SimpleFileOptions::default())?;
    }

    for entry in &layout.entries {
        match &entry.source {
            EntrySource::Data(data) => {
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(data)?;
            }
            EntrySource::Original(original) => {
                let name = source
                    .and_then(|container| container.entries().get(*original))
                    .map(|e| e.name.as_str())
                    .ok_or_else(|| {
                        Error::invalid_request(format!("source entry {original} does not exist"))
                    })?;
                let archive = source_archive.as_mut().ok_or_else(|| {
                    Error::invalid_request("original entry referenced without a source container")
                })?;
                let index = archive
                    .index_for_name(name)
                    .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
                let file = archive.by_index_raw(index)?;
                if entry.name == name {
                    zip.raw_copy_file(file)?;
                } else {
                    zip.raw_copy_file_rename(file, entry.name.as_str())?;
                }
            }
        }
    }

    if !header.comment.is_empty() {
        zip.set_raw_comment(header.comment.clone().into_boxed_slice());
    }
    zip.finish()?;
    writer.flush()?;
    Ok(())
}
