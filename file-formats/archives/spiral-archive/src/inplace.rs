//! In-place payload overwrites
//!
//! When every replacement matches the stored size of its entry, the new
//! bytes are written straight over the old ones and no table changes.
//! SPC entries additionally have their storage flags reset to raw, matching
//! what a rebuild writes for a replaced entry.
//! All items are validated before the first byte is written. A failure
//! after that point leaves the file partially patched; such failures are
//! reported as [`Error::InPlaceWrite`].

use crate::container::ArchiveContainer;
use crate::format::ContainerKind;
use crate::request::PatchRequest;
use crate::spc;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Check that every item exists with an equal stored size
pub fn validate(container: &ArchiveContainer, request: &PatchRequest) -> Result<()> {
    if !container.kind().supports_in_place() {
        return Err(Error::invalid_request(format!(
            "{} containers cannot be patched in place",
            container.kind()
        )));
    }

    for item in request.items() {
        let entry = container
            .entry(&item.name)
            .ok_or_else(|| Error::EntryNotFound(item.name.clone()))?;
        if entry.size != item.size() {
            return Err(Error::invalid_request(format!(
                "{} is {} bytes, replacement is {} bytes",
                item.name,
                entry.size,
                item.size()
            )));
        }
    }
    Ok(())
}

fn write_items<W: Write + Seek>(
    writer: &mut W,
    container: &ArchiveContainer,
    request: &PatchRequest,
) -> io::Result<()> {
    for item in request.items() {
        // Validated by the caller
        let Some(entry) = container.entry(&item.name) else {
            continue;
        };
        let offset = container.data_offset() + entry.offset;
        log::trace!("Writing {} bytes of {} at {offset}", item.data.len(), item.name);
        writer.seek(SeekFrom::Start(offset))?;
        writer.write_all(&item.data)?;
        if container.kind() == ContainerKind::Spc {
            spc::mark_raw(writer, entry)?;
        }
    }
    writer.flush()
}

/// Overwrite payloads through any seekable writer over the container bytes
pub fn apply_in_place_to<W: Write + Seek>(
    writer: &mut W,
    container: &ArchiveContainer,
    request: &PatchRequest,
) -> Result<()> {
    validate(container, request)?;
    let target = container
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("<memory>"));
    write_items(writer, container, request).map_err(|source| in_place_failure(target, source))
}

/// Overwrite payloads in the container file at `path`
///
/// # Errors
/// - `Error::EntryNotFound` / `Error::InvalidRequest` before anything is written
/// - `Error::InPlaceWrite` if writing fails part-way
pub fn apply_in_place<P: AsRef<Path>>(
    path: P,
    container: &ArchiveContainer,
    request: &PatchRequest,
) -> Result<()> {
    let path = path.as_ref();
    validate(container, request)?;
    if request.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new().write(true).open(path)?;
    write_items(&mut file, container, request)
        .and_then(|()| file.sync_all())
        .map_err(|source| in_place_failure(path.to_path_buf(), source))?;

    log::info!(
        "Patched {} entries in place in {}",
        request.len(),
        path.display()
    );
    Ok(())
}

fn in_place_failure(path: PathBuf, source: io::Error) -> Error {
    log::warn!(
        "In-place write to {} failed part-way, the file may be inconsistent: {source}",
        path.display()
    );
    Error::InPlaceWrite { path, source }
}
