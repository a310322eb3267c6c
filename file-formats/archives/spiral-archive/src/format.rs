//! Container and resource kinds
//!
//! Every supported container kind is a variant of the closed [`ContainerKind`]
//! enumeration. Its behaviour is looked up in a static [`Capabilities`] table
//! instead of being dispatched through trait objects, so adding a kind means
//! adding one variant and one table row.

use crate::container::{ArchiveContainer, ContainerEntry, FormatHeader, ImageLayout, ParsedContainer};
use crate::io::{ReadSeek, WriteSeek};
use crate::security::ParseLimits;
use crate::{Error, Result, spc, wad, zip_format};
use std::fmt;

/// Detect whether a byte prefix belongs to a kind
pub type DetectFn = fn(&[u8]) -> bool;

/// Parse a container table from a reader of the given total length
pub type ReadFn = fn(&mut dyn ReadSeek, u64, &ParseLimits) -> Result<ParsedContainer>;

/// Read the logical payload of one entry
pub type ExtractFn = fn(&ArchiveContainer, &ContainerEntry) -> Result<Vec<u8>>;

/// Serialize a container image, copying original entries from `source`
pub type WriteFn =
    fn(&ImageLayout, Option<&ArchiveContainer>, &FormatHeader, &mut dyn WriteSeek) -> Result<()>;

/// Per-kind behaviour table
#[derive(Debug)]
pub struct Capabilities {
    /// Human-readable name
    pub name: &'static str,
    /// Conventional file extension, without the dot
    pub extension: &'static str,
    /// Magic-number detection
    pub detect: DetectFn,
    /// Table parser
    pub read: ReadFn,
    /// Entry payload reader
    pub extract: ExtractFn,
    /// Container writer
    pub write: WriteFn,
    /// Whether stored payloads may be overwritten without touching any table
    pub supports_in_place: bool,
}

static WAD_CAPABILITIES: Capabilities = Capabilities {
    name: "WAD",
    extension: "wad",
    detect: wad::detect,
    read: wad::read_table,
    extract: extract_stored,
    write: wad::write_container,
    supports_in_place: true,
};

static SPC_CAPABILITIES: Capabilities = Capabilities {
    name: "SPC",
    extension: "spc",
    detect: spc::detect,
    read: spc::read_table,
    extract: extract_stored,
    write: spc::write_container,
    supports_in_place: true,
};

static ZIP_CAPABILITIES: Capabilities = Capabilities {
    name: "ZIP",
    extension: "zip",
    detect: zip_format::detect,
    read: zip_format::read_table,
    extract: zip_format::extract,
    write: zip_format::write_container,
    supports_in_place: false,
};

/// Supported container kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Danganronpa `AGAR` archive with a separate data region
    Wad,
    /// Danganronpa V3 `CPS.` archive with interleaved entries
    Spc,
    /// ZIP-wrapped resource bundle
    Zip,
}

impl ContainerKind {
    /// All kinds, in detection order
    pub const ALL: [ContainerKind; 3] = [ContainerKind::Wad, ContainerKind::Spc, ContainerKind::Zip];

    /// Static capability table for this kind
    pub fn capabilities(self) -> &'static Capabilities {
        match self {
            ContainerKind::Wad => &WAD_CAPABILITIES,
            ContainerKind::Spc => &SPC_CAPABILITIES,
            ContainerKind::Zip => &ZIP_CAPABILITIES,
        }
    }

    /// Detect the kind of a container from its leading bytes
    pub fn detect(data: &[u8]) -> Option<ContainerKind> {
        Self::ALL
            .into_iter()
            .find(|kind| (kind.capabilities().detect)(data))
    }

    /// Check whether `data` looks like this kind
    pub fn is_format(self, data: &[u8]) -> bool {
        (self.capabilities().detect)(data)
    }

    /// Resolve a kind from a file extension (case-insensitive)
    pub fn from_extension(extension: &str) -> Option<ContainerKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.capabilities().extension.eq_ignore_ascii_case(extension))
    }

    /// Whether payloads can be overwritten in place
    pub fn supports_in_place(self) -> bool {
        self.capabilities().supports_in_place
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capabilities().name)
    }
}

/// Read the stored bytes of an entry verbatim
fn extract_stored(container: &ArchiveContainer, entry: &ContainerEntry) -> Result<Vec<u8>> {
    let len = usize::try_from(entry.size)
        .map_err(|_| Error::CapacityExceeded(format!("entry {} is too large", entry.name)))?;
    let mut data = vec![0u8; len];
    let mut reader = container.open_reader()?;
    crate::io::read_at(
        &mut reader,
        container.data_offset() + entry.offset,
        &mut data,
    )?;
    Ok(data)
}

/// Resource kinds found inside containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Structural resource holding the resource table (`$CFH` block stream)
    Srd,
    /// Bulk data indexed by a structural resource
    Srdv,
    /// PNG image
    Png,
    /// TGA image
    Tga,
    /// DDS texture
    Dds,
}

impl ResourceKind {
    /// All kinds
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Srd,
        ResourceKind::Srdv,
        ResourceKind::Png,
        ResourceKind::Tga,
        ResourceKind::Dds,
    ];

    /// Conventional file extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ResourceKind::Srd => "srd",
            ResourceKind::Srdv => "srdv",
            ResourceKind::Png => "png",
            ResourceKind::Tga => "tga",
            ResourceKind::Dds => "dds",
        }
    }

    /// Magic-number detection; kinds without a magic never match
    pub fn is_format(self, data: &[u8]) -> bool {
        match self {
            ResourceKind::Srd => data.starts_with(crate::srd::CFH_MAGIC),
            ResourceKind::Png => data.starts_with(b"\x89PNG\r\n\x1a\n"),
            ResourceKind::Dds => data.starts_with(b"DDS "),
            ResourceKind::Srdv | ResourceKind::Tga => false,
        }
    }

    /// Detect a resource kind from its content
    pub fn detect(data: &[u8]) -> Option<ResourceKind> {
        Self::ALL.into_iter().find(|kind| kind.is_format(data))
    }

    /// Classify an entry name by its extension (case-insensitive)
    pub fn for_name(name: &str) -> Option<ResourceKind> {
        let (_, extension) = name.rsplit_once('.')?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(extension))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Conversion collaborator producing canonical payload bytes
///
/// Pixel and codec conversion live outside this crate; callers plug their
/// implementation in here before handing payloads to the patcher.
pub trait Converter {
    /// Convert `data` from one resource kind to another
    fn convert(&self, from: ResourceKind, to: ResourceKind, data: &[u8]) -> Result<Vec<u8>>;
}

/// Converter that only accepts identity conversions
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Converter for Passthrough {
    fn convert(&self, from: ResourceKind, to: ResourceKind, data: &[u8]) -> Result<Vec<u8>> {
        if from == to {
            Ok(data.to_vec())
        } else {
            Err(Error::Conversion(format!(
                "no codec available for {from} -> {to}"
            )))
        }
    }
}
