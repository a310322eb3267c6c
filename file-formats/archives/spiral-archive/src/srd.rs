//! Structural resource (`.srd`) block stream and resource table
//!
//! A structural resource is a stream of blocks:
//!
//! ```text
//! magic[4] | data_len u32 BE | sub_len u32 BE | unknown u32 BE |
//! data[data_len] | pad to 16 | sub-blocks[sub_len] | pad to 16
//! ```
//!
//! The stream opens with a `$CFH` block. `$RSI` blocks, at any depth, hold
//! a resource record whose locations point into the companion bulk-data
//! resource (`.srdv`):
//!
//! ```text
//! location_count u32 LE | name_offset u32 LE |
//! { offset u32 LE | length u32 LE | unk1 u32 LE | unk2 u32 LE } * location_count |
//! ... | name NUL-terminated at name_offset
//! ```
//!
//! Only the offset and length fields are ever rewritten, so a structural
//! resource keeps its size across patches.

use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Magic of the block opening every structural resource
pub const CFH_MAGIC: &[u8; 4] = b"$CFH";

/// Magic of a resource information block
pub const RSI_MAGIC: &[u8; 4] = b"$RSI";

/// Magic of the closing block written by [`SrdBuilder`]
pub const CT0_MAGIC: &[u8; 4] = b"$CT0";

const BLOCK_HEADER_LEN: usize = 16;
const LOCATION_LEN: usize = 16;
const MAX_DEPTH: usize = 32;

#[inline]
fn align16(len: usize) -> usize {
    (len + 15) & !15
}

/// One parsed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrdBlock {
    /// Block magic
    pub magic: [u8; 4],
    /// Absolute position of the block data in the stream
    pub data_start: usize,
    /// Length of the block data
    pub data_len: usize,
    /// Unknown header field
    pub unknown: u32,
    /// Nested blocks
    pub children: Vec<SrdBlock>,
}

impl SrdBlock {
    /// The block's data within `stream`
    pub fn data<'a>(&self, stream: &'a [u8]) -> &'a [u8] {
        &stream[self.data_start..self.data_start + self.data_len]
    }
}

fn parse_region(stream: &[u8], start: usize, end: usize, depth: usize) -> Result<Vec<SrdBlock>> {
    if depth > MAX_DEPTH {
        return Err(Error::invalid_format("SRD blocks nested too deeply"));
    }

    let mut blocks = Vec::new();
    let mut pos = start;
    while pos < end {
        if end - pos < BLOCK_HEADER_LEN {
            return Err(Error::invalid_format(format!(
                "Truncated SRD block header at {pos}"
            )));
        }

        let header = &stream[pos..pos + BLOCK_HEADER_LEN];
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[..4]);
        let data_len = BigEndian::read_u32(&header[4..8]) as usize;
        let sub_len = BigEndian::read_u32(&header[8..12]) as usize;
        let unknown = BigEndian::read_u32(&header[12..16]);

        let data_start = pos + BLOCK_HEADER_LEN;
        let sub_start = data_start
            .checked_add(align16(data_len))
            .filter(|&p| p <= end)
            .ok_or_else(|| {
                Error::invalid_format(format!("SRD block data at {pos} exceeds its region"))
            })?;
        let sub_end = sub_start
            .checked_add(sub_len)
            .filter(|&p| p <= end)
            .ok_or_else(|| {
                Error::invalid_format(format!("SRD sub-blocks at {pos} exceed their region"))
            })?;

        let children = if sub_len > 0 {
            parse_region(stream, sub_start, sub_end, depth + 1)?
        } else {
            Vec::new()
        };

        blocks.push(SrdBlock {
            magic,
            data_start,
            data_len,
            unknown,
            children,
        });
        pos = align16(sub_end).min(end);
    }
    Ok(blocks)
}

/// Parse a structural resource into its block tree
///
/// # Errors
/// - `Error::InvalidFormat` if the stream does not open with `$CFH` or a
///   block overruns its region
pub fn parse_blocks(stream: &[u8]) -> Result<Vec<SrdBlock>> {
    if !stream.starts_with(CFH_MAGIC) {
        return Err(Error::invalid_format("Structural resource does not start with $CFH"));
    }
    parse_region(stream, 0, stream.len(), 0)
}

/// One location of a resource in the bulk data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLocation {
    /// Offset in the bulk data
    pub offset: u32,
    /// Length in the bulk data
    pub length: u32,
    /// Absolute position of the offset field in the structural stream
    field_pos: usize,
}

impl ResourceLocation {
    /// End of the located range
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.length)
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        u64::from(self.offset) < end && start < self.end()
    }
}

/// A resource record from a `$RSI` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Resource name
    pub name: String,
    /// Locations in the bulk data; the first is the resource payload
    pub locations: Vec<ResourceLocation>,
}

fn parse_record(stream: &[u8], block: &SrdBlock) -> Result<ResourceRecord> {
    let data = block.data(stream);
    if data.len() < 8 {
        return Err(Error::invalid_format("Truncated $RSI record"));
    }

    let count = LittleEndian::read_u32(&data[0..4]) as usize;
    let name_offset = LittleEndian::read_u32(&data[4..8]) as usize;

    let table_end = count
        .checked_mul(LOCATION_LEN)
        .and_then(|len| len.checked_add(8))
        .filter(|&end| end <= data.len())
        .ok_or_else(|| Error::invalid_format("$RSI location table exceeds its block"))?;

    let mut locations = Vec::with_capacity(count);
    for pos in (8..table_end).step_by(LOCATION_LEN) {
        locations.push(ResourceLocation {
            offset: LittleEndian::read_u32(&data[pos..pos + 4]),
            length: LittleEndian::read_u32(&data[pos + 4..pos + 8]),
            field_pos: block.data_start + pos,
        });
    }

    let name_bytes = data
        .get(name_offset..)
        .ok_or_else(|| Error::invalid_format("$RSI name offset exceeds its block"))?;
    let name_len = name_bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::invalid_format("$RSI name is not NUL-terminated"))?;
    let name = String::from_utf8(name_bytes[..name_len].to_vec())
        .map_err(|_| Error::invalid_format("$RSI name is not valid UTF-8"))?;

    Ok(ResourceRecord { name, locations })
}

fn collect_records(stream: &[u8], blocks: &[SrdBlock], out: &mut Vec<ResourceRecord>) -> Result<()> {
    for block in blocks {
        if &block.magic == RSI_MAGIC {
            out.push(parse_record(stream, block)?);
        }
        collect_records(stream, &block.children, out)?;
    }
    Ok(())
}

/// Every resource record of a structural resource, in stream order
pub fn resource_records(stream: &[u8]) -> Result<Vec<ResourceRecord>> {
    let blocks = parse_blocks(stream)?;
    let mut records = Vec::new();
    collect_records(stream, &blocks, &mut records)?;
    Ok(records)
}

/// Result of splicing a payload into a companion pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePatch {
    /// Rewritten structural resource, same size as the original
    pub structural: Vec<u8>,
    /// Rewritten bulk data
    pub bulk: Vec<u8>,
    /// Change in bulk size
    pub delta: i64,
}

/// Replace the payload of `resource_name` in the bulk data
///
/// The payload replaces the resource's first location. Every location that
/// starts at or past the end of the replaced range is shifted by the size
/// change.
///
/// # Errors
/// - `Error::ResourceNotFound` if no record has this name
/// - `Error::InvalidFormat` if the replaced range lies outside the bulk data
///   or another location overlaps it
/// - `Error::CapacityExceeded` if a shifted offset or the new length no
///   longer fits in 32 bits
pub fn patch_resource(
    structural: &[u8],
    bulk: &[u8],
    resource_name: &str,
    payload: &[u8],
) -> Result<ResourcePatch> {
    let records = resource_records(structural)?;
    let record = records
        .iter()
        .find(|record| record.name == resource_name)
        .ok_or_else(|| Error::ResourceNotFound(resource_name.to_string()))?;
    let target = *record.locations.first().ok_or_else(|| {
        Error::invalid_format(format!("Resource {resource_name} has no bulk location"))
    })?;

    let start = u64::from(target.offset);
    let end = target.end();
    if end > bulk.len() as u64 {
        return Err(Error::invalid_format(format!(
            "Resource {resource_name} range {start}..{end} exceeds bulk size {}",
            bulk.len()
        )));
    }

    let others = records
        .iter()
        .flat_map(|record| record.locations.iter())
        .filter(|location| location.field_pos != target.field_pos);
    for location in others.clone() {
        if location.overlaps(start, end) {
            return Err(Error::invalid_format(format!(
                "Location {}..{} overlaps the range of {resource_name}",
                location.offset,
                location.end()
            )));
        }
    }

    let new_length = u32::try_from(payload.len()).map_err(|_| {
        Error::CapacityExceeded(format!("payload for {resource_name} exceeds 4 GiB"))
    })?;
    let delta = payload.len() as i64 - i64::from(target.length);

    let mut out = structural.to_vec();
    LittleEndian::write_u32(&mut out[target.field_pos + 4..target.field_pos + 8], new_length);

    let mut shifted = 0usize;
    for location in others {
        if u64::from(location.offset) < end {
            continue;
        }
        let moved = u32::try_from(i64::from(location.offset) + delta).map_err(|_| {
            Error::CapacityExceeded(format!(
                "shifted offset of location at {} no longer fits in 32 bits",
                location.offset
            ))
        })?;
        LittleEndian::write_u32(&mut out[location.field_pos..location.field_pos + 4], moved);
        shifted += 1;
    }

    let (start, end) = (start as usize, end as usize);
    let mut new_bulk = Vec::with_capacity(bulk.len() - (end - start) + payload.len());
    new_bulk.extend_from_slice(&bulk[..start]);
    new_bulk.extend_from_slice(payload);
    new_bulk.extend_from_slice(&bulk[end..]);

    log::debug!(
        "Spliced {} bytes into {resource_name} (delta {delta}, {shifted} locations shifted)",
        payload.len()
    );

    Ok(ResourcePatch {
        structural: out,
        bulk: new_bulk,
        delta,
    })
}

/// Encode one block
pub fn encode_block(magic: &[u8; 4], data: &[u8], sub_blocks: &[u8], unknown: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(BLOCK_HEADER_LEN + align16(data.len()) + align16(sub_blocks.len()));
    out.extend_from_slice(magic);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&(sub_blocks.len() as u32).to_be_bytes());
    out.extend_from_slice(&unknown.to_be_bytes());
    out.extend_from_slice(data);
    out.resize(BLOCK_HEADER_LEN + align16(data.len()), 0);
    out.extend_from_slice(sub_blocks);
    out.resize(align16(out.len()), 0);
    out
}

/// Encode a `$RSI` record
pub fn encode_record(name: &str, locations: &[(u32, u32)]) -> Vec<u8> {
    let name_offset = 8 + locations.len() * LOCATION_LEN;
    let mut out = Vec::with_capacity(name_offset + name.len() + 1);
    out.extend_from_slice(&(locations.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name_offset as u32).to_le_bytes());
    for (offset, length) in locations {
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
    }
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out
}

/// Writer for structural resources
///
/// Each resource becomes a `$TXR` block with its `$RSI` record nested as a
/// sub-block, between a leading `$CFH` and a trailing `$CT0`.
#[derive(Debug, Default)]
pub struct SrdBuilder {
    resources: Vec<(String, Vec<(u32, u32)>)>,
}

impl SrdBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource with its bulk-data locations
    pub fn resource<S: Into<String>>(mut self, name: S, locations: &[(u32, u32)]) -> Self {
        self.resources.push((name.into(), locations.to_vec()));
        self
    }

    /// Encode the block stream
    pub fn build(&self) -> Vec<u8> {
        let mut out = encode_block(CFH_MAGIC, &[], &[], 1);
        for (name, locations) in &self.resources {
            let rsi = encode_block(RSI_MAGIC, &encode_record(name, locations), &[], 0);
            out.extend(encode_block(b"$TXR", &[0u8; 4], &rsi, 0));
        }
        out.extend(encode_block(CT0_MAGIC, &[], &[], 0));
        out
    }
}
