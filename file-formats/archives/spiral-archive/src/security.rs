//! Input validation for untrusted containers
//!
//! Container tables are read from files supplied by mod authors. Every count
//! and length read from disk is checked against [`ParseLimits`] before it is
//! used to size an allocation, and every entry range is bounds-checked against
//! the container size before it is trusted.

use crate::{Error, Result};
use std::path::{Component, Path};

/// Limits applied while parsing container tables
#[derive(Debug, Clone)]
pub struct ParseLimits {
    /// Maximum number of entries in a single table (default: 1M)
    pub max_entry_count: u32,
    /// Maximum byte length of an entry name (default: 4096)
    pub max_name_length: u32,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_entry_count: 1_000_000,
            max_name_length: 4096,
        }
    }
}

impl ParseLimits {
    /// Check an entry count read from a table header
    pub fn check_count(&self, what: &str, count: u32) -> Result<()> {
        if count > self.max_entry_count {
            return Err(Error::invalid_format(format!(
                "{what} count {count} exceeds limit {}",
                self.max_entry_count
            )));
        }
        Ok(())
    }

    /// Check a name length read from a table
    pub fn check_name_length(&self, len: u32) -> Result<()> {
        if len > self.max_name_length {
            return Err(Error::invalid_format(format!(
                "Name length {len} exceeds limit {}",
                self.max_name_length
            )));
        }
        Ok(())
    }
}

/// Validate that `offset..offset + size` lies inside `container_size`
pub fn validate_entry_bounds(name: &str, offset: u64, size: u64, container_size: u64) -> Result<()> {
    let end = offset
        .checked_add(size)
        .ok_or_else(|| Error::invalid_format(format!("Entry {name} offset overflows")))?;

    if end > container_size {
        return Err(Error::invalid_format(format!(
            "Entry {name} extends beyond container bounds ({end} > {container_size})"
        )));
    }

    Ok(())
}

/// Validate an entry name before it is used as a path on disk
///
/// Rejects empty names, NUL and control characters, absolute paths and
/// parent directory references.
pub fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_format("Empty entry name not allowed"));
    }

    if name.chars().any(|ch| matches!(ch, '\0'..='\x1f' | '\x7f')) {
        return Err(Error::invalid_format(format!(
            "Entry name {name:?} contains control characters"
        )));
    }

    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(Error::invalid_format(format!(
            "Absolute entry name not allowed: {name}"
        )));
    }

    for component in Path::new(&normalized).components() {
        match component {
            Component::ParentDir => {
                return Err(Error::invalid_format(format!(
                    "Entry name contains parent directory reference: {name}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::invalid_format(format!(
                    "Absolute entry name not allowed: {name}"
                )));
            }
            _ => {}
        }
    }

    Ok(())
}
