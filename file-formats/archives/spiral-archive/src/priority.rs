//! Load-order priorities for container entries
//!
//! Mods co-installed into the same container record how senior their
//! entries are in a reserved manifest entry, [`PRIORITY_MANIFEST_NAME`].
//! Higher numbers win. A container without a manifest has no ordering
//! history and every entry has priority 0.

use crate::container::ArchiveContainer;
use crate::special_files::{decode_priority_list, encode_priority_list};
use crate::Result;
use std::collections::HashMap;

/// Reserved entry name of the priority manifest
pub const PRIORITY_MANIFEST_NAME: &str = "Spiral-Priority-List";

/// Mapping from entry name to load-order priority
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityIndex {
    priorities: HashMap<String, i32>,
}

impl PriorityIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the priority manifest of a container
    ///
    /// An absent manifest yields an empty index; a malformed one is an
    /// `Error::InvalidFormat`.
    pub fn for_container(container: &ArchiveContainer) -> Result<Self> {
        if !container.contains(PRIORITY_MANIFEST_NAME) {
            return Ok(Self::new());
        }

        let data = container.read_entry(PRIORITY_MANIFEST_NAME)?;
        Self::decode(&data)
    }

    /// Decode a manifest payload
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            priorities: decode_priority_list(data)?,
        })
    }

    /// Encode this index as a manifest payload
    pub fn encode(&self) -> Vec<u8> {
        encode_priority_list(self.priorities.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Priority of `name`, 0 if unlisted
    pub fn get(&self, name: &str) -> i32 {
        self.priorities.get(name).copied().unwrap_or(0)
    }

    /// Set the priority of `name`
    pub fn set<S: Into<String>>(&mut self, name: S, priority: i32) {
        self.priorities.insert(name.into(), priority);
    }

    /// Highest listed priority, 0 if the index is empty
    pub fn highest(&self) -> i32 {
        self.priorities.values().copied().max().unwrap_or(0)
    }

    /// Number of listed names
    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    /// Whether no name is listed
    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }

    /// Iterate over listed names and priorities
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.priorities.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, i32)> for PriorityIndex {
    fn from_iter<I: IntoIterator<Item = (S, i32)>>(iter: I) -> Self {
        Self {
            priorities: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
