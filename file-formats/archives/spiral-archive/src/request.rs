//! Patch requests
//!
//! A [`PatchRequest`] is an ordered list of `(name, payload)` replacements
//! with unique names. The size of each replacement is the payload length.

use crate::priority::PRIORITY_MANIFEST_NAME;
use crate::{Error, Result};
use std::collections::HashSet;

/// One replacement payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchItem {
    /// Target entry name
    pub name: String,
    /// Replacement bytes
    pub data: Vec<u8>,
}

impl PatchItem {
    /// Create a patch item
    pub fn new<S: Into<String>>(name: S, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Size of the replacement payload
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Ordered set of replacements against one container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchRequest {
    items: Vec<PatchItem>,
}

impl PatchRequest {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a request from items, validating names
    ///
    /// # Errors
    /// - `Error::InvalidRequest` on a duplicate, empty or reserved name
    pub fn from_items<I: IntoIterator<Item = PatchItem>>(items: I) -> Result<Self> {
        let mut request = Self::new();
        for item in items {
            request.push(item)?;
        }
        Ok(request)
    }

    /// Append a replacement
    pub fn push(&mut self, item: PatchItem) -> Result<()> {
        if item.name.is_empty() {
            return Err(Error::invalid_request("entry name must not be empty"));
        }
        if item.name == PRIORITY_MANIFEST_NAME {
            return Err(Error::invalid_request(format!(
                "{PRIORITY_MANIFEST_NAME} is managed by the patcher and cannot be replaced"
            )));
        }
        if self.contains(&item.name) {
            return Err(Error::invalid_request(format!(
                "{} is replaced more than once",
                item.name
            )));
        }
        self.items.push(item);
        Ok(())
    }

    /// Builder-style [`push`](Self::push)
    pub fn with<S: Into<String>>(mut self, name: S, data: Vec<u8>) -> Result<Self> {
        self.push(PatchItem::new(name, data))?;
        Ok(self)
    }

    /// Items in request order
    pub fn items(&self) -> &[PatchItem] {
        &self.items
    }

    /// Look up an item by name
    pub fn get(&self, name: &str) -> Option<&PatchItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Whether `name` is replaced by this request
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Requested names in request order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }

    /// Requested names as a set
    pub fn name_set(&self) -> HashSet<&str> {
        self.names().collect()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the request is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total payload bytes
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(PatchItem::size).sum()
    }

    /// Consume into items
    pub fn into_items(self) -> Vec<PatchItem> {
        self.items
    }
}
