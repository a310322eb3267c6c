//! Container rebuilding
//!
//! Rewrites a whole container with replacements substituted and new entries
//! appended. The table keeps the original entry order; the physical layout
//! of the data region depends on [`RebuildMode`].

use crate::container::{ArchiveContainer, EntrySource, ImageLayout, OutputEntry};
use crate::io::{CacheReader, cache_stream};
use crate::priority::{PRIORITY_MANIFEST_NAME, PriorityIndex};
use crate::request::PatchRequest;
use crate::Result;
use std::io::{Seek, Write};

/// Physical layout policy for a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebuildMode {
    /// Keep the original physical order, appending new entries
    Reorganize,
    /// Lay data out by ascending priority so senior content sits last
    Full,
}

/// Options for rebuilding a container
#[derive(Debug, Clone)]
pub struct RebuildOptions {
    /// Physical layout policy
    pub mode: RebuildMode,
    /// Promote every requested name above the current highest priority
    pub prioritize_new: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            mode: RebuildMode::Reorganize,
            prioritize_new: false,
        }
    }
}

impl RebuildOptions {
    /// Create default rebuild options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the physical layout policy
    pub fn mode(mut self, mode: RebuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set whether requested names are promoted to the top priority
    pub fn prioritize_new(mut self, prioritize: bool) -> Self {
        self.prioritize_new = prioritize;
        self
    }
}

/// Summary of a rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Entries copied unchanged
    pub copied: usize,
    /// Entries whose payload was replaced
    pub replaced: usize,
    /// Entries added by the request
    pub inserted: usize,
    /// Layout policy used
    pub mode: RebuildMode,
}

/// Compute the output image for a rebuild
pub fn plan_layout(
    container: &ArchiveContainer,
    request: &PatchRequest,
    options: &RebuildOptions,
) -> Result<(ImageLayout, RebuildSummary)> {
    let prioritize = options.prioritize_new && !request.is_empty();
    let promoted = container.highest_priority().saturating_add(1);

    let manifest = if prioritize {
        let mut priorities = PriorityIndex::for_container(container)?;
        for name in request.names() {
            priorities.set(name, promoted);
        }
        Some(priorities.encode())
    } else {
        None
    };

    let mut summary = RebuildSummary {
        copied: 0,
        replaced: 0,
        inserted: 0,
        mode: options.mode,
    };
    let mut entries = Vec::with_capacity(container.entries().len() + request.len() + 1);

    for (index, entry) in container.entries().iter().enumerate() {
        let (priority, source) = if entry.name == PRIORITY_MANIFEST_NAME {
            match &manifest {
                Some(data) => (entry.priority, EntrySource::Data(data.clone())),
                None => (entry.priority, EntrySource::Original(index)),
            }
        } else if let Some(item) = request.get(&entry.name) {
            summary.replaced += 1;
            let priority = if prioritize { promoted } else { entry.priority };
            (priority, EntrySource::Data(item.data.clone()))
        } else {
            summary.copied += 1;
            (entry.priority, EntrySource::Original(index))
        };
        entries.push(OutputEntry {
            name: entry.name.clone(),
            priority,
            source,
        });
    }

    let existing = entries.len();
    for item in request.items() {
        if container.contains(&item.name) {
            continue;
        }
        summary.inserted += 1;
        entries.push(OutputEntry {
            name: item.name.clone(),
            priority: if prioritize { promoted } else { 0 },
            source: EntrySource::Data(item.data.clone()),
        });
    }

    if let Some(data) = manifest {
        if !container.contains(PRIORITY_MANIFEST_NAME) {
            entries.push(OutputEntry {
                name: PRIORITY_MANIFEST_NAME.to_string(),
                priority: 0,
                source: EntrySource::Data(data),
            });
        }
    }

    let physical_order = match options.mode {
        RebuildMode::Reorganize => {
            let mut order: Vec<usize> = (0..existing).collect();
            order.sort_by_key(|&i| container.entries()[i].offset);
            order.extend(existing..entries.len());
            order
        }
        RebuildMode::Full => {
            let mut order: Vec<usize> = (0..entries.len()).collect();
            order.sort_by_key(|&i| entries[i].priority);
            order
        }
    };

    Ok((
        ImageLayout {
            entries,
            physical_order,
        },
        summary,
    ))
}

/// Rebuild `container` with `request` applied into `writer`
pub fn rebuild_into<W: Write + Seek>(
    container: &ArchiveContainer,
    request: &PatchRequest,
    options: &RebuildOptions,
    writer: &mut W,
) -> Result<RebuildSummary> {
    let (layout, summary) = plan_layout(container, request, options)?;

    log::debug!(
        "Rebuilding {} container ({:?}): {} copied, {} replaced, {} inserted",
        container.kind(),
        summary.mode,
        summary.copied,
        summary.replaced,
        summary.inserted
    );

    (container.kind().capabilities().write)(&layout, Some(container), container.header(), writer)?;
    Ok(summary)
}

/// Rebuild `container` with `request` applied into a cache stream
pub fn rebuild(
    container: &ArchiveContainer,
    request: &PatchRequest,
    options: &RebuildOptions,
) -> Result<CacheReader> {
    let mut stream = cache_stream();
    rebuild_into(container, request, options, &mut stream)?;
    stream.into_reader()
}
