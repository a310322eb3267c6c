//! Patch strategy selection
//!
//! The planner is a pure function of a container snapshot, its priority
//! index and a request. It decides between overwriting payloads in place,
//! reorganizing the container around the replacements, or rebuilding it
//! from scratch with the replacements promoted to the top priority.

use crate::container::ArchiveContainer;
use crate::priority::PriorityIndex;
use crate::request::PatchRequest;
use std::collections::BTreeSet;
use std::fmt;

/// How a request will be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchStrategy {
    /// Overwrite payload bytes at their current offsets
    InPlace,
    /// Rewrite the container keeping existing priorities and physical order
    Reorganize,
    /// Rewrite the container with the replaced entries at top priority
    Rebuild,
}

impl fmt::Display for PatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchStrategy::InPlace => write!(f, "in-place"),
            PatchStrategy::Reorganize => write!(f, "reorganize"),
            PatchStrategy::Rebuild => write!(f, "rebuild"),
        }
    }
}

/// Why a strategy was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanReason {
    /// Every name exists with the same size
    SizesMatch,
    /// Neither the container nor the request carries priorities
    FreshBuild,
    /// The lowest requested priority is above half the highest
    WithinPriorityBounds,
    /// The lowest requested priority is at or below half the highest
    PriorityTooLow,
    /// Some requested names are absent from the container
    NewEntries,
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PlanReason::SizesMatch => "all entries exist with matching sizes",
            PlanReason::FreshBuild => "no priorities recorded",
            PlanReason::WithinPriorityBounds => "requested entries are within priority bounds",
            PlanReason::PriorityTooLow => "requested entries have too low a priority",
            PlanReason::NewEntries => "request adds new entries",
        };
        f.write_str(text)
    }
}

/// Planner decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    /// Chosen strategy
    pub strategy: PatchStrategy,
    /// Reason for the choice
    pub reason: PlanReason,
    /// Names the decision hinges on
    ///
    /// The missing names for [`PlanReason::NewEntries`], otherwise every
    /// requested name.
    pub names: BTreeSet<String>,
}

/// Map `(highest, lowest)` priorities to a rewrite strategy
///
/// Only consulted when every requested name already exists.
pub fn classify_priorities(highest: i32, lowest: i32) -> (PatchStrategy, PlanReason) {
    if highest == 0 && lowest == 0 {
        (PatchStrategy::Rebuild, PlanReason::FreshBuild)
    } else if lowest > highest / 2 {
        (PatchStrategy::Reorganize, PlanReason::WithinPriorityBounds)
    } else {
        (PatchStrategy::Rebuild, PlanReason::PriorityTooLow)
    }
}

/// Decide how to apply `request` to `container`
pub fn plan(container: &ArchiveContainer, priorities: &PriorityIndex, request: &PatchRequest) -> PatchPlan {
    let requested: BTreeSet<String> = request.names().map(str::to_string).collect();

    let sizes_match = request.items().iter().all(|item| {
        container
            .entry(&item.name)
            .is_some_and(|entry| entry.size == item.size())
    });
    if container.kind().supports_in_place() && sizes_match {
        log::debug!("Planned in-place patch of {} entries", requested.len());
        return PatchPlan {
            strategy: PatchStrategy::InPlace,
            reason: PlanReason::SizesMatch,
            names: requested,
        };
    }

    let missing: BTreeSet<String> = requested
        .iter()
        .filter(|name| !container.contains(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        log::debug!("Planned rebuild, {} new entries", missing.len());
        return PatchPlan {
            strategy: PatchStrategy::Rebuild,
            reason: PlanReason::NewEntries,
            names: missing,
        };
    }

    let highest = container.highest_priority();
    let lowest = request
        .names()
        .map(|name| priorities.get(name))
        .min()
        .unwrap_or(0);
    let (strategy, reason) = classify_priorities(highest, lowest);
    log::debug!("Planned {strategy} (highest priority {highest}, lowest requested {lowest})");

    PatchPlan {
        strategy,
        reason,
        names: requested,
    }
}
