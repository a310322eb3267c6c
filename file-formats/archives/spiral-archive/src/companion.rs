//! Companion-pair patching
//!
//! Structural resources (`.srd`) index their payloads inside a bulk-data
//! companion (`.srdv`) by offset. Replacing one payload means splicing the
//! bulk data and rewriting every offset behind the edit, then writing both
//! entries back through the regular patch pipeline.
//!
//! When a container holds more than one candidate of a role, the caller's
//! [`Disambiguator`] picks one. The patcher never prompts by itself.

use crate::container::ArchiveContainer;
use crate::format::ResourceKind;
use crate::request::{PatchItem, PatchRequest};
use crate::srd::patch_resource;
use crate::{Error, Result};
use std::fmt;

/// Which half of a companion pair is being chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanionRole {
    /// The `.srd` resource holding the resource table
    Structural,
    /// The `.srdv` resource holding payload bytes
    Bulk,
}

impl CompanionRole {
    /// Resource kind of this role
    pub fn resource_kind(self) -> ResourceKind {
        match self {
            CompanionRole::Structural => ResourceKind::Srd,
            CompanionRole::Bulk => ResourceKind::Srdv,
        }
    }
}

impl fmt::Display for CompanionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompanionRole::Structural => write!(f, "structural (.srd)"),
            CompanionRole::Bulk => write!(f, "bulk data (.srdv)"),
        }
    }
}

/// Outcome of a disambiguation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The chosen candidate
    Selected(String),
    /// The caller declined to choose
    Cancelled,
}

/// Chooses one candidate when several match
pub trait Disambiguator {
    /// Pick one of `candidates` for `role`
    fn choose(&mut self, role: CompanionRole, candidates: &[String]) -> Selection;
}

impl<F> Disambiguator for F
where
    F: FnMut(CompanionRole, &[String]) -> Selection,
{
    fn choose(&mut self, role: CompanionRole, candidates: &[String]) -> Selection {
        self(role, candidates)
    }
}

/// Always picks the first candidate
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCandidate;

impl Disambiguator for FirstCandidate {
    fn choose(&mut self, _role: CompanionRole, candidates: &[String]) -> Selection {
        candidates
            .first()
            .cloned()
            .map_or(Selection::Cancelled, Selection::Selected)
    }
}

/// Answers from names fixed up front, cancelling for unset roles
#[derive(Debug, Default, Clone)]
pub struct Preselected {
    /// Name to answer for the structural role
    pub structural: Option<String>,
    /// Name to answer for the bulk role
    pub bulk: Option<String>,
}

impl Disambiguator for Preselected {
    fn choose(&mut self, role: CompanionRole, _candidates: &[String]) -> Selection {
        let name = match role {
            CompanionRole::Structural => &self.structural,
            CompanionRole::Bulk => &self.bulk,
        };
        name.clone().map_or(Selection::Cancelled, Selection::Selected)
    }
}

/// Candidate entries for each role, in table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanionCandidates {
    /// `.srd` entries
    pub structural: Vec<String>,
    /// `.srdv` entries
    pub bulk: Vec<String>,
}

impl CompanionCandidates {
    /// Candidates for `role`
    pub fn for_role(&self, role: CompanionRole) -> &[String] {
        match role {
            CompanionRole::Structural => &self.structural,
            CompanionRole::Bulk => &self.bulk,
        }
    }
}

/// Classify container entries into structural and bulk candidates
pub fn find_candidates(container: &ArchiveContainer) -> CompanionCandidates {
    let mut candidates = CompanionCandidates::default();
    for entry in container.entries() {
        match ResourceKind::for_name(&entry.name) {
            Some(ResourceKind::Srd) => candidates.structural.push(entry.name.clone()),
            Some(ResourceKind::Srdv) => candidates.bulk.push(entry.name.clone()),
            _ => {}
        }
    }
    candidates
}

/// Resolve one candidate for `role`
///
/// # Errors
/// - `Error::NoCandidateResource` if the list is empty
/// - `Error::SelectionCancelled` if the disambiguator declines
/// - `Error::InvalidSelection` if it answers with a name outside the list
pub fn select<D: Disambiguator + ?Sized>(
    role: CompanionRole,
    candidates: &[String],
    disambiguator: &mut D,
) -> Result<String> {
    match candidates {
        [] => Err(Error::NoCandidateResource {
            kind: role.resource_kind().extension(),
        }),
        [only] => Ok(only.clone()),
        _ => match disambiguator.choose(role, candidates) {
            Selection::Cancelled => {
                log::debug!("Selection of {role} resource cancelled");
                Err(Error::SelectionCancelled)
            }
            Selection::Selected(name) if candidates.contains(&name) => Ok(name),
            Selection::Selected(name) => Err(Error::InvalidSelection(name)),
        },
    }
}

/// The chosen structural and bulk entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionPair {
    /// Structural entry name
    pub structural: String,
    /// Bulk entry name
    pub bulk: String,
}

/// Rewritten bytes of a companion pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionPatch {
    /// The pair that was patched
    pub pair: CompanionPair,
    /// The resource whose payload was replaced
    pub resource_name: String,
    /// New structural resource bytes
    pub structural: Vec<u8>,
    /// New bulk resource bytes
    pub bulk: Vec<u8>,
    /// Change in bulk size
    pub delta: i64,
}

impl CompanionPatch {
    /// Turn the rewritten pair into a request against the same container
    pub fn into_request(self) -> Result<PatchRequest> {
        PatchRequest::from_items([
            PatchItem::new(self.pair.structural, self.structural),
            PatchItem::new(self.pair.bulk, self.bulk),
        ])
    }
}

/// Replace the payload of `resource_name` inside a companion pair
///
/// Only reads from `container`; apply the result with
/// [`CompanionPatch::into_request`].
pub fn patch_companion_pair<D: Disambiguator + ?Sized>(
    container: &ArchiveContainer,
    candidates: &CompanionCandidates,
    disambiguator: &mut D,
    resource_name: &str,
    payload: &[u8],
) -> Result<CompanionPatch> {
    let structural = select(CompanionRole::Structural, &candidates.structural, disambiguator)?;
    let bulk = select(CompanionRole::Bulk, &candidates.bulk, disambiguator)?;
    log::debug!("Companion pair: {structural} + {bulk}");

    let structural_data = container.read_entry(&structural)?;
    let bulk_data = container.read_entry(&bulk)?;
    let patch = patch_resource(&structural_data, &bulk_data, resource_name, payload)?;

    Ok(CompanionPatch {
        pair: CompanionPair { structural, bulk },
        resource_name: resource_name.to_string(),
        structural: patch.structural,
        bulk: patch.bulk,
        delta: patch.delta,
    })
}
