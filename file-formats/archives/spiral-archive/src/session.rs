//! Patch sessions
//!
//! A [`PatchSession`] owns one target container and runs requests through
//! the whole pipeline: plan, then either an in-place overwrite or a rebuild
//! staged in a [`Transaction`]. Sessions share no state, so independent
//! targets can be patched in parallel with [`apply_all`].

use crate::companion::{Disambiguator, find_candidates, patch_companion_pair};
use crate::container::ArchiveContainer;
use crate::inplace::apply_in_place;
use crate::planner::{PatchPlan, PatchStrategy, plan};
use crate::priority::PriorityIndex;
use crate::rebuild::{RebuildMode, RebuildOptions, RebuildSummary, rebuild_into};
use crate::request::PatchRequest;
use crate::transaction::Transaction;
use crate::{Error, Result};
use std::collections::HashSet;
use std::io::Seek;
use std::path::{Path, PathBuf};

/// Result of applying one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// The plan that was executed
    pub plan: PatchPlan,
    /// Rebuild counts, absent for in-place patches
    pub summary: Option<RebuildSummary>,
    /// Bytes written to the target
    pub bytes_written: u64,
}

/// Rebuild options used for a planned strategy
pub fn options_for(strategy: PatchStrategy) -> Option<RebuildOptions> {
    match strategy {
        PatchStrategy::InPlace => None,
        PatchStrategy::Reorganize => Some(
            RebuildOptions::new()
                .mode(RebuildMode::Reorganize)
                .prioritize_new(false),
        ),
        PatchStrategy::Rebuild => Some(
            RebuildOptions::new()
                .mode(RebuildMode::Full)
                .prioritize_new(true),
        ),
    }
}

/// One container being patched
#[derive(Debug)]
pub struct PatchSession {
    path: PathBuf,
    container: ArchiveContainer,
    priorities: PriorityIndex,
}

impl PatchSession {
    /// Open and validate the container at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let container = ArchiveContainer::open(&path)?;
        let priorities = PriorityIndex::for_container(&container)?;
        Ok(Self {
            path,
            container,
            priorities,
        })
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current container snapshot
    pub fn container(&self) -> &ArchiveContainer {
        &self.container
    }

    /// Priorities of the current snapshot
    pub fn priorities(&self) -> &PriorityIndex {
        &self.priorities
    }

    /// Decide how `request` would be applied without touching the target
    pub fn plan(&self, request: &PatchRequest) -> PatchPlan {
        plan(&self.container, &self.priorities, request)
    }

    /// Apply `request` to the target
    ///
    /// The session reloads the container afterwards, so successive requests
    /// see each other's effects.
    pub fn apply(&mut self, request: PatchRequest) -> Result<PatchOutcome> {
        let plan = self.plan(&request);
        log::info!(
            "Applying {} entries to {} via {} ({})",
            request.len(),
            self.path.display(),
            plan.strategy,
            plan.reason
        );

        let outcome = match options_for(plan.strategy) {
            None => {
                apply_in_place(&self.path, &self.container, &request)?;
                PatchOutcome {
                    plan,
                    summary: None,
                    bytes_written: request.total_size(),
                }
            }
            Some(options) => {
                let mut tx = Transaction::begin(&self.path)?;
                let container = &self.container;
                let (summary, bytes_written) = tx.stage_write(|file| {
                    let summary = rebuild_into(container, &request, &options, file)?;
                    Ok((summary, file.stream_position()?))
                })?;
                tx.commit()?;
                PatchOutcome {
                    plan,
                    summary: Some(summary),
                    bytes_written,
                }
            }
        };

        self.reload()?;
        Ok(outcome)
    }

    /// Replace `resource_name` inside the container's companion pair
    ///
    /// The rewritten pair is applied through [`apply`](Self::apply).
    pub fn merge<D: Disambiguator + ?Sized>(
        &mut self,
        resource_name: &str,
        payload: &[u8],
        disambiguator: &mut D,
    ) -> Result<PatchOutcome> {
        let candidates = find_candidates(&self.container);
        let patch = patch_companion_pair(
            &self.container,
            &candidates,
            disambiguator,
            resource_name,
            payload,
        )?;
        log::info!(
            "Merging {resource_name} into {} / {}",
            patch.pair.structural,
            patch.pair.bulk
        );
        self.apply(patch.into_request()?)
    }

    fn reload(&mut self) -> Result<()> {
        self.container = ArchiveContainer::open(&self.path)?;
        self.priorities = PriorityIndex::for_container(&self.container)?;
        Ok(())
    }
}

/// A request bound to its target file
#[derive(Debug, Clone)]
pub struct PatchJob {
    /// Container to patch
    pub target: PathBuf,
    /// Replacements
    pub request: PatchRequest,
}

impl PatchJob {
    /// Create a job
    pub fn new<P: Into<PathBuf>>(target: P, request: PatchRequest) -> Self {
        Self {
            target: target.into(),
            request,
        }
    }
}

fn target_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Apply independent jobs in parallel
///
/// Each job runs in its own session. Results are returned in job order.
///
/// # Errors
/// - `Error::ConcurrentTarget` if two jobs name the same file; nothing is
///   touched in that case
pub fn apply_all(jobs: Vec<PatchJob>) -> Result<Vec<Result<PatchOutcome>>> {
    use rayon::prelude::*;

    let mut seen = HashSet::with_capacity(jobs.len());
    for job in &jobs {
        if !seen.insert(target_key(&job.target)) {
            return Err(Error::ConcurrentTarget(job.target.clone()));
        }
    }

    log::debug!("Applying {} jobs in parallel", jobs.len());
    Ok(jobs
        .into_par_iter()
        .map(|job| PatchSession::open(&job.target)?.apply(job.request))
        .collect())
}
