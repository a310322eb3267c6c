//! # spiral_archive - patch engine for game-asset containers
//!
//! Injects replacement resources into WAD, SPC and ZIP containers used by
//! Danganronpa mods without breaking the byte offsets other mods rely on.
//!
//! ## Features
//!
//! - Uniform, read-only view over WAD, SPC and ZIP containers
//! - Load-order priorities shared by co-installed mods
//! - Strategy planning: in-place overwrite, reorganization or full rebuild
//! - Offset-preserving patching of `.srd`/`.srdv` companion pairs
//! - Atomic commits through staged temporary files
//!
//! ## Examples
//!
//! ### Patching a container
//!
//! ```no_run
//! use spiral_archive::{PatchRequest, PatchSession};
//!
//! # fn main() -> Result<(), spiral_archive::Error> {
//! let mut session = PatchSession::open("partition_data_win.wad")?;
//! let request = PatchRequest::new().with("bg/bg_001.tga", std::fs::read("bg_001.tga")?)?;
//!
//! let plan = session.plan(&request);
//! println!("{} because {}", plan.strategy, plan.reason);
//!
//! let outcome = session.apply(request)?;
//! println!("wrote {} bytes", outcome.bytes_written);
//! # Ok(())
//! # }
//! ```
//!
//! ### Replacing a texture inside a model pair
//!
//! ```no_run
//! use spiral_archive::{FirstCandidate, PatchSession};
//!
//! # fn main() -> Result<(), spiral_archive::Error> {
//! let mut session = PatchSession::open("model.spc")?;
//! let texture = std::fs::read("face.bc4")?;
//! session.merge("face.tex", &texture, &mut FirstCandidate)?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod companion;
pub mod container;
pub mod error;
pub mod format;
pub mod inplace;
pub mod io;
pub mod planner;
pub mod priority;
pub mod rebuild;
pub mod request;
pub mod security;
pub mod session;
pub mod spc;
pub mod special_files;
pub mod srd;
pub mod transaction;
pub mod wad;
pub mod zip_format;

// Re-export commonly used types
pub use builder::ContainerBuilder;
pub use companion::{
    CompanionCandidates, CompanionPair, CompanionPatch, CompanionRole, Disambiguator,
    FirstCandidate, Preselected, Selection, find_candidates, patch_companion_pair,
};
pub use container::{ArchiveContainer, Backing, ContainerEntry};
pub use error::{Error, Result};
pub use format::{ContainerKind, Converter, Passthrough, ResourceKind};
pub use inplace::{apply_in_place, apply_in_place_to};
pub use io::{CacheReader, CacheWriter, cache_stream};
pub use planner::{PatchPlan, PatchStrategy, PlanReason, plan};
pub use priority::{PRIORITY_MANIFEST_NAME, PriorityIndex};
pub use rebuild::{RebuildMode, RebuildOptions, RebuildSummary, rebuild, rebuild_into};
pub use request::{PatchItem, PatchRequest};
pub use security::ParseLimits;
pub use session::{PatchJob, PatchOutcome, PatchSession, apply_all};
pub use transaction::Transaction;
