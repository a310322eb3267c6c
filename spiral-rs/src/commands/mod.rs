//! Command implementations

pub mod archive;
pub mod patch;
