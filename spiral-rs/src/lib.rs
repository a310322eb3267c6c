//! Spiral-RS library
//!
//! Command implementations behind the `spiral-rs` binary.

pub mod cli;
pub mod commands;
pub mod utils;
