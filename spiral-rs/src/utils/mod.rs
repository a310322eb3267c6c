//! Shared utilities for the spiral-rs CLI

pub mod format;
pub mod io;
pub mod progress;
pub mod prompt;
pub mod table;

pub use format::*;
pub use io::*;
pub use progress::*;
pub use prompt::*;
pub use table::*;
