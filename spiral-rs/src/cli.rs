//! Root CLI structure for spiral-rs

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "spiral-rs")]
#[command(about = "Command-line tools for Danganronpa game containers", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect, extract and create WAD, SPC and ZIP containers
    Archive {
        #[command(subcommand)]
        command: crate::commands::archive::ArchiveCommands,
    },

    /// Plan and apply patches to containers
    Patch {
        #[command(subcommand)]
        command: crate::commands::patch::PatchCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
