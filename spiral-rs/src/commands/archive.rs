//! Container inspection, extraction and creation

use anyhow::{Context, Result, bail};
use clap::{Subcommand, ValueEnum};
use console::style;
use spiral_archive::companion::find_candidates;
use spiral_archive::container::FormatHeader;
use spiral_archive::security::validate_entry_name;
use spiral_archive::{
    ArchiveContainer, ContainerBuilder, ContainerKind, PRIORITY_MANIFEST_NAME, PriorityIndex,
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::{
    collect_mod_files, create_progress_bar, create_spinner, entry_table, format_bytes,
    matches_pattern, parse_entry_arg,
};

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KindArg {
    Wad,
    Spc,
    Zip,
}

impl From<KindArg> for ContainerKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Wad => ContainerKind::Wad,
            KindArg::Spc => ContainerKind::Spc,
            KindArg::Zip => ContainerKind::Zip,
        }
    }
}

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// List entries in a container
    List {
        /// Path to the container
        archive: String,

        /// Show size, offset and priority of each entry
        #[arg(short, long)]
        long: bool,

        /// Filter entries by pattern (supports * and ? wildcards)
        #[arg(short, long)]
        filter: Option<String>,

        /// Include the priority manifest entry
        #[arg(short, long)]
        all: bool,
    },

    /// Show information about a container
    Info {
        /// Path to the container
        archive: String,
    },

    /// Extract entries from a container
    Extract {
        /// Path to the container
        archive: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Specific entries to extract (extracts all if not specified)
        files: Vec<String>,
    },

    /// Create a new container
    Create {
        /// Path for the new container
        archive: String,

        /// Files to add, as PATH or NAME=PATH
        #[arg(short, long)]
        add: Vec<String>,

        /// Add every file below a directory, named relative to it
        #[arg(short, long)]
        dir: Option<String>,

        /// Container kind (defaults to the archive's extension)
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        /// Load-order priority recorded for every added entry
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
    },
}

pub fn execute(command: ArchiveCommands) -> Result<()> {
    match command {
        ArchiveCommands::List {
            archive,
            long,
            filter,
            all,
        } => list_archive(&archive, long, filter.as_deref(), all),
        ArchiveCommands::Info { archive } => show_info(&archive),
        ArchiveCommands::Extract {
            archive,
            output,
            files,
        } => extract_entries(&archive, &output, files),
        ArchiveCommands::Create {
            archive,
            add,
            dir,
            kind,
            priority,
        } => create_archive(&archive, &add, dir.as_deref(), kind, priority),
    }
}

pub(crate) fn open_container(path: &str) -> Result<ArchiveContainer> {
    let spinner = create_spinner("Opening container...");
    let result =
        ArchiveContainer::open(path).with_context(|| format!("Failed to open container {path}"));
    spinner.finish_and_clear();
    result
}

fn list_archive(path: &str, long: bool, filter: Option<&str>, all: bool) -> Result<()> {
    let container = open_container(path)?;
    let pattern = filter.unwrap_or("*");

    let entries: Vec<_> = container
        .entries()
        .iter()
        .filter(|e| all || e.name != PRIORITY_MANIFEST_NAME)
        .filter(|e| matches_pattern(&e.name, pattern))
        .collect();

    if entries.is_empty() {
        println!("No entries found matching pattern: {pattern}");
        return Ok(());
    }

    if long {
        entry_table(entries).printstd();
    } else {
        for entry in entries {
            println!("{}", entry.name);
        }
    }

    Ok(())
}

fn show_info(path: &str) -> Result<()> {
    let container = open_container(path)?;
    let kind = container.kind();
    let priorities = PriorityIndex::for_container(&container)?;
    let candidates = find_candidates(&container);

    println!("{}", style(format!("{kind} Container Information")).bold().cyan());
    println!("{}", style("=========================").cyan());
    println!("Path: {path}");
    println!("Container size: {}", format_bytes(container.size()));
    println!("Number of entries: {}", container.entries().len());
    println!("Data region offset: {:#x}", container.data_offset());
    println!(
        "In-place patching: {}",
        if kind.supports_in_place() {
            "supported"
        } else {
            "not supported"
        }
    );

    match container.header() {
        FormatHeader::Wad(header) => {
            println!("WAD version: {}.{}", header.major, header.minor);
            println!("Header blob: {} bytes", header.header.len());
        }
        FormatHeader::Spc(header) => {
            let compressed = header.flags.iter().filter(|f| f.cmp_flag != 1).count();
            println!("Compressed entries: {compressed}");
        }
        FormatHeader::Zip(header) => {
            if !header.directories.is_empty() {
                println!("Directories: {}", header.directories.len());
            }
            if !header.comment.is_empty() {
                println!("Comment: {}", String::from_utf8_lossy(&header.comment));
            }
        }
    }

    println!();
    if priorities.is_empty() {
        println!("Priority manifest: none");
    } else {
        println!(
            "Priority manifest: {} entries, highest priority {}",
            priorities.len(),
            priorities.highest()
        );
    }
    println!(
        "Companion resources: {} structural, {} bulk",
        candidates.structural.len(),
        candidates.bulk.len()
    );

    Ok(())
}

fn extract_entries(archive_path: &str, output_dir: &str, files: Vec<String>) -> Result<()> {
    let container = open_container(archive_path)?;

    let names: Vec<String> = if files.is_empty() {
        container
            .entries()
            .iter()
            .filter(|e| e.name != PRIORITY_MANIFEST_NAME)
            .map(|e| e.name.clone())
            .collect()
    } else {
        files
    };

    let pb = create_progress_bar(names.len() as u64, "Extracting entries");
    let mut failed = 0usize;

    for name in &names {
        pb.set_message(format!("Extracting: {name}"));

        let result = validate_entry_name(name)
            .and_then(|()| container.read_entry(name))
            .map_err(anyhow::Error::from)
            .and_then(|data| {
                let output_path = Path::new(output_dir).join(name);
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&output_path, data)?;
                Ok(())
            });

        if let Err(e) = result {
            log::warn!("Failed to extract {name}: {e}");
            failed += 1;
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    if failed > 0 {
        bail!("{failed} of {} entries could not be extracted", names.len());
    }
    println!("Extracted {} entries to {output_dir}", names.len());
    Ok(())
}

fn resolve_kind(path: &str, kind: Option<KindArg>) -> Result<ContainerKind> {
    if let Some(kind) = kind {
        return Ok(kind.into());
    }
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ContainerKind::from_extension)
        .with_context(|| format!("Cannot infer container kind of {path}, pass --kind"))
}

fn create_archive(
    path: &str,
    add: &[String],
    dir: Option<&str>,
    kind: Option<KindArg>,
    priority: i32,
) -> Result<()> {
    let kind = resolve_kind(path, kind)?;

    let mut sources: Vec<(String, PathBuf)> = match dir {
        Some(dir) => collect_mod_files(Path::new(dir))?,
        None => Vec::new(),
    };
    for arg in add {
        if arg.contains('=') {
            sources.push(parse_entry_arg(arg)?);
        } else {
            let file_name = Path::new(arg)
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Invalid file path: {arg}"))?;
            sources.push((file_name.to_string(), PathBuf::from(arg)));
        }
    }
    if sources.is_empty() {
        bail!("Nothing to add: pass --add or --dir");
    }

    let mut builder = ContainerBuilder::new(kind);
    let pb = create_progress_bar(sources.len() as u64, "Adding files");

    for (name, source) in &sources {
        pb.set_message(format!("Adding: {name}"));
        let data =
            fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
        builder = builder.add_entry_with_priority(name.as_str(), data, priority);
        pb.inc(1);
    }

    pb.finish_and_clear();

    let spinner = create_spinner("Building container...");
    builder
        .build(path)
        .with_context(|| format!("Failed to create {path}"))?;
    spinner.finish_and_clear();

    println!("Created {kind} container {path} with {} entries", sources.len());
    Ok(())
}
