//! Patch planning, application and companion-pair merging

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use console::style;
use spiral_archive::{
    CompanionRole, Converter, Disambiguator, FirstCandidate, Passthrough, PatchJob, PatchOutcome,
    PatchRequest, PatchSession, PlanReason, Preselected, ResourceKind, Selection, apply_all,
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::{
    Prompt, add_table_row, collect_mod_files, create_spinner, create_table, format_bytes,
    format_priority, parse_entry_arg,
};

/// Replacement payloads shared by `plan` and `apply`
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Replace or add one entry, as NAME=PATH
    #[arg(short, long = "entry")]
    pub entries: Vec<String>,

    /// Replace or add every file below a directory, named relative to it
    #[arg(short, long)]
    pub dir: Option<String>,
}

#[derive(Subcommand)]
pub enum PatchCommands {
    /// Show how a patch would be applied without writing anything
    Plan {
        /// Path to the container
        archive: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Apply a patch to one or more containers
    Apply {
        /// Containers to patch; several are patched in parallel
        #[arg(required = true)]
        archives: Vec<String>,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Replace one resource inside a structural/bulk companion pair
    Merge {
        /// Path to the container
        archive: String,

        /// File holding the new payload
        payload: String,

        /// Name of the resource inside the structural resource table
        /// [default: the payload's file name]
        resource: Option<String>,

        /// Structural (.srd) entry to use when several exist
        #[arg(long)]
        structural: Option<String>,

        /// Bulk data (.srdv) entry to use when several exist
        #[arg(long)]
        bulk: Option<String>,

        /// Pick the first candidate instead of asking
        #[arg(long)]
        first: bool,
    },
}

pub fn execute(command: PatchCommands) -> Result<()> {
    match command {
        PatchCommands::Plan { archive, request } => plan_patch(&archive, &request),
        PatchCommands::Apply { archives, request } => apply_patch(&archives, &request),
        PatchCommands::Merge {
            archive,
            payload,
            resource,
            structural,
            bulk,
            first,
        } => {
            let payload = Path::new(&payload);
            let resource = resource_name(resource, payload)?;
            merge_resource(
                &archive,
                &resource,
                payload,
                Preselected { structural, bulk },
                first,
            )
        }
    }
}

/// The named resource, or the payload's file name when none was given
fn resource_name(resource: Option<String>, payload: &Path) -> Result<String> {
    match resource {
        Some(name) => Ok(name),
        None => payload
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot name a resource after {}", payload.display())),
    }
}

/// Read every payload named by `args` into a request
pub fn build_request(args: &RequestArgs) -> Result<PatchRequest> {
    let mut sources: Vec<(String, PathBuf)> = match &args.dir {
        Some(dir) => collect_mod_files(Path::new(dir))?,
        None => Vec::new(),
    };
    for arg in &args.entries {
        sources.push(parse_entry_arg(arg)?);
    }
    if sources.is_empty() {
        bail!("Nothing to patch: pass --entry NAME=PATH or --dir DIR");
    }

    let mut request = PatchRequest::new();
    for (name, path) in sources {
        let data = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        request = request
            .with(name.as_str(), data)
            .with_context(|| format!("Cannot patch {name}"))?;
    }
    Ok(request)
}

fn plan_patch(path: &str, args: &RequestArgs) -> Result<()> {
    let request = build_request(args)?;
    let session =
        PatchSession::open(path).with_context(|| format!("Failed to open container {path}"))?;
    let plan = session.plan(&request);

    println!("{}", style("Patch Plan").bold().cyan());
    println!("{}", style("==========").cyan());
    println!("Container: {path}");
    println!("Strategy: {}", plan.strategy);
    println!("Reason: {}", plan.reason);
    if plan.reason == PlanReason::NewEntries {
        println!("New entries: {}", plan.names.len());
    }
    println!();

    let container = session.container();
    let mut table = create_table(&["Entry", "Current", "New", "Priority"]);
    for item in request.items() {
        let (current, priority) = match container.entry(&item.name) {
            Some(entry) => (format_bytes(entry.size), format_priority(entry.priority)),
            None => ("(new)".to_string(), "-".to_string()),
        };
        add_table_row(
            &mut table,
            vec![item.name.clone(), current, format_bytes(item.size()), priority],
        );
    }
    table.printstd();

    println!();
    println!("Dry run: nothing was written");
    Ok(())
}

fn print_outcome(path: &str, outcome: &PatchOutcome) {
    println!(
        "{path}: {} ({}), wrote {}",
        outcome.plan.strategy,
        outcome.plan.reason,
        format_bytes(outcome.bytes_written)
    );
    if let Some(summary) = &outcome.summary {
        println!(
            "  {} copied, {} replaced, {} inserted",
            summary.copied, summary.replaced, summary.inserted
        );
    }
}

fn apply_patch(archives: &[String], args: &RequestArgs) -> Result<()> {
    let request = build_request(args)?;

    if let [path] = archives {
        let mut session =
            PatchSession::open(path).with_context(|| format!("Failed to open container {path}"))?;
        let spinner = create_spinner("Applying patch...");
        let result = session.apply(request);
        spinner.finish_and_clear();
        let outcome = result.with_context(|| format!("Failed to patch {path}"))?;
        print_outcome(path, &outcome);
        return Ok(());
    }

    let jobs = archives
        .iter()
        .map(|path| PatchJob::new(path, request.clone()))
        .collect();
    let spinner = create_spinner(&format!("Patching {} containers...", archives.len()));
    let results = apply_all(jobs);
    spinner.finish_and_clear();

    let mut failed = 0usize;
    for (path, result) in archives.iter().zip(results?) {
        match result {
            Ok(outcome) => print_outcome(path, &outcome),
            Err(e) => {
                log::error!("Failed to patch {path}: {e}");
                println!("{path}: failed: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} containers could not be patched", archives.len());
    }
    Ok(())
}

/// Answers fixed names first, then either the first candidate or the user
struct MergeChooser<D> {
    preselected: Preselected,
    first: bool,
    fallback: D,
}

impl<D: Disambiguator> Disambiguator for MergeChooser<D> {
    fn choose(&mut self, role: CompanionRole, candidates: &[String]) -> Selection {
        let fixed = match role {
            CompanionRole::Structural => &self.preselected.structural,
            CompanionRole::Bulk => &self.preselected.bulk,
        };
        if let Some(name) = fixed {
            return Selection::Selected(name.clone());
        }
        if self.first {
            FirstCandidate.choose(role, candidates)
        } else {
            self.fallback.choose(role, candidates)
        }
    }
}

/// Convert a payload file to the resource's kind when both kinds are known
fn load_payload(payload: &Path, resource: &str) -> Result<Vec<u8>> {
    let data =
        fs::read(payload).with_context(|| format!("Failed to read {}", payload.display()))?;
    let from = ResourceKind::detect(&data)
        .or_else(|| ResourceKind::for_name(&payload.to_string_lossy()));
    match (from, ResourceKind::for_name(resource)) {
        (Some(from), Some(to)) => Ok(Passthrough
            .convert(from, to, &data)
            .with_context(|| format!("Cannot use {} for {resource}", payload.display()))?),
        _ => Ok(data),
    }
}

fn merge_resource(
    path: &str,
    resource: &str,
    payload: &Path,
    preselected: Preselected,
    first: bool,
) -> Result<()> {
    let data = load_payload(payload, resource)?;
    let mut session =
        PatchSession::open(path).with_context(|| format!("Failed to open container {path}"))?;

    let mut chooser = MergeChooser {
        preselected,
        first,
        fallback: Prompt::stdio(),
    };
    let outcome = session
        .merge(resource, &data, &mut chooser)
        .with_context(|| format!("Failed to merge {resource} into {path}"))?;

    println!("Merged {resource} ({})", format_bytes(data.len() as u64));
    print_outcome(path, &outcome);
    Ok(())
}
