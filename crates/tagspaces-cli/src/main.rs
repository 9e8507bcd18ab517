//! TagSpaces storage CLI.
//!
//! Entries are addressed as `<location>:<path>`, where the location part
//! is a name or uuid from the locations config (TAGSPACES_CONFIG or
//! --config) and the path is native to the location's backend.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use tagspaces_cli::{format_size, init_tracing, parse_entry_spec};
use tagspaces_core::{FileSystemEntry, Location, LocationsConfig};
use tagspaces_ops::{
    collect_dir_stats, get_metadata_id, AutoResolution, BatchReport, ConflictResolution,
    DirStats, RevisionManager, TransferOrchestrator,
};
use tagspaces_storage::{create_adapter, StorageAdapter};

#[derive(Parser)]
#[command(name = "tagspaces", about = "TagSpaces storage operations CLI")]
struct Cli {
    /// Locations config file (defaults to TAGSPACES_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured locations
    Locations,
    /// List a directory
    Ls {
        /// Directory as <location>:<path>
        spec: String,
        /// Only show files with these extensions (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
    /// Print a file's content
    Cat {
        /// File as <location>:<path>
        spec: String,
    },
    /// Copy entries into a target directory
    Cp {
        /// Source entries as <location>:<path>
        #[arg(required = true)]
        sources: Vec<String>,
        /// Target directory as <location>:<path>
        #[arg(long)]
        to: String,
        /// What to do when the target name exists: overwrite, skip, rename
        #[arg(long, default_value = "skip")]
        on_conflict: ConflictResolution,
        /// Parallel transfers
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Move entries into a target directory
    Mv {
        /// Source entries as <location>:<path>
        #[arg(required = true)]
        sources: Vec<String>,
        /// Target directory as <location>:<path>
        #[arg(long)]
        to: String,
        /// What to do when the target name exists: overwrite, skip, rename
        #[arg(long, default_value = "skip")]
        on_conflict: ConflictResolution,
        /// Parallel transfers
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Delete entries
    Rm {
        /// Entries as <location>:<path>
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Revision history of a file
    Revisions {
        /// File as <location>:<path>
        spec: String,
        #[command(subcommand)]
        sub: RevisionCommands,
    },
}

#[derive(Subcommand)]
enum RevisionCommands {
    /// List revisions, newest first
    List,
    /// Capture the current content as a new revision
    Create,
    /// Restore the revision with the given timestamp (epoch millis)
    Restore {
        lmdt: i64,
    },
    /// Delete the revision with the given timestamp (epoch millis)
    Delete {
        lmdt: i64,
    },
    /// Delete the whole revision history
    Purge,
}

fn load_config(path: &Option<PathBuf>) -> Result<LocationsConfig> {
    let config = match path {
        Some(p) => LocationsConfig::load(p)
            .with_context(|| format!("Failed to load locations config {}", p.display()))?,
        None => LocationsConfig::from_env()
            .context("Failed to load locations config. Set TAGSPACES_CONFIG or pass --config")?,
    };
    config.validate()?;
    Ok(config)
}

fn resolve<'a>(config: &'a LocationsConfig, loc_ref: &str) -> Result<&'a Location> {
    config
        .find_location_by_ref(loc_ref)
        .ok_or_else(|| anyhow!("unknown location: {}", loc_ref))
}

fn open<'a>(
    config: &'a LocationsConfig,
    spec: &str,
) -> Result<(&'a Location, Arc<dyn StorageAdapter>, String)> {
    let (loc_ref, path) = parse_entry_spec(spec)?;
    let location = resolve(config, loc_ref)?;
    let adapter = create_adapter(location)?;
    Ok((location, adapter, path.to_string()))
}

/// Stat the source specs, which must all live on one location.
async fn stat_sources(
    config: &LocationsConfig,
    specs: &[String],
) -> Result<(Arc<dyn StorageAdapter>, Vec<FileSystemEntry>)> {
    let (first_loc, adapter, first_path) = open(config, &specs[0])?;
    let mut entries = vec![adapter.stat(&first_path).await?];
    for spec in &specs[1..] {
        let (loc_ref, path) = parse_entry_spec(spec)?;
        let location = resolve(config, loc_ref)?;
        if location.uuid != first_loc.uuid {
            return Err(anyhow!("all sources must live on one location"));
        }
        entries.push(adapter.stat(path).await?);
    }
    Ok((adapter, entries))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn report_json(report: &BatchReport) -> serde_json::Value {
    serde_json::json!({
        "succeeded": report.succeeded,
        "failed": report
            .failed
            .iter()
            .map(|(path, err)| serde_json::json!({ "path": path, "error": err.to_string() }))
            .collect::<Vec<_>>(),
        "aborted": report.aborted,
        "skipped": report.skipped,
    })
}

/// Cancel the batch on Ctrl-C; a second Ctrl-C kills the process.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, aborting transfers");
            signal_cancel.cancel();
        }
    });
    cancel
}

fn log_progress(orchestrator: &TransferOrchestrator) {
    let mut rx = orchestrator.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            for task in snapshot.iter() {
                tracing::debug!(
                    path = %task.path,
                    progress = task.progress,
                    state = ?task.state,
                    "Transfer progress"
                );
            }
        }
    });
}

async fn run_transfer(
    config: &LocationsConfig,
    sources: &[String],
    to: &str,
    on_conflict: ConflictResolution,
    concurrency: usize,
    delete_source: bool,
) -> Result<()> {
    let (src_adapter, entries) = stat_sources(config, sources).await?;
    let (target_loc, dst_adapter, target_dir) = open(config, to)?;
    if target_loc.is_read_only {
        return Err(anyhow!("location {} is read-only", target_loc.name));
    }
    let sep = target_loc.dir_separator();
    let handler = AutoResolution(on_conflict);
    let cancel = cancel_on_ctrl_c();

    let (files, dirs): (Vec<FileSystemEntry>, Vec<FileSystemEntry>) =
        entries.into_iter().partition(|e| e.is_file);

    let orchestrator = TransferOrchestrator::new(concurrency);
    log_progress(&orchestrator);

    let mut report = BatchReport::default();
    if !files.is_empty() {
        let batch = if delete_source {
            orchestrator
                .move_files(
                    &files,
                    &target_dir,
                    src_adapter.clone(),
                    dst_adapter.clone(),
                    sep,
                    &handler,
                    &cancel,
                )
                .await?
        } else {
            orchestrator
                .copy_files(
                    &files,
                    &target_dir,
                    src_adapter.clone(),
                    dst_adapter.clone(),
                    sep,
                    &handler,
                    &cancel,
                )
                .await?
        };
        report.merge(batch);
    }
    if !dirs.is_empty() {
        let mut stats: Vec<DirStats> = Vec::with_capacity(dirs.len());
        for dir in &dirs {
            stats.push(collect_dir_stats(&*src_adapter, &dir.path).await?);
        }
        let batch = if delete_source {
            orchestrator
                .move_dirs(
                    &dirs, &target_dir, src_adapter, dst_adapter, sep, &handler, &cancel, &stats,
                )
                .await?
        } else {
            orchestrator
                .copy_dirs(
                    &dirs, &target_dir, src_adapter, dst_adapter, sep, &handler, &cancel, &stats,
                )
                .await?
        };
        report.merge(batch);
    }

    print_json(&report_json(&report))?;
    if report.is_complete_success() {
        Ok(())
    } else {
        Err(anyhow!("transfer finished with failures"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Locations => {
            print_json(&config.locations)?;
        }
        Commands::Ls { spec, extensions } => {
            let (location, adapter, path) = open(&config, &spec)?;
            let dir = if path.is_empty() {
                location.path().to_string()
            } else {
                path
            };
            let entries = adapter.list_directory(&dir, &extensions).await?;
            for entry in &entries {
                let kind = if entry.is_file { "f" } else { "d" };
                let size = if entry.is_file {
                    format_size(entry.size)
                } else {
                    String::new()
                };
                let lmdt = entry
                    .lmdt
                    .and_then(chrono::DateTime::from_timestamp_millis)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{}  {:>10}  {:>19}  {}", kind, size, lmdt, entry.name);
            }
        }
        Commands::Cat { spec } => {
            let (_, adapter, path) = open(&config, &spec)?;
            let content = adapter.get_file_content(&path).await?;
            let body = content
                .strip_prefix(b"\xEF\xBB\xBF".as_slice())
                .unwrap_or(&content);
            std::io::stdout().write_all(body)?;
        }
        Commands::Cp {
            sources,
            to,
            on_conflict,
            concurrency,
        } => {
            run_transfer(&config, &sources, &to, on_conflict, concurrency, false).await?;
        }
        Commands::Mv {
            sources,
            to,
            on_conflict,
            concurrency,
        } => {
            run_transfer(&config, &sources, &to, on_conflict, concurrency, true).await?;
        }
        Commands::Rm { specs } => {
            let (adapter, entries) = stat_sources(&config, &specs).await?;
            let orchestrator = TransferOrchestrator::new(1);
            let report = orchestrator.delete_entries(&entries, adapter).await?;
            print_json(&report_json(&report))?;
            if !report.is_complete_success() {
                return Err(anyhow!("delete finished with failures"));
            }
        }
        Commands::Revisions { spec, sub } => {
            let (location, adapter, path) = open(&config, &spec)?;
            let sep = location.dir_separator();
            let uuid = get_metadata_id(&*adapter, &path, true, sep).await?;
            let manager = RevisionManager::new(adapter, sep);
            match sub {
                RevisionCommands::List => {
                    let revisions = manager.list_revisions(&path, &uuid).await?;
                    let rows: Vec<serde_json::Value> = revisions
                        .iter()
                        .map(|r| {
                            serde_json::json!({
                                "lmdt": r.lmdt,
                                "size": r.size,
                                "path": r.path,
                            })
                        })
                        .collect();
                    print_json(&rows)?;
                }
                RevisionCommands::Create => {
                    let revision = manager.create_revision(&path, &uuid).await?;
                    print_json(&serde_json::json!({
                        "lmdt": revision.lmdt,
                        "path": revision.path,
                    }))?;
                }
                RevisionCommands::Restore { lmdt } => {
                    let revisions = manager.list_revisions(&path, &uuid).await?;
                    let revision = revisions
                        .iter()
                        .find(|r| r.lmdt == lmdt)
                        .ok_or_else(|| anyhow!("no revision with timestamp {}", lmdt))?;
                    manager.restore_revision(&path, &uuid, &revision.path).await?;
                    print_json(&serde_json::json!({ "restored": revision.lmdt }))?;
                }
                RevisionCommands::Delete { lmdt } => {
                    let revisions = manager.list_revisions(&path, &uuid).await?;
                    let revision = revisions
                        .iter()
                        .find(|r| r.lmdt == lmdt)
                        .ok_or_else(|| anyhow!("no revision with timestamp {}", lmdt))?;
                    manager.delete_revision(&revision.path).await?;
                    print_json(&serde_json::json!({ "deleted": revision.lmdt }))?;
                }
                RevisionCommands::Purge => {
                    manager.delete_all_revisions(&path, &uuid).await?;
                    print_json(&serde_json::json!({ "purged": true }))?;
                }
            }
        }
    }

    Ok(())
}
