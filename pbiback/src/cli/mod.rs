use std::{
    io::{self, IsTerminal},
    path::PathBuf,
};

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pbi::prelude::*;
use pbiback::{
    Orchestrator,
    report::{BackupAllOutcome, BackupOutcome, RestoreOutcome},
    store::FsSnapshotStore,
};
use serde::Serialize;
use tracing::info;

const DEFAULT_BACKUP_DIR: &str = "./backups";

#[derive(Parser, Debug)]
#[command(name = "pbiback")]
#[command(author, version, about = "Power BI workspace backup and restore tool", long_about = None)]
pub struct Cli {
    /// REST endpoint. Default: <https://api.powerbi.com/v1.0/myorg>
    #[arg(long, env = "PBI_API_URL", global = true)]
    pub api_url: Option<String>,

    /// OAuth authority. Default: <https://login.microsoftonline.com>
    #[arg(long, env = "PBI_AUTHORITY_URL", global = true)]
    pub authority_url: Option<String>,

    /// Azure AD tenant id
    #[arg(long, env = "PBI_TENANT_ID", global = true)]
    pub tenant_id: Option<String>,

    /// Service principal application (client) id
    #[arg(long, env = "PBI_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Service principal secret
    #[arg(long, env = "PBI_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub client_secret: Option<String>,

    /// Root directory of the snapshot store
    #[arg(long, env = "PBI_BACKUP_DIR", default_value = DEFAULT_BACKUP_DIR, global = true)]
    pub backup_dir: PathBuf,

    /// Print machine-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose mode (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Color mode for log output
    #[arg(long, value_enum, default_value_t = ColorArg::Auto, global = true)]
    pub color: ColorArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up one workspace, or all of them
    Backup(BackupArgs),

    /// Restore a snapshot into a workspace
    Restore(RestoreArgs),

    /// List snapshots in the backup directory
    List(ListArgs),

    /// List workspaces the service principal can access
    Workspaces,

    /// Create a new workspace
    WorkspaceCreate(WorkspaceCreateArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["workspace", "all"])))]
pub struct BackupArgs {
    /// Workspace id to back up
    #[arg(long)]
    pub workspace: Option<String>,

    /// Back up every accessible workspace
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["snapshot", "latest_from"])))]
pub struct RestoreArgs {
    /// Target workspace id
    #[arg(long)]
    pub workspace: String,

    /// Snapshot directory to restore
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Restore the latest snapshot of this source workspace id
    #[arg(long)]
    pub latest_from: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only snapshots of this workspace id
    #[arg(long)]
    pub workspace: Option<String>,
}

#[derive(Args, Debug)]
pub struct WorkspaceCreateArgs {
    /// Display name of the new workspace
    pub name: String,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    let store = FsSnapshotStore::new(&cli.backup_dir);
    if let Commands::List(args) = &cli.command {
        return handle_list(cli.json, &store, args);
    }

    let client = build_client(&cli)?;
    client
        .authenticate()
        .await
        .context("authentication failed")?;
    let orchestrator = Orchestrator::new(client, store);

    match cli.command {
        Commands::Backup(args) => handle_backup(cli.json, &orchestrator, args).await,
        Commands::Restore(args) => handle_restore(cli.json, &orchestrator, args).await,
        Commands::Workspaces => handle_workspaces(cli.json, orchestrator.api()).await,
        Commands::WorkspaceCreate(args) => {
            handle_workspace_create(cli.json, orchestrator.api(), &args.name).await
        }
        Commands::List(_) => unreachable!("handled above"),
    }
}

fn build_client(cli: &Cli) -> Result<PbiClient> {
    let mut config = ClientConfig::default();
    if let Some(url) = &cli.api_url {
        config = config.base_url(url);
    }
    if let Some(url) = &cli.authority_url {
        config = config.authority_url(url);
    }
    if let Some(tenant) = &cli.tenant_id {
        config = config.tenant_id(tenant);
    }
    if let Some(client_id) = &cli.client_id {
        config = config.client_id(client_id);
    }
    if let Some(secret) = &cli.client_secret {
        config = config.client_secret(secret);
    }
    let missing = config.missing_credentials();
    if !missing.is_empty() {
        bail!("missing credentials: set {}", missing.join(", "));
    }
    Ok(PbiClient::with_config(config)?)
}

async fn handle_backup(
    json: bool,
    orchestrator: &Orchestrator<PbiClient>,
    args: BackupArgs,
) -> Result<()> {
    if args.all {
        let progress = ProgressReporter::new(json, "Backing up all workspaces");
        let outcome = orchestrator.run_backup_all().await?;
        sync_filesystem_after_snapshot_write();
        progress.finish(&format!(
            "Backed up {} workspaces ({} failed)",
            outcome.succeeded, outcome.failed
        ));
        return print_backup_all(json, &outcome);
    }

    let Some(workspace_id) = args.workspace.as_deref() else {
        bail!("--workspace or --all is required");
    };
    let progress = ProgressReporter::new(json, &format!("Backing up workspace {workspace_id}"));
    let outcome = orchestrator
        .run_backup(workspace_id)
        .await
        .with_context(|| format!("backup of workspace {workspace_id} failed"))?;
    sync_filesystem_after_snapshot_write();
    progress.finish("Backup complete");
    print_backup(json, &outcome)
}

async fn handle_restore(
    json: bool,
    orchestrator: &Orchestrator<PbiClient>,
    args: RestoreArgs,
) -> Result<()> {
    let location = match (&args.snapshot, &args.latest_from) {
        (Some(path), _) => path.clone(),
        (None, Some(source)) => orchestrator.store().latest(source)?,
        (None, None) => bail!("--snapshot or --latest-from is required"),
    };
    info!(location = %location.display(), target = %args.workspace, "restoring");
    let progress = ProgressReporter::new(
        json,
        &format!("Restoring into workspace {}", args.workspace),
    );
    let outcome = orchestrator
        .run_restore(&args.workspace, &location)
        .await
        .with_context(|| format!("restore into workspace {} failed", args.workspace))?;
    progress.finish("Restore complete");
    print_restore(json, &outcome)
}

fn handle_list(json: bool, store: &FsSnapshotStore, args: &ListArgs) -> Result<()> {
    let summaries = store.summaries(args.workspace.as_deref())?;
    if json {
        return emit_json(&summaries);
    }
    if summaries.is_empty() {
        println!("no snapshots in {}", store.root().display());
        return Ok(());
    }
    for s in &summaries {
        println!(
            "{}  {} ({})  {}",
            s.timestamp.format("%Y-%m-%d %H:%M:%S"),
            s.workspace_name,
            s.workspace_id,
            s.counts
        );
        println!("    {}", s.path.display());
    }
    Ok(())
}

async fn handle_workspaces(json: bool, client: &PbiClient) -> Result<()> {
    let workspaces = client.list_workspaces().await?;
    if json {
        return emit_json(&workspaces);
    }
    for ws in &workspaces {
        println!("{}  {}", ws.id, ws.name);
    }
    Ok(())
}

async fn handle_workspace_create(json: bool, client: &PbiClient, name: &str) -> Result<()> {
    let workspace = client
        .create_workspace(name)
        .await
        .with_context(|| format!("creating workspace {name:?}"))?;
    if json {
        return emit_json(&workspace);
    }
    println!("created workspace {} ({})", workspace.name, workspace.id);
    Ok(())
}

fn print_backup(json: bool, outcome: &BackupOutcome) -> Result<()> {
    if json {
        return emit_json(outcome);
    }
    println!(
        "backup of {} ({}) saved to {}",
        outcome.workspace_name,
        outcome.workspace_id,
        outcome.location.display()
    );
    print!("{}", outcome.report);
    if outcome.report.is_degraded() {
        println!("warning: backup is incomplete, see failed steps above");
    }
    Ok(())
}

fn print_backup_all(json: bool, outcome: &BackupAllOutcome) -> Result<()> {
    if json {
        return emit_json(outcome);
    }
    for ws in &outcome.workspaces {
        match (&ws.location, &ws.error) {
            (Some(path), _) => println!(
                "{}  {}  {}{}",
                ws.workspace_id,
                ws.workspace_name,
                path.display(),
                if ws.degraded { "  (incomplete)" } else { "" }
            ),
            (None, error) => println!(
                "{}  {}  FAILED: {}",
                ws.workspace_id,
                ws.workspace_name,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!("succeeded={} failed={}", outcome.succeeded, outcome.failed);
    Ok(())
}

fn print_restore(json: bool, outcome: &RestoreOutcome) -> Result<()> {
    if json {
        return emit_json(outcome);
    }
    println!(
        "restored {} into workspace {}",
        outcome.snapshot_location.display(),
        outcome.target_workspace_id
    );
    for item in &outcome.imports {
        let final_name = item.final_name.as_deref().unwrap_or_default();
        match &item.error {
            Some(err) => println!("  import {:<30} {} {err}", item.name, item.status),
            None if final_name != item.name => {
                println!("  import {:<30} {} as {final_name}", item.name, item.status);
            }
            None => println!("  import {:<30} {}", item.name, item.status),
        }
    }
    for item in &outcome.schedules {
        println!(
            "  schedule {:<28} {}{}",
            item.name,
            item.status,
            item.error
                .as_deref()
                .map(|e| format!(" {e}"))
                .unwrap_or_default()
        );
    }
    print!("{}", outcome.report);
    Ok(())
}

fn progress_enabled(json: bool, stderr_is_tty: bool) -> bool {
    !json && stderr_is_tty
}

struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    fn new(json: bool, message: &str) -> Self {
        let enabled = progress_enabled(json, io::stderr().is_terminal());
        if enabled {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar.set_message(message.to_string());
            Self { bar: Some(bar) }
        } else {
            Self { bar: None }
        }
    }

    fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

fn sync_filesystem_after_snapshot_write() {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        nix::unistd::sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    #[test]
    fn backup_requires_workspace_or_all() {
        assert!(parse(&["pbiback", "backup"]).is_err());
        assert!(parse(&["pbiback", "backup", "--workspace", "w", "--all"]).is_err());
        let cli = parse(&["pbiback", "backup", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Backup(BackupArgs { all: true, .. })));
    }

    #[test]
    fn restore_requires_exactly_one_source() {
        assert!(parse(&["pbiback", "restore", "--workspace", "t"]).is_err());
        assert!(
            parse(&[
                "pbiback", "restore", "--workspace", "t", "--snapshot", "s", "--latest-from", "w"
            ])
            .is_err()
        );
        let cli = parse(&["pbiback", "restore", "--workspace", "t", "--latest-from", "src"]).unwrap();
        let Commands::Restore(args) = cli.command else {
            panic!("expected restore");
        };
        assert_eq!(args.latest_from.as_deref(), Some("src"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["pbiback", "list", "--json", "-vv", "--backup-dir", "/tmp/b"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.backup_dir, PathBuf::from("/tmp/b"));
    }

    #[test]
    fn progress_disabled_for_json_or_pipes() {
        assert!(progress_enabled(false, true));
        assert!(!progress_enabled(true, true));
        assert!(!progress_enabled(false, false));
    }
}
