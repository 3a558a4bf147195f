//! Errors returned by backup and restore runs
//!
//! Only failures that abort a run reach the caller. A step tagged degraded
//! or optional records its error in the run report instead.
use std::path::PathBuf;

use pbi::prelude::PbiError;
use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackupError {
    /// The workspace being backed up could not be identified
    #[snafu(display("fetching settings of workspace {workspace_id}: {source}"))]
    WorkspaceSettings {
        workspace_id: String,
        source: PbiError,
    },

    /// A metadata collection could not be fetched
    #[snafu(display("fetching {resource} of workspace {workspace_id}: {source}"))]
    Fetch {
        resource: &'static str,
        workspace_id: String,
        source: PbiError,
    },

    #[snafu(display("listing workspaces: {source}"))]
    ListWorkspaces { source: PbiError },

    /// The artifact directory of a snapshot could not be read
    #[snafu(display("listing artifacts in {}: {source}", path.display()))]
    ListArtifacts {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The datasets already present in the restore target could not be listed
    #[snafu(display("listing datasets of target workspace {workspace_id}: {source}"))]
    ListTargetDatasets {
        workspace_id: String,
        source: PbiError,
    },

    #[snafu(display("saving snapshot to {}: {source}", path.display()))]
    SnapshotSave {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("loading snapshot from {}: {source}", path.display()))]
    SnapshotLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A complete snapshot already exists at the run directory
    #[snafu(display("snapshot already exists at {}", path.display()))]
    SnapshotExists { path: PathBuf },

    #[snafu(display("no complete snapshot found for workspace {workspace_id}"))]
    SnapshotNotFound { workspace_id: String },

    #[snafu(display("invalid snapshot location {}: {message}", path.display()))]
    InvalidLocation { path: PathBuf, message: String },

    /// Another run holds the workspace
    #[snafu(display("workspace {workspace_id} is busy with another backup or restore"))]
    WorkspaceBusy { workspace_id: String },

    #[snafu(display("{}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("json {}: {source}", path.display()))]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
