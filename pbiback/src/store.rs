//! Snapshot persistence on the local filesystem.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<workspace id>/<YYYY-MM-DD_HH-MM-SS-mmm>/
//!     workspace_settings.json
//!     reports.json  datasets.json  dataflows.json
//!     dashboards.json  apps.json  refresh_schedules.json
//!     pbix/<report>.pbix
//!     complete_backup.json
//! ```
//!
//! `complete_backup.json` is written last, through a temporary file and a
//! rename. A directory without it is an aborted run and is never listed.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    Result,
    artifact::{PBIX_DIR, artifact_file_stem},
    error::*,
    snapshot::{Snapshot, SnapshotCounts},
};

/// Full snapshot file; its presence marks a snapshot as complete
pub const COMPLETE_BACKUP_FILE: &str = "complete_backup.json";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";

/// One row of [`FsSnapshotStore::summaries`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub workspace_id: String,
    pub workspace_name: String,
    pub timestamp: DateTime<Utc>,
    pub path: PathBuf,
    pub counts: SnapshotCounts,
}

#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all snapshots of a workspace.
    pub fn workspace_dir(&self, workspace_id: &str) -> PathBuf {
        self.root.join(artifact_file_stem(workspace_id))
    }

    /// Directory of the snapshot of `workspace_id` taken at `timestamp`.
    pub fn run_dir(&self, workspace_id: &str, timestamp: DateTime<Utc>) -> PathBuf {
        self.workspace_dir(workspace_id)
            .join(timestamp.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Creates the run directory and its artifact subdirectory.
    ///
    /// # Errors
    /// - [`BackupError::SnapshotExists`] if a complete snapshot is already there
    pub fn create_run_dir(&self, workspace_id: &str, timestamp: DateTime<Utc>) -> Result<PathBuf> {
        let dir = self.run_dir(workspace_id, timestamp);
        ensure!(
            !is_complete(&dir),
            SnapshotExistsSnafu { path: dir.clone() }
        );
        let pbix = dir.join(PBIX_DIR);
        fs::create_dir_all(&pbix).context(IoSnafu { path: pbix })?;
        Ok(dir)
    }

    /// Persists a snapshot and returns its directory.
    ///
    /// Collection files are written first and `complete_backup.json` last, so
    /// a failure part way leaves a directory that [`list`](Self::list) ignores.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let dir = self.create_run_dir(&snapshot.workspace_id, snapshot.timestamp)?;
        write_json(&dir, "workspace_settings.json", &snapshot.workspace_settings)?;
        write_json(&dir, "reports.json", &snapshot.reports)?;
        write_json(&dir, "datasets.json", &snapshot.datasets)?;
        write_json(&dir, "dataflows.json", &snapshot.dataflows)?;
        write_json(&dir, "dashboards.json", &snapshot.dashboards)?;
        write_json(&dir, "apps.json", &snapshot.apps)?;
        write_json(&dir, "refresh_schedules.json", &snapshot.refresh_schedules)?;
        write_json(&dir, COMPLETE_BACKUP_FILE, snapshot)?;
        info!(path = %dir.display(), counts = %snapshot.counts(), "snapshot saved");
        Ok(dir)
    }

    /// Directory of the snapshot at `location`, which names either the
    /// directory itself or its `complete_backup.json`.
    pub fn snapshot_dir(location: &Path) -> PathBuf {
        match location.parent() {
            Some(parent) if location.is_file() => parent.to_path_buf(),
            _ => location.to_path_buf(),
        }
    }

    /// Loads a snapshot from its directory (or from its `complete_backup.json`).
    pub fn load(&self, location: &Path) -> Result<Snapshot> {
        let file = if location.is_dir() {
            location.join(COMPLETE_BACKUP_FILE)
        } else {
            location.to_path_buf()
        };
        ensure!(
            file.is_file(),
            InvalidLocationSnafu {
                path: location,
                message: "not a complete snapshot",
            }
        );
        let text = fs::read(&file).context(SnapshotLoadSnafu { path: &file })?;
        let snapshot: Snapshot =
            serde_json::from_slice(&text).context(JsonSnafu { path: &file })?;
        debug!(path = %file.display(), counts = %snapshot.counts(), "snapshot loaded");
        Ok(snapshot)
    }

    /// Complete snapshots of a workspace, oldest first.
    pub fn list(&self, workspace_id: &str) -> Result<Vec<PathBuf>> {
        complete_runs(&self.workspace_dir(workspace_id))
    }

    /// Most recent complete snapshot of a workspace.
    ///
    /// # Errors
    /// - [`BackupError::SnapshotNotFound`] if there is none
    pub fn latest(&self, workspace_id: &str) -> Result<PathBuf> {
        self.list(workspace_id)?
            .pop()
            .context(SnapshotNotFoundSnafu { workspace_id })
    }

    /// Summaries of every complete snapshot under the root, or only those
    /// of `workspace_id`. Unreadable snapshots are skipped with a warning.
    pub fn summaries(&self, workspace_id: Option<&str>) -> Result<Vec<SnapshotSummary>> {
        let workspace_dirs = match workspace_id {
            Some(id) => vec![self.workspace_dir(id)],
            None => subdirectories(&self.root)?,
        };
        let mut summaries = Vec::new();
        for ws_dir in workspace_dirs {
            for path in complete_runs(&ws_dir)? {
                match self.load(&path) {
                    Ok(snapshot) => summaries.push(SnapshotSummary {
                        counts: snapshot.counts(),
                        workspace_id: snapshot.workspace_id,
                        workspace_name: snapshot.workspace_name,
                        timestamp: snapshot.timestamp,
                        path,
                    }),
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable snapshot"),
                }
            }
        }
        Ok(summaries)
    }
}

fn is_complete(dir: &Path) -> bool {
    dir.join(COMPLETE_BACKUP_FILE).is_file()
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(BackupError::Io { path: dir.to_path_buf(), source }),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.context(IoSnafu { path: dir })?;
        if entry.file_type().context(IoSnafu { path: dir })?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

// run directory names sort chronologically
fn complete_runs(workspace_dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(subdirectories(workspace_dir)?
        .into_iter()
        .filter(|dir| is_complete(dir))
        .collect())
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let tmp = dir.join(format!(".{name}.tmp"));
    let text = serde_json::to_vec_pretty(value).context(JsonSnafu { path: &path })?;
    let result = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(&text)?;
        file.sync_all()
    });
    if let Err(source) = result.and_then(|()| fs::rename(&tmp, &path)) {
        let _ = fs::remove_file(&tmp);
        return Err(BackupError::SnapshotSave { path, source });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pbi::prelude::*;

    use super::*;

    fn snapshot_at(workspace_id: &str, secs: i64) -> Snapshot {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        let mut snapshot = Snapshot::new(workspace_id, ts);
        snapshot.workspace_name = "Finance".into();
        snapshot.reports.push(Report {
            id: "r1".into(),
            name: "Sales".into(),
            dataset_id: "d1".into(),
            embed_url: String::new(),
            web_url: String::new(),
            report_type: None,
        });
        snapshot
    }

    #[test]
    fn run_dir_uses_millisecond_timestamp() {
        let store = FsSnapshotStore::new("/backups");
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            store.run_dir("ws/1", ts),
            PathBuf::from("/backups/ws%2F1/2023-11-14_22-13-20-123")
        );
    }

    #[test]
    fn save_writes_collection_files_and_loads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());
        let snapshot = snapshot_at("ws1", 0);
        let dir = store.save(&snapshot).unwrap();
        for name in [
            "workspace_settings.json",
            "reports.json",
            "datasets.json",
            "dataflows.json",
            "dashboards.json",
            "apps.json",
            "refresh_schedules.json",
            COMPLETE_BACKUP_FILE,
        ] {
            assert!(dir.join(name).is_file(), "{name}");
        }
        assert!(dir.join(PBIX_DIR).is_dir());
        assert_eq!(store.load(&dir).unwrap(), snapshot);
        assert_eq!(
            store.load(&dir.join(COMPLETE_BACKUP_FILE)).unwrap(),
            snapshot
        );
        assert_eq!(FsSnapshotStore::snapshot_dir(&dir), dir);
        assert_eq!(
            FsSnapshotStore::snapshot_dir(&dir.join(COMPLETE_BACKUP_FILE)),
            dir
        );
    }

    #[test]
    fn complete_snapshot_is_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());
        let snapshot = snapshot_at("ws1", 0);
        store.save(&snapshot).unwrap();
        let err = store.save(&snapshot).unwrap_err();
        assert!(matches!(err, BackupError::SnapshotExists { .. }), "{err}");
    }

    #[test]
    fn list_skips_incomplete_runs_and_sorts_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());
        let newer = store.save(&snapshot_at("ws1", 60)).unwrap();
        let older = store.save(&snapshot_at("ws1", 0)).unwrap();
        // aborted run: directory without complete_backup.json
        let aborted = store
            .create_run_dir("ws1", Utc.timestamp_opt(1_700_000_999, 0).unwrap())
            .unwrap();

        assert_eq!(store.list("ws1").unwrap(), vec![older, newer.clone()]);
        assert_eq!(store.latest("ws1").unwrap(), newer);
        assert!(aborted.is_dir());
    }

    #[test]
    fn latest_without_snapshots_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());
        assert!(store.list("nobody").unwrap().is_empty());
        assert!(matches!(
            store.latest("nobody"),
            Err(BackupError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn load_rejects_incomplete_location() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());
        let err = store.load(tmp.path()).unwrap_err();
        assert!(matches!(err, BackupError::InvalidLocation { .. }), "{err}");
    }

    #[test]
    fn summaries_cover_all_workspaces() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(tmp.path());
        store.save(&snapshot_at("ws1", 0)).unwrap();
        store.save(&snapshot_at("ws2", 0)).unwrap();
        let corrupt = store
            .create_run_dir("ws2", Utc.timestamp_opt(1_700_000_500, 0).unwrap())
            .unwrap();
        fs::write(corrupt.join(COMPLETE_BACKUP_FILE), b"{not json").unwrap();

        let all = store.summaries(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].workspace_id, "ws1");
        assert_eq!(all[0].counts.reports, 1);
        assert_eq!(all[1].workspace_name, "Finance");

        let one = store.summaries(Some("ws2")).unwrap();
        assert_eq!(one.len(), 1);
    }
}
