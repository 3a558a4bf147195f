//! Per-workspace run exclusion within one process.
//!
//! A backup or restore holds its workspace's [`WorkspaceGuard`] for the whole
//! run. A second run on the same workspace fails immediately with
//! [`BackupError::WorkspaceBusy`] instead of waiting. Runs in other processes
//! are not seen.

use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::{Result, error::BackupError};

#[derive(Debug, Clone, Default)]
pub struct WorkspaceLocks {
    active: Arc<Mutex<HashSet<String>>>,
}

/// Releases the workspace when dropped
#[derive(Debug)]
pub struct WorkspaceGuard {
    active: Arc<Mutex<HashSet<String>>>,
    key: String,
}

// workspace ids are GUIDs; case differences name the same workspace
fn lock_key(workspace_id: &str) -> String {
    workspace_id.trim().to_ascii_lowercase()
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `workspace_id` for the caller.
    ///
    /// # Errors
    /// - [`BackupError::WorkspaceBusy`] if another run holds it
    pub fn try_acquire(&self, workspace_id: &str) -> Result<WorkspaceGuard> {
        let key = lock_key(workspace_id);
        if !self.active.lock().insert(key.clone()) {
            return Err(BackupError::WorkspaceBusy {
                workspace_id: workspace_id.to_string(),
            });
        }
        debug!(workspace_id, "workspace locked");
        Ok(WorkspaceGuard {
            active: self.active.clone(),
            key,
        })
    }

    pub fn is_locked(&self, workspace_id: &str) -> bool {
        self.active.lock().contains(&lock_key(workspace_id))
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}
