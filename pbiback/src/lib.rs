/*
 * pbiback - backup and restore Power BI workspaces
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Workspace backup and restore
//!
//! A backup captures one workspace into a snapshot directory: metadata for
//! every resource kind, the refresh schedule of each dataset, and one PBIX
//! artifact per report. A restore imports those artifacts into a target
//! workspace, picking collision-free dataset names, and then re-applies the
//! captured refresh schedules by dataset name.
//!
//! Both runs are driven by an ordered step table ([`steps`]). Each step is
//! tagged fatal, degraded or optional; only fatal step failures are returned
//! as errors. Everything else is counted in the [`report::RunReport`].
//!
//! ```rust,no_run
//! use pbi::prelude::*;
//! use pbiback::{Orchestrator, store::FsSnapshotStore};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PbiClient::new()?;
//! client.authenticate().await?;
//! let orchestrator = Orchestrator::new(client, FsSnapshotStore::new("./backups"));
//! let backup = orchestrator.run_backup("source-workspace-id").await?;
//! let restore = orchestrator
//!     .run_restore("target-workspace-id", &backup.location)
//!     .await?;
//! println!("imported {} artifacts", restore.report.succeeded("import_artifacts"));
//! # Ok(())
//! # }
//! ```
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::future_not_send)]
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

pub mod api;
pub mod artifact;
mod backup;
pub mod error;
pub mod locks;
pub mod reconcile;
pub mod report;
mod restore;
pub mod snapshot;
pub mod steps;
pub mod store;

pub use backup::Orchestrator;
pub use error::BackupError;

/// Result type alias using `BackupError` as the default error.
pub type Result<T, E = BackupError> = std::result::Result<T, E>;
