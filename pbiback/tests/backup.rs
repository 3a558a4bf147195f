//! Backup orchestration against an in-memory API.

mod common;

use std::fs;

use common::{FakeApi, FakeWorkspace, orchestrator, report};
use pbi::prelude::*;
use pbiback::{
    BackupError, Orchestrator,
    artifact::{PBIX_DIR, list_artifacts},
    report::StepStatus,
    steps::StepPolicy,
    store::{COMPLETE_BACKUP_FILE, FsSnapshotStore},
};

fn app(id: &str, workspace_id: &str) -> App {
    App {
        id: id.into(),
        name: format!("app {id}"),
        workspace_id: workspace_id.into(),
    }
}

#[test_log::test(tokio::test)]
async fn backup_captures_every_collection() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales", "Finance", "Ops"]);
    api.state.lock().apps = vec![app("a1", "ws1"), app("a2", "other")];
    let (orch, _tmp) = orchestrator(api);

    let outcome = orch.run_backup("ws1").await.unwrap();
    assert!(!outcome.report.is_degraded(), "{}", outcome.report);
    assert_eq!(outcome.workspace_name, "Workspace ws1");

    let snapshot = &outcome.snapshot;
    assert_eq!(snapshot.reports.len(), 3);
    assert_eq!(snapshot.datasets.len(), 3);
    assert_eq!(snapshot.refresh_schedules.len(), 3);
    // only apps published from this workspace
    assert_eq!(snapshot.apps.len(), 1);
    assert_eq!(snapshot.apps[0].id, "a1");
    let sched = &snapshot.refresh_schedules[1];
    assert_eq!(sched.dataset_name, "Finance");
    assert_eq!(sched.dataset_id, "ws1-d1");

    // one timestamp for directory and snapshot
    assert_eq!(
        outcome.location,
        orch.store().run_dir("ws1", snapshot.timestamp)
    );
    assert!(outcome.location.join(COMPLETE_BACKUP_FILE).is_file());
    assert_eq!(orch.store().load(&outcome.location).unwrap(), *snapshot);
    assert_eq!(orch.store().latest("ws1").unwrap(), outcome.location);

    let artifacts = list_artifacts(&outcome.location).unwrap();
    assert_eq!(artifacts.len(), 3);
    let sales = outcome.location.join(PBIX_DIR).join("Sales.pbix");
    assert_eq!(fs::read(sales).unwrap(), b"pbix:Sales:0");
    assert_eq!(outcome.report.succeeded("export_artifacts"), 3);
}

#[test_log::test(tokio::test)]
async fn settings_failure_aborts_without_snapshot() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales"]);
    api.fail("get_workspace_settings");
    let (orch, _tmp) = orchestrator(api);

    let err = orch.run_backup("ws1").await.unwrap_err();
    assert!(matches!(err, BackupError::WorkspaceSettings { .. }), "{err}");
    assert_eq!(orch.api().calls("list_reports"), 0);
    assert_eq!(orch.api().calls("export_report"), 0);
    assert!(orch.store().list("ws1").unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn collection_failures_degrade_but_succeed() {
    for (op, step) in [
        ("list_reports", "reports"),
        ("list_datasets", "datasets"),
        ("list_dataflows", "dataflows"),
        ("list_dashboards", "dashboards"),
    ] {
        let api = FakeApi::new();
        api.add_source_workspace("ws1", &["Sales", "Finance"]);
        api.fail(op);
        let (orch, _tmp) = orchestrator(api);

        let outcome = orch.run_backup("ws1").await.unwrap();
        assert!(outcome.report.is_degraded(), "{op}");
        let step_report = outcome.report.step(step).unwrap();
        assert_eq!(step_report.status, StepStatus::Failed, "{op}");
        assert_eq!(step_report.policy, StepPolicy::Degraded);
        assert!(step_report.error.is_some());
        assert!(outcome.location.join(COMPLETE_BACKUP_FILE).is_file(), "{op}");
    }
}

#[test_log::test(tokio::test)]
async fn failed_report_listing_leaves_no_artifacts() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales"]);
    api.fail("list_reports");
    let (orch, _tmp) = orchestrator(api);

    let outcome = orch.run_backup("ws1").await.unwrap();
    assert!(outcome.snapshot.reports.is_empty());
    assert_eq!(outcome.snapshot.datasets.len(), 1);
    assert!(list_artifacts(&outcome.location).unwrap().is_empty());
    assert_eq!(orch.api().calls("export_report"), 0);
}

#[test_log::test(tokio::test)]
async fn schedule_fetch_failures_are_counted_not_fatal() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales", "Finance", "Ops"]);
    api.fail_after("get_refresh_schedule", 1);
    let (orch, _tmp) = orchestrator(api);

    let outcome = orch.run_backup("ws1").await.unwrap();
    let step = outcome.report.step("refresh_schedules").unwrap();
    assert_eq!(step.status, StepStatus::Partial);
    assert_eq!((step.succeeded, step.failed), (1, 2));
    assert_eq!(outcome.snapshot.refresh_schedules.len(), 1);
}

#[test_log::test(tokio::test)]
async fn dataset_without_schedule_is_omitted() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales", "Finance"]);
    api.state
        .lock()
        .workspaces
        .get_mut("ws1")
        .unwrap()
        .schedules
        .remove("ws1-d0");
    let (orch, _tmp) = orchestrator(api);

    let outcome = orch.run_backup("ws1").await.unwrap();
    assert!(!outcome.report.is_degraded());
    assert_eq!(outcome.snapshot.refresh_schedules.len(), 1);
    assert_eq!(outcome.snapshot.refresh_schedules[0].dataset_name, "Finance");
}

#[test_log::test(tokio::test)]
async fn apps_failure_is_optional() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales"]);
    api.fail("list_apps");
    let (orch, _tmp) = orchestrator(api);

    let outcome = orch.run_backup("ws1").await.unwrap();
    assert!(outcome.snapshot.apps.is_empty());
    assert!(!outcome.report.is_degraded(), "{}", outcome.report);
    let apps = outcome.report.step("apps").unwrap();
    assert_eq!(apps.policy, StepPolicy::Optional);
}

#[test_log::test(tokio::test)]
async fn failed_exports_leave_no_file() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["A", "B", "C", "D", "E", "F"]);
    api.fail_export("ws1-r3");
    let (orch, _tmp) = orchestrator(api);

    let outcome = orch.run_backup("ws1").await.unwrap();
    assert_eq!(outcome.report.succeeded("export_artifacts"), 5);
    assert_eq!(outcome.report.failed("export_artifacts"), 1);
    assert!(outcome.report.is_degraded());
    // report metadata is still captured
    assert_eq!(outcome.snapshot.reports.len(), 6);

    let pbix = outcome.location.join(PBIX_DIR);
    assert!(!pbix.join("D.pbix").exists());
    let names: Vec<String> = fs::read_dir(&pbix)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 5, "{names:?}");
    assert!(names.iter().all(|n| n.ends_with(".pbix")), "{names:?}");
}

#[test_log::test(tokio::test)]
async fn duplicate_and_unsafe_report_names_get_distinct_files() {
    let api = FakeApi::new();
    let mut ws = FakeWorkspace {
        name: "Dupes".into(),
        ..FakeWorkspace::default()
    };
    for (idx, name) in ["Sales", "Sales", "sales", "Q1/Q2"].iter().enumerate() {
        let id = format!("r{idx}");
        ws.reports.push(report(&id, name, ""));
        ws.exports.insert(id, name.as_bytes().to_vec());
    }
    api.add_workspace("ws1", ws);
    let (orch, _tmp) = orchestrator(api);

    let outcome = orch.run_backup("ws1").await.unwrap();
    let files: Vec<Option<String>> = outcome
        .exports
        .iter()
        .map(|e| e.final_name.clone())
        .collect();
    assert_eq!(
        files,
        vec![
            Some("Sales.pbix".to_string()),
            Some("Sales_1.pbix".to_string()),
            Some("%73ales.pbix".to_string()),
            Some("Q1%2FQ2.pbix".to_string()),
        ]
    );
    assert_eq!(list_artifacts(&outcome.location).unwrap().len(), 4);
}

#[test_log::test(tokio::test)]
async fn persist_failure_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    // the store root is a regular file, so nothing can be created below it
    let root = tmp.path().join("not-a-dir");
    fs::write(&root, b"x").unwrap();
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales"]);
    let orch = Orchestrator::new(api, FsSnapshotStore::new(&root));

    let err = orch.run_backup("ws1").await.unwrap_err();
    assert!(matches!(err, BackupError::Io { .. }), "{err}");
}

#[test_log::test(tokio::test)]
async fn failed_completion_write_leaves_no_snapshot() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales", "Finance"]);
    let (orch, _tmp) = orchestrator(api);
    let ws_dir = orch.store().workspace_dir("ws1");
    orch.api().block_snapshot_completion(&ws_dir);

    let err = orch.run_backup("ws1").await.unwrap_err();
    assert!(matches!(err, BackupError::SnapshotSave { .. }), "{err}");

    // exports and collection files were written, the completion file was not
    let run_dirs: Vec<_> = fs::read_dir(&ws_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(run_dirs.len(), 1);
    let run_dir = &run_dirs[0];
    assert_eq!(list_artifacts(run_dir).unwrap().len(), 2);
    assert!(run_dir.join("reports.json").is_file());
    assert!(!run_dir.join(COMPLETE_BACKUP_FILE).is_file());

    assert!(orch.store().list("ws1").unwrap().is_empty());
    let err = orch.store().latest("ws1").unwrap_err();
    assert!(matches!(err, BackupError::SnapshotNotFound { .. }), "{err}");
    assert!(orch.store().summaries(None).unwrap().is_empty());
    assert!(!orch.locks().is_locked("ws1"));
}

#[test_log::test(tokio::test)]
async fn busy_workspace_is_rejected() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales"]);
    let (orch, _tmp) = orchestrator(api);

    let guard = orch.locks().try_acquire("ws1").unwrap();
    let err = orch.run_backup("ws1").await.unwrap_err();
    assert!(matches!(err, BackupError::WorkspaceBusy { .. }), "{err}");
    assert_eq!(orch.api().calls("get_workspace_settings"), 0);
    drop(guard);

    orch.run_backup("ws1").await.unwrap();
    assert!(!orch.locks().is_locked("ws1"));
}

#[test_log::test(tokio::test)]
async fn backup_all_continues_past_failures() {
    let api = FakeApi::new();
    api.add_source_workspace("ws1", &["Sales"]);
    api.add_source_workspace("ws2", &["Finance"]);
    api.add_source_workspace("ws3", &["Ops"]);
    let (orch, _tmp) = orchestrator(api);

    let _busy = orch.locks().try_acquire("ws2").unwrap();
    let outcome = orch.run_backup_all().await.unwrap();
    assert_eq!((outcome.succeeded, outcome.failed), (2, 1));
    let failed = &outcome.workspaces[1];
    assert_eq!(failed.workspace_id, "ws2");
    assert!(failed.location.is_none());
    assert!(failed.error.as_deref().unwrap().contains("busy"));
    assert_eq!(orch.store().summaries(None).unwrap().len(), 2);
}

#[test_log::test(tokio::test)]
async fn backup_all_fails_when_workspaces_cannot_be_listed() {
    let api = FakeApi::new();
    api.fail("list_workspaces");
    let (orch, _tmp) = orchestrator(api);
    assert!(matches!(
        orch.run_backup_all().await,
        Err(BackupError::ListWorkspaces { .. })
    ));
}
