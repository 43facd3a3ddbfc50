//! Integration tests for marksync
//!
//! These tests drive the full loop: scan a workspace, mutate through the
//! sync engine or status calls, and check both source text and stored state.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::NaiveDate;
use markstore::MetaStore;
use marksync::{EventBus, FsDocuments, ItemStatus, ScanEvent, Scanner, ScannerConfig, SyncEngine, item_id};
use predicates::prelude::*;
use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;

fn workspace(temp: &TempDir) -> PathBuf {
    let root = temp.path().join("ws");
    fs::create_dir_all(root.join("src")).expect("Failed to create workspace");
    root
}

fn scanner_for(temp: &TempDir, root: &Path, config: ScannerConfig) -> Scanner {
    let meta = MetaStore::open(temp.path().join("state.json")).expect("Failed to open metadata store");
    Scanner::new(config, vec![root.to_path_buf()], meta, EventBus::default())
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

// =============================================================================
// Workspace scan
// =============================================================================

#[tokio::test]
async fn test_batched_scan_reports_once() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    for i in 0..45 {
        fs::write(root.join("src").join(format!("f{:02}.rs", i)), format!("// TODO: task {}\n", i))
            .expect("Failed to write file");
    }

    let config = ScannerConfig {
        batch_size: 20,
        ..ScannerConfig::default()
    };
    let mut scanner = scanner_for(&temp, &root, config);
    let mut rx = scanner.events().subscribe();

    let items = scanner.scan_workspace().await;
    assert_eq!(items.len(), 45);
    assert_eq!(scanner.last_batch_sizes(), &[20, 20, 5]);

    let mut completed = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ScanEvent::ScanCompleted { count }) => completed.push(count),
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("unexpected receive error: {:?}", e),
        }
    }
    assert_eq!(completed, vec![45]);
}

#[tokio::test]
async fn test_excluded_and_unlisted_files_are_skipped() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    fs::create_dir_all(root.join("node_modules/pkg")).expect("Failed to create dir");
    fs::write(root.join("node_modules/pkg/index.js"), "// TODO: vendored\n").expect("write");
    fs::write(root.join("src/notes.bin"), "// TODO: binary\n").expect("write");
    fs::write(root.join("src/main.py"), "# FIXME: real one\n").expect("write");

    let mut scanner = scanner_for(&temp, &root, ScannerConfig::default());
    let items = scanner.scan_workspace().await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].description, "real one");
}

// =============================================================================
// Write-back
// =============================================================================

#[tokio::test]
async fn test_due_date_round_trip_through_source() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    let file = root.join("src/parser.rs");
    let original = "fn parse() {}\n// TODO: fix parser\n";
    fs::write(&file, original).expect("write");

    let mut scanner = scanner_for(&temp, &root, ScannerConfig::default());
    scanner.scan_workspace().await;
    let engine = SyncEngine::new(FsDocuments::new());
    let id = item_id(&file, 1);

    assert!(engine.set_due_date_by_id(&mut scanner, &id, day(2024, 3, 1)).await);
    assert_eq!(
        fs::read_to_string(&file).expect("read"),
        "fn parse() {}\n// TODO(@2024-03-01): fix parser\n"
    );
    assert_eq!(scanner.overdue_on(day(2024, 3, 2)).len(), 1);
    assert_eq!(scanner.due_today_on(day(2024, 3, 1)).len(), 1);

    let item = scanner.get(&id).cloned().expect("item present");
    assert!(engine.clear_due_date(&mut scanner, &item).await);
    assert_eq!(fs::read_to_string(&file).expect("read"), original);
    assert_eq!(scanner.no_due_date().len(), 1);
}

#[tokio::test]
async fn test_delete_line_renumbers_following_items() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    let file = root.join("src/lib.rs");
    fs::write(&file, "// TODO: first\n// HACK: second\n// BUG: third\n").expect("write");

    let mut scanner = scanner_for(&temp, &root, ScannerConfig::default());
    scanner.scan_workspace().await;
    let engine = SyncEngine::new(FsDocuments::new());
    let first = scanner.get(&item_id(&file, 0)).cloned().expect("item present");

    assert!(engine.delete_line(&mut scanner, &first, true).await);

    let items = scanner.open_items();
    let lines: Vec<_> = items.iter().map(|i| (i.line_number, i.description.as_str())).collect();
    assert_eq!(lines, vec![(0, "second"), (1, "third")]);
    assert!(scanner.get(&item_id(&file, 2)).is_none());
}

#[tokio::test]
async fn test_mark_done_survives_restart() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    let file = root.join("src/app.ts");
    fs::write(&file, "// TODO: ship it\n").expect("write");
    let id = item_id(&file, 0);

    {
        let mut scanner = scanner_for(&temp, &root, ScannerConfig::default());
        scanner.scan_workspace().await;
        let engine = SyncEngine::new(FsDocuments::new());
        let item = scanner.get(&id).cloned().expect("item present");
        assert!(engine.mark_done(&mut scanner, &item).await);
    }

    assert_eq!(fs::read_to_string(&file).expect("read"), "// DONE: ship it\n");

    // DONE is not a marker, so a fresh scan finds nothing, but the record remains
    let mut scanner = scanner_for(&temp, &root, ScannerConfig::default());
    assert!(scanner.scan_workspace().await.is_empty());
    assert_eq!(
        scanner.meta().get(&id).map(|m| m.status),
        Some(ItemStatus::Completed)
    );
}

// =============================================================================
// Status persistence
// =============================================================================

#[tokio::test]
async fn test_status_is_restored_on_rescan() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    let file = root.join("src/main.go");
    fs::write(&file, "// TODO: one\n// FIXME: two\n").expect("write");
    let first = item_id(&file, 0);
    let second = item_id(&file, 1);

    {
        let mut scanner = scanner_for(&temp, &root, ScannerConfig::default());
        scanner.scan_workspace().await;
        scanner.mark_complete(&first).expect("mark complete");
        scanner.snooze(&second, day(2030, 1, 1)).expect("snooze");
    }

    let mut scanner = scanner_for(&temp, &root, ScannerConfig::default());
    let open = scanner.scan_workspace().await;

    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second);
    assert_eq!(open[0].status, ItemStatus::Snoozed);
    assert_eq!(scanner.completed().len(), 1);
    assert_eq!(scanner.open_count(), 0);
    assert_eq!(
        scanner.meta().get(&second).and_then(|m| m.snoozed_until),
        Some(day(2030, 1, 1))
    );
}

// =============================================================================
// CLI
// =============================================================================

fn mk(temp: &TempDir, root: &Path) -> Command {
    let config = temp.path().join("marksync.yml");
    fs::write(
        &config,
        format!("storage:\n  state-file: {}\n", temp.path().join("state.json").display()),
    )
    .expect("Failed to write config");

    let mut cmd = Command::cargo_bin("mk").expect("mk binary");
    cmd.env("XDG_DATA_HOME", temp.path().join("data"))
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(&config)
        .arg("--root")
        .arg(root);
    cmd
}

#[test]
fn test_cli_scan_and_list() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    fs::write(root.join("src/lib.rs"), "// TODO: from the cli @2024-03-01\n").expect("write");

    mk(&temp, &root)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 comments"));

    mk(&temp, &root)
        .args(["list", "--filter", "overdue"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from the cli"));
}

#[test]
fn test_cli_delete_needs_yes() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);
    let file = root.join("src/lib.rs");
    fs::write(&file, "// TODO: keep me\n").expect("write");
    let canonical = file.canonicalize().expect("canonical path");
    let id = item_id(&canonical, 0);

    mk(&temp, &root)
        .args(["delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
    assert_eq!(fs::read_to_string(&file).expect("read"), "// TODO: keep me\n");

    mk(&temp, &root).args(["delete", &id, "--yes"]).assert().success();
    assert_eq!(fs::read_to_string(&file).expect("read"), "");
}

#[test]
fn test_cli_unknown_id_fails() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = workspace(&temp);

    mk(&temp, &root).args(["done", "000000000000"]).assert().failure();
}
