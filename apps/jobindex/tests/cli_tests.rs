//! Tests for the CLI commands against an on-disk database.

#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use jobindex::cli::{self, Cli, Commands};
use jobindex::config::AppConfig;
use jobindex_core::{IndexError, ObjectStore, RedbStore};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MARKER: &str = "logs/my-job/55/finished.json";
const STATE_ENTRY: &str = "index/job-state/2021-05-03T00:00:00Z/my-job/55";

fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_parse_attrs() {
    let attrs = cli::parse_attrs(&["link=gs://b/x".to_string(), "empty=".to_string()]).unwrap();
    assert_eq!(
        attrs,
        vec![
            ("link".to_string(), "gs://b/x".to_string()),
            ("empty".to_string(), String::new()),
        ]
    );

    assert!(cli::parse_attrs(&["no-separator".to_string()]).is_err());
    assert!(cli::parse_attrs(&["=value".to_string()]).is_err());
}

#[test]
fn test_put_then_index() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let marker = write_file(dir.path(), "finished.json", r#"{"timestamp":1620000000,"passed":false}"#);

    cli::cmd_put(&db, false, "b", MARKER, &marker, &["origin=test".to_string()]).unwrap();
    cli::cmd_index(&db, &AppConfig::default(), true, "b", MARKER).unwrap();

    let store = RedbStore::open(&db).unwrap();
    let source = store.stat("b", MARKER).unwrap().unwrap();
    assert_eq!(source.metadata.get("origin").map(String::as_str), Some("test"));

    let entry = store.stat("b", STATE_ENTRY).unwrap().unwrap();
    assert_eq!(entry.metadata.get("state").map(String::as_str), Some("failed"));
}

#[test]
fn test_put_keeps_existing_object() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let first = write_file(dir.path(), "first", "one");
    let second = write_file(dir.path(), "second", "two");

    cli::cmd_put(&db, false, "b", "obj", &first, &[]).unwrap();
    cli::cmd_put(&db, true, "b", "obj", &second, &[]).unwrap();

    let store = RedbStore::open(&db).unwrap();
    assert_eq!(store.get("b", "obj").unwrap(), b"one".to_vec());
}

#[test]
fn test_get_missing_object() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");

    let err = cli::cmd_get(&db, false, "b", "nope").unwrap_err();
    assert!(matches!(err, IndexError::NotFound { .. }));
}

#[test]
fn test_put_missing_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");

    let err = cli::cmd_put(&db, false, "b", "obj", &dir.path().join("absent"), &[]).unwrap_err();
    assert!(matches!(err, IndexError::Io(_)));
}

#[test]
fn test_init_refuses_existing_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let file = write_file(dir.path(), "obj", "data");

    cli::cmd_init(&db, false).unwrap();
    cli::cmd_put(&db, false, "b", "obj", &file, &[]).unwrap();
    assert!(cli::cmd_init(&db, false).is_err());

    cli::cmd_init(&db, true).unwrap();
    let store = RedbStore::open(&db).unwrap();
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_list_and_status() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let file = write_file(dir.path(), "obj", "data");

    cli::cmd_put(&db, false, "b", "logs/a", &file, &[]).unwrap();
    cli::cmd_list(&db, true, "b", "logs/").unwrap();
    cli::cmd_status(&db, &AppConfig::default(), true).unwrap();
}

#[test]
fn test_compact_keeps_objects() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("test.db");
    let file = write_file(dir.path(), "obj", &"x".repeat(4096));

    for i in 0..8 {
        cli::cmd_put(&db, true, "b", &format!("logs/{i}"), &file, &[]).unwrap();
    }
    cli::cmd_compact(&db, true).unwrap();

    let store = RedbStore::open(&db).unwrap();
    assert_eq!(store.len().unwrap(), 8);
    assert_eq!(store.get("b", "logs/3").unwrap().len(), 4096);
}

#[test]
fn test_compact_missing_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("absent.db");

    let err = cli::cmd_compact(&db, false).unwrap_err();
    assert!(err.is_transient());
    assert!(!db.exists());
}

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from([
        "jobindex", "-D", "x.db", "put", "-b", "b", "-n", "obj", "-f", "data.json", "-a", "k=v",
        "--attr", "k2=v2",
    ])
    .unwrap();

    assert_eq!(cli.database, PathBuf::from("x.db"));
    match cli.command {
        Some(Commands::Put { bucket, name, attrs, .. }) => {
            assert_eq!(bucket, "b");
            assert_eq!(name, "obj");
            assert_eq!(attrs, vec!["k=v".to_string(), "k2=v2".to_string()]);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["jobindex", "compact", "-D", "y.db"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Compact)));
    assert_eq!(cli.database, PathBuf::from("y.db"));

    let cli = Cli::try_parse_from(["jobindex", "--json-mode"]).unwrap();
    assert!(cli.json_mode);
    assert!(cli.command.is_none());
}
