//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::sink::TracingSink;
use jobindex_core::{
    IndexError, Indexer, ObjectChangeEvent, ObjectStore, Outcome, RedbStore, StoredObject,
    WriteOutcome, primitives::MAX_OBJECT_SIZE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), IndexError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| IndexError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(IndexError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, IndexError> {
    let canonical = path.canonicalize().map_err(|e| {
        IndexError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(IndexError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Parse `key=value` metadata attributes.
pub fn parse_attrs(attrs: &[String]) -> Result<Vec<(String, String)>, IndexError> {
    attrs
        .iter()
        .map(|attr| {
            attr.split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| IndexError::Decode {
                    context: "attribute".to_string(),
                    reason: format!("expected key=value, got {:?}", attr),
                })
        })
        .collect()
}

fn open_store(db_path: &Path) -> Result<RedbStore, IndexError> {
    tracing::debug!("Opening object database {}", db_path.display());
    RedbStore::open(db_path)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    config: AppConfig,
    host: &str,
    port: u16,
) -> Result<(), IndexError> {
    let store = open_store(db_path)?;

    println!("jobindex server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Database: {:?}", db_path);
    println!("  Timeout:  {}s", config.server.timeout_secs);
    println!("  Failures: {}", config.indexer.index_failures);
    println!(
        "  Token:    {}",
        if config.server.push_token.is_some() { "required" } else { "none" }
    );
    if config.server.subscriptions.is_empty() {
        println!("  Subscriptions: any");
    } else {
        println!("  Subscriptions: {}", config.server.subscriptions.join(", "));
    }
    if config.server.rate_limit == 0 {
        println!("  Rate limit: disabled");
    } else {
        println!("  Rate limit: {}/s", config.server.rate_limit);
    }
    println!();
    println!("Endpoints:");
    println!("  POST /events  - Index the object of a storage event");
    println!("  POST /pubsub  - Index the object of a Pub/Sub push message");
    println!("  GET  /objects - List object names");
    println!("  GET  /health  - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(Arc::new(store), config);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(db_path: &Path, config: &AppConfig, json_mode: bool) -> Result<(), IndexError> {
    let store = open_store(db_path)?;
    let objects = store.len()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "objects": objects,
            "log_root": config.indexer.log_root,
            "job_prefixes": config.indexer.job_prefixes,
            "required_metric": config.indexer.required_metric,
            "index_failures": config.indexer.index_failures,
        });
        println!("{}", output);
    } else {
        println!("Database:        {:?}", db_path);
        println!("Objects:         {}", objects);
        println!("Log root:        {}", config.indexer.log_root);
        println!("Job prefixes:    {}", config.indexer.job_prefixes.join(", "));
        println!("Required metric: {}", config.indexer.required_metric);
        println!("Failures index:  {}", config.indexer.index_failures);
    }
    Ok(())
}

// =============================================================================
// INDEX COMMAND
// =============================================================================

/// Deliver one storage event to the indexer.
pub fn cmd_index(
    db_path: &Path,
    config: &AppConfig,
    json_mode: bool,
    bucket: &str,
    name: &str,
) -> Result<(), IndexError> {
    let store = open_store(db_path)?;
    let event = ObjectChangeEvent::new(bucket, name);
    let outcome = Indexer::new(&store, &TracingSink, &config.indexer).handle(&event)?;

    if json_mode {
        let output = serde_json::json!({
            "object": event.uri(),
            "outcome": outcome.as_str(),
            "entries": outcome.published(),
        });
        println!("{}", output);
        return Ok(());
    }

    match &outcome {
        Outcome::Ignored => println!("Ignored {}", event.uri()),
        Outcome::Skipped(reason) => println!("Skipped {} ({})", event.uri(), reason.as_str()),
        Outcome::Indexed(entries) => {
            for entry in entries {
                println!(
                    "{:<16} {:<15} gs://{}/{}",
                    entry.kind.as_str(),
                    entry.publication.as_str(),
                    bucket,
                    entry.path
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// OBJECT COMMANDS
// =============================================================================

/// Store a file as an object unless one exists at `name`.
pub fn cmd_put(
    db_path: &Path,
    json_mode: bool,
    bucket: &str,
    name: &str,
    file: &Path,
    attrs: &[String],
) -> Result<(), IndexError> {
    let file = validate_file_path(file)?;
    validate_file_size(&file, MAX_OBJECT_SIZE as u64)?;
    let attrs = parse_attrs(attrs)?;

    let data = std::fs::read(&file)
        .map_err(|e| IndexError::Io(format!("Cannot read {}: {}", file.display(), e)))?;
    let size = data.len();
    let object = attrs
        .into_iter()
        .fold(StoredObject::new(data), |object, (key, value)| {
            object.with_attr(key, value)
        });

    let store = open_store(db_path)?;
    let created = match store.create_if_absent(bucket, name, object)? {
        WriteOutcome::Created => true,
        WriteOutcome::Exists(_) => false,
    };

    if json_mode {
        let output = serde_json::json!({
            "bucket": bucket,
            "name": name,
            "bytes": size,
            "created": created,
        });
        println!("{}", output);
    } else if created {
        println!("Stored gs://{}/{} ({} bytes)", bucket, name, size);
    } else {
        println!("gs://{}/{} already exists, left unchanged", bucket, name);
    }
    Ok(())
}

/// Print an object and its metadata.
pub fn cmd_get(db_path: &Path, json_mode: bool, bucket: &str, name: &str) -> Result<(), IndexError> {
    let store = open_store(db_path)?;
    let object = store
        .stat(bucket, name)?
        .ok_or_else(|| IndexError::NotFound {
            bucket: bucket.to_string(),
            name: name.to_string(),
        })?;
    let body = String::from_utf8_lossy(&object.data);

    if json_mode {
        let output = serde_json::json!({
            "bucket": bucket,
            "name": name,
            "metadata": object.metadata,
            "data": body,
        });
        println!("{}", output);
    } else {
        for (key, value) in &object.metadata {
            println!("{}: {}", key, value);
        }
        if !object.metadata.is_empty() {
            println!();
        }
        println!("{}", body);
    }
    Ok(())
}

/// List object names under a prefix.
pub fn cmd_list(db_path: &Path, json_mode: bool, bucket: &str, prefix: &str) -> Result<(), IndexError> {
    let store = open_store(db_path)?;
    let names = store.list(bucket, prefix)?;

    if json_mode {
        let output = serde_json::json!({
            "bucket": bucket,
            "prefix": prefix,
            "names": names,
        });
        println!("{}", output);
    } else {
        for name in &names {
            println!("{}", name);
        }
        tracing::info!("{} objects under gs://{}/{}", names.len(), bucket, prefix);
    }
    Ok(())
}

// =============================================================================
// COMPACT COMMAND
// =============================================================================

fn file_size(db_path: &Path) -> Result<u64, IndexError> {
    std::fs::metadata(db_path)
        .map(|m| m.len())
        .map_err(|e| IndexError::Io(format!("Cannot stat {}: {}", db_path.display(), e)))
}

/// Compact the database file, reclaiming space freed by old transactions.
pub fn cmd_compact(db_path: &Path, json_mode: bool) -> Result<(), IndexError> {
    if !db_path.exists() {
        return Err(IndexError::Io(format!(
            "Database {} does not exist",
            db_path.display()
        )));
    }

    let before = file_size(db_path)?;
    let mut store = open_store(db_path)?;
    store.compact()?;
    let objects = store.len()?;
    drop(store);
    let after = file_size(db_path)?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "objects": objects,
            "bytes_before": before,
            "bytes_after": after,
        });
        println!("{}", output);
    } else {
        println!(
            "Compacted {:?}: {} objects, {} -> {} bytes",
            db_path, objects, before, after
        );
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), IndexError> {
    if db_path.exists() {
        if !force {
            return Err(IndexError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path).map_err(|e| {
            IndexError::Io(format!("Cannot remove {}: {}", db_path.display(), e))
        })?;
    }

    open_store(db_path)?;
    println!("Initialized empty database at {:?}", db_path);
    Ok(())
}
