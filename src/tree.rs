//! Persistence for the relation trees.
//!
//! The three graphs of a dump are serialized next to the dump itself, at
//! `<dump path>-trees.db`. The file is a cache, not a source of truth: a
//! missing, corrupt, version-mismatched or stale file just triggers a full
//! rebuild. Writes go through a temp file and an atomic rename so a crash
//! mid-write leaves either no tree file or a complete one.

use crate::config::{TREE_SUFFIX, TREE_VERSION};
use crate::relations::RelationTrees;
use anyhow::{bail, Context, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Serialize, Deserialize)]
struct TreeMetadata {
    version: u32,
    input_path: String,
    input_mtime: u64,
    input_size: u64,
}

#[derive(Deserialize)]
struct TreeFileDe {
    metadata: TreeMetadata,
    trees: RelationTrees,
}

/// Borrows the trees to avoid cloning every edge set during serialization.
#[derive(Serialize)]
struct TreeFileSer<'a> {
    metadata: TreeMetadata,
    trees: &'a RelationTrees,
}

pub fn tree_path(input_path: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", input_path, TREE_SUFFIX))
}

fn get_input_metadata(input_path: &str) -> Result<(u64, u64)> {
    let metadata = fs::metadata(input_path)
        .with_context(|| format!("Failed to get metadata for: {}", input_path))?;
    let mtime = metadata
        .modified()
        .context("Failed to get modification time")?
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("Invalid modification time")?
        .as_secs();
    Ok((mtime, metadata.len()))
}

/// Returns `Ok(Some(trees))` if a valid tree file exists, `Ok(None)` if it is
/// missing, corrupt, from another format version, or stale with respect to
/// the dump file.
pub fn try_load(path: &Path, input_path: &str) -> Result<Option<RelationTrees>> {
    if !path.exists() {
        return Ok(None);
    }

    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Tree file cannot be opened, rebuilding");
            return Ok(None);
        }
    };
    let reader = BufReader::with_capacity(256 * 1024, file);

    let options = bincode::options().with_limit(file_size.saturating_add(1024));

    let cache: TreeFileDe = match options.deserialize_from(reader) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Tree file is corrupt or unreadable");
            return Ok(None);
        }
    };

    if cache.metadata.version != TREE_VERSION {
        info!(
            cached = cache.metadata.version,
            current = TREE_VERSION,
            "Tree file version mismatch"
        );
        return Ok(None);
    }

    if cache.metadata.input_path != input_path {
        info!(
            cached = cache.metadata.input_path,
            current = input_path,
            "Tree file input path mismatch"
        );
        return Ok(None);
    }

    let (mtime, size) = get_input_metadata(input_path)?;
    if cache.metadata.input_mtime != mtime || cache.metadata.input_size != size {
        info!(
            cached_mtime = cache.metadata.input_mtime,
            current_mtime = mtime,
            cached_size = cache.metadata.input_size,
            current_size = size,
            "Dump file has changed since the trees were built"
        );
        return Ok(None);
    }

    info!(
        pages = cache.trees.references.node_count(),
        "Relation trees loaded from cache"
    );

    Ok(Some(cache.trees))
}

/// Serializes the trees by reference and writes atomically via rename.
pub fn save(trees: &RelationTrees, input_path: &str) -> Result<()> {
    let path = tree_path(input_path);
    let (mtime, size) = get_input_metadata(input_path)?;

    let cache = TreeFileSer {
        metadata: TreeMetadata {
            version: TREE_VERSION,
            input_path: input_path.to_string(),
            input_mtime: mtime,
            input_size: size,
        },
        trees,
    };

    let tmp_path = path.with_extension("db.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp tree file: {:?}", tmp_path))?;
    let mut writer = BufWriter::new(file);

    bincode::DefaultOptions::new()
        .serialize_into(&mut writer, &cache)
        .context("Failed to serialize relation trees")?;
    writer.flush().context("Failed to flush relation trees")?;

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to rename temp tree file to: {:?}", path))?;

    info!(
        pages = trees.references.node_count(),
        template_edges = trees.templates.edge_count(),
        include_edges = trees.includes.edge_count(),
        reference_edges = trees.references.edge_count(),
        path = ?path,
        "Relation trees saved"
    );

    Ok(())
}

/// Loads a tree file without validating staleness.
pub fn load(path: &Path) -> Result<RelationTrees> {
    if !path.exists() {
        bail!("Tree file does not exist: {:?}", path);
    }

    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let file =
        File::open(path).with_context(|| format!("Failed to open tree file: {:?}", path))?;
    let reader = BufReader::with_capacity(256 * 1024, file);

    let options = bincode::options().with_limit(file_size.saturating_add(1024));

    let cache: TreeFileDe = options
        .deserialize_from(reader)
        .context("Failed to deserialize relation trees")?;

    Ok(cache.trees)
}
