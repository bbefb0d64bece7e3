//! Versioned on-disk snapshots of fitted engine state.
//!
//! A snapshot is a bincode header followed by the bincode-encoded state. Files
//! are written to a temporary file in the target directory and renamed into
//! place, so a reader never observes a half-written snapshot.

pub mod cache;

use crate::error::{RecommenderError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const MAGIC: [u8; 8] = *b"STYLEREC";
pub const FORMAT_VERSION: u32 = 2;
/// Content state whose feature matrix lives in a separate sidecar file.
pub const LEGACY_SPLIT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    Collaborative,
    Content,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Collaborative => "collaborative",
            EngineKind::Content => "content",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: [u8; 8],
    pub format_version: u32,
    pub kind: EngineKind,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
}

impl SnapshotHeader {
    pub fn new(kind: EngineKind, format_version: u32) -> Self {
        Self {
            magic: MAGIC,
            format_version,
            kind,
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Writes `header` then `state` atomically to `path`, creating parent directories.
pub fn write_snapshot<T: Serialize>(path: &Path, header: &SnapshotHeader, state: &T) -> Result<()> {
    write_atomic(path, |writer| {
        bincode::serialize_into(&mut *writer, header)?;
        bincode::serialize_into(&mut *writer, state)
    })?;
    info!(
        path = %path.display(),
        kind = header.kind.as_str(),
        version = header.format_version,
        "Snapshot saved"
    );
    Ok(())
}

/// Writes a bare bincode value (no header) atomically. Used for sidecar files.
pub fn write_blob<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| bincode::serialize_into(&mut *writer, value))
}

pub fn read_blob<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| RecommenderError::io(format!("opening {}", path.display()), e))?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| RecommenderError::serialization(format!("reading {}", path.display()), e))
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> bincode::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| RecommenderError::io(format!("creating {}", dir.display()), e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| RecommenderError::io(format!("creating temp file in {}", dir.display()), e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)
            .map_err(|e| RecommenderError::serialization(format!("writing {}", path.display()), e))?;
        writer
            .flush()
            .map_err(|e| RecommenderError::io(format!("flushing {}", path.display()), e))?;
    }
    tmp.persist(path)
        .map_err(|e| RecommenderError::io(format!("persisting {}", path.display()), e.error))?;
    Ok(())
}

/// An opened snapshot whose header has been checked; the state is read on demand.
pub struct SnapshotReader {
    path: PathBuf,
    header: SnapshotHeader,
    reader: BufReader<File>,
}

impl SnapshotReader {
    /// Opens `path` and validates magic, engine kind and format version.
    pub fn open(path: &Path, kind: EngineKind) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| RecommenderError::io(format!("opening snapshot {}", path.display()), e))?;
        let mut reader = BufReader::new(file);
        let format_error = |reason: String| RecommenderError::SnapshotFormat {
            path: path.to_path_buf(),
            reason,
        };

        let header: SnapshotHeader = bincode::deserialize_from(&mut reader)
            .map_err(|e| format_error(format!("unreadable header: {}", e)))?;
        if header.magic != MAGIC {
            return Err(format_error("bad magic bytes".to_string()));
        }
        if header.kind != kind {
            return Err(format_error(format!(
                "holds a {} engine, expected {}",
                header.kind.as_str(),
                kind.as_str()
            )));
        }
        if header.format_version != FORMAT_VERSION && header.format_version != LEGACY_SPLIT_VERSION {
            return Err(format_error(format!(
                "unsupported format version {}",
                header.format_version
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            reader,
        })
    }

    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_state<T: DeserializeOwned>(mut self) -> Result<T> {
        let state = bincode::deserialize_from(&mut self.reader).map_err(|e| {
            RecommenderError::serialization(format!("reading state from {}", self.path.display()), e)
        })?;
        info!(
            path = %self.path.display(),
            kind = self.header.kind.as_str(),
            version = self.header.format_version,
            created_at = %self.header.created_at,
            "Snapshot loaded"
        );
        Ok(state)
    }
}
